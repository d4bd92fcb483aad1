//! Configuration module.
//!
//! Handles the TOML settings file and environment overrides.

mod settings;

pub use settings::{
    BoosterSettings, CacheSettings, IngestSettings, SessionSettings, Settings, SettingsError,
    DEFAULT_BASE_URL,
};

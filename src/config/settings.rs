//! TOML-based configuration.
//!
//! Example configuration:
//! ```toml
//! [cache]
//! dir = "/var/cache/mtgjson"
//! offline = false
//! timeout_secs = 120
//! base_url = "https://mtgjson.com/api/v5"
//!
//! [ingest]
//! sample_rows = 256
//! batch_size = 8192
//!
//! [booster]
//! sampling = "independent"   # or "distinct", "follow_sheet"
//! box_size = 36
//!
//! [session]
//! max_workers = 4
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::booster::SamplingPolicy;

/// Default remote base URL of the dataset.
pub const DEFAULT_BASE_URL: &str = "https://mtgjson.com/api/v5";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub cache: CacheSettings,
    pub ingest: IngestSettings,
    pub booster: BoosterSettings,
    pub session: SessionSettings,
}

/// Local cache and download settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache root. Defaults to the platform cache directory.
    pub dir: Option<PathBuf>,

    /// Never touch the network; serve cached files only.
    pub offline: bool,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,

    /// Remote base URL.
    pub base_url: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: None,
            offline: false,
            timeout_secs: 120,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl CacheSettings {
    /// The configured cache root, or `<platform cache dir>/mtgjson`.
    pub fn resolved_dir(&self) -> Result<PathBuf, SettingsError> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|base| base.join("mtgjson"))
                .ok_or(SettingsError::NoCacheDir),
        }
    }
}

/// Schema inference and bulk-load settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Rows sampled from the first batch for shape inference.
    pub sample_rows: usize,

    /// Rows per Arrow batch when reading Parquet.
    pub batch_size: usize,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            sample_rows: 256,
            batch_size: 8192,
        }
    }
}

/// Booster simulation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BoosterSettings {
    /// How a slot with multiplicity > 1 draws from its sheet.
    pub sampling: SamplingPolicy,

    /// Packs per box.
    pub box_size: usize,
}

impl Default for BoosterSettings {
    fn default() -> Self {
        Self {
            sampling: SamplingPolicy::default(),
            box_size: 36,
        }
    }
}

/// Async wrapper settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on concurrently running delegated calls.
    pub max_workers: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { max_workers: 4 }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `MTGJSON_CONFIG`
    /// 2. `./mtgjson.toml`
    /// 3. `<config dir>/mtgjson/config.toml`
    ///
    /// `MTGJSON_CACHE_DIR` and `MTGJSON_OFFLINE` override the loaded values.
    pub fn load() -> Result<Self, SettingsError> {
        let mut settings = Self::load_file()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn load_file() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("MTGJSON_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("mtgjson.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mtgjson").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Apply `MTGJSON_CACHE_DIR` / `MTGJSON_OFFLINE` from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("MTGJSON_CACHE_DIR") {
            if !dir.is_empty() {
                self.cache.dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(flag) = env::var("MTGJSON_OFFLINE") {
            self.cache.offline = matches!(flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    /// Reject values that would make the session unusable.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.ingest.batch_size == 0 {
            return Err(SettingsError::InvalidConfig(
                "ingest.batch_size must be positive".into(),
            ));
        }
        if self.session.max_workers == 0 {
            return Err(SettingsError::InvalidConfig(
                "session.max_workers must be positive".into(),
            ));
        }
        if self.cache.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "cache.base_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}

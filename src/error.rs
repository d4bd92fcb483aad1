//! Crate-level error taxonomy.
//!
//! Each component owns a narrow error enum (`CacheError`, `BoosterError`,
//! `SettingsError`); [`Error`] aggregates them so callers can branch on the
//! failure kind without string matching.

use std::io;

use thiserror::Error;

use crate::booster::BoosterError;
use crate::cache::CacheError;
use crate::config::SettingsError;

/// Result type for session-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session, the view registry and the materializer.
#[derive(Error, Debug)]
pub enum Error {
    /// Cache lifecycle failure (network, offline, corrupt file).
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Booster configuration or sampling failure.
    #[error(transparent)]
    Booster(#[from] BoosterError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The requested name is not a known logical view.
    #[error("unknown view: {0}")]
    UnknownView(String),

    /// A delegated call could not run to completion on the worker pool.
    #[error("worker task failed: {0}")]
    Task(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True when the failure came from the network and a retry may succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Cache(CacheError::NetworkFailure { .. }))
    }

    /// True when a required file is missing and offline mode forbade fetching it.
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::Cache(CacheError::DataUnavailable { .. }))
    }
}

/// Non-fatal conditions raised while ingesting a file.
///
/// These never abort a load. They are logged and attached to the resulting
/// relation so callers can inspect what was guessed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestWarning {
    /// Sample evidence for a plural-named column pointed both ways.
    #[error("column '{column}' has ambiguous shape: {reason}")]
    SchemaInferenceAmbiguous { column: String, reason: String },

    /// A column the unpivot relies on is absent from the file.
    #[error("'{view}' is missing expected columns {missing:?}; loaded as-is")]
    UnpivotSourceMissingColumns { view: String, missing: Vec<String> },
}

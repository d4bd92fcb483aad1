//! # mtgjson
//!
//! Adaptive ingestion and SQL access for the MTGJSON card dataset.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Remote (CDN / mirror)                  │
//! │          Meta.json, parquet/*.parquet, *.json.gz         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [cache]
//! ┌─────────────────────────────────────────────────────────┐
//! │      Versioned generations + atomic manifest on disk     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Column shapes (static, blocklist, plurals)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [transform]
//! ┌─────────────────────────────────────────────────────────┐
//! │   List splitting, legality unpivot, price flattening     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [views]
//! ┌─────────────────────────────────────────────────────────┐
//! │        SQLite tables bound lazily by view name           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [session / booster]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Raw SQL, export, booster pack simulation          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mtgjson::{Session, Settings};
//! use rusqlite::types::Value;
//!
//! let session = Session::open(Settings::load()?)?;
//! session.refresh()?;
//! session.ensure_views(&["cards"])?;
//! let rows = session.run(
//!     "SELECT name FROM cards WHERE manaValue = ? LIMIT 5",
//!     &[Value::Real(1.0)],
//! )?;
//! println!("{}", rows.to_json());
//! # Ok::<(), mtgjson::Error>(())
//! ```

pub mod async_session;
pub mod booster;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod schema;
pub mod session;
pub mod transform;
pub mod views;

pub use async_session::AsyncSession;
pub use booster::{BoosterConfig, BoosterEngine, BoosterError, BoosterSheet, SamplingPolicy};
pub use cache::{CacheError, CacheManager, DatasetVersion, ProgressFn, RemoteSource};
pub use config::Settings;
pub use error::{Error, IngestWarning, Result};
pub use schema::{infer_shape, ColumnShape, FileDescriptor, ShapeKind, ShapeSource};
pub use session::{Rows, Session};
pub use views::{Relation, ViewRegistry};

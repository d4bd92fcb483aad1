//! The query surface.
//!
//! A [`Session`] owns the cache, an in-memory SQLite engine and the view
//! registry. All state sits behind one lock, so the session is `Send + Sync`
//! and registration is at-most-once per view per generation.
//!
//! ```text
//! Session
//!   └─ Mutex<Inner>
//!        ├─ CacheManager   files on disk, version lifecycle
//!        ├─ Connection     in-memory SQLite, one table per bound view
//!        └─ ViewRegistry   name -> Arc<Relation>
//! ```

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, DatabaseName};
use serde_json::{Map, Value as Json};
use tracing::info;

use crate::booster::config::{self as booster_config, BOOSTER_VIEWS, SHEETS_VIEW};
use crate::booster::{BoosterConfig, BoosterEngine, BoosterSheet};
use crate::cache::{CacheManager, DatasetVersion, ProgressFn};
use crate::catalog::{self, META_ID};
use crate::config::Settings;
use crate::error::Result;
use crate::views::{loader, Relation, ViewRegistry};

/// A result grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json(&self) -> Json {
        Json::Array(
            self.rows
                .iter()
                .map(|row| {
                    let object: Map<String, Json> = self
                        .columns
                        .iter()
                        .cloned()
                        .zip(row.iter().map(value_to_json))
                        .collect();
                    Json::Object(object)
                })
                .collect(),
        )
    }
}

/// JSON rendering of a SQLite value. Blobs become lowercase hex.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Integer(i) => Json::from(*i),
        Value::Real(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Text(s) => Json::String(s.clone()),
        Value::Blob(b) => Json::String(b.iter().map(|byte| format!("{byte:02x}")).collect()),
    }
}

struct Inner {
    cache: CacheManager,
    conn: Connection,
    registry: ViewRegistry,
}

impl Inner {
    /// Bind `name`. If loading it committed a new dataset version, every
    /// binding is reset and `name` is loaded again from the new generation.
    fn view(&mut self, name: &str, settings: &Settings) -> Result<Arc<Relation>> {
        let before = self.cache.local_version().map(|v| v.version.clone());
        let relation = self.bind(name, settings)?;
        let after = self.cache.local_version().map(|v| v.version.clone());
        if before.is_none() || before == after {
            return Ok(relation);
        }
        info!(
            from = before.as_deref().unwrap_or_default(),
            to = after.as_deref().unwrap_or_default(),
            view = name,
            "dataset changed during load, views reset"
        );
        self.invalidate_views()?;
        self.bind(name, settings)
    }

    fn bind(&mut self, name: &str, settings: &Settings) -> Result<Arc<Relation>> {
        let Inner {
            cache,
            conn,
            registry,
        } = self;
        registry.get_or_register(name, |spec, generation| {
            loader::materialize(conn, cache, spec, generation, &settings.ingest)
        })
    }

    fn invalidate_views(&mut self) -> Result<()> {
        let dropped = self.registry.invalidate();
        loader::drop_tables(&self.conn, dropped.iter().map(Arc::as_ref))
    }
}

/// Lazily materialized, queryable view of the dataset.
pub struct Session {
    inner: Mutex<Inner>,
    settings: Settings,
}

impl Session {
    /// Open a session on the cache described by `settings`.
    pub fn open(settings: Settings) -> Result<Self> {
        let root = settings.cache.resolved_dir()?;
        let cache = CacheManager::open(root, &settings.cache)?;
        Self::with_cache(cache, settings)
    }

    /// Open a session with a download progress callback installed.
    pub fn open_with_progress(settings: Settings, progress: ProgressFn) -> Result<Self> {
        let root = settings.cache.resolved_dir()?;
        let cache = CacheManager::open(root, &settings.cache)?.with_progress(progress);
        Self::with_cache(cache, settings)
    }

    /// Open a session over an existing cache manager.
    pub fn with_cache(cache: CacheManager, settings: Settings) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                cache,
                conn,
                registry: ViewRegistry::new(),
            }),
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The relation for `name`, materializing it on first use.
    pub fn view(&self, name: &str) -> Result<Arc<Relation>> {
        self.inner.lock().view(name, &self.settings)
    }

    /// Make sure every named view is bound.
    pub fn ensure_views(&self, names: &[&str]) -> Result<Vec<Arc<Relation>>> {
        let mut inner = self.inner.lock();
        names
            .iter()
            .map(|name| inner.view(name, &self.settings))
            .collect()
    }

    /// Names of currently bound views.
    pub fn views(&self) -> Vec<String> {
        self.inner.lock().registry.registered()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().registry.generation()
    }

    /// Total successful materializations since the session opened.
    pub fn materializations(&self) -> u64 {
        self.inner.lock().registry.materializations()
    }

    /// Run a query with bound parameters.
    ///
    /// Views are not registered implicitly; call [`Session::ensure_views`]
    /// first for the tables the query reads.
    pub fn run(&self, sql: &str, params: &[Value]) -> Result<Rows> {
        let inner = self.inner.lock();
        let mut stmt = inner.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();

        let mut rows = Vec::new();
        let mut cursor = stmt.query(params_from_iter(params.iter()))?;
        while let Some(row) = cursor.next()? {
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.push(values);
        }
        Ok(Rows { columns, rows })
    }

    /// First column of the first row, if any.
    pub fn run_scalar(&self, sql: &str, params: &[Value]) -> Result<Option<Value>> {
        let rows = self.run(sql, params)?;
        Ok(rows.rows.into_iter().next().and_then(|r| r.into_iter().next()))
    }

    /// Check the remote version and reset bound views if the data changed.
    ///
    /// Returns `true` when a new dataset generation was committed.
    pub fn refresh(&self) -> Result<bool> {
        let mut inner = self.inner.lock();
        let changed = inner.cache.ensure_fresh()?;
        if changed {
            inner.invalidate_views()?;
            info!(generation = inner.registry.generation(), "dataset changed, views reset");
        }
        Ok(changed)
    }

    /// Drop every bound view; the next access reloads from the cache.
    pub fn reset_views(&self) -> Result<()> {
        self.inner.lock().invalidate_views()
    }

    /// Version of the cached dataset.
    pub fn local_version(&self) -> Option<DatasetVersion> {
        self.inner.lock().cache.local_version().cloned()
    }

    /// The cached version metadata document.
    pub fn meta(&self) -> Result<Json> {
        Ok(self.inner.lock().cache.load_json(META_ID)?)
    }

    /// Materialize every catalog view and write the database to `path`.
    ///
    /// The result is a standalone SQLite file.
    pub fn export_db(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut inner = self.inner.lock();
        for spec in catalog::VIEWS {
            inner.view(spec.name, &self.settings)?;
        }
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        inner.conn.backup(DatabaseName::Main, path, None)?;
        info!(path = %path.display(), views = catalog::VIEWS.len(), "exported database");
        Ok(())
    }

    /// Engine configured with the session's sampling policy.
    pub fn booster_engine(&self) -> BoosterEngine {
        BoosterEngine::new(self.settings.booster.sampling)
    }

    /// Booster kinds available for a set.
    pub fn available_kinds(&self, set_code: &str) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        inner.view(booster_config::WEIGHTS_VIEW, &self.settings)?;
        booster_config::available_kinds(&inner.conn, set_code)
    }

    /// Full booster configuration for a set and kind.
    pub fn booster_config(&self, set_code: &str, booster_kind: &str) -> Result<BoosterConfig> {
        let mut inner = self.inner.lock();
        let sheets = self.booster_views(&mut inner)?;
        booster_config::load_config(&inner.conn, set_code, booster_kind, &sheets.columns)
    }

    /// Card uuids and weights of one sheet.
    pub fn sheet_contents(
        &self,
        set_code: &str,
        booster_kind: &str,
        sheet_name: &str,
    ) -> Result<Option<BoosterSheet>> {
        let mut inner = self.inner.lock();
        let sheets = self.booster_views(&mut inner)?;
        booster_config::load_sheet(&inner.conn, set_code, booster_kind, sheet_name, &sheets.columns)
    }

    /// Open one pack; returns card uuids.
    pub fn open_pack(&self, set_code: &str, booster_kind: &str) -> Result<Vec<String>> {
        let config = self.booster_config(set_code, booster_kind)?;
        Ok(self.booster_engine().open_pack(&config)?)
    }

    /// Open one pack with a caller-supplied random source.
    pub fn open_pack_with_rng<R: Rng>(
        &self,
        set_code: &str,
        booster_kind: &str,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let config = self.booster_config(set_code, booster_kind)?;
        Ok(self.booster_engine().open_pack_with_rng(&config, rng)?)
    }

    /// Open `packs` packs, or the configured box size when `None`.
    pub fn open_box(
        &self,
        set_code: &str,
        booster_kind: &str,
        packs: Option<usize>,
    ) -> Result<Vec<Vec<String>>> {
        let config = self.booster_config(set_code, booster_kind)?;
        let packs = packs.unwrap_or(self.settings.booster.box_size);
        Ok(self.booster_engine().open_box(&config, packs)?)
    }

    /// Bind the booster views, returning the sheet relation.
    fn booster_views(&self, inner: &mut Inner) -> Result<Arc<Relation>> {
        for name in BOOSTER_VIEWS {
            inner.view(name, &self.settings)?;
        }
        inner.view(SHEETS_VIEW, &self.settings)
    }
}

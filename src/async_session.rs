//! Async front for [`Session`].
//!
//! Each call runs the synchronous operation on tokio's blocking pool. A
//! semaphore bounds how many run at once; the session lock still serializes
//! anything that touches the engine.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::types::Value;
use serde_json::Value as Json;
use tokio::sync::Semaphore;

use crate::error::{Error, Result};
use crate::session::{Rows, Session};
use crate::views::Relation;

/// Shares one [`Session`] across async tasks.
#[derive(Clone)]
pub struct AsyncSession {
    session: Arc<Session>,
    permits: Arc<Semaphore>,
}

impl AsyncSession {
    /// Wrap a session, allowing `session.max_workers` concurrent calls.
    pub fn new(session: Session) -> Self {
        Self::from_arc(Arc::new(session))
    }

    pub fn from_arc(session: Arc<Session>) -> Self {
        let workers = session.settings().session.max_workers.max(1);
        Self {
            session,
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// The wrapped session, for synchronous use.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run `f` against the session on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Session) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Task(e.to_string()))?;
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || f(&session))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    pub async fn run(&self, sql: impl Into<String>, params: Vec<Value>) -> Result<Rows> {
        let sql = sql.into();
        self.call(move |s| s.run(&sql, &params)).await
    }

    pub async fn view(&self, name: impl Into<String>) -> Result<Arc<Relation>> {
        let name = name.into();
        self.call(move |s| s.view(&name)).await
    }

    pub async fn ensure_views(&self, names: Vec<String>) -> Result<Vec<Arc<Relation>>> {
        self.call(move |s| {
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            s.ensure_views(&names)
        })
        .await
    }

    pub async fn refresh(&self) -> Result<bool> {
        self.call(|s| s.refresh()).await
    }

    pub async fn meta(&self) -> Result<Json> {
        self.call(|s| s.meta()).await
    }

    pub async fn export_db(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        self.call(move |s| s.export_db(&path)).await
    }

    pub async fn open_pack(
        &self,
        set_code: impl Into<String>,
        booster_kind: impl Into<String>,
    ) -> Result<Vec<String>> {
        let (set_code, booster_kind) = (set_code.into(), booster_kind.into());
        self.call(move |s| s.open_pack(&set_code, &booster_kind)).await
    }

    pub async fn open_box(
        &self,
        set_code: impl Into<String>,
        booster_kind: impl Into<String>,
        packs: Option<usize>,
    ) -> Result<Vec<Vec<String>>> {
        let (set_code, booster_kind) = (set_code.into(), booster_kind.into());
        self.call(move |s| s.open_box(&set_code, &booster_kind, packs))
            .await
    }
}

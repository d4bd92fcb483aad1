//! Lazy, memoized binding of logical view names to loaded relations.
//!
//! ```text
//! get_or_register("cards")
//!   ├─ bound in this generation? ──► same Arc<Relation>
//!   └─ not bound ──► loader(spec, generation)
//!                      ├─ Ok  ──► bind, return
//!                      └─ Err ──► nothing bound, error returned
//! invalidate() ──► clear bindings, generation += 1
//! ```
//!
//! The registry does no I/O itself. The caller supplies the loader and
//! drops backing tables of relations returned by [`ViewRegistry::invalidate`].
//! At-most-once materialization relies on the caller holding the registry
//! behind a lock for the duration of `get_or_register`.

pub mod loader;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::catalog::{self, ViewSpec};
use crate::error::{Error, IngestWarning, Result};
use crate::schema::ColumnShape;

/// A view that has been loaded into the engine.
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    /// Logical view name.
    pub name: String,
    /// Backing table in the engine.
    pub table: String,
    pub columns: Vec<String>,
    pub row_count: u64,
    /// Registry generation the relation was built in.
    pub generation: u64,
    /// Inferred column shapes, empty for transformed families.
    pub shapes: BTreeMap<String, ColumnShape>,
    #[serde(skip)]
    pub warnings: Vec<IngestWarning>,
}

impl Relation {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Name-to-relation bindings for one session.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    bindings: HashMap<String, Arc<Relation>>,
    generation: u64,
    materializations: u64,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relation bound to `name`, loading it with `loader` on first use.
    ///
    /// A second call in the same generation returns the same `Arc` and does
    /// not call the loader. Unknown names fail with [`Error::UnknownView`]
    /// before the loader runs.
    pub fn get_or_register<F>(&mut self, name: &str, loader: F) -> Result<Arc<Relation>>
    where
        F: FnOnce(&'static ViewSpec, u64) -> Result<Relation>,
    {
        if let Some(rel) = self.bindings.get(name) {
            return Ok(Arc::clone(rel));
        }
        let spec = catalog::view(name).ok_or_else(|| Error::UnknownView(name.to_string()))?;

        let relation = Arc::new(loader(spec, self.generation)?);
        self.materializations += 1;
        debug!(view = name, generation = self.generation, "view registered");
        self.bindings.insert(name.to_string(), Arc::clone(&relation));
        Ok(relation)
    }

    /// Bound relation, without loading.
    pub fn get(&self, name: &str) -> Option<Arc<Relation>> {
        self.bindings.get(name).cloned()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Names bound in the current generation, sorted.
    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every binding and start a new generation.
    ///
    /// Returns the relations that were bound so their tables can be dropped.
    pub fn invalidate(&mut self) -> Vec<Arc<Relation>> {
        self.generation += 1;
        debug!(generation = self.generation, "view registry invalidated");
        self.bindings.drain().map(|(_, rel)| rel).collect()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Successful loads over the registry's lifetime.
    pub fn materializations(&self) -> u64 {
        self.materializations
    }
}

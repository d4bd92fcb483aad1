//! Schema-shape inference.
//!
//! Decides which text columns of a columnar file are really comma-joined
//! lists. Upstream adds array columns between releases, so the decision is
//! made from the file itself rather than from a hand-maintained mapping.
//!
//! Three tiers, first match wins:
//!
//! 1. **Static baseline** - known array columns of the file family
//! 2. **Blocklist** - known scalar columns, checked before any guessing
//! 3. **Plural heuristic** - plural name *and* sample rows that show
//!    repeated structure
//!
//! Inference is a pure function of a [`FileDescriptor`]; building the
//! descriptor from Arrow data lives in [`sample`].

mod inflection;
mod rules;
pub mod sample;

pub use inflection::{is_plural_name, last_word};
pub use rules::{is_blocklisted, is_static_array, scalar_columns, static_array_columns};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::IngestWarning;

/// Separator used by upstream when flattening a list into a text column.
pub const LIST_SEPARATOR: &str = ", ";

/// Physical kind of a column as declared by the file's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredKind {
    Text,
    List,
    Struct,
    Other,
}

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredColumn {
    pub name: String,
    pub kind: DeclaredKind,
}

impl DeclaredColumn {
    pub fn new(name: impl Into<String>, kind: DeclaredKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A sampled cell, reduced to what inference needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleValue {
    Null,
    Text(String),
    /// A native list value.
    List,
    Other,
}

/// Sampled cells, positionally aligned with [`FileDescriptor::columns`].
pub type SampleRow = Vec<SampleValue>;

/// What inference gets to see of a file.
#[derive(Debug, Clone, Default)]
pub struct FileDescriptor {
    /// Logical view the file backs; selects the static baseline.
    pub view: Option<String>,
    pub columns: Vec<DeclaredColumn>,
    pub sample: Vec<SampleRow>,
}

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Scalar,
    Array,
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSource {
    StaticRule,
    BlocklistOverride,
    /// The plural heuristic ran; it classifies as array or falls through to scalar.
    PluralHeuristic,
    /// The physical type is already a list.
    DeclaredType,
}

/// Classification of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnShape {
    pub column_name: String,
    pub inferred_kind: ShapeKind,
    pub confidence_source: ShapeSource,
}

impl ColumnShape {
    fn new(column_name: &str, inferred_kind: ShapeKind, confidence_source: ShapeSource) -> Self {
        Self {
            column_name: column_name.to_string(),
            inferred_kind,
            confidence_source,
        }
    }

    pub fn is_array(&self) -> bool {
        self.inferred_kind == ShapeKind::Array
    }
}

/// Shapes for every declared column plus any non-fatal findings.
#[derive(Debug, Clone, Default)]
pub struct ShapeInference {
    pub shapes: BTreeMap<String, ColumnShape>,
    pub warnings: Vec<IngestWarning>,
}

impl ShapeInference {
    pub fn is_array(&self, column: &str) -> bool {
        self.shapes.get(column).is_some_and(ColumnShape::is_array)
    }

    /// Text columns that must be split into arrays at load time.
    pub fn split_columns(&self) -> Vec<&str> {
        self.shapes
            .values()
            .filter(|s| s.is_array() && s.confidence_source != ShapeSource::DeclaredType)
            .map(|s| s.column_name.as_str())
            .collect()
    }
}

/// What the sample says about one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    /// No non-empty values sampled.
    Absent,
    /// Only single values.
    Single,
    /// List values or separator-joined text, and nothing prose-like.
    Repeated,
    /// Both separator-joined values and prose.
    Conflicting,
}

fn looks_like_prose(s: &str) -> bool {
    s.contains('\n') || [". ", "! ", "? "].iter().any(|t| s.contains(t))
}

fn sample_evidence(desc: &FileDescriptor, idx: usize) -> Evidence {
    let mut values = 0usize;
    let mut repeated = 0usize;
    let mut prose = 0usize;

    for row in &desc.sample {
        match row.get(idx) {
            Some(SampleValue::List) => {
                values += 1;
                repeated += 1;
            }
            Some(SampleValue::Text(s)) if !s.trim().is_empty() => {
                values += 1;
                if looks_like_prose(s) {
                    prose += 1;
                } else if s.contains(LIST_SEPARATOR) {
                    repeated += 1;
                }
            }
            _ => {}
        }
    }

    match (values, repeated, prose) {
        (0, _, _) => Evidence::Absent,
        (_, 0, _) => Evidence::Single,
        (_, _, 0) => Evidence::Repeated,
        _ => Evidence::Conflicting,
    }
}

/// Classify every declared column of a file.
pub fn infer_shape(desc: &FileDescriptor) -> BTreeMap<String, ColumnShape> {
    infer_shape_detailed(desc).shapes
}

/// Classify every declared column, also returning ambiguity warnings.
pub fn infer_shape_detailed(desc: &FileDescriptor) -> ShapeInference {
    let view = desc.view.as_deref();
    let mut out = ShapeInference::default();

    for (idx, col) in desc.columns.iter().enumerate() {
        let name = col.name.as_str();

        let shape = if is_static_array(view, name) {
            ColumnShape::new(name, ShapeKind::Array, ShapeSource::StaticRule)
        } else if is_blocklisted(name) {
            ColumnShape::new(name, ShapeKind::Scalar, ShapeSource::BlocklistOverride)
        } else if col.kind == DeclaredKind::List {
            ColumnShape::new(name, ShapeKind::Array, ShapeSource::DeclaredType)
        } else if col.kind == DeclaredKind::Text && is_plural_name(name) && !desc.sample.is_empty()
        {
            match sample_evidence(desc, idx) {
                Evidence::Repeated => {
                    ColumnShape::new(name, ShapeKind::Array, ShapeSource::PluralHeuristic)
                }
                Evidence::Conflicting => {
                    let warning = IngestWarning::SchemaInferenceAmbiguous {
                        column: name.to_string(),
                        reason: "sample mixes list-like values and prose".to_string(),
                    };
                    warn!(column = name, "{warning}");
                    out.warnings.push(warning);
                    ColumnShape::new(name, ShapeKind::Scalar, ShapeSource::PluralHeuristic)
                }
                Evidence::Single | Evidence::Absent => {
                    ColumnShape::new(name, ShapeKind::Scalar, ShapeSource::PluralHeuristic)
                }
            }
        } else {
            ColumnShape::new(name, ShapeKind::Scalar, ShapeSource::PluralHeuristic)
        };

        out.shapes.insert(col.name.clone(), shape);
    }

    out
}

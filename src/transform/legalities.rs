//! Wide-to-long unpivot of the card legality table.
//!
//! Upstream ships one column per format:
//!
//! ```text
//! uuid | modern | legacy | vintage | ...
//! a    | Legal  | Legal  | null    |
//! ```
//!
//! Queries want `(uuid, format, status)` rows instead. The format columns
//! are discovered from the file, so new formats need no code change.

use arrow::array::Array;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use serde::{Deserialize, Serialize};

use crate::error::{IngestWarning, Result};

/// Identifier column; every other column is a format.
pub const KEY_COLUMN: &str = "uuid";

/// Columns of the unpivoted table.
pub const LONG_COLUMNS: [&str; 3] = ["uuid", "format", "status"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegalityStatus {
    Legal,
    Banned,
    Restricted,
    Suspended,
    /// Anything upstream adds later, kept verbatim.
    Other(String),
}

impl LegalityStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "Legal" => Self::Legal,
            "Banned" => Self::Banned,
            "Restricted" => Self::Restricted,
            "Suspended" => Self::Suspended,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Legal => "Legal",
            Self::Banned => "Banned",
            Self::Restricted => "Restricted",
            Self::Suspended => "Suspended",
            Self::Other(s) => s,
        }
    }
}

/// One card's status in one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalityRow {
    pub card_uuid: String,
    pub format_name: String,
    pub status: LegalityStatus,
}

/// How a legality file is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpivotPlan {
    /// Wide file: one output row per non-null format cell.
    Unpivot {
        key_index: usize,
        formats: Vec<(usize, String)>,
    },
    /// Load the file unchanged.
    PassThrough { warning: Option<IngestWarning> },
}

impl UnpivotPlan {
    /// Decide from the file's schema.
    ///
    /// Without a key column there is nothing to pivot around; without format
    /// columns the file is already long.
    pub fn from_schema(view: &str, schema: &Schema) -> Self {
        let Some(key_index) = schema.fields().iter().position(|f| f.name() == KEY_COLUMN) else {
            return Self::PassThrough {
                warning: Some(IngestWarning::UnpivotSourceMissingColumns {
                    view: view.to_string(),
                    missing: vec![KEY_COLUMN.to_string()],
                }),
            };
        };

        let formats: Vec<(usize, String)> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != key_index)
            .map(|(i, f)| (i, f.name().clone()))
            .collect();

        // An already-long file has a `format` column alongside `uuid`
        let long = formats.iter().any(|(_, name)| name == "format")
            && formats.iter().any(|(_, name)| name == "status");
        if formats.is_empty() || long {
            return Self::PassThrough { warning: None };
        }

        Self::Unpivot { key_index, formats }
    }

    pub fn is_unpivot(&self) -> bool {
        matches!(self, Self::Unpivot { .. })
    }

    /// Discovered format names, empty for pass-through.
    pub fn format_names(&self) -> Vec<&str> {
        match self {
            Self::Unpivot { formats, .. } => formats.iter().map(|(_, n)| n.as_str()).collect(),
            Self::PassThrough { .. } => Vec::new(),
        }
    }

    /// Unpivot one batch, card by card, formats in file order.
    ///
    /// Null statuses and rows without a key produce nothing.
    pub fn apply(&self, batch: &RecordBatch) -> Result<Vec<LegalityRow>> {
        let Self::Unpivot { key_index, formats } = self else {
            return Ok(Vec::new());
        };

        let options = FormatOptions::default();
        let keys = batch.column(*key_index);
        let key_fmt = ArrayFormatter::try_new(keys.as_ref(), &options)?;
        let columns = formats
            .iter()
            .map(|(i, name)| {
                let array = batch.column(*i);
                ArrayFormatter::try_new(array.as_ref(), &options).map(|f| (name, array, f))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut rows = Vec::new();
        for row in 0..batch.num_rows() {
            if keys.is_null(row) {
                continue;
            }
            let uuid = key_fmt.value(row).to_string();
            for (name, array, fmt) in &columns {
                if array.is_null(row) {
                    continue;
                }
                rows.push(LegalityRow {
                    card_uuid: uuid.clone(),
                    format_name: (*name).clone(),
                    status: LegalityStatus::parse(&fmt.value(row).to_string()),
                });
            }
        }
        Ok(rows)
    }
}

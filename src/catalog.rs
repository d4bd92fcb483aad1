//! The fixed catalog of logical files and the views built from them.

use serde::{Deserialize, Serialize};

/// Remote path of the version metadata document.
pub const META_PATH: &str = "Meta.json";

/// Logical id of the version metadata document.
pub const META_ID: &str = "meta";

/// How a source file becomes a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Parquet table, loaded column for column after shape inference.
    Columnar,
    /// Wide Parquet table with one column per format, unpivoted to long rows.
    Legalities,
    /// Gzip'd nested price document, flattened to one row per observation.
    Prices,
}

/// One logical view and the file backing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSpec {
    /// Logical view name, also the SQLite table name.
    pub name: &'static str,
    /// Path below the remote base URL (and below a cache generation).
    pub remote_path: &'static str,
    pub family: Family,
}

impl ViewSpec {
    const fn columnar(name: &'static str, remote_path: &'static str) -> Self {
        Self {
            name,
            remote_path,
            family: Family::Columnar,
        }
    }

    /// File name used in progress reports.
    pub fn file_name(&self) -> &'static str {
        self.remote_path
            .rsplit('/')
            .next()
            .unwrap_or(self.remote_path)
    }
}

/// Every view the session knows how to materialize.
pub static VIEWS: &[ViewSpec] = &[
    ViewSpec::columnar("cards", "parquet/cards.parquet"),
    ViewSpec::columnar("tokens", "parquet/tokens.parquet"),
    ViewSpec::columnar("sets", "parquet/sets.parquet"),
    ViewSpec::columnar("card_identifiers", "parquet/cardIdentifiers.parquet"),
    ViewSpec {
        name: "card_legalities",
        remote_path: "parquet/cardLegalities.parquet",
        family: Family::Legalities,
    },
    ViewSpec::columnar("card_foreign_data", "parquet/cardForeignData.parquet"),
    ViewSpec::columnar("card_rulings", "parquet/cardRulings.parquet"),
    ViewSpec::columnar("card_purchase_urls", "parquet/cardPurchaseUrls.parquet"),
    ViewSpec::columnar("set_translations", "parquet/setTranslations.parquet"),
    ViewSpec::columnar("token_identifiers", "parquet/tokenIdentifiers.parquet"),
    ViewSpec::columnar(
        "set_booster_content_weights",
        "parquet/setBoosterContentWeights.parquet",
    ),
    ViewSpec::columnar("set_booster_contents", "parquet/setBoosterContents.parquet"),
    ViewSpec::columnar(
        "set_booster_sheet_cards",
        "parquet/setBoosterSheetCards.parquet",
    ),
    ViewSpec::columnar("set_booster_sheets", "parquet/setBoosterSheets.parquet"),
    ViewSpec {
        name: "prices_today",
        remote_path: "AllPricesToday.json.gz",
        family: Family::Prices,
    },
];

/// Look up a view by name.
pub fn view(name: &str) -> Option<&'static ViewSpec> {
    VIEWS.iter().find(|v| v.name == name)
}

/// Remote path for a logical file id (a view name or [`META_ID`]).
pub fn remote_path(file_id: &str) -> Option<&'static str> {
    if file_id == META_ID {
        return Some(META_PATH);
    }
    view(file_id).map(|v| v.remote_path)
}

/// All logical file ids the cache manages, metadata first.
pub fn managed_files() -> impl Iterator<Item = &'static str> {
    std::iter::once(META_ID).chain(VIEWS.iter().map(|v| v.name))
}

/// Catalog views named as identifiers in a SQL text, in catalog order.
///
/// A plain token scan: it may over-match names inside string literals,
/// which only costs an unnecessary load.
pub fn referenced_views(sql: &str) -> Vec<&'static str> {
    let tokens: Vec<String> = sql
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
        .collect();
    VIEWS
        .iter()
        .map(|v| v.name)
        .filter(|name| tokens.iter().any(|t| t == name))
        .collect()
}

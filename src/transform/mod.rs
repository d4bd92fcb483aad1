//! Shape transformers applied between reading a source file and loading it.
//!
//! - [`columns`] turns Arrow cells into SQLite values, splitting inferred
//!   array columns and rendering nested types as JSON
//! - [`legalities`] unpivots the wide legality table
//! - [`prices`] flattens the nested price document

pub mod columns;
pub mod legalities;
pub mod prices;

pub use columns::Encoding;
pub use legalities::{LegalityRow, LegalityStatus, UnpivotPlan};
pub use prices::{flatten_card, stream_prices, CardPrices, PriceKind, PriceRecord, StreamStats};

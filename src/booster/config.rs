//! Reading booster configuration from the `set_booster_*` tables.
//!
//! ```text
//! set_booster_content_weights  setCode, boosterName, boosterIndex, boosterWeight
//! set_booster_contents         setCode, boosterName, boosterIndex, sheetName, sheetPicks
//! set_booster_sheet_cards      setCode, boosterName, sheetName, cardUuid, cardWeight
//! set_booster_sheets           setCode, boosterName, sheetName, [sheetIsFoil], [sheetAllowDuplicates]
//! ```
//!
//! The bracketed flag columns are optional; callers pass the column list of
//! the loaded sheet table so absent flags read as false.

use std::collections::{BTreeMap, HashMap};

use rusqlite::{params, Connection, OptionalExtension};

use super::{BoosterConfig, BoosterError, BoosterSheet, PackTemplate};
use crate::error::Result;
use crate::views::loader::quote_ident;

pub const WEIGHTS_VIEW: &str = "set_booster_content_weights";
pub const CONTENTS_VIEW: &str = "set_booster_contents";
pub const SHEET_CARDS_VIEW: &str = "set_booster_sheet_cards";
pub const SHEETS_VIEW: &str = "set_booster_sheets";

/// Every view the booster engine reads.
pub const BOOSTER_VIEWS: [&str; 4] = [WEIGHTS_VIEW, CONTENTS_VIEW, SHEET_CARDS_VIEW, SHEETS_VIEW];

static FOIL_COLUMNS: &[&str] = &["sheetIsFoil", "foil"];
static DUPLICATE_COLUMNS: &[&str] = &["sheetAllowDuplicates", "allowDuplicates"];

fn weight(w: i64) -> u64 {
    u64::try_from(w).unwrap_or(0)
}

/// SQL expression for the first present flag column, or `0`.
fn flag_expr(candidates: &[&str], present: &[String]) -> String {
    candidates
        .iter()
        .find(|c| present.iter().any(|p| p == *c))
        .map(|c| format!("COALESCE({}, 0)", quote_ident(c)))
        .unwrap_or_else(|| "0".to_string())
}

/// Booster kinds with a configuration for `set_code`, sorted.
pub fn available_kinds(conn: &Connection, set_code: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT DISTINCT boosterName FROM {WEIGHTS_VIEW}
         WHERE UPPER(setCode) = UPPER(?) ORDER BY boosterName"
    ))?;
    let kinds = stmt
        .query_map(params![set_code], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(kinds)
}

/// Load the full configuration for one set and booster kind.
pub fn load_config(
    conn: &Connection,
    set_code: &str,
    booster_kind: &str,
    sheet_columns: &[String],
) -> Result<BoosterConfig> {
    let mut templates: BTreeMap<i64, PackTemplate> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT boosterIndex, boosterWeight FROM {WEIGHTS_VIEW}
             WHERE UPPER(setCode) = UPPER(?1) AND boosterName = ?2
             ORDER BY boosterIndex"
        ))?;
        let rows = stmt.query_map(params![set_code, booster_kind], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (index, w) = row?;
            templates.insert(
                index,
                PackTemplate {
                    weight: weight(w),
                    contents: Vec::new(),
                },
            );
        }
    }
    if templates.is_empty() {
        return Err(BoosterError::ConfigurationNotFound {
            set_code: set_code.to_string(),
            booster_kind: booster_kind.to_string(),
        }
        .into());
    }

    {
        let mut stmt = conn.prepare(&format!(
            "SELECT boosterIndex, sheetName, sheetPicks FROM {CONTENTS_VIEW}
             WHERE UPPER(setCode) = UPPER(?1) AND boosterName = ?2
             ORDER BY boosterIndex, sheetName"
        ))?;
        let rows = stmt.query_map(params![set_code, booster_kind], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (index, sheet, picks) = row?;
            if let Some(template) = templates.get_mut(&index) {
                template.contents.push((sheet, usize::try_from(picks).unwrap_or(0)));
            }
        }
    }

    let sheets = load_sheets(conn, set_code, booster_kind, None, sheet_columns)?;

    Ok(BoosterConfig {
        set_code: set_code.to_string(),
        booster_kind: booster_kind.to_string(),
        templates: templates.into_values().collect(),
        sheets,
    })
}

/// One sheet of a configuration, if it exists.
pub fn load_sheet(
    conn: &Connection,
    set_code: &str,
    booster_kind: &str,
    sheet_name: &str,
    sheet_columns: &[String],
) -> Result<Option<BoosterSheet>> {
    let mut sheets = load_sheets(conn, set_code, booster_kind, Some(sheet_name), sheet_columns)?;
    Ok(sheets.remove(sheet_name))
}

fn load_sheets(
    conn: &Connection,
    set_code: &str,
    booster_kind: &str,
    only: Option<&str>,
    sheet_columns: &[String],
) -> Result<HashMap<String, BoosterSheet>> {
    let mut entries: BTreeMap<String, Vec<(String, u64)>> = BTreeMap::new();
    {
        let mut stmt = conn.prepare(&format!(
            "SELECT sheetName, cardUuid, cardWeight FROM {SHEET_CARDS_VIEW}
             WHERE UPPER(setCode) = UPPER(?1) AND boosterName = ?2
               AND (?3 IS NULL OR sheetName = ?3)
             ORDER BY sheetName, cardUuid"
        ))?;
        let rows = stmt.query_map(params![set_code, booster_kind, only], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        for row in rows {
            let (sheet, uuid, w) = row?;
            entries.entry(sheet).or_default().push((uuid, weight(w)));
        }
    }

    let foil = flag_expr(FOIL_COLUMNS, sheet_columns);
    let duplicates = flag_expr(DUPLICATE_COLUMNS, sheet_columns);
    let mut flags = conn.prepare(&format!(
        "SELECT {foil}, {duplicates} FROM {SHEETS_VIEW}
         WHERE UPPER(setCode) = UPPER(?1) AND boosterName = ?2 AND sheetName = ?3
         LIMIT 1"
    ))?;

    let mut sheets = HashMap::new();
    for (name, cards) in entries {
        let mut sheet = BoosterSheet::new(set_code, booster_kind, name.clone(), cards);
        let found = flags
            .query_row(params![set_code, booster_kind, name], |row| {
                Ok((row.get::<_, bool>(0)?, row.get::<_, bool>(1)?))
            })
            .optional()?;
        if let Some((is_foil, allow)) = found {
            sheet.foil = is_foil;
            sheet.allow_duplicates = allow;
        }
        sheets.insert(name, sheet);
    }
    Ok(sheets)
}

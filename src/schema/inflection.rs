//! Plural detection for column names.
//!
//! Column names are camelCase or snake_case; only the last word decides
//! whether the name reads as a collection (`promoTypes`, `artist_ids`).
//! Uses the `inflector` crate with a few irregulars it gets wrong.

use inflector::Inflector;

/// Irregular (plural, singular) pairs seen in dataset column names.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("people", "person"),
    ("children", "child"),
    ("indices", "index"),
    ("criteria", "criterion"),
    ("media", "medium"),
    ("aliases", "alias"),
];

/// Words that end in `s` but are singular or uncountable.
static SINGULAR_S_WORDS: &[&str] = &["status", "news", "series", "species", "bonus", "canvas"];

/// The last word of a camelCase or snake_case identifier, lowercased.
///
/// # Examples
/// ```ignore
/// assert_eq!(last_word("promoTypes"), "types");
/// assert_eq!(last_word("artist_ids"), "ids");
/// assert_eq!(last_word("colors"), "colors");
/// ```
pub fn last_word(name: &str) -> String {
    let tail = name
        .rsplit(|c: char| c == '_' || c == '-' || c == ' ')
        .next()
        .unwrap_or(name);
    let start = tail
        .char_indices()
        .filter(|(i, c)| *i > 0 && c.is_uppercase())
        .map(|(i, _)| i)
        .last()
        .unwrap_or(0);
    tail[start..].to_lowercase()
}

/// Whether a column name ends in a plural word.
pub fn is_plural_name(name: &str) -> bool {
    let word = last_word(name);
    if word.len() < 2 {
        return false;
    }
    if IRREGULAR_PLURALS.iter().any(|(plural, _)| *plural == word) {
        return true;
    }
    if IRREGULAR_PLURALS.iter().any(|(_, singular)| *singular == word) {
        return false;
    }
    if SINGULAR_S_WORDS.contains(&word.as_str()) || word.ends_with("ss") {
        return false;
    }
    word.ends_with('s') && word.to_singular() != word
}

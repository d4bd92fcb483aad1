//! Fixed column lists driving the first two inference tiers.

/// Array-valued columns of the `cards` table that don't follow the plural
/// naming convention, or that must be arrays whatever the sample says.
static CARD_ARRAY_COLUMNS: &[&str] = &[
    "artistIds",
    "attractionLights",
    "availability",
    "boosterTypes",
    "cardParts",
    "colorIdentity",
    "colorIndicator",
    "colors",
    "finishes",
    "frameEffects",
    "keywords",
    "originalPrintings",
    "otherFaceIds",
    "printings",
    "producedMana",
    "promoTypes",
    "rebalancedPrintings",
    "subsets",
    "subtypes",
    "supertypes",
    "types",
    "variations",
];

/// Array-valued columns of the `tokens` table.
static TOKEN_ARRAY_COLUMNS: &[&str] = &[
    "artistIds",
    "availability",
    "boosterTypes",
    "colorIdentity",
    "colorIndicator",
    "colors",
    "finishes",
    "frameEffects",
    "keywords",
    "otherFaceIds",
    "producedMana",
    "promoTypes",
    "reverseRelated",
    "subtypes",
    "supertypes",
    "types",
];

/// Text columns that are never lists, even when plural-named or when the
/// sample contains commas: free text, JSON-encoded structs, and words that
/// merely end in `s`.
static SCALAR_COLUMNS: &[&str] = &[
    "text",
    "originalText",
    "flavorText",
    "printedText",
    "identifiers",
    "legalities",
    "leadershipSkills",
    "purchaseUrls",
    "relatedCards",
    "rulings",
    "sourceProducts",
    "foreignData",
    "translations",
    "toughness",
    "status",
    "format",
    "uris",
    "scryfallUri",
];

/// Static baseline for a file family, if it has one.
pub fn static_array_columns(view: &str) -> &'static [&'static str] {
    match view {
        "cards" => CARD_ARRAY_COLUMNS,
        "tokens" => TOKEN_ARRAY_COLUMNS,
        _ => &[],
    }
}

/// Whether `column` is in the static baseline of `view`.
pub fn is_static_array(view: Option<&str>, column: &str) -> bool {
    view.is_some_and(|v| static_array_columns(v).contains(&column))
}

/// Columns forced to scalar whatever their name, type or sample.
pub fn scalar_columns() -> &'static [&'static str] {
    SCALAR_COLUMNS
}

/// Whether `column` is blocklisted as scalar.
pub fn is_blocklisted(column: &str) -> bool {
    SCALAR_COLUMNS.contains(&column)
}

//! Flattening of the nested daily price document.
//!
//! The document maps card uuids to nested price maps:
//!
//! ```text
//! { "meta": {...},
//!   "data": {
//!     "<uuid>": {
//!       "paper": {
//!         "cardkingdom": {
//!           "currency": "USD",
//!           "retail":  { "normal": { "2024-06-01": 0.25 }, "foil": {...} },
//!           "buylist": { ... } } },
//!       "mtgo": { ... } } } }
//! ```
//!
//! Keys are classified by role rather than by depth, so layouts that nest
//! provider, finish and kind in a different order flatten the same way:
//!
//! - `paper` / `mtgo`      -> source
//! - `retail` / `buylist`  -> price kind
//! - `currency` (string)   -> currency for the enclosing map
//! - numeric leaf          -> date / value
//! - first other key       -> provider, the next one -> finish
//!
//! The outer document is streamed one card at a time; only a single card's
//! sub-document is ever held in memory.

use std::fmt;
use std::io::Read;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Error, Result};

/// Columns of the flattened price table.
pub const PRICE_COLUMNS: [&str; 8] = [
    "uuid",
    "source",
    "provider",
    "currency",
    "price_kind",
    "finish",
    "date",
    "price",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    Retail,
    Buylist,
}

impl PriceKind {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "retail" => Some(Self::Retail),
            "buylist" => Some(Self::Buylist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retail => "retail",
            Self::Buylist => "buylist",
        }
    }
}

/// One price observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub card_uuid: String,
    pub source: Option<String>,
    pub provider: String,
    pub currency: Option<String>,
    pub price_kind: PriceKind,
    pub finish: String,
    pub date: String,
    pub value: f64,
}

const SOURCES: &[&str] = &["paper", "mtgo"];
const CURRENCY_KEY: &str = "currency";

/// Roles resolved on the path from the card root to a node.
#[derive(Debug, Clone, Copy, Default)]
struct Roles<'a> {
    source: Option<&'a str>,
    provider: Option<&'a str>,
    finish: Option<&'a str>,
    kind: Option<PriceKind>,
    currency: Option<&'a str>,
}

impl<'a> Roles<'a> {
    /// The path extended by one map key.
    fn child(mut self, key: &'a str) -> Self {
        if SOURCES.contains(&key) {
            self.source = Some(key);
        } else if let Some(kind) = PriceKind::from_key(key) {
            self.kind = Some(kind);
        } else if self.provider.is_none() {
            self.provider = Some(key);
        } else if self.finish.is_none() {
            self.finish = Some(key);
        }
        self
    }
}

/// Iterator over the price records of one card document.
///
/// Walks the document with an explicit stack, so arbitrarily deep input
/// cannot overflow the call stack.
pub struct CardPrices<'a> {
    uuid: &'a str,
    stack: Vec<(Roles<'a>, &'a serde_json::Map<String, Json>)>,
    leaves: Vec<(Roles<'a>, &'a str, f64)>,
}

impl<'a> CardPrices<'a> {
    pub fn new(uuid: &'a str, doc: &'a Json) -> Self {
        let stack = match doc {
            Json::Object(map) => vec![(Roles::default(), map)],
            _ => Vec::new(),
        };
        Self {
            uuid,
            stack,
            leaves: Vec::new(),
        }
    }

    fn record(&self, path: Roles<'a>, date: &str, value: f64) -> Option<PriceRecord> {
        Some(PriceRecord {
            card_uuid: self.uuid.to_string(),
            source: path.source.map(str::to_string),
            provider: path.provider?.to_string(),
            currency: path.currency.map(str::to_string),
            price_kind: path.kind?,
            finish: path.finish?.to_string(),
            date: date.to_string(),
            value,
        })
    }
}

impl<'a> Iterator for CardPrices<'a> {
    type Item = PriceRecord;

    fn next(&mut self) -> Option<PriceRecord> {
        loop {
            while let Some((path, date, value)) = self.leaves.pop() {
                if let Some(record) = self.record(path, date, value) {
                    return Some(record);
                }
            }

            let (mut path, map) = self.stack.pop()?;
            if let Some(Json::String(currency)) = map.get(CURRENCY_KEY) {
                path.currency = Some(currency.as_str());
            }

            // Reverse so records come out in document order
            for (key, value) in map.iter().rev() {
                match value {
                    Json::Number(n) => {
                        if let Some(v) = n.as_f64() {
                            self.leaves.push((path, key.as_str(), v));
                        }
                    }
                    Json::Object(child) => self.stack.push((path.child(key.as_str()), child)),
                    _ => {}
                }
            }
        }
    }
}

/// Counters from a streamed document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub cards: u64,
    pub records: u64,
}

/// Stream a price document, handing each record to `sink`.
///
/// An error from the sink stops the stream and is returned unchanged.
pub fn stream_prices<R, F>(reader: R, sink: &mut F) -> Result<StreamStats>
where
    R: Read,
    F: FnMut(PriceRecord) -> Result<()>,
{
    let mut failure = None;
    let mut stats = StreamStats::default();
    let mut de = serde_json::Deserializer::from_reader(reader);

    let outcome = DocumentSeed {
        sink,
        failure: &mut failure,
        stats: &mut stats,
    }
    .deserialize(&mut de);

    if let Some(err) = failure {
        return Err(err);
    }
    outcome?;
    de.end()?;
    Ok(stats)
}

struct DocumentSeed<'a, F> {
    sink: &'a mut F,
    failure: &'a mut Option<Error>,
    stats: &'a mut StreamStats,
}

impl<'de, F> DeserializeSeed<'de> for DocumentSeed<'_, F>
where
    F: FnMut(PriceRecord) -> Result<()>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for DocumentSeed<'_, F>
where
    F: FnMut(PriceRecord) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a price document with a `data` map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let DocumentSeed {
            sink,
            failure,
            stats,
        } = self;
        while let Some(key) = map.next_key::<String>()? {
            if key == "data" {
                map.next_value_seed(CardsSeed {
                    sink: &mut *sink,
                    failure: &mut *failure,
                    stats: &mut *stats,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(())
    }
}

struct CardsSeed<'a, F> {
    sink: &'a mut F,
    failure: &'a mut Option<Error>,
    stats: &'a mut StreamStats,
}

impl<'de, F> DeserializeSeed<'de> for CardsSeed<'_, F>
where
    F: FnMut(PriceRecord) -> Result<()>,
{
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, F> Visitor<'de> for CardsSeed<'_, F>
where
    F: FnMut(PriceRecord) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of card uuids to price documents")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<(), A::Error> {
        let CardsSeed {
            sink,
            failure,
            stats,
        } = self;
        while let Some(uuid) = map.next_key::<String>()? {
            let doc: Json = map.next_value()?;
            for record in CardPrices::new(&uuid, &doc) {
                if let Err(e) = sink(record) {
                    *failure = Some(e);
                    return Err(de::Error::custom("price sink failed"));
                }
                stats.records += 1;
            }
            stats.cards += 1;
        }
        Ok(())
    }
}

/// Flatten a single card document.
pub fn flatten_card(uuid: &str, doc: &Json) -> Vec<PriceRecord> {
    CardPrices::new(uuid, doc).collect()
}

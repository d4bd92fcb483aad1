//! Shared fixtures: a mirror directory laid out like the CDN, filled with
//! small Parquet tables and a gzip'd price document.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanArray, Float64Array, Int64Array, ListBuilder, StringArray, StringBuilder,
};
use arrow::record_batch::RecordBatch;
use flate2::write::GzEncoder;
use flate2::Compression;
use mtgjson::cache::{CacheError, CacheManager, ChunkProgress, DatasetVersion, MirrorRemote, RemoteSource};
use mtgjson::{Session, Settings};
use parking_lot::Mutex;
use tempfile::TempDir;

pub const VERSION_1: &str = "5.2.2+20240601";
pub const VERSION_2: &str = "5.2.2+20240602";

fn text(values: &[Option<&str>]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

fn strings(values: &[&str]) -> ArrayRef {
    Arc::new(StringArray::from(values.to_vec()))
}

fn ints(values: &[i64]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    RecordBatch::try_from_iter(columns).unwrap()
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = File::create(path).unwrap();
    let mut writer = parquet::arrow::ArrowWriter::try_new(file, batch.schema(), None).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

pub fn write_meta(root: &Path, version: &str) {
    let doc = serde_json::json!({
        "meta": { "version": version, "date": "2024-06-01" },
        "data": { "version": version, "date": "2024-06-01" },
    });
    fs::write(root.join("Meta.json"), doc.to_string()).unwrap();
}

pub fn write_gz(path: &Path, body: &str) {
    let mut enc = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    enc.write_all(body.as_bytes()).unwrap();
    enc.finish().unwrap();
}

fn cards() -> RecordBatch {
    batch(vec![
        ("uuid", strings(&["c1", "c2", "c3", "r1", "r2"])),
        ("name", strings(&["Serra Angel", "Opt", "Duress", "Ancestral Recall", "Black Lotus"])),
        ("setCode", strings(&["TST"; 5])),
        (
            "colors",
            text(&[Some("W"), Some("U"), Some("B"), Some("U"), None]),
        ),
        (
            "colorIdentity",
            text(&[Some("W, U"), Some("U"), Some("B"), Some("U"), None]),
        ),
        (
            "text",
            text(&[
                Some("Flying, vigilance"),
                Some("Scry 1. Draw a card."),
                Some("Target opponent reveals their hand. You choose a noncreature, nonland card."),
                Some("Target player draws three cards."),
                Some("Add three mana of any one color."),
            ]),
        ),
        (
            "otherNames",
            text(&[Some("Angel, Serra"), Some("Opt, Vision"), None, None, Some("Lotus, Flower")]),
        ),
        (
            "manaValue",
            Arc::new(Float64Array::from(vec![5.0, 1.0, 1.0, 1.0, 0.0])) as ArrayRef,
        ),
    ])
}

fn tokens() -> RecordBatch {
    batch(vec![
        ("uuid", strings(&["t1"])),
        ("name", strings(&["Soldier"])),
        ("colors", text(&[Some("W")])),
        ("reverseRelated", text(&[Some("Raise the Alarm, Captain's Call")])),
    ])
}

fn sets() -> RecordBatch {
    let mut languages = ListBuilder::new(StringBuilder::new());
    languages.values().append_value("English");
    languages.values().append_value("Japanese");
    languages.append(true);
    batch(vec![
        ("code", strings(&["TST"])),
        ("name", strings(&["Test Set"])),
        ("languages", Arc::new(languages.finish()) as ArrayRef),
        ("baseSetSize", ints(&[5])),
    ])
}

fn legalities() -> RecordBatch {
    batch(vec![
        ("uuid", strings(&["c1", "c2"])),
        ("modern", text(&[Some("Legal"), Some("Banned")])),
        ("vintage", text(&[Some("Legal"), Some("Restricted")])),
        ("pioneer", text(&[None, Some("Legal")])),
    ])
}

fn uuid_pairs(column: &str, values: &[&str]) -> RecordBatch {
    let uuids: Vec<&str> = ["c1", "c2", "c3"].iter().take(values.len()).copied().collect();
    batch(vec![("uuid", strings(&uuids)), (column, strings(values))])
}

fn set_translations() -> RecordBatch {
    batch(vec![
        ("setCode", strings(&["TST"])),
        ("language", strings(&["German"])),
        ("translation", strings(&["Testset"])),
    ])
}

fn booster_weights() -> RecordBatch {
    batch(vec![
        ("setCode", strings(&["TST", "TST"])),
        ("boosterName", strings(&["draft", "broken"])),
        ("boosterIndex", ints(&[0, 0])),
        ("boosterWeight", ints(&[1, 1])),
    ])
}

fn booster_contents() -> RecordBatch {
    batch(vec![
        ("setCode", strings(&["TST", "TST", "TST"])),
        ("boosterName", strings(&["draft", "draft", "broken"])),
        ("boosterIndex", ints(&[0, 0, 0])),
        ("sheetName", strings(&["common", "rare", "missing"])),
        ("sheetPicks", ints(&[2, 1, 1])),
    ])
}

fn booster_sheet_cards() -> RecordBatch {
    batch(vec![
        ("setCode", strings(&["TST"; 5])),
        ("boosterName", strings(&["draft"; 5])),
        ("sheetName", strings(&["common", "common", "common", "rare", "rare"])),
        ("cardUuid", strings(&["c1", "c2", "c3", "r1", "r2"])),
        ("cardWeight", ints(&[1, 1, 1, 3, 1])),
    ])
}

fn booster_sheets() -> RecordBatch {
    batch(vec![
        ("setCode", strings(&["TST", "TST"])),
        ("boosterName", strings(&["draft", "draft"])),
        ("sheetName", strings(&["common", "rare"])),
        (
            "sheetIsFoil",
            Arc::new(BooleanArray::from(vec![false, false])) as ArrayRef,
        ),
    ])
}

pub const PRICES: &str = r#"{
  "meta": {"version": "5.2.2+20240601"},
  "data": {
    "c1": {"paper": {"tcgplayer": {"currency": "USD",
        "retail": {"normal": {"2024-06-01": 0.25}, "foil": {"2024-06-01": null}}}}},
    "c2": {"mtgo": {"cardhoarder": {"currency": "USD",
        "buylist": {"normal": {"2024-06-01": 0.01}}}}}
  }
}"#;

/// A directory served by [`MirrorRemote`], populated for `version`.
pub struct Mirror {
    pub dir: TempDir,
}

impl Mirror {
    pub fn new(version: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write_meta(root, version);

        let parquet = root.join("parquet");
        write_parquet(&parquet.join("cards.parquet"), &cards());
        write_parquet(&parquet.join("tokens.parquet"), &tokens());
        write_parquet(&parquet.join("sets.parquet"), &sets());
        write_parquet(
            &parquet.join("cardIdentifiers.parquet"),
            &uuid_pairs("scryfallId", &["s1", "s2", "s3"]),
        );
        write_parquet(&parquet.join("cardLegalities.parquet"), &legalities());
        write_parquet(
            &parquet.join("cardForeignData.parquet"),
            &uuid_pairs("language", &["German"]),
        );
        write_parquet(
            &parquet.join("cardRulings.parquet"),
            &uuid_pairs("text", &["Vigilance means attacking doesn't cause it to tap."]),
        );
        write_parquet(
            &parquet.join("cardPurchaseUrls.parquet"),
            &uuid_pairs("tcgplayer", &["https://example.invalid/c1"]),
        );
        write_parquet(&parquet.join("setTranslations.parquet"), &set_translations());
        write_parquet(
            &parquet.join("tokenIdentifiers.parquet"),
            &batch(vec![("uuid", strings(&["t1"])), ("scryfallId", strings(&["ts1"]))]),
        );
        write_parquet(&parquet.join("setBoosterContentWeights.parquet"), &booster_weights());
        write_parquet(&parquet.join("setBoosterContents.parquet"), &booster_contents());
        write_parquet(&parquet.join("setBoosterSheetCards.parquet"), &booster_sheet_cards());
        write_parquet(&parquet.join("setBoosterSheets.parquet"), &booster_sheets());

        write_gz(&root.join("AllPricesToday.json.gz"), PRICES);
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn set_version(&self, version: &str) {
        write_meta(self.root(), version);
    }
}

/// Knobs shared between a test and its [`FaultyRemote`].
#[derive(Default)]
pub struct Faults {
    /// Remote path whose fetch fails.
    pub fail_path: Mutex<Option<String>>,
    /// Version checks fail as if the network were down.
    pub unreachable: AtomicBool,
    pub fetches: AtomicUsize,
}

/// A mirror whose fetches can be made to fail.
pub struct FaultyRemote {
    inner: MirrorRemote,
    faults: Arc<Faults>,
}

impl FaultyRemote {
    pub fn new(root: impl Into<PathBuf>) -> (Self, Arc<Faults>) {
        let faults = Arc::new(Faults::default());
        (
            Self {
                inner: MirrorRemote::new(root),
                faults: Arc::clone(&faults),
            },
            faults,
        )
    }
}

impl RemoteSource for FaultyRemote {
    fn current_version(&self) -> Result<DatasetVersion, CacheError> {
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(CacheError::network("Meta.json", "connection refused"));
        }
        self.inner.current_version()
    }

    fn fetch(
        &self,
        remote_path: &str,
        sink: &mut dyn Write,
        progress: ChunkProgress<'_>,
    ) -> Result<u64, CacheError> {
        self.faults.fetches.fetch_add(1, Ordering::SeqCst);
        if self.faults.unreachable.load(Ordering::SeqCst) {
            return Err(CacheError::network(remote_path, "connection refused"));
        }
        if self.faults.fail_path.lock().as_deref() == Some(remote_path) {
            // Write a little first, like a dropped connection would
            sink.write_all(b"PAR1")?;
            progress(4, Some(1024));
            return Err(CacheError::network(remote_path, "connection reset"));
        }
        self.inner.fetch(remote_path, sink, progress)
    }
}

/// A cache at `root` backed by `remote`.
pub fn cache(root: &Path, offline: bool, remote: Box<dyn RemoteSource>) -> CacheManager {
    CacheManager::with_remote(root, offline, remote).unwrap()
}

/// An online session over a fresh cache of `mirror`.
pub fn session(mirror: &Mirror, cache_root: &Path) -> Session {
    session_with(mirror, cache_root, Settings::default())
}

pub fn session_with(mirror: &Mirror, cache_root: &Path, settings: Settings) -> Session {
    let cache = cache(cache_root, false, Box::new(MirrorRemote::new(mirror.root())));
    Session::with_cache(cache, settings).unwrap()
}

#[path = "../common/mod.rs"]
mod common;

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{cache, FaultyRemote, Mirror, VERSION_1, VERSION_2};
use mtgjson::cache::{CacheError, MirrorRemote, MANIFEST_FILE};
use mtgjson::catalog;
use parking_lot::Mutex;

fn generation_dirs(root: &std::path::Path) -> Vec<String> {
    let mut dirs: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("gen-"))
        .collect();
    dirs.sort();
    dirs
}

#[test]
fn test_first_refresh_downloads_everything() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));

    assert!(cache.is_stale());
    assert!(cache.ensure_fresh().unwrap());
    assert_eq!(cache.local_version().unwrap().version, VERSION_1);
    assert!(cache.missing_files().is_empty());
    assert!(root.path().join(MANIFEST_FILE).exists());
    assert_eq!(generation_dirs(root.path()).len(), 1);

    // Same version upstream: nothing to do
    assert!(!cache.is_stale());
    assert!(!cache.ensure_fresh().unwrap());
}

#[test]
fn test_new_version_replaces_generation() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
    cache.ensure_fresh().unwrap();
    let before = generation_dirs(root.path());

    mirror.set_version(VERSION_2);
    assert!(cache.ensure_fresh().unwrap());
    assert_eq!(cache.local_version().unwrap().version, VERSION_2);

    let after = generation_dirs(root.path());
    assert_eq!(after.len(), 1);
    assert_ne!(before, after);
}

#[test]
fn test_interrupted_refresh_keeps_previous_generation() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let (remote, faults) = FaultyRemote::new(mirror.root());
    let mut cache = cache(root.path(), false, Box::new(remote));
    cache.ensure_fresh().unwrap();

    let manifest_before = fs::read_to_string(root.path().join(MANIFEST_FILE)).unwrap();
    let cards_path = cache.path_for("cards").unwrap();
    let cards_before = fs::read(&cards_path).unwrap();
    let gens_before = generation_dirs(root.path());

    mirror.set_version(VERSION_2);
    *faults.fail_path.lock() = Some("parquet/cardRulings.parquet".to_string());

    let err = cache.ensure_fresh().unwrap_err();
    assert!(matches!(err, CacheError::NetworkFailure { .. }));

    // Old version still current, untouched on disk, staging removed
    assert_eq!(cache.local_version().unwrap().version, VERSION_1);
    assert_eq!(
        fs::read_to_string(root.path().join(MANIFEST_FILE)).unwrap(),
        manifest_before
    );
    assert_eq!(fs::read(&cards_path).unwrap(), cards_before);
    assert_eq!(generation_dirs(root.path()), gens_before);

    // Once the network recovers the refresh goes through
    *faults.fail_path.lock() = None;
    assert!(cache.ensure_fresh().unwrap());
    assert_eq!(cache.local_version().unwrap().version, VERSION_2);
}

#[test]
fn test_unreachable_remote_serves_complete_cache() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let (remote, faults) = FaultyRemote::new(mirror.root());
    let mut cache = cache(root.path(), false, Box::new(remote));
    cache.ensure_fresh().unwrap();

    faults.unreachable.store(true, Ordering::SeqCst);
    assert!(!cache.ensure_fresh().unwrap());
    assert!(!cache.is_stale());
    assert_eq!(cache.local_version().unwrap().version, VERSION_1);
}

#[test]
fn test_unreachable_remote_with_empty_cache_fails() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let (remote, faults) = FaultyRemote::new(mirror.root());
    faults.unreachable.store(true, Ordering::SeqCst);
    let mut cache = cache(root.path(), false, Box::new(remote));

    assert!(matches!(
        cache.ensure_fresh(),
        Err(CacheError::NetworkFailure { .. })
    ));
}

#[test]
fn test_offline_never_fetches() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    {
        let mut online = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
        online.ensure_fresh().unwrap();
    }

    mirror.set_version(VERSION_2);
    let (remote, faults) = FaultyRemote::new(mirror.root());
    let mut offline = cache(root.path(), true, Box::new(remote));

    assert!(!offline.ensure_fresh().unwrap());
    assert!(!offline.is_stale());
    assert_eq!(offline.local_version().unwrap().version, VERSION_1);
    assert_eq!(faults.fetches.load(Ordering::SeqCst), 0);
}

#[test]
fn test_offline_missing_file_is_unavailable() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    {
        let mut online = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
        online.ensure_file("sets").unwrap();
    }

    let mut offline = cache(root.path(), true, Box::new(MirrorRemote::new(mirror.root())));
    assert!(offline.ensure_file("sets").is_ok());
    assert!(matches!(
        offline.ensure_file("cards"),
        Err(CacheError::DataUnavailable { ref file }) if file == "cards"
    ));
    assert!(matches!(
        offline.ensure_fresh(),
        Err(CacheError::DataUnavailable { .. })
    ));
}

#[test]
fn test_progress_ends_at_total() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let calls: Arc<Mutex<Vec<(String, u64, u64)>>> = Arc::default();
    let sink = Arc::clone(&calls);
    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())))
        .with_progress(Arc::new(move |file: &str, done: u64, total: u64| {
            sink.lock().push((file.to_string(), done, total));
        }));
    cache.ensure_fresh().unwrap();

    let calls = calls.lock();
    for spec in catalog::VIEWS {
        let name = spec.file_name();
        let last = calls
            .iter()
            .filter(|(file, _, _)| file == name)
            .last()
            .unwrap_or_else(|| panic!("no progress for {name}"));
        assert_eq!(last.1, last.2, "{name} did not finish at its total");
        let size = fs::metadata(mirror.root().join(spec.remote_path)).unwrap().len();
        assert_eq!(last.2, size);
    }
}

#[test]
fn test_corrupt_metadata_is_refetched() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
    cache.ensure_fresh().unwrap();

    let meta_path = cache.path_for("meta").unwrap();
    fs::write(&meta_path, b"{\"data\": ").unwrap();
    assert!(matches!(
        cache.load_json("meta"),
        Err(CacheError::CorruptCacheFile { .. })
    ));
    assert!(!meta_path.exists());

    // The next read downloads a clean copy into the same generation
    let doc = cache.load_json("meta").unwrap();
    assert_eq!(doc["data"]["version"], VERSION_1);
}

#[test]
fn test_lazy_fetch_after_upstream_change_starts_new_generation() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    {
        let mut first = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
        first.ensure_file("sets").unwrap();
    }
    let old_gens = generation_dirs(root.path());

    mirror.set_version(VERSION_2);
    fs::write(mirror.root().join("parquet/cards.parquet"), b"V2-CARDS-BYTES").unwrap();

    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
    let cards = cache.ensure_file("cards").unwrap();
    assert_eq!(fs::read(&cards).unwrap(), b"V2-CARDS-BYTES");

    // Every file of the generation belongs to the new version
    let manifest = cache.manifest().unwrap();
    assert_eq!(manifest.version.version, VERSION_2);
    assert_eq!(manifest.entries["cards"].remote_version_tag, VERSION_2);
    assert_eq!(manifest.entries["sets"].remote_version_tag, VERSION_2);
    assert!(manifest
        .entries
        .values()
        .all(|e| e.remote_version_tag == VERSION_2));

    let gens = generation_dirs(root.path());
    assert_eq!(gens.len(), 1);
    assert_ne!(gens, old_gens);
}

#[test]
fn test_lazy_fetch_rechecks_memoized_version() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut cache = cache(root.path(), false, Box::new(MirrorRemote::new(mirror.root())));
    cache.ensure_file("sets").unwrap();
    assert_eq!(
        cache.remote_version().unwrap().unwrap().version,
        VERSION_1
    );

    mirror.set_version(VERSION_2);
    cache.ensure_file("cards").unwrap();

    assert_eq!(cache.local_version().unwrap().version, VERSION_2);
    assert_eq!(
        cache.manifest().unwrap().entries["cards"].remote_version_tag,
        VERSION_2
    );
    assert_eq!(
        cache.remote_version().unwrap().unwrap().version,
        VERSION_2
    );
}

#[path = "../common/mod.rs"]
mod common;

use common::{Mirror, VERSION_1};
use mtgjson::{BoosterError, Error, SamplingPolicy, Settings};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_available_kinds() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    assert_eq!(session.available_kinds("tst").unwrap(), vec!["broken", "draft"]);
    assert!(session.available_kinds("NOPE").unwrap().is_empty());
}

#[test]
fn test_sheet_contents() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let rare = session.sheet_contents("TST", "draft", "rare").unwrap().unwrap();
    assert_eq!(rare.entries, vec![("r1".to_string(), 3), ("r2".to_string(), 1)]);
    assert_eq!(rare.total_weight, 4);
    assert!(!rare.foil);
    assert!(session
        .sheet_contents("TST", "draft", "mythic")
        .unwrap()
        .is_none());
}

#[test]
fn test_pack_layout_follows_template() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let pack = session.open_pack("TST", "draft").unwrap();
    assert_eq!(pack.len(), 3);
    for uuid in &pack[..2] {
        assert!(["c1", "c2", "c3"].contains(&uuid.as_str()), "{uuid} is not a common");
    }
    assert!(["r1", "r2"].contains(&pack[2].as_str()));
}

#[test]
fn test_seeded_packs_are_reproducible() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let mut a = StdRng::seed_from_u64(42);
    let mut b = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        assert_eq!(
            session.open_pack_with_rng("TST", "draft", &mut a).unwrap(),
            session.open_pack_with_rng("TST", "draft", &mut b).unwrap()
        );
    }
}

#[test]
fn test_rare_slot_respects_weights() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let config = session.booster_config("TST", "draft").unwrap();
    let engine = session.booster_engine();
    let mut rng = StdRng::seed_from_u64(7);
    let packs = engine.open_box_with_rng(&config, 4000, &mut rng).unwrap();

    let r1 = packs.iter().filter(|p| p[2] == "r1").count() as f64;
    let r2 = packs.iter().filter(|p| p[2] == "r2").count() as f64;
    assert_eq!(r1 + r2, 4000.0);
    let ratio = r1 / r2;
    assert!((2.6..3.4).contains(&ratio), "r1:r2 ratio was {ratio}");
}

#[test]
fn test_open_box_uses_configured_size() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.booster.box_size = 4;
    let session = common::session_with(&mirror, root.path(), settings);

    assert_eq!(session.open_box("TST", "draft", None).unwrap().len(), 4);
    assert_eq!(session.open_box("TST", "draft", Some(2)).unwrap().len(), 2);
}

#[test]
fn test_distinct_policy_never_repeats_within_a_sheet() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let mut settings = Settings::default();
    settings.booster.sampling = SamplingPolicy::Distinct;
    let session = common::session_with(&mirror, root.path(), settings);

    let config = session.booster_config("TST", "draft").unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    for pack in session
        .booster_engine()
        .open_box_with_rng(&config, 200, &mut rng)
        .unwrap()
    {
        assert_ne!(pack[0], pack[1]);
    }
}

#[test]
fn test_missing_sheet_is_empty_sheet_error() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let err = session.open_pack("TST", "broken").unwrap_err();
    assert!(matches!(
        err,
        Error::Booster(BoosterError::EmptySheet { ref sheet }) if sheet == "missing"
    ));
}

#[test]
fn test_unknown_configuration() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let err = session.open_pack("NOPE", "draft").unwrap_err();
    assert!(matches!(
        err,
        Error::Booster(BoosterError::ConfigurationNotFound { ref set_code, .. }) if set_code == "NOPE"
    ));
}

#[path = "../common/mod.rs"]
mod common;

use std::fs;

use common::{Mirror, VERSION_1};
use mtgjson::{ShapeKind, ShapeSource};
use rusqlite::types::Value;

fn texts(rows: &mtgjson::Rows, column: &str) -> Vec<String> {
    rows.column(column)
        .unwrap()
        .into_iter()
        .map(|v| match v {
            Value::Text(s) => s.clone(),
            other => panic!("expected text, got {other:?}"),
        })
        .collect()
}

#[test]
fn test_static_array_columns_are_split() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let cards = session.view("cards").unwrap();
    assert_eq!(cards.shapes["colorIdentity"].inferred_kind, ShapeKind::Array);
    assert_eq!(cards.shapes["colorIdentity"].confidence_source, ShapeSource::StaticRule);

    let rows = session
        .run("SELECT colorIdentity FROM cards WHERE uuid = ?", &[Value::Text("c1".into())])
        .unwrap();
    assert_eq!(texts(&rows, "colorIdentity"), vec![r#"["W","U"]"#]);

    // Split columns work with SQLite's JSON functions
    let rows = session
        .run(
            "SELECT c.uuid FROM cards c, json_each(c.colors) j WHERE j.value = ? ORDER BY c.uuid",
            &[Value::Text("U".into())],
        )
        .unwrap();
    assert_eq!(texts(&rows, "uuid"), vec!["c2", "r1"]);

    // A null list becomes an empty array
    let empty = session
        .run_scalar("SELECT colors FROM cards WHERE uuid = 'r2'", &[])
        .unwrap();
    assert_eq!(empty, Some(Value::Text("[]".into())));
}

#[test]
fn test_blocklisted_text_stays_scalar() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let cards = session.view("cards").unwrap();
    assert_eq!(cards.shapes["text"].inferred_kind, ShapeKind::Scalar);
    assert_eq!(cards.shapes["text"].confidence_source, ShapeSource::BlocklistOverride);

    let text = session
        .run_scalar("SELECT text FROM cards WHERE uuid = 'c1'", &[])
        .unwrap();
    assert_eq!(text, Some(Value::Text("Flying, vigilance".into())));
}

#[test]
fn test_plural_heuristic_splits_unlisted_columns() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let cards = session.view("cards").unwrap();
    let shape = &cards.shapes["otherNames"];
    assert_eq!(shape.inferred_kind, ShapeKind::Array);
    assert_eq!(shape.confidence_source, ShapeSource::PluralHeuristic);
    assert_eq!(cards.shapes["name"].inferred_kind, ShapeKind::Scalar);

    let n = session
        .run_scalar(
            "SELECT json_array_length(otherNames) FROM cards WHERE uuid = 'c1'",
            &[],
        )
        .unwrap();
    assert_eq!(n, Some(Value::Integer(2)));
}

#[test]
fn test_native_and_nested_types() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let sets = session.view("sets").unwrap();
    assert_eq!(sets.shapes["languages"].confidence_source, ShapeSource::DeclaredType);

    let rows = session
        .run("SELECT baseSetSize, languages FROM sets", &[])
        .unwrap();
    assert_eq!(rows.rows[0][0], Value::Integer(5));
    assert_eq!(rows.rows[0][1], Value::Text(r#"["English","Japanese"]"#.into()));

    session.view("cards").unwrap();
    let mv = session
        .run_scalar("SELECT manaValue FROM cards WHERE uuid = 'c1'", &[])
        .unwrap();
    assert_eq!(mv, Some(Value::Real(5.0)));
}

#[test]
fn test_legalities_are_unpivoted() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let rel = session.view("card_legalities").unwrap();
    assert_eq!(rel.columns, vec!["uuid", "format", "status"]);
    // c1 has no pioneer status; c2 has all three
    assert_eq!(rel.row_count, 5);

    let rows = session
        .run(
            "SELECT format, status FROM card_legalities WHERE uuid = ? ORDER BY format",
            &[Value::Text("c1".into())],
        )
        .unwrap();
    assert_eq!(texts(&rows, "format"), vec!["modern", "vintage"]);
    assert_eq!(texts(&rows, "status"), vec!["Legal", "Legal"]);

    let restricted = session
        .run_scalar(
            "SELECT status FROM card_legalities WHERE uuid = 'c2' AND format = 'vintage'",
            &[],
        )
        .unwrap();
    assert_eq!(restricted, Some(Value::Text("Restricted".into())));
}

#[test]
fn test_prices_are_flattened() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());

    let rel = session.view("prices_today").unwrap();
    // The null foil observation is dropped
    assert_eq!(rel.row_count, 2);

    let rows = session
        .run(
            "SELECT source, provider, currency, price_kind, finish, date, price
             FROM prices_today WHERE uuid = ?",
            &[Value::Text("c1".into())],
        )
        .unwrap();
    assert_eq!(
        rows.rows,
        vec![vec![
            Value::Text("paper".into()),
            Value::Text("tcgplayer".into()),
            Value::Text("USD".into()),
            Value::Text("retail".into()),
            Value::Text("normal".into()),
            Value::Text("2024-06-01".into()),
            Value::Real(0.25),
        ]]
    );

    let kind = session
        .run_scalar("SELECT price_kind FROM prices_today WHERE uuid = 'c2'", &[])
        .unwrap();
    assert_eq!(kind, Some(Value::Text("buylist".into())));
}

#[test]
fn test_corrupt_parquet_is_discarded_and_refetched() {
    let mirror = Mirror::new(VERSION_1);
    let root = tempfile::tempdir().unwrap();
    let session = common::session(&mirror, root.path());
    assert!(session.refresh().unwrap());

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(root.path().join("manifest.json")).unwrap())
            .unwrap();
    let cached = root
        .path()
        .join(manifest["entries"]["tokens"]["local_path"].as_str().unwrap());
    fs::write(&cached, b"not parquet at all").unwrap();

    let err = session.view("tokens").unwrap_err();
    assert!(err.to_string().contains("corrupt"), "{err}");
    assert!(!cached.exists());
    assert!(session.views().is_empty());

    // The next access downloads a clean copy
    let tokens = session.view("tokens").unwrap();
    assert_eq!(tokens.row_count, 1);
}

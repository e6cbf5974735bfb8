use std::collections::BTreeMap;

use shabaka::db::{Database, GraphStore, Query, Selector};
use shabaka::errors::ShabakaError;
use shabaka::types::*;
use tempfile::TempDir;

const ROOT: &str = "\u{0641}\u{0636}\u{0644}";
const VERB: &str = "\u{0641}\u{064E}\u{0636}\u{064E}\u{0651}\u{0644}\u{064E}";
const NOUN: &str = "\u{0641}\u{064E}\u{0636}\u{0652}\u{0644}";

/// Helper: create a temp database and return (Database, TempDir).
/// The TempDir is returned so that it stays alive for the duration of the test.
fn setup_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let db = Database::initialize(&db_path).expect("failed to initialize database");
    (db, dir)
}

/// Root, a stem II verb, a noun derived from the verb and an English gloss.
fn populate(db: &Database) -> (RecordId, RecordId, RecordId, RecordId) {
    let root = db.add_root_node(ROOT).expect("failed to add root");
    let verb = db.add_verb_node(VERB, "II", root).expect("failed to add verb");
    let noun = db.add_noun_node(NOUN, verb).expect("failed to add noun");
    let foreign = db
        .add_foreign_node("prefer", "en", verb)
        .expect("failed to add foreign node");
    (root, verb, noun, foreign)
}

#[test]
fn test_initialize_creates_database() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("subdir").join("shabaka.db");
    let _db = Database::initialize(&db_path).expect("failed to initialize database");
    assert!(db_path.exists(), "database file should exist after initialize");
}

#[test]
fn test_open_missing_database_fails() {
    let dir = TempDir::new().expect("failed to create temp dir");
    assert!(Database::open(&dir.path().join("missing.db")).is_err());
}

#[test]
fn test_reopen_keeps_records() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("test.db");
    {
        let db = Database::initialize(&db_path).expect("failed to initialize database");
        populate(&db);
    }
    let db = Database::open(&db_path).expect("failed to reopen database");
    assert_eq!(db.count_records().expect("failed to count"), 7);
}

#[test]
fn test_ids_are_allocated_per_cluster() {
    let db = Database::open_in_memory().expect("failed to open database");
    let (root, verb, noun, foreign) = populate(&db);
    let second_root = db.add_root_node("\u{0643}\u{062A}\u{0628}").expect("failed to add root");

    assert_eq!(root, RecordId::new(11, 0));
    assert_eq!(second_root, RecordId::new(11, 1));
    assert_eq!(verb, RecordId::new(12, 0));
    assert_eq!(noun, RecordId::new(13, 0));
    assert_eq!(foreign, RecordId::new(15, 0));
}

#[test]
fn test_arabic_node_is_normalized() {
    let (db, _dir) = setup_db();
    let id = db
        .add_root_node("\u{0641}\u{0640}\u{0636}\u{0644}")
        .expect("failed to add root");
    let record = db.get_record(&id).expect("failed to read").expect("record should exist");
    assert_eq!(record.class, "Root");
    assert_eq!(record.get(LABEL).and_then(RawValue::as_str), Some(ROOT));
    assert_eq!(record.get(UNVOCALIZED_LABEL).and_then(RawValue::as_str), Some(ROOT));
}

#[test]
fn test_ligature_is_spelled_out() {
    let (db, _dir) = setup_db();
    let id = db.add_root_node("\u{0633}\u{FEFB}").expect("failed to add root");
    let record = db.get_record(&id).expect("failed to read").expect("record should exist");
    assert_eq!(
        record.get(LABEL).and_then(RawValue::as_str),
        Some("\u{0633}\u{0644}\u{0627}")
    );
}

#[test]
fn test_non_arabic_label_is_rejected() {
    let (db, _dir) = setup_db();
    let err = db.add_root_node("prefer").unwrap_err();
    assert!(matches!(err, ShabakaError::NotArabic { .. }));
    assert_eq!(db.count_records().expect("failed to count"), 0);
}

#[test]
fn test_node_record_carries_link_bags() {
    let (db, _dir) = setup_db();
    let (root, verb, _, _) = populate(&db);
    let record = db.get_record(&verb).expect("failed to read").expect("record should exist");

    assert_eq!(
        record.get("in_VerbDerivationEdge"),
        Some(&RawValue::LinkList(vec!["#21:0".to_string()]))
    );
    assert_eq!(
        record.get("out_NounDerivationEdge"),
        Some(&RawValue::LinkList(vec!["#22:0".to_string()]))
    );
    assert_eq!(
        record.get("out_InformationEdge"),
        Some(&RawValue::LinkList(vec!["#24:0".to_string()]))
    );

    let root_record = db.get_record(&root).expect("failed to read").expect("record should exist");
    assert!(root_record.get("in_VerbDerivationEdge").is_none());
}

#[test]
fn test_edge_record_carries_endpoints_and_stem() {
    let (db, _dir) = setup_db();
    let (root, verb, _, _) = populate(&db);
    let edge = db
        .get_record(&RecordId::new(21, 0))
        .expect("failed to read")
        .expect("edge should exist");

    assert_eq!(edge.class, "VerbDerivationEdge");
    assert_eq!(edge.get(SOURCE_FIELD), Some(&RawValue::link(root)));
    assert_eq!(edge.get(TARGET_FIELD), Some(&RawValue::link(verb)));
    assert_eq!(edge.get("stem").and_then(RawValue::as_str), Some("II"));
}

#[test]
fn test_foreign_node_keeps_label_verbatim() {
    let (db, _dir) = setup_db();
    let (_, _, _, foreign) = populate(&db);
    let record = db.get_record(&foreign).expect("failed to read").expect("record should exist");
    assert_eq!(record.get(LABEL).and_then(RawValue::as_str), Some("prefer"));
    assert_eq!(record.get("language").and_then(RawValue::as_str), Some("en"));
    assert!(record.get(UNVOCALIZED_LABEL).is_none());
}

#[test]
fn test_second_derivation_edge_is_rejected() {
    let (db, _dir) = setup_db();
    let (root, _, noun, _) = populate(&db);
    let err = db
        .create_edge(EdgeKind::NounDerivation, root, noun, BTreeMap::new())
        .unwrap_err();
    assert!(matches!(err, ShabakaError::Store { .. }));
}

#[test]
fn test_root_cannot_be_derived() {
    let (db, _dir) = setup_db();
    let (root, verb, _, _) = populate(&db);
    assert!(db
        .create_edge(EdgeKind::VerbDerivation, verb, root, BTreeMap::new())
        .is_err());
}

#[test]
fn test_collocation_edges_are_unrestricted() {
    let (db, _dir) = setup_db();
    let (root, verb, noun, _) = populate(&db);
    db.create_edge(EdgeKind::Collocation, noun, verb, BTreeMap::new())
        .expect("collocation should be allowed");
    db.create_edge(EdgeKind::Collocation, verb, root, BTreeMap::new())
        .expect("collocation to a root should be allowed");
}

#[test]
fn test_edge_to_missing_node_is_rejected() {
    let (db, _dir) = setup_db();
    let root = db.add_root_node(ROOT).expect("failed to add root");
    assert!(db.add_noun_node(NOUN, RecordId::new(12, 40)).is_err());
    assert!(db
        .create_edge(EdgeKind::Collocation, root, RecordId::new(13, 9), BTreeMap::new())
        .is_err());
    // The failed derivation left no orphan noun behind.
    assert_eq!(db.count_records().expect("failed to count"), 1);
}

#[test]
fn test_index_query_returns_artifacts() {
    let (db, _dir) = setup_db();
    let (root, verb, noun, _) = populate(&db);
    let query = Query::new(Selector::Index {
        index: LabelIndex::UnvocalizedLabel,
        key: ROOT.to_string(),
    });
    let fetched = db.execute(&query).expect("query failed");

    assert_eq!(fetched.direct.len(), 3);
    assert!(fetched.direct.iter().all(|r| db.is_index_artifact(r)));
    let targets: Vec<&RawValue> = fetched
        .direct
        .iter()
        .filter_map(|r| r.get(ARTIFACT_LINK_FIELD))
        .collect();
    assert_eq!(
        targets,
        vec![&RawValue::link(root), &RawValue::link(verb), &RawValue::link(noun)]
    );
    assert!(fetched.expanded.is_empty());
}

#[test]
fn test_index_query_with_fetch_plan_loads_targets() {
    let (db, _dir) = setup_db();
    let (_, verb, _, _) = populate(&db);
    let query = Query::new(Selector::Index {
        index: LabelIndex::Label,
        key: VERB.to_string(),
    })
    .with_fetch_plan(FetchPlan::depth(1));
    let fetched = db.execute(&query).expect("query failed");

    assert_eq!(fetched.direct.len(), 1);
    let expanded: Vec<Option<RecordId>> = fetched.expanded.iter().map(|r| r.record_id()).collect();
    assert_eq!(expanded, vec![Some(verb)]);
}

#[test]
fn test_index_targets_query() {
    let (db, _dir) = setup_db();
    let (_, _, noun, _) = populate(&db);
    let query = Query::new(Selector::IndexTargets {
        index: LabelIndex::Label,
        key: NOUN.to_string(),
    });
    let fetched = db.execute(&query).expect("query failed");
    assert_eq!(fetched.direct.len(), 1);
    assert_eq!(fetched.direct[0].record_id(), Some(noun));
}

#[test]
fn test_limit_applies_to_direct_hits() {
    let (db, _dir) = setup_db();
    populate(&db);
    let query = Query::new(Selector::Index {
        index: LabelIndex::UnvocalizedLabel,
        key: ROOT.to_string(),
    })
    .with_limit(1);
    assert_eq!(db.execute(&query).expect("query failed").direct.len(), 1);
}

#[test]
fn test_fetch_plan_depth() {
    let (db, _dir) = setup_db();
    let (root, ..) = populate(&db);
    let depth = |d: u32| {
        let query = Query::new(Selector::Records(vec![root])).with_fetch_plan(FetchPlan::depth(d));
        db.execute(&query).expect("query failed").expanded.len()
    };

    assert_eq!(depth(0), 0);
    // root -> verb edge
    assert_eq!(depth(1), 1);
    // -> verb
    assert_eq!(depth(2), 2);
    // -> noun and information edges
    assert_eq!(depth(3), 4);
    // -> noun, foreign node
    assert_eq!(depth(4), 6);
    assert_eq!(depth(10), 6);
}

#[test]
fn test_subgraph_does_not_enter_foreign_nodes() {
    let (db, _dir) = setup_db();
    let (root, verb, noun, foreign) = populate(&db);
    let query = Query::new(Selector::Records(vec![noun])).with_subgraph(true);
    let fetched = db.execute(&query).expect("query failed");

    let ids: Vec<RecordId> = fetched.expanded.iter().filter_map(|r| r.record_id()).collect();
    assert!(ids.contains(&root));
    assert!(ids.contains(&verb));
    assert!(ids.contains(&RecordId::new(21, 0)));
    assert!(ids.contains(&RecordId::new(22, 0)));
    assert!(!ids.contains(&foreign));
    assert!(!ids.contains(&RecordId::new(24, 0)));
    assert!(!ids.contains(&noun));
}

#[test]
fn test_foreign_origins_query() {
    let (db, _dir) = setup_db();
    let (_, verb, _, _) = populate(&db);
    let query = Query::new(Selector::ForeignOrigins {
        label: "prefer".to_string(),
    });
    let fetched = db.execute(&query).expect("query failed");
    assert_eq!(fetched.direct.len(), 1);
    assert_eq!(fetched.direct[0].record_id(), Some(verb));
    assert!(fetched.expanded.is_empty());
}

#[test]
fn test_records_query_skips_unknown_ids() {
    let (db, _dir) = setup_db();
    let (root, ..) = populate(&db);
    let query = Query::new(Selector::Records(vec![root, RecordId::new(11, 77), root]));
    let fetched = db.execute(&query).expect("query failed");
    assert_eq!(fetched.direct.len(), 1);
}

#[test]
fn test_undecodable_record_is_skipped() {
    let (db, _dir) = setup_db();
    let (root, verb, _, _) = populate(&db);
    db.set_raw_attributes(&verb, "{ broken").expect("failed to corrupt record");

    let query = Query::new(Selector::Records(vec![root, verb])).with_fetch_plan(FetchPlan::depth(2));
    let fetched = db.execute(&query).expect("query should not fail");
    assert_eq!(fetched.direct.len(), 1);
    assert!(fetched.expanded.iter().all(|r| r.record_id() != Some(verb)));
}

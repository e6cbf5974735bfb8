use std::sync::{Arc, Mutex};
use std::thread;

use shabaka::config::ShabakaConfig;
use shabaka::db::{Database, FetchedRecords, GraphStore, Query, Selector};
use shabaka::errors::{Result, ShabakaError};
use shabaka::types::*;
use shabaka::word_graph::ArabicWordGraph;
use tempfile::TempDir;

const FDL: &str = "\u{0641}\u{0636}\u{0644}";
const FADDALA: &str = "\u{0641}\u{064E}\u{0636}\u{064E}\u{0651}\u{0644}\u{064E}";
const FADALA: &str = "\u{0641}\u{064E}\u{0636}\u{064E}\u{0644}\u{064E}";
const FDDL: &str = "\u{0641}\u{0636}\u{0651}\u{0644}";
const FUDDILA: &str = "\u{0641}\u{064F}\u{0636}\u{0651}\u{0650}\u{0644}\u{064E}";
const FA_DL: &str = "\u{0641}\u{064E}\u{0636}\u{0644}";

/// A store answering every query with a fixed response and recording the
/// queries it was sent.
#[derive(Default)]
struct ScriptedStore {
    responses: Mutex<Vec<Result<FetchedRecords>>>,
    queries: Mutex<Vec<Query>>,
}

impl ScriptedStore {
    fn with_responses(responses: Vec<Result<FetchedRecords>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

impl GraphStore for ScriptedStore {
    fn execute(&self, query: &Query) -> Result<FetchedRecords> {
        self.queries.lock().unwrap().push(query.clone());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Ok(FetchedRecords::default());
        }
        responses.remove(0)
    }
}

fn artifact(target: &str) -> RawRecord {
    RawRecord::new("#-1:-1", "").with(ARTIFACT_LINK_FIELD, RawValue::Link(target.to_string()))
}

fn verb(id: &str, label: &str) -> RawRecord {
    RawRecord::new(id, "Verb").with_str(LABEL, label)
}

fn rid(s: &str) -> RecordId {
    RecordId::parse(s).expect("valid record id")
}

fn graph(store: ScriptedStore) -> ArabicWordGraph<ScriptedStore> {
    ArabicWordGraph::new(store, ShabakaConfig::default())
}

// ---------------------------------------------------------------------------
// Coordinator against a scripted store
// ---------------------------------------------------------------------------

#[test]
fn test_unvocalized_query_is_one_index_lookup() {
    let store = ScriptedStore::with_responses(vec![Ok(FetchedRecords {
        direct: vec![artifact("#12:0")],
        expanded: vec![verb("#12:0", FADDALA), verb("#12:1", FADALA)],
    })]);
    let graph = graph(store);
    let results = graph
        .search_arabic(FDL, false, 10, FetchPlan::depth(1))
        .expect("search failed");

    let primary: Vec<RecordId> = results.primary_results().map(|r| r.id()).collect();
    assert_eq!(primary, vec![rid("#12:0")]);
    assert_eq!(results.count(), 2);

    let queries = graph.store().queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].selector,
        Selector::Index {
            index: LabelIndex::UnvocalizedLabel,
            key: FDL.to_string(),
        }
    );
    assert_eq!(queries[0].limit, 10);
    assert_eq!(queries[0].fetch_plan, FetchPlan::depth(1));
}

#[test]
fn test_unvocalized_query_without_fetch_plan_dereferences_index() {
    let store = ScriptedStore::with_responses(vec![Ok(FetchedRecords {
        direct: vec![verb("#12:0", FADDALA)],
        expanded: vec![],
    })]);
    let graph = graph(store);
    let results = graph
        .search_arabic(FDL, false, 10, FetchPlan::NONE)
        .expect("search failed");

    let primary: Vec<RecordId> = results.primary_results().map(|r| r.id()).collect();
    assert_eq!(primary, vec![rid("#12:0")]);

    let queries = graph.store().queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].selector,
        Selector::IndexTargets {
            index: LabelIndex::UnvocalizedLabel,
            key: FDL.to_string(),
        }
    );
}

#[test]
fn test_vocalized_query_refetches_compatible_hits() {
    let store = ScriptedStore::with_responses(vec![
        Ok(FetchedRecords {
            direct: vec![artifact("#12:0"), artifact("#12:1")],
            expanded: vec![verb("#12:0", FADDALA), verb("#12:1", FADALA)],
        }),
        Ok(FetchedRecords {
            direct: vec![verb("#12:0", FADDALA)],
            expanded: vec![],
        }),
    ]);
    let graph = graph(store);
    let results = graph
        .search_arabic(FDDL, true, 5, FetchPlan::depth(2))
        .expect("search failed");
    assert_eq!(results.primary_results().count(), 1);

    let queries = graph.store().queries();
    assert_eq!(queries.len(), 2);
    assert_eq!(
        queries[0].selector,
        Selector::Index {
            index: LabelIndex::UnvocalizedLabel,
            key: FDL.to_string(),
        }
    );
    assert!(!queries[0].expand_subgraph);
    assert_eq!(queries[1].selector, Selector::Records(vec![rid("#12:0")]));
    assert!(queries[1].expand_subgraph);
    assert_eq!(queries[1].fetch_plan, FetchPlan::depth(2));
}

#[test]
fn test_vocalized_query_falls_back_to_all_hits() {
    let store = ScriptedStore::with_responses(vec![
        Ok(FetchedRecords {
            direct: vec![artifact("#12:0"), artifact("#12:1")],
            expanded: vec![verb("#12:0", FADDALA), verb("#12:1", FADALA)],
        }),
        Ok(FetchedRecords {
            direct: vec![verb("#12:0", FADDALA), verb("#12:1", FADALA)],
            expanded: vec![],
        }),
    ]);
    let graph = graph(store);
    let results = graph
        .search_arabic(FUDDILA, false, 5, FetchPlan::depth(1))
        .expect("search failed");
    assert_eq!(results.primary_results().count(), 2);

    let queries = graph.store().queries();
    assert_eq!(
        queries[1].selector,
        Selector::Records(vec![rid("#12:0"), rid("#12:1")])
    );
}

#[test]
fn test_vocalized_query_without_hits_is_empty() {
    let graph = graph(ScriptedStore::default());
    let results = graph
        .search_arabic(FADDALA, false, 5, FetchPlan::depth(1))
        .expect("search failed");
    assert!(results.is_empty());
    assert_eq!(graph.store().queries().len(), 1);
}

#[test]
fn test_ignore_shaddas_widens_the_filter() {
    let responses = || {
        vec![
            Ok(FetchedRecords {
                direct: vec![artifact("#12:0"), artifact("#12:1")],
                expanded: vec![verb("#12:0", FADDALA), verb("#12:1", FADALA)],
            }),
            Ok(FetchedRecords::default()),
        ]
    };
    // Only the first letter is vowelled; the doubled verb needs its shadda
    // to be elidable.
    let strict = graph(ScriptedStore::with_responses(responses()));
    strict
        .search_arabic(FA_DL, false, 5, FetchPlan::depth(1))
        .expect("search failed");
    assert_eq!(
        strict.store().queries()[1].selector,
        Selector::Records(vec![rid("#12:1")])
    );

    let config = ShabakaConfig {
        ignore_shaddas: true,
        ..ShabakaConfig::default()
    };
    let lenient = ArabicWordGraph::new(ScriptedStore::with_responses(responses()), config);
    lenient
        .search_arabic(FA_DL, false, 5, FetchPlan::depth(1))
        .expect("search failed");
    assert_eq!(
        lenient.store().queries()[1].selector,
        Selector::Records(vec![rid("#12:0"), rid("#12:1")])
    );
}

#[test]
fn test_blank_query_does_not_contact_store() {
    let graph = graph(ScriptedStore::default());
    assert!(graph
        .search_arabic("  ", false, 5, FetchPlan::depth(1))
        .expect("search failed")
        .is_empty());
    assert!(graph.search_foreign("").expect("search failed").is_empty());
    assert!(graph.store().queries().is_empty());
}

#[test]
fn test_get_nodes_with_no_ids_does_not_contact_store() {
    let graph = graph(ScriptedStore::default());
    let results = graph.get_nodes(&[], true).expect("fetch failed");
    assert_eq!(results.count(), 0);
    assert!(results.first_result().is_none());
    assert!(graph.store().queries().is_empty());
}

#[test]
fn test_get_nodes_marks_requested_ids_primary() {
    let store = ScriptedStore::with_responses(vec![Ok(FetchedRecords {
        direct: vec![verb("#12:0", FADDALA)],
        expanded: vec![verb("#12:1", FADALA)],
    })]);
    let graph = graph(store);
    let results = graph.get_nodes(&[rid("#12:0")], true).expect("fetch failed");

    assert!(results.is_primary(&rid("#12:0")));
    assert!(!results.is_primary(&rid("#12:1")));
    let queries = graph.store().queries();
    assert_eq!(queries[0].fetch_plan, FetchPlan::depth(2));
    assert!(queries[0].expand_subgraph);
}

#[test]
fn test_search_foreign_returns_origins() {
    let store = ScriptedStore::with_responses(vec![Ok(FetchedRecords {
        direct: vec![verb("#12:0", FADDALA)],
        expanded: vec![],
    })]);
    let graph = graph(store);
    let results = graph.search_foreign("prefer").expect("search failed");
    assert_eq!(results.first_result().map(|r| r.id()), Some(rid("#12:0")));

    let queries = graph.store().queries();
    assert_eq!(
        queries[0].selector,
        Selector::ForeignOrigins {
            label: "prefer".to_string(),
        }
    );
    assert_eq!(queries[0].fetch_plan, FetchPlan::NONE);
    assert_eq!(queries[0].limit, 100);
}

#[test]
fn test_store_failure_is_propagated() {
    let store = ScriptedStore::with_responses(vec![Err(ShabakaError::Store {
        message: "connection refused".to_string(),
        operation: "execute".to_string(),
    })]);
    let graph = graph(store);
    let err = graph
        .search_arabic(FDL, false, 5, FetchPlan::depth(1))
        .unwrap_err();
    assert!(matches!(err, ShabakaError::Store { .. }));
}

// ---------------------------------------------------------------------------
// Coordinator against the SQLite store
// ---------------------------------------------------------------------------

fn setup_graph() -> (ArabicWordGraph<Database>, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let graph = ArabicWordGraph::<Database>::init(dir.path()).expect("failed to init project");
    let root = graph.store().add_root_node(FDL).expect("failed to add root");
    graph
        .store()
        .add_verb_node(FADDALA, "II", root)
        .expect("failed to add verb");
    (graph, dir)
}

fn primary_labels(graph: &ArabicWordGraph<Database>, query: &str) -> Vec<String> {
    let results = graph
        .search_arabic(query, false, 100, FetchPlan::depth(1))
        .expect("search failed");
    results
        .primary_results()
        .filter_map(|r| r.as_node())
        .map(|n| n.label().to_string())
        .collect()
}

#[test]
fn test_unvocalized_search_finds_vocalized_label() {
    let (graph, _dir) = setup_graph();
    let labels = primary_labels(&graph, FDL);
    assert!(labels.contains(&FADDALA.to_string()));
    assert!(labels.contains(&FDL.to_string()));
}

#[test]
fn test_unvocalized_search_without_fetch_plan_finds_words() {
    let (graph, _dir) = setup_graph();
    let results = graph
        .search_arabic(FDL, false, 100, FetchPlan::NONE)
        .expect("search failed");

    let labels: Vec<&str> = results
        .primary_results()
        .filter_map(|r| r.as_node())
        .map(|n| n.label())
        .collect();
    assert_eq!(labels.len(), 2);
    assert!(labels.contains(&FADDALA));
    assert!(labels.contains(&FDL));
    assert_eq!(results.edges().count(), 0);
}

#[test]
fn test_partially_vocalized_search_finds_verb() {
    let (graph, _dir) = setup_graph();
    assert_eq!(primary_labels(&graph, FDDL), vec![FADDALA.to_string()]);
}

#[test]
fn test_incompatible_vocalization_falls_back() {
    let (graph, _dir) = setup_graph();
    let labels = primary_labels(&graph, FUDDILA);
    assert!(labels.contains(&FADDALA.to_string()));
    assert_eq!(labels.len(), 2);
}

#[test]
fn test_subgraph_search_stops_at_foreign_nodes() {
    let (graph, _dir) = setup_graph();
    let verb = RecordId::new(12, 0);
    graph
        .store()
        .add_foreign_node("prefer", "en", verb)
        .expect("failed to add foreign node");

    let results = graph
        .search_arabic(FDDL, true, 100, FetchPlan::NONE)
        .expect("search failed");
    assert!(results.contains(&RecordId::new(11, 0)));
    assert!(results.contains(&RecordId::new(21, 0)));
    assert!(!results.contains(&RecordId::new(15, 0)));
    assert!(!results.contains(&RecordId::new(24, 0)));
    assert_eq!(results.node(&verb).unwrap().derivation_parent().unwrap().label(), FDL);
}

#[test]
fn test_foreign_search_against_sqlite() {
    let (graph, _dir) = setup_graph();
    let verb = RecordId::new(12, 0);
    graph
        .store()
        .add_foreign_node("prefer", "en", verb)
        .expect("failed to add foreign node");

    let results = graph.search_foreign("prefer").expect("search failed");
    let primary: Vec<RecordId> = results.primary_results().map(|r| r.id()).collect();
    assert_eq!(primary, vec![verb]);
}

#[test]
fn test_open_reads_existing_project() {
    let (graph, dir) = setup_graph();
    drop(graph);
    assert!(ArabicWordGraph::<Database>::is_initialized(dir.path()));
    let reopened = ArabicWordGraph::<Database>::open(dir.path()).expect("failed to open project");
    let results = reopened
        .get_nodes(&[RecordId::new(11, 0)], false)
        .expect("fetch failed");
    assert!(results.is_primary(&RecordId::new(11, 0)));
}

#[test]
fn test_open_uninitialized_project_fails() {
    let dir = TempDir::new().expect("failed to create temp dir");
    assert!(!ArabicWordGraph::<Database>::is_initialized(dir.path()));
    assert!(ArabicWordGraph::<Database>::open(dir.path()).is_err());
}

#[test]
fn test_parallel_searches() {
    let (graph, _dir) = setup_graph();
    let graph = Arc::new(graph);

    let handles: Vec<_> = [FDL, FDDL, FUDDILA, FADDALA]
        .into_iter()
        .map(|query| {
            let graph = Arc::clone(&graph);
            thread::spawn(move || {
                graph
                    .search_arabic(query, false, 100, FetchPlan::depth(1))
                    .expect("search failed")
                    .primary_results()
                    .count()
            })
        })
        .collect();

    let counts: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("search thread panicked"))
        .collect();
    assert_eq!(counts, vec![2, 1, 2, 1]);
}

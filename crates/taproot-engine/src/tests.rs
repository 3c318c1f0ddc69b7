//! Unit tests for taproot-engine

use crate::ingest::{IngestEvent, IngestStatus, IngestStep};
use crate::repo::{block_globs_for, build_blockset, default_block_globs, filter_files};
use crate::retrieval::{edge_weight, rank_hits, rank_hits_with_config};
use std::collections::{BTreeMap, HashMap};
use taproot_core::{EdgeKind, KGEdge, KGNode, KGNodeKind, KnowledgeGraph, PageRankConfig};
use taproot_index::SearchRow;

fn hit(node_id: usize, score: f32) -> (SearchRow, f32) {
    (
        SearchRow {
            id: node_id as i32,
            file: None,
            text: None,
            node_id: node_id as i64,
            graph_id: "1".to_string(),
        },
        score,
    )
}

/// Graph from the test-bias scenario: a source function and the test that
/// calls it, with mirrored call edges.
fn test_bias_graph() -> (KnowledgeGraph, KGNode, KGNode) {
    let mut graph = KnowledgeGraph::new();
    let src = graph.add_node(
        KGNodeKind::Function,
        "src.foo".to_string(),
        "src.py".to_string(),
        0,
        Some(2),
    );
    let test = graph.add_node(
        KGNodeKind::Function,
        "tests.test_foo".to_string(),
        "tests/test_foo.py".to_string(),
        0,
        Some(3),
    );
    let call = KGEdge::forward(EdgeKind::Call, "tests/test_foo.py", "src.py");
    graph.add_edge(test.id, src.id, call.clone());
    graph.add_edge(src.id, test.id, call.mirrored());
    (graph, src, test)
}

#[test]
fn test_edge_weight_test_target() {
    let edge = KGEdge::forward(EdgeKind::Call, "src.py", "tests/test_foo.py");
    assert_eq!(edge_weight(&edge, true, false), 1.0);
    assert_eq!(edge_weight(&edge, false, false), 0.10);
}

#[test]
fn test_edge_weight_test_check_uses_first_underscore_component() {
    // "docs/latest_tests.py" splits to "docs/latest" before the first '_';
    // no "test" there, so the test branch does not fire.
    let edge = KGEdge::forward(EdgeKind::Call, "a.py", "docs/latest_tests.py");
    assert_eq!(edge_weight(&edge, false, false), 0.01);

    let edge = KGEdge::forward(EdgeKind::Call, "a.py", "testutil_helpers.py");
    assert_eq!(edge_weight(&edge, false, false), 0.10);
}

#[test]
fn test_edge_weight_direction_agreement() {
    let forward = KGEdge::forward(EdgeKind::Call, "a.py", "b.py");
    let mirror = forward.mirrored();

    // Weight 1.0 only when pass direction and edge direction disagree on the
    // reverse flag (effective direction), for propagating kinds.
    assert_eq!(edge_weight(&forward, false, false), 0.01);
    assert_eq!(edge_weight(&mirror, false, false), 1.0);
    assert_eq!(edge_weight(&forward, false, true), 1.0);
    assert_eq!(edge_weight(&mirror, false, true), 0.01);
}

#[test]
fn test_edge_weight_def_edges_do_not_propagate() {
    let edge = KGEdge::forward(EdgeKind::FunctionDef, "a.py", "b.py");
    assert_eq!(edge_weight(&edge, false, true), 0.01);
    let edge = KGEdge::forward(EdgeKind::ClassDef, "a.py", "b.py");
    assert_eq!(edge_weight(&edge, false, true), 0.01);
}

#[test]
fn test_edge_weight_only_tests_downweights_everything_else() {
    let edge = KGEdge::forward(EdgeKind::Call, "a.py", "b.py");
    assert_eq!(edge_weight(&edge, true, false), 0.01);
    assert_eq!(edge_weight(&edge, true, true), 0.01);
}

#[test]
fn test_bias_ranks_source_first_by_default() {
    let (graph, src, test) = test_bias_graph();
    let hits = vec![hit(src.id.0, 1.0), hit(test.id.0, 1.0)];

    let out = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 50);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0.symbol, "src.foo");
    assert_eq!(out[1].0.symbol, "tests.test_foo");
}

#[test]
fn test_bias_ranks_test_first_when_only_tests() {
    let (graph, src, test) = test_bias_graph();
    let hits = vec![hit(src.id.0, 1.0), hit(test.id.0, 1.0)];

    let out = rank_hits(&graph, &hits, &[], &HashMap::new(), true, 50);
    assert_eq!(out[0].0.symbol, "tests.test_foo");
}

#[test]
fn test_only_tests_with_no_test_files_is_empty() {
    let mut graph = KnowledgeGraph::new();
    let a = graph.add_node(KGNodeKind::Function, "m.a".into(), "m.py".into(), 0, None);
    let b = graph.add_node(KGNodeKind::Function, "m.b".into(), "m.py".into(), 5, None);
    graph.add_edge(a.id, b.id, KGEdge::forward(EdgeKind::Call, "m.py", "m.py"));

    let hits = vec![hit(a.id.0, 1.0), hit(b.id.0, 0.5)];
    let out = rank_hits(&graph, &hits, &[], &HashMap::new(), true, 50);
    assert!(out.is_empty());
}

#[test]
fn test_is_test_file() {
    use crate::retrieval::is_test_file;
    assert!(is_test_file("tests/test_foo.py"));
    assert!(is_test_file("testutil_helpers.py"));
    assert!(!is_test_file("docs/latest_tests.py"));
    assert!(!is_test_file("src/main.py"));
}

#[test]
fn test_convergence_failure_falls_back_to_search_order() {
    let (graph, src, test) = test_bias_graph();
    let hits = vec![hit(src.id.0, 0.9), hit(test.id.0, 0.4)];

    // Zero iterations can never converge; ranking degrades to the raw
    // personalization scores.
    let config = PageRankConfig {
        max_iterations: 0,
        ..PageRankConfig::default()
    };
    let out = rank_hits_with_config(&graph, &hits, &[], &HashMap::new(), false, 50, &config);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].0.symbol, "src.foo");
    assert!((out[0].1 - 0.9).abs() < 1e-9);
    assert_eq!(out[1].0.symbol, "tests.test_foo");
    assert!((out[1].1 - 0.4).abs() < 1e-9);
}

#[test]
fn test_seed_nodes_weigh_as_much_as_best_hit() {
    let mut graph = KnowledgeGraph::new();
    let a = graph.add_node(KGNodeKind::Function, "m.a".into(), "m.py".into(), 0, None);
    let b = graph.add_node(KGNodeKind::Function, "m.b".into(), "m.py".into(), 5, None);
    let seed = graph.add_node(KGNodeKind::Function, "m.c".into(), "m.py".into(), 9, None);

    let hits = vec![hit(a.id.0, 0.8), hit(b.id.0, 0.2)];
    let config = PageRankConfig {
        max_iterations: 0,
        ..PageRankConfig::default()
    };
    let out = rank_hits_with_config(
        &graph,
        &hits,
        std::slice::from_ref(&seed),
        &HashMap::new(),
        false,
        50,
        &config,
    );

    // With the fallback exposing raw personalization, the seed carries the
    // same score as the strongest hit.
    let seed_score = out.iter().find(|(n, _)| n.id == seed.id).unwrap().1;
    assert!((seed_score - 0.8).abs() < 1e-9);
}

#[test]
fn test_overlay_deleted_files_filtered_from_results() {
    let (graph, src, test) = test_bias_graph();
    let hits = vec![hit(src.id.0, 1.0), hit(test.id.0, 1.0)];

    let mut overlay: HashMap<String, Option<String>> = HashMap::new();
    overlay.insert("src.py".to_string(), None);

    let out = rank_hits(&graph, &hits, &[], &overlay, false, 50);
    assert!(out.iter().all(|(n, _)| n.file_name != "src.py"));
    assert_eq!(out.len(), 1);
}

#[test]
fn test_rank_ties_break_by_node_id() {
    let mut graph = KnowledgeGraph::new();
    let a = graph.add_node(KGNodeKind::Function, "m.a".into(), "m.py".into(), 0, None);
    let b = graph.add_node(KGNodeKind::Function, "m.b".into(), "m.py".into(), 5, None);

    let hits = vec![hit(b.id.0, 0.5), hit(a.id.0, 0.5)];
    let config = PageRankConfig {
        max_iterations: 0,
        ..PageRankConfig::default()
    };
    let out = rank_hits_with_config(&graph, &hits, &[], &HashMap::new(), false, 50, &config);
    assert_eq!(out[0].0.id, a.id);
    assert_eq!(out[1].0.id, b.id);
}

#[test]
fn test_graph_top_truncates_results() {
    let mut graph = KnowledgeGraph::new();
    let mut hits = Vec::new();
    for i in 0..10 {
        let node = graph.add_node(
            KGNodeKind::Function,
            format!("m.f{i}"),
            "m.py".to_string(),
            i,
            None,
        );
        hits.push(hit(node.id.0, 1.0 - i as f32 * 0.05));
    }
    let out = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 3);
    assert_eq!(out.len(), 3);
}

#[test]
fn test_default_block_globs_cover_dependency_dirs() {
    let blockset = build_blockset(&default_block_globs()).unwrap();
    assert!(blockset.is_match("node_modules/react/index.js"));
    assert!(blockset.is_match("app/node_modules/react/index.js"));
    assert!(blockset.is_match("target/debug/build.rs"));
    assert!(blockset.is_match("venv/lib/python3.12/site.py"));
    assert!(blockset.is_match(".git/config"));
    assert!(blockset.is_match("src/__pycache__/mod.pyc"));
    assert!(!blockset.is_match("src/main.py"));
}

#[test]
fn test_filter_files_applies_globs_and_size_cap() {
    let mut files = BTreeMap::new();
    files.insert("src/main.py".to_string(), "print()".to_string());
    files.insert("node_modules/x/y.js".to_string(), "x".to_string());
    files.insert("big.py".to_string(), "x".repeat(1_000_000));

    let blockset = build_blockset(&default_block_globs()).unwrap();
    let kept = filter_files(files, &blockset);
    assert_eq!(kept.len(), 1);
    assert!(kept.contains_key("src/main.py"));
}

#[test]
fn test_block_globs_from_repo_toml() {
    let mut files = BTreeMap::new();
    files.insert(
        "taproot.toml".to_string(),
        "[chat]\nblock_globs = [\"generated/**\"]\n".to_string(),
    );
    let globs = block_globs_for(&files);
    assert_eq!(globs, vec!["generated/**"]);

    // No config file: the defaults apply.
    assert_eq!(block_globs_for(&BTreeMap::new()), default_block_globs());
}

#[test]
fn test_ingest_event_wire_format() {
    let event = IngestEvent {
        step: IngestStep::BuildGraph,
        status: IngestStatus::InProgress,
        progress: Some(0.5),
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(
        json,
        r#"{"step":"Building code graph","status":"IN_PROGRESS","progress":0.5}"#
    );

    let event = IngestEvent {
        step: IngestStep::Analyze,
        status: IngestStatus::Completed,
        progress: None,
    };
    let json = serde_json::to_string(&event).unwrap();
    assert_eq!(json, r#"{"step":"Analyzing code","status":"COMPLETED"}"#);
}

#[test]
fn test_overlay_apply_and_cleanup_shape() {
    // The database-free half of overlay handling: deleted entries are
    // ignored by the parser, live entries produce draft nodes with edges.
    let mut overlay: HashMap<String, Option<String>> = HashMap::new();
    overlay.insert("a.py".to_string(), Some("def foo():\n    pass\n".to_string()));
    overlay.insert("b.py".to_string(), None);

    let live: BTreeMap<String, String> = overlay
        .iter()
        .filter_map(|(k, v)| v.as_ref().map(|c| (k.clone(), c.clone())))
        .collect();
    let analysis = taproot_analyzer::analyze_files(&live);
    assert_eq!(analysis.nodes.len(), 2);
    assert!(analysis.nodes.iter().all(|n| n.file_name == "a.py"));
}

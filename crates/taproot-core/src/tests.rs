//! Unit tests for taproot-core

use crate::graph::KnowledgeGraph;
use crate::model::{EdgeKind, KGEdge, KGNodeKind, NodeId};
use crate::pagerank::{PageRankConfig, pagerank};
use std::collections::HashMap;

fn two_node_graph() -> (KnowledgeGraph, NodeId, NodeId) {
    let mut graph = KnowledgeGraph::new();
    let file = graph.add_node(KGNodeKind::File, "a".to_string(), "a.py".to_string(), 0, None);
    let func = graph.add_node(
        KGNodeKind::Function,
        "a.foo".to_string(),
        "a.py".to_string(),
        0,
        Some(2),
    );
    (graph, file.id, func.id)
}

#[test]
fn test_node_ids_are_dense() {
    let (graph, file_id, func_id) = two_node_graph();
    assert_eq!(file_id, NodeId(0));
    assert_eq!(func_id, NodeId(1));
    assert_eq!(graph.node_count(), 2);
}

#[test]
fn test_removed_ids_are_reused() {
    let (mut graph, file_id, func_id) = two_node_graph();
    graph.remove_node(file_id);
    let replacement = graph.add_node(
        KGNodeKind::Function,
        "a.bar".to_string(),
        "a.py".to_string(),
        5,
        Some(7),
    );
    assert_eq!(replacement.id, file_id);
    assert!(graph.node(func_id).is_some());
}

#[test]
fn test_remove_node_drops_incident_edges() {
    let (mut graph, file_id, func_id) = two_node_graph();
    let attrs = KGEdge::forward(EdgeKind::FunctionDef, "a.py", "a.py");
    graph.add_edge(func_id, file_id, attrs.clone());
    graph.add_edge(file_id, func_id, attrs.mirrored());
    assert_eq!(graph.edge_count(), 2);

    graph.remove_node(func_id);
    assert_eq!(graph.edge_count(), 0);
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn test_multigraph_allows_parallel_edges() {
    let (mut graph, file_id, func_id) = two_node_graph();
    let attrs = KGEdge::forward(EdgeKind::Call, "a.py", "a.py");
    graph.add_edge(func_id, file_id, attrs.clone());
    graph.add_edge(func_id, file_id, attrs);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(graph.edges_from(func_id).count(), 2);
}

#[test]
fn test_mirrored_edge_swaps_files_and_flips_reverse() {
    let attrs = KGEdge::forward(EdgeKind::Call, "src/a.py", "src/b.py");
    let mirror = attrs.mirrored();
    assert_eq!(mirror.src_file, "src/b.py");
    assert_eq!(mirror.target_file, "src/a.py");
    assert!(mirror.reverse);
    assert_eq!(mirror.kind, EdgeKind::Call);
}

#[test]
fn test_save_load_round_trip() {
    let (mut graph, file_id, func_id) = two_node_graph();
    let attrs = KGEdge::forward(EdgeKind::FunctionDef, "a.py", "a.py");
    graph.add_edge(func_id, file_id, attrs.clone());
    graph.add_edge(file_id, func_id, attrs.mirrored());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    graph.save(&path).unwrap();

    let loaded = KnowledgeGraph::load(&path).unwrap();
    assert_eq!(loaded.node_count(), 2);
    assert_eq!(loaded.edge_count(), 2);

    let func = loaded.node(func_id).unwrap();
    assert_eq!(func.symbol, "a.foo");
    assert_eq!(func.line, 0);
    assert_eq!(func.end_line, Some(2));
    assert_eq!(func.kind, KGNodeKind::Function);

    // src_file/target_file are rebuilt from the endpoints; the reverse flag
    // survives the trip.
    let mut reverse_flags: Vec<bool> = loaded.edges().map(|(_, _, e)| e.reverse).collect();
    reverse_flags.sort();
    assert_eq!(reverse_flags, vec![false, true]);
    for (_, _, edge) in loaded.edges() {
        assert_eq!(edge.src_file, "a.py");
        assert_eq!(edge.target_file, "a.py");
    }
}

#[test]
fn test_load_preserves_holes() {
    let (mut graph, file_id, func_id) = two_node_graph();
    let third = graph.add_node(
        KGNodeKind::Class,
        "a.C".to_string(),
        "a.py".to_string(),
        3,
        Some(4),
    );
    graph.remove_node(func_id);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    graph.save(&path).unwrap();

    let mut loaded = KnowledgeGraph::load(&path).unwrap();
    assert!(loaded.node(func_id).is_none());
    assert_eq!(loaded.node(file_id).unwrap().symbol, "a");
    assert_eq!(loaded.node(third.id).unwrap().symbol, "a.C");

    // The hole is reused by the next insert, same as before the round trip.
    let reinserted = loaded.add_node(
        KGNodeKind::Function,
        "a.baz".to_string(),
        "a.py".to_string(),
        9,
        None,
    );
    assert_eq!(reinserted.id, func_id);
}

#[test]
fn test_pagerank_uniform_on_empty_personalization() {
    let (mut graph, file_id, func_id) = two_node_graph();
    graph.add_edge(func_id, file_id, KGEdge::forward(EdgeKind::Call, "a.py", "a.py"));

    let ranks = pagerank(&graph, |_| 1.0, &HashMap::new(), &PageRankConfig::default()).unwrap();
    assert_eq!(ranks.len(), 2);
    let total: f64 = ranks.values().sum();
    assert!((total - 1.0).abs() < 1e-6);
}

#[test]
fn test_pagerank_follows_weighted_edges() {
    // a -> b with weight 1, a -> c with weight 0.01: b should outrank c.
    let mut graph = KnowledgeGraph::new();
    let a = graph.add_node(KGNodeKind::Function, "m.a".into(), "m.py".into(), 0, None);
    let b = graph.add_node(KGNodeKind::Function, "m.b".into(), "m.py".into(), 5, None);
    let c = graph.add_node(KGNodeKind::Function, "m.c".into(), "m.py".into(), 10, None);
    graph.add_edge(a.id, b.id, KGEdge::forward(EdgeKind::Call, "m.py", "m.py"));
    graph.add_edge(a.id, c.id, KGEdge::forward(EdgeKind::ClassRef, "m.py", "m.py"));

    let mut personalization = HashMap::new();
    personalization.insert(a.id.0, 1.0);

    let ranks = pagerank(
        &graph,
        |edge| if edge.kind == EdgeKind::Call { 1.0 } else { 0.01 },
        &personalization,
        &PageRankConfig::default(),
    )
    .unwrap();
    assert!(ranks[&b.id.0] > ranks[&c.id.0]);
    assert!(ranks[&a.id.0] > ranks[&b.id.0]);
}

#[test]
fn test_pagerank_personalization_biases_ranks() {
    let mut graph = KnowledgeGraph::new();
    let a = graph.add_node(KGNodeKind::Function, "m.a".into(), "m.py".into(), 0, None);
    let b = graph.add_node(KGNodeKind::Function, "m.b".into(), "m.py".into(), 5, None);

    let mut personalization = HashMap::new();
    personalization.insert(b.id.0, 1.0);

    let ranks = pagerank(&graph, |_| 1.0, &personalization, &PageRankConfig::default()).unwrap();
    assert!(ranks[&b.id.0] > ranks[&a.id.0]);
}

#[test]
fn test_pagerank_non_convergence() {
    let (mut graph, file_id, func_id) = two_node_graph();
    graph.add_edge(func_id, file_id, KGEdge::forward(EdgeKind::Call, "a.py", "a.py"));
    graph.add_edge(file_id, func_id, KGEdge::forward(EdgeKind::Call, "a.py", "a.py"));

    // Zero allowed iterations: power iteration cannot settle.
    let config = PageRankConfig {
        max_iterations: 0,
        ..PageRankConfig::default()
    };
    let result = pagerank(&graph, |_| 1.0, &HashMap::new(), &config);
    assert!(result.is_err());
}

#[test]
fn test_pagerank_empty_graph() {
    let graph = KnowledgeGraph::new();
    let ranks = pagerank(&graph, |_| 1.0, &HashMap::new(), &PageRankConfig::default()).unwrap();
    assert!(ranks.is_empty());
}

#[test]
fn test_edge_kind_wire_names() {
    for kind in [
        EdgeKind::FunctionDef,
        EdgeKind::ClassDef,
        EdgeKind::Call,
        EdgeKind::ClassRef,
        EdgeKind::TestCoverage,
    ] {
        assert_eq!(EdgeKind::from_str(kind.as_str()), Some(kind));
    }
    assert_eq!(EdgeKind::from_str("imports"), None);
}

#[test]
fn test_node_kind_wire_names() {
    for kind in [
        KGNodeKind::File,
        KGNodeKind::Namespace,
        KGNodeKind::Class,
        KGNodeKind::Function,
    ] {
        assert_eq!(KGNodeKind::from_str(kind.as_str()), Some(kind));
    }
}

//! Integration tests for Taproot
//!
//! These drive the analyzer, the graph, and the ranking layer together, the
//! way ingestion and retrieval compose them. Paths that need a running
//! search database are covered by unit tests in their own crates and by the
//! server's own smoke checks.

use std::collections::{BTreeMap, HashMap};
use taproot_analyzer::analyze_files;
use taproot_core::{EdgeKind, KGEdge, KGNode, KnowledgeGraph, KGNodeKind};
use taproot_engine::rank_hits;
use taproot_index::SearchRow;

/// Mirror of the ingest pipeline without the database: insert analyzed
/// drafts, resolve deferred edges by symbol, add mirrored twins.
fn build_graph(files: &[(&str, &str)]) -> (KnowledgeGraph, Vec<KGNode>, Vec<String>) {
    let files: BTreeMap<String, String> = files
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let analysis = analyze_files(&files);

    let mut graph = KnowledgeGraph::new();
    let mut inserted = Vec::new();
    for draft in analysis.nodes {
        inserted.push(graph.add_node(
            draft.kind,
            draft.symbol,
            draft.file_name,
            draft.line,
            draft.end_line,
        ));
    }

    let by_symbol: HashMap<String, KGNode> = inserted
        .iter()
        .map(|node| (node.symbol.clone(), node.clone()))
        .collect();
    let mut edges = Vec::new();
    for deferred in &analysis.deferred_edges {
        let child = &by_symbol[&deferred.symbol];
        let parent = &by_symbol[&deferred.parent_symbol];
        edges.push((
            child.id,
            parent.id,
            KGEdge::forward(deferred.kind, child.file_name.clone(), parent.file_name.clone()),
        ));
    }
    let mirrors: Vec<_> = edges
        .iter()
        .map(|(a, b, attrs)| (*b, *a, attrs.mirrored()))
        .collect();
    graph.add_edges(edges);
    graph.add_edges(mirrors);

    (graph, inserted, analysis.contents)
}

fn hit(node: &KGNode, score: f32) -> (SearchRow, f32) {
    (
        SearchRow {
            id: node.id.0 as i32,
            file: Some(node.file_name.clone()),
            text: None,
            node_id: node.id.0 as i64,
            graph_id: "1".to_string(),
        },
        score,
    )
}

#[test]
fn test_single_function_ingest() {
    let (graph, nodes, contents) =
        build_graph(&[("a.py", "def foo(x):\n    return x+1\n")]);

    assert_eq!(graph.node_count(), 2);
    assert_eq!(nodes[0].symbol, "a");
    assert_eq!(nodes[0].kind, KGNodeKind::File);
    assert_eq!(nodes[1].symbol, "a.foo");
    assert_eq!(nodes[1].kind, KGNodeKind::Function);
    assert_eq!(contents[1], "# a.py\n# a.foo\ndef foo(x):\n    return x+1");

    // One function_def edge plus its mirror.
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.has_edge_between(nodes[1].id, nodes[0].id, EdgeKind::FunctionDef));
    assert!(graph.has_edge_between(nodes[0].id, nodes[1].id, EdgeKind::FunctionDef));
}

#[test]
fn test_every_edge_has_a_mirror() {
    let (graph, _, _) = build_graph(&[
        ("a.py", "class C:\n    def m(self):\n        pass\n"),
        ("b.py", "def standalone():\n    pass\n"),
    ]);

    for (source, target, attrs) in graph.edges() {
        let mirrored = graph.edges_from(target).any(|(t, twin)| {
            t == source
                && twin.kind == attrs.kind
                && twin.reverse != attrs.reverse
                && twin.src_file == attrs.target_file
                && twin.target_file == attrs.src_file
        });
        assert!(mirrored, "edge {source:?}->{target:?} lacks a mirror");
    }
}

#[test]
fn test_class_nodes_have_exactly_one_parent_def_edge() {
    let (graph, _, _) = build_graph(&[(
        "a.py",
        "class C:\n    def m(self):\n        pass\n\ndef free():\n    pass\n",
    )]);

    for node in graph.nodes() {
        if matches!(node.kind, KGNodeKind::Class | KGNodeKind::Function) {
            let def_edges = graph
                .edges_from(node.id)
                .filter(|(_, e)| {
                    matches!(e.kind, EdgeKind::ClassDef | EdgeKind::FunctionDef) && !e.reverse
                })
                .count();
            assert_eq!(def_edges, 1, "node {} should have one def edge", node.symbol);
        }
    }
}

#[test]
fn test_ingest_then_save_load_round_trip() {
    let (graph, nodes, _) = build_graph(&[(
        "pkg/mod.py",
        "class C:\n    def m(self):\n        pass\n",
    )]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.json");
    graph.save(&path).unwrap();
    let loaded = KnowledgeGraph::load(&path).unwrap();

    assert_eq!(loaded.node_count(), graph.node_count());
    assert_eq!(loaded.edge_count(), graph.edge_count());
    for node in &nodes {
        let restored = loaded.node(node.id).unwrap();
        assert_eq!(restored.symbol, node.symbol);
        assert_eq!(restored.line, node.line);
        assert_eq!(restored.end_line, node.end_line);
    }
}

#[test]
fn test_test_bias_end_to_end() {
    // Two real files plus the call edge scenario: the test calls the
    // source function.
    let (mut graph, nodes, _) = build_graph(&[
        ("src.py", "def foo(x):\n    return x+1\n"),
        ("tests/test_foo.py", "def test_foo():\n    assert foo(1) == 2\n"),
    ]);

    let src = nodes.iter().find(|n| n.symbol == "src.foo").unwrap().clone();
    let test = nodes
        .iter()
        .find(|n| n.symbol == "tests.test_foo.test_foo")
        .unwrap()
        .clone();

    let call = KGEdge::forward(EdgeKind::Call, test.file_name.clone(), src.file_name.clone());
    graph.add_edge(test.id, src.id, call.clone());
    graph.add_edge(src.id, test.id, call.mirrored());

    let hits = vec![hit(&src, 1.0), hit(&test, 1.0)];

    let ranked = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 50);
    assert_eq!(ranked[0].0.symbol, "src.foo", "source ranks first by default");

    let ranked = rank_hits(&graph, &hits, &[], &HashMap::new(), true, 50);
    assert_eq!(
        ranked[0].0.id, test.id,
        "test node ranks first with only_tests"
    );
}

#[test]
fn test_overlay_delete_filters_results() {
    let (graph, nodes, _) = build_graph(&[("a.py", "def foo(x):\n    return x+1\n")]);
    let func = nodes.iter().find(|n| n.symbol == "a.foo").unwrap();

    let hits = vec![hit(func, 1.0)];
    let mut overlay: HashMap<String, Option<String>> = HashMap::new();
    overlay.insert("a.py".to_string(), None);

    let ranked = rank_hits(&graph, &hits, &[], &overlay, false, 50);
    assert!(ranked.is_empty());
}

#[test]
fn test_scores_are_descending() {
    let (graph, nodes, _) = build_graph(&[(
        "m.py",
        "def a():\n    pass\n\ndef b():\n    pass\n\ndef c():\n    pass\n",
    )]);
    let hits: Vec<_> = nodes
        .iter()
        .filter(|n| n.kind == KGNodeKind::Function)
        .enumerate()
        .map(|(i, n)| hit(n, 1.0 - i as f32 * 0.1))
        .collect();

    let ranked = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 50);
    for pair in ranked.windows(2) {
        assert!(pair[0].1 >= pair[1].1);
    }
}

#[test]
fn test_retrieval_is_deterministic() {
    let (graph, nodes, _) = build_graph(&[
        ("src.py", "def foo(x):\n    return x+1\n"),
        ("lib.py", "class Helper:\n    def run(self):\n        pass\n"),
    ]);
    let hits: Vec<_> = nodes
        .iter()
        .filter(|n| n.kind != KGNodeKind::File)
        .map(|n| hit(n, 0.7))
        .collect();

    let first = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 50);
    let second = rank_hits(&graph, &hits, &[], &HashMap::new(), false, 50);
    let ids = |out: &[(KGNode, f64)]| out.iter().map(|(n, _)| n.id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
}

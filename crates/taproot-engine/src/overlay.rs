//! Overlay manager: uncommitted edits applied for the lifetime of one query
//!
//! Overlay files are parsed and inserted through the query's own transaction
//! so the hybrid search can see them, and never committed. Deleted files
//! (content `None`) are skipped here and filtered out of the final ranking.

use anyhow::Result;
use sqlx::PgConnection;
use std::collections::{BTreeMap, HashMap};
use taproot_analyzer::analyze_files;
use taproot_core::{KGEdge, KnowledgeGraph, NodeId};
use taproot_index::{SearchAction, SearchStore};
use tokio_util::sync::CancellationToken;

/// Parse the overlay set and graft its nodes, rows, and edges onto the
/// graph. Returns the inserted node ids so the caller can strip them out
/// again when the query finishes.
pub async fn apply_overlay(
    graph: &mut KnowledgeGraph,
    store: &SearchStore,
    graph_id: &str,
    overlay_files: &HashMap<String, Option<String>>,
    conn: &mut PgConnection,
    cancel: &CancellationToken,
) -> Result<Vec<NodeId>> {
    let live_files: BTreeMap<String, String> = overlay_files
        .iter()
        .filter_map(|(name, content)| content.as_ref().map(|c| (name.clone(), c.clone())))
        .collect();
    if live_files.is_empty() {
        return Ok(Vec::new());
    }

    let analysis = analyze_files(&live_files);

    let mut inserted = Vec::with_capacity(analysis.nodes.len());
    for draft in analysis.nodes {
        inserted.push(graph.add_node(
            draft.kind,
            draft.symbol,
            draft.file_name,
            draft.line,
            draft.end_line,
        ));
    }

    let actions = inserted
        .iter()
        .zip(&analysis.contents)
        .map(|(node, content)| SearchAction::Create {
            file: node.file_name.clone(),
            content: content.clone(),
            node_id: node.id.0 as i64,
        })
        .collect();
    store
        .bulk_action(graph_id, actions, None, conn, cancel)
        .await?;

    // Resolve deferred edges against the overlay's own nodes. A symbol that
    // also exists outside the overlay resolves to the overlay node for the
    // duration of this query.
    let by_symbol: HashMap<&str, usize> = inserted
        .iter()
        .enumerate()
        .map(|(i, node)| (node.symbol.as_str(), i))
        .collect();

    let mut edges = Vec::new();
    for deferred in &analysis.deferred_edges {
        let (Some(&child), Some(&parent)) = (
            by_symbol.get(deferred.symbol.as_str()),
            by_symbol.get(deferred.parent_symbol.as_str()),
        ) else {
            tracing::warn!("overlay edge references unknown symbol {}", deferred.symbol);
            continue;
        };
        let child = &inserted[child];
        let parent = &inserted[parent];
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

    Ok(inserted.into_iter().map(|node| node.id).collect())
}

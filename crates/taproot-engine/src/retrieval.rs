//! Retrieval engine: hybrid search blended with graph propagation
//!
//! A query runs in its own database transaction. Overlay files are parsed
//! and inserted inside that transaction so the hybrid search sees them, two
//! personalized PageRank passes (forward and reverse) run over the
//! multigraph, and the transaction is rolled back before results return, so
//! nothing a query does is visible to anyone else.

use crate::overlay;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use taproot_core::{
    Config, FailedToConverge, KGEdge, KGNode, KnowledgeGraph, NodeId, PageRankConfig, pagerank,
};
use taproot_index::{RerankClient, RerankDoc, RerankResult, SearchAction, SearchRow, SearchStore};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Caller-overridable retrieval weights.
#[derive(Debug, Clone)]
pub struct RetrieverTuning {
    pub graph_top: usize,
    pub search_top: i64,
    pub rerank_top: usize,
    pub bm25_weight: f64,
    pub vector_weight: f64,
}

impl Default for RetrieverTuning {
    fn default() -> Self {
        RetrieverTuning {
            graph_top: 50,
            search_top: 150,
            rerank_top: 100,
            bm25_weight: 0.5,
            vector_weight: 0.5,
        }
    }
}

/// One feature's knowledge graph plus the search index handle.
pub struct Retriever {
    feature_id: i64,
    graph_path: PathBuf,
    pub tuning: RetrieverTuning,
    graph: RwLock<KnowledgeGraph>,
    store: Arc<SearchStore>,
}

impl Retriever {
    /// Bind a feature id, loading its persisted graph when one exists.
    pub fn open(feature_id: i64, config: &Config, store: Arc<SearchStore>) -> Result<Self> {
        let graph_path = config.graph_path(feature_id);
        let graph = if graph_path.is_file() {
            KnowledgeGraph::load(&graph_path)
                .with_context(|| format!("loading {}", graph_path.display()))?
        } else {
            KnowledgeGraph::new()
        };
        Ok(Retriever {
            feature_id,
            graph_path,
            tuning: RetrieverTuning::default(),
            graph: RwLock::new(graph),
            store,
        })
    }

    pub fn feature_id(&self) -> i64 {
        self.feature_id
    }

    /// Key for this feature's rows in the multi-tenant search index.
    pub fn graph_id(&self) -> String {
        self.feature_id.to_string()
    }

    pub fn store(&self) -> &Arc<SearchStore> {
        &self.store
    }

    pub async fn node_count(&self) -> usize {
        self.graph.read().await.node_count()
    }

    /// Persist the graph to `<GRAPH_ROOT>/<feature_id>/graph.json`.
    pub async fn save(&self) -> Result<()> {
        let graph = self.graph.read().await;
        graph.save(&self.graph_path)
    }

    /// Insert draft nodes into the graph and their contents into the search
    /// index, under the caller's connection. Returns the nodes with assigned
    /// ids, in input order.
    pub async fn bulk_insert(
        &self,
        nodes: Vec<KGNode>,
        contents: Vec<String>,
        progress_cb: Option<&mut (dyn FnMut(f32) + Send)>,
        conn: &mut sqlx::PgConnection,
        cancel: &CancellationToken,
    ) -> Result<Vec<KGNode>> {
        let mut graph = self.graph.write().await;
        self.insert_locked(&mut graph, nodes, contents, progress_cb, conn, cancel)
            .await
    }

    pub(crate) async fn insert_locked(
        &self,
        graph: &mut KnowledgeGraph,
        nodes: Vec<KGNode>,
        contents: Vec<String>,
        progress_cb: Option<&mut (dyn FnMut(f32) + Send)>,
        conn: &mut sqlx::PgConnection,
        cancel: &CancellationToken,
    ) -> Result<Vec<KGNode>> {
        let mut inserted = Vec::with_capacity(nodes.len());
        for (i, draft) in nodes.into_iter().enumerate() {
            // Bulk graphs run to hundreds of thousands of nodes; stay fair to
            // the rest of the runtime.
            if i % 1000 == 0 {
                tokio::task::yield_now().await;
            }
            inserted.push(graph.add_node(
                draft.kind,
                draft.symbol,
                draft.file_name,
                draft.line,
                draft.end_line,
            ));
        }
        tracing::debug!("added {} nodes to graph", inserted.len());

        let actions = inserted
            .iter()
            .zip(&contents)
            .map(|(node, content)| SearchAction::Create {
                file: node.file_name.clone(),
                content: content.clone(),
                node_id: node.id.0 as i64,
            })
            .collect();
        self.store
            .bulk_action(&self.graph_id(), actions, progress_cb, conn, cancel)
            .await?;
        tracing::debug!("added {} rows to search index", inserted.len());

        Ok(inserted)
    }

    /// Add forward edges together with their mirrored reverse twins.
    pub async fn add_mirrored_edges(&self, edges: Vec<(NodeId, NodeId, KGEdge)>) {
        let mut graph = self.graph.write().await;
        let mirrors: Vec<_> = edges
            .iter()
            .map(|(a, b, attrs)| (*b, *a, attrs.mirrored()))
            .collect();
        graph.add_edges(edges);
        graph.add_edges(mirrors);
    }

    /// Drop the persisted graph file, if any. Used when an ingest aborts.
    pub fn remove_graph_file(&self) {
        if self.graph_path.is_file() {
            if let Err(e) = std::fs::remove_file(&self.graph_path) {
                tracing::warn!("could not remove {}: {}", self.graph_path.display(), e);
            }
        }
    }

    /// Remove every node (and search row) belonging to the given files.
    pub async fn invalidate(&self, file_names: &[String]) -> Result<()> {
        let mut graph = self.graph.write().await;
        let mut ids_by_file: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for node in graph.nodes() {
            ids_by_file
                .entry(node.file_name.as_str())
                .or_default()
                .push(node.id);
        }

        let mut doomed: Vec<NodeId> = Vec::new();
        for file_name in file_names {
            if let Some(ids) = ids_by_file.remove(file_name.as_str()) {
                doomed.extend(ids);
            }
        }
        drop(ids_by_file);

        for id in &doomed {
            graph.remove_node(*id);
        }

        let mut conn = self.store.pool().acquire().await?;
        let actions = doomed
            .iter()
            .map(|id| SearchAction::Delete { node_id: id.0 as i64 })
            .collect();
        self.store
            .bulk_action(&self.graph_id(), actions, None, &mut *conn, &CancellationToken::new())
            .await
    }

    /// Delete all data for this feature: search rows and the persisted JSON.
    pub async fn delete(&self) -> Result<()> {
        let removed = self.store.delete_graph(&self.graph_id()).await?;
        tracing::info!("deleted {} rows for feature {}", removed, self.feature_id);
        if self.graph_path.is_file() {
            std::fs::remove_file(&self.graph_path)
                .with_context(|| format!("removing {}", self.graph_path.display()))?;
        }
        Ok(())
    }

    /// Search the graph for nodes matching the query, most relevant first.
    pub async fn search(
        &self,
        query: &str,
        seed_nodes: &[KGNode],
        overlay_files: &HashMap<String, Option<String>>,
        only_tests: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<(KGNode, f64)>> {
        let mut tx = self.store.begin().await?;
        let has_overlay = overlay_files.values().any(|content| content.is_some());

        let out = if has_overlay {
            // Overlay mutates the graph for the duration of the query, so the
            // whole query holds the write lock.
            let mut graph = self.graph.write().await;
            let overlay_ids = overlay::apply_overlay(
                &mut graph,
                &self.store,
                &self.graph_id(),
                overlay_files,
                &mut *tx,
                cancel,
            )
            .await?;

            let hits = self
                .store
                .search(
                    &self.graph_id(),
                    query,
                    self.tuning.search_top,
                    self.tuning.bm25_weight,
                    self.tuning.vector_weight,
                    &mut *tx,
                    cancel,
                )
                .await?;

            let out = rank_hits(
                &graph,
                &hits,
                seed_nodes,
                overlay_files,
                only_tests,
                self.tuning.graph_top,
            );

            // Overlay nodes live only as long as their query.
            for id in overlay_ids {
                graph.remove_node(id);
            }
            out
        } else {
            let hits = self
                .store
                .search(
                    &self.graph_id(),
                    query,
                    self.tuning.search_top,
                    self.tuning.bm25_weight,
                    self.tuning.vector_weight,
                    &mut *tx,
                    cancel,
                )
                .await?;

            let graph = self.graph.read().await;
            rank_hits(
                &graph,
                &hits,
                seed_nodes,
                overlay_files,
                only_tests,
                self.tuning.graph_top,
            )
        };

        // Nothing a query writes may outlive it.
        tx.rollback().await.context("rolling back query transaction")?;
        Ok(out)
    }

    /// Reorder search rows through the rerank sidecar.
    pub async fn rerank_docs(
        &self,
        client: &RerankClient,
        query: &str,
        docs: &[SearchRow],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        let docs: Vec<RerankDoc> = docs
            .iter()
            .map(|row| RerankDoc {
                id: row.id as i64,
                text: row.text.clone().unwrap_or_default(),
                file: row.file.clone().unwrap_or_default(),
            })
            .collect();
        client.rerank(query, &docs, top_n).await
    }
}

/// A path names a test when its first `_`-separated component contains
/// "test", so `tests/test_foo.py` and `testutil.py` qualify while
/// `docs/latest_tests.py` does not.
pub fn is_test_file(file_name: &str) -> bool {
    file_name.split('_').next().unwrap_or("").contains("test")
}

/// Edge weight for one traversal pass.
///
/// Rank flows along call-like edges whose effective direction matches the
/// pass; edges into test files are pinned up or down by the test policy.
pub fn edge_weight(edge: &KGEdge, only_tests: bool, reverse: bool) -> f64 {
    if is_test_file(&edge.target_file) {
        return if only_tests { 1.0 } else { 0.10 };
    }

    if only_tests {
        0.01
    } else if (reverse ^ edge.reverse) && edge.kind.propagates() {
        1.0
    } else {
        0.01
    }
}

/// Blend search hits and seeds into a personalization vector, run both
/// PageRank passes, and pick the top nodes. Falls back to the raw
/// personalization scores when the iteration does not converge.
pub fn rank_hits(
    graph: &KnowledgeGraph,
    hits: &[(SearchRow, f32)],
    seed_nodes: &[KGNode],
    overlay_files: &HashMap<String, Option<String>>,
    only_tests: bool,
    graph_top: usize,
) -> Vec<(KGNode, f64)> {
    rank_hits_with_config(
        graph,
        hits,
        seed_nodes,
        overlay_files,
        only_tests,
        graph_top,
        &PageRankConfig::default(),
    )
}

pub fn rank_hits_with_config(
    graph: &KnowledgeGraph,
    hits: &[(SearchRow, f32)],
    seed_nodes: &[KGNode],
    overlay_files: &HashMap<String, Option<String>>,
    only_tests: bool,
    graph_top: usize,
    pr_config: &PageRankConfig,
) -> Vec<(KGNode, f64)> {
    let mut personalization: HashMap<usize, f64> = hits
        .iter()
        .map(|(row, score)| (row.node_id as usize, *score as f64))
        .collect();

    if !seed_nodes.is_empty() {
        // Seeds weigh as much as the strongest search hit.
        let ceiling = personalization
            .values()
            .fold(0.0_f64, |acc, &v| acc.max(v));
        for seed in seed_nodes {
            personalization.insert(seed.id.0, ceiling);
        }
    }

    let merged = match two_pass_pagerank(graph, &personalization, only_tests, pr_config) {
        Ok(merged) => merged,
        Err(FailedToConverge(iterations)) => {
            tracing::warn!(
                "failed to converge in graph traversal after {} iterations, returning raw search results",
                iterations
            );
            personalization.clone()
        }
    };

    let mut scored: Vec<(usize, f64)> = merged.into_iter().collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    scored
        .into_iter()
        .take(graph_top)
        .filter_map(|(id, score)| graph.node(NodeId(id)).map(|n| (n.clone(), score)))
        .filter(|(node, _)| !matches!(overlay_files.get(&node.file_name), Some(None)))
        // A tests-only query answers with test locations or nothing.
        .filter(|(node, _)| !only_tests || is_test_file(&node.file_name))
        .collect()
}

fn two_pass_pagerank(
    graph: &KnowledgeGraph,
    personalization: &HashMap<usize, f64>,
    only_tests: bool,
    config: &PageRankConfig,
) -> Result<HashMap<usize, f64>, FailedToConverge> {
    let mut merged: HashMap<usize, f64> = HashMap::new();

    // Forward pass: x calls y.
    let forward = pagerank(
        graph,
        |e| edge_weight(e, only_tests, false),
        personalization,
        config,
    )?;
    for (node, weight) in forward {
        *merged.entry(node).or_insert(0.0) += weight;
    }

    // Reverse pass: y is called by x.
    let backward = pagerank(
        graph,
        |e| edge_weight(e, only_tests, true),
        personalization,
        config,
    )?;
    for (node, weight) in backward {
        *merged.entry(node).or_insert(0.0) += weight;
    }

    Ok(merged)
}

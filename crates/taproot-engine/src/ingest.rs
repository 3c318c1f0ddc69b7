//! Ingestion pipeline: repository files to a persisted, searchable graph
//!
//! The whole ingest is one database transaction. Progress streams out as
//! `(step, status, progress)` events; a failure rolls the transaction back
//! and removes any partially written graph file.

use crate::retrieval::Retriever;
use anyhow::{Context, Result, anyhow};
use futures_util::Stream;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use taproot_analyzer::Analyzer;
use taproot_core::{KGEdge, KGNode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Distinguished error for a cancelled unit of work.
#[derive(Debug, Error)]
#[error("cancelled")]
pub struct Cancelled;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IngestStep {
    #[serde(rename = "Analyzing code")]
    Analyze,
    #[serde(rename = "Building code graph")]
    BuildGraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    InProgress,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestEvent {
    pub step: IngestStep,
    pub status: IngestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f32>,
}

impl IngestEvent {
    fn new(step: IngestStep, status: IngestStatus, progress: Option<f32>) -> Self {
        IngestEvent { step, status, progress }
    }
}

/// Ingest a file set into the feature's graph, streaming progress events.
/// The returned stream ends when ingestion has committed or failed.
pub fn ingest(
    retriever: Arc<Retriever>,
    analyzer: Analyzer,
    files: BTreeMap<String, String>,
    cancel: CancellationToken,
) -> impl Stream<Item = IngestEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(e) = run_ingest(retriever, analyzer, files, cancel, tx).await {
            tracing::error!("ingest failed: {:#}", e);
        }
    });

    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (event, rx))
    })
}

async fn run_ingest(
    retriever: Arc<Retriever>,
    analyzer: Analyzer,
    files: BTreeMap<String, String>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<IngestEvent>,
) -> Result<()> {
    let send = |event: IngestEvent| {
        let _ = events.send(event);
    };

    send(IngestEvent::new(IngestStep::Analyze, IngestStatus::InProgress, None));
    let analysis = match analyzer.analyze(files).await {
        Ok(analysis) if !cancel.is_cancelled() => analysis,
        Ok(_) => {
            send(IngestEvent::new(IngestStep::Analyze, IngestStatus::Error, None));
            return Err(anyhow!(Cancelled));
        }
        Err(e) => {
            send(IngestEvent::new(IngestStep::Analyze, IngestStatus::Error, None));
            return Err(e.context("analyzing code"));
        }
    };
    send(IngestEvent::new(IngestStep::Analyze, IngestStatus::Completed, None));

    tracing::debug!("inserting {} nodes", analysis.nodes.len());
    send(IngestEvent::new(
        IngestStep::BuildGraph,
        IngestStatus::InProgress,
        Some(0.0),
    ));

    let mut tx = retriever.store().begin().await?;

    let progress_events = events.clone();
    let mut progress_cb = move |progress: f32| {
        let _ = progress_events.send(IngestEvent::new(
            IngestStep::BuildGraph,
            IngestStatus::InProgress,
            Some(progress),
        ));
    };

    let result = build_graph(
        &retriever,
        analysis.nodes,
        analysis.contents,
        &analysis.deferred_edges,
        &mut progress_cb,
        &mut tx,
        &cancel,
    )
    .await;

    match result {
        Ok(()) => {
            tx.commit().await.context("committing ingest")?;
            send(IngestEvent::new(
                IngestStep::BuildGraph,
                IngestStatus::Completed,
                Some(1.0),
            ));
            Ok(())
        }
        Err(e) => {
            // Roll back the cursor and drop the half-written graph file; the
            // next ingest starts clean.
            tx.rollback().await.ok();
            retriever.remove_graph_file();
            send(IngestEvent::new(IngestStep::BuildGraph, IngestStatus::Error, None));
            Err(e)
        }
    }
}

async fn build_graph(
    retriever: &Retriever,
    nodes: Vec<KGNode>,
    contents: Vec<String>,
    deferred_edges: &[taproot_analyzer::DeferredEdge],
    progress_cb: &mut (dyn FnMut(f32) + Send),
    tx: &mut sqlx::Transaction<'static, sqlx::Postgres>,
    cancel: &CancellationToken,
) -> Result<()> {
    let inserted = retriever
        .bulk_insert(nodes, contents, Some(progress_cb), &mut *tx, cancel)
        .await?;
    tracing::debug!("inserted nodes");

    if cancel.is_cancelled() {
        return Err(anyhow!(Cancelled));
    }

    // Deferred edges resolve by symbol now that every node has an id.
    let by_symbol: HashMap<&str, &KGNode> =
        inserted.iter().map(|node| (node.symbol.as_str(), node)).collect();

    let mut edges = Vec::with_capacity(deferred_edges.len());
    for deferred in deferred_edges {
        let (Some(child), Some(parent)) = (
            by_symbol.get(deferred.symbol.as_str()),
            by_symbol.get(deferred.parent_symbol.as_str()),
        ) else {
            tracing::warn!("deferred edge references unknown symbol {}", deferred.symbol);
            continue;
        };
        edges.push((
            child.id,
            parent.id,
            KGEdge::forward(deferred.kind, child.file_name.clone(), parent.file_name.clone()),
        ));
    }

    retriever.add_mirrored_edges(edges).await;
    tracing::debug!("inserted {} edges", deferred_edges.len());

    retriever.save().await.context("saving graph")?;
    Ok(())
}

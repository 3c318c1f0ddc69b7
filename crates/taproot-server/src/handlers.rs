//! REST handlers: SSE ingestion, graph deletion, healthcheck

use crate::ServerState;
use axum::{
    Json,
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use taproot_engine::{
    IngestEvent, IngestStatus, IngestStep, Retriever, block_globs_for, build_blockset,
    filter_files, ingest, read_repo_files,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
pub struct IngestParams {
    pub feature_id: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

/// `POST /api/codegraph?feature_id=<int>`: ingest the feature's repository,
/// streaming progress events until the graph has committed.
pub async fn ingest_codegraph(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<IngestParams>,
) -> Sse<EventStream> {
    let stream: EventStream = match prepare_ingest(Arc::clone(&state), params.feature_id).await {
        Ok(events) => Box::pin(events.map(|event| Ok(to_sse_event(&event)))),
        Err(e) => {
            tracing::error!("ingest setup failed for feature {}: {:#}", params.feature_id, e);
            let event = IngestEvent {
                step: IngestStep::Analyze,
                status: IngestStatus::Error,
                progress: None,
            };
            Box::pin(futures_util::stream::once(async move { Ok(to_sse_event(&event)) }))
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn prepare_ingest(
    state: Arc<ServerState>,
    feature_id: i64,
) -> anyhow::Result<impl Stream<Item = IngestEvent> + Send> {
    let repo = state.repos.fetch(feature_id).await?;
    let files = read_repo_files(&repo)?;
    let blockset = build_blockset(&block_globs_for(&files))?;
    let files = filter_files(files, &blockset);
    tracing::info!("ingesting {} files for feature {}", files.len(), feature_id);

    let retriever = Arc::new(Retriever::open(
        feature_id,
        &state.config,
        Arc::clone(&state.store),
    )?);
    Ok(ingest(
        retriever,
        state.analyzer.clone(),
        files,
        CancellationToken::new(),
    ))
}

fn to_sse_event(event: &IngestEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(body) => Event::default().data(body),
        Err(e) => {
            tracing::error!("failed to serialize ingest event: {}", e);
            Event::default().data("{}")
        }
    }
}

/// `DELETE /api/codegraph/{feature_id}`: drop the feature's rows and its
/// persisted graph file.
pub async fn delete_codegraph(
    State(state): State<Arc<ServerState>>,
    Path(feature_id): Path<i64>,
) -> Json<StatusResponse> {
    match Retriever::open(feature_id, &state.config, Arc::clone(&state.store)) {
        Ok(retriever) => {
            if let Err(e) = retriever.delete().await {
                tracing::error!("failed to delete code graph: {:#}", e);
            }
        }
        Err(e) => {
            tracing::error!("failed to open feature {}: {:#}", feature_id, e);
        }
    }
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

pub async fn health_check() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

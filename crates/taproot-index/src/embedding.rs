//! Embedding adapter: batched, bounded, retried, order-preserving
//!
//! Texts are packed greedily into batches under an aggregate character
//! budget, dispatched with at most six batches in flight, and delivered in
//! input order via `FuturesOrdered` even when batches complete out of order.
//! When no credentials are configured every input yields `None` and the
//! backend is never called.

use futures_util::future::Either;
use futures_util::stream::{self, FuturesOrdered, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use taproot_core::Config;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Aggregate characters per batch. The backend takes ~20k tokens per call;
/// two chars per token is the worst case we plan for.
const BATCH_CHAR_BUDGET: usize = 20_000;
const MAX_INFLIGHT_BATCHES: usize = 6;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding backend returned {got} vectors for {want} texts")]
    ShapeMismatch { want: usize, got: usize },
    #[error("embedding retries exceeded")]
    RetriesExceeded,
    #[error("cancelled")]
    Cancelled,
}

/// Task type hint forwarded to the embedding backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    RetrievalDocument,
    RetrievalQuery,
}

impl InputType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            InputType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    input_type: &'static str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct Embedder {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    enabled: bool,
    semaphore: Arc<Semaphore>,
}

impl Embedder {
    pub fn from_config(config: &Config) -> Self {
        let enabled = config.embeddings_enabled();
        let token = if enabled {
            config
                .embedding_credentials
                .as_ref()
                .and_then(|path| std::fs::read_to_string(path).ok())
                .map(|s| s.trim().to_string())
        } else {
            None
        };
        if !enabled {
            tracing::warn!("embeddings disabled");
        }
        Embedder {
            client: reqwest::Client::new(),
            url: config.embedding_url.clone(),
            token,
            enabled,
            semaphore: Arc::new(Semaphore::new(MAX_INFLIGHT_BATCHES)),
        }
    }

    /// An adapter that yields `None` for everything, for environments with
    /// no embedding backend.
    pub fn disabled() -> Self {
        Embedder {
            client: reqwest::Client::new(),
            url: String::new(),
            token: None,
            enabled: false,
            semaphore: Arc::new(Semaphore::new(MAX_INFLIGHT_BATCHES)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Embed `texts`, yielding exactly one item per input, in input order.
    /// Empty strings yield `None` without touching the backend.
    pub fn embed(
        &self,
        texts: Vec<String>,
        input_type: InputType,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Result<Option<Vec<f32>>, EmbeddingError>> + '_ {
        if !self.enabled {
            return Either::Left(stream::iter(texts.into_iter().map(|_| Ok(None))));
        }

        let mut futures = FuturesOrdered::new();
        for batch in pack_batches(texts) {
            futures.push_back(self.embed_batch(batch, input_type, cancel.clone()));
        }

        Either::Right(futures.flat_map(|result| match result {
            Ok(values) => stream::iter(values.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(e) => stream::iter(vec![Err(e)]),
        }))
    }

    /// Convenience for single-text callers like query embedding.
    pub async fn embed_one(
        &self,
        text: String,
        input_type: InputType,
        cancel: CancellationToken,
    ) -> Result<Option<Vec<f32>>, EmbeddingError> {
        let mut stream = std::pin::pin!(self.embed(vec![text], input_type, cancel));
        stream.next().await.unwrap_or(Ok(None))
    }

    async fn embed_batch(
        &self,
        batch: Vec<String>,
        input_type: InputType,
        cancel: CancellationToken,
    ) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let nonempty: Vec<String> = batch.iter().filter(|t| !t.is_empty()).cloned().collect();
        if nonempty.is_empty() {
            return Ok(vec![None; batch.len()]);
        }

        for retry in 1..=MAX_RETRIES {
            let permit = self
                .semaphore
                .acquire()
                .await
                .map_err(|_| EmbeddingError::Cancelled)?;
            let outcome = self.request(&nonempty, input_type).await;
            drop(permit);

            match outcome {
                Ok(mut embeddings) => {
                    if embeddings.len() != nonempty.len() {
                        return Err(EmbeddingError::ShapeMismatch {
                            want: nonempty.len(),
                            got: embeddings.len(),
                        });
                    }
                    let mut out = Vec::with_capacity(batch.len());
                    let mut it = embeddings.drain(..);
                    for text in &batch {
                        if text.is_empty() {
                            out.push(None);
                        } else {
                            out.push(it.next());
                        }
                    }
                    return Ok(out);
                }
                Err(Retryable::Transient(status)) => {
                    tracing::warn!("{} from embedding backend, backing off", status);
                    let backoff = Duration::from_secs(5u64.pow(retry) + fastrand::u64(0..=30));
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(EmbeddingError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                Err(Retryable::Fatal(e)) => return Err(e),
            }
        }
        Err(EmbeddingError::RetriesExceeded)
    }

    async fn request(
        &self,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, Retryable> {
        let mut request = self.client.post(&self.url).json(&EmbedRequest {
            texts,
            input_type: input_type.as_str(),
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Retryable::Fatal(e.into()))?;
        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(Retryable::Transient(status.as_u16()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| Retryable::Fatal(e.into()))?;
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Retryable::Fatal(e.into()))?;
        Ok(body.embeddings)
    }
}

enum Retryable {
    Transient(u16),
    Fatal(EmbeddingError),
}

/// Greedy packing: a text always joins the current batch; once the batch
/// crosses the character budget the next text starts a new one.
pub(crate) fn pack_batches(texts: Vec<String>) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = vec![Vec::new()];
    let mut chars = 0usize;
    for text in texts {
        chars += text.len();
        batches.last_mut().expect("non-empty").push(text);
        if chars > BATCH_CHAR_BUDGET {
            batches.push(Vec::new());
            chars = 0;
        }
    }
    batches.retain(|b| !b.is_empty());
    batches
}

//! Reranker client
//!
//! Posts search hits to the rerank sidecar for finer ordering. Failures
//! surface as errors; callers that can live without reranking simply skip
//! the call.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct RerankDoc {
    pub id: i64,
    pub text: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RerankResult {
    pub id: i64,
    pub score: f32,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    top_n: usize,
    docs: Vec<WireDoc<'a>>,
}

#[derive(Serialize)]
struct WireDoc<'a> {
    id: i64,
    text: &'a str,
    meta: WireMeta<'a>,
}

#[derive(Serialize)]
struct WireMeta<'a> {
    file: &'a str,
}

#[derive(Deserialize)]
struct RerankResponse {
    reranked_docs: Vec<RerankResult>,
}

pub struct RerankClient {
    client: reqwest::Client,
    url: String,
}

impl RerankClient {
    pub fn new(url: impl Into<String>) -> Self {
        RerankClient {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn rerank(
        &self,
        query: &str,
        docs: &[RerankDoc],
        top_n: usize,
    ) -> Result<Vec<RerankResult>> {
        let request = RerankRequest {
            query,
            top_n,
            docs: docs
                .iter()
                .map(|doc| WireDoc {
                    id: doc.id,
                    text: &doc.text,
                    meta: WireMeta { file: &doc.file },
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("sending rerank request")?
            .error_for_status()
            .context("rerank request rejected")?;
        let body: RerankResponse = response.json().await.context("decoding rerank response")?;
        Ok(body.reranked_docs)
    }
}

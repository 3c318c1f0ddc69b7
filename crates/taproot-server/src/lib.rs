//! Taproot Server — HTTP surface for ingestion and graph lifecycle

pub mod handlers;
pub mod router;

use anyhow::Result;
use std::sync::Arc;
use taproot_analyzer::Analyzer;
use taproot_core::Config;
use taproot_engine::RepoProvider;
use taproot_index::SearchStore;

/// Shared state for all request handlers.
pub struct ServerState {
    pub config: Config,
    pub store: Arc<SearchStore>,
    pub analyzer: Analyzer,
    pub repos: Arc<dyn RepoProvider>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub struct TaprootServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl TaprootServer {
    pub fn new(state: ServerState, config: ServerConfig) -> Self {
        TaprootServer {
            state: Arc::new(state),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    pub async fn start(self) -> Result<()> {
        let router = router::create_router(self.state);
        let addr = format!("{}:{}", self.config.host, self.config.port);
        tracing::info!("listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }
}

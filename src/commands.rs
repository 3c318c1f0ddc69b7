//! CLI command implementations

use anyhow::Result;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use taproot_analyzer::{Analyzer, create_parser_pool};
use taproot_core::Config;
use taproot_engine::{
    LocalRepoProvider, Retriever, block_globs_for, build_blockset, filter_files, read_repo_files,
};
use taproot_index::{Embedder, RerankClient, SearchStore};
use taproot_server::{ServerConfig, ServerState, TaprootServer};
use tokio_util::sync::CancellationToken;

async fn open_store(config: &Config) -> Result<Arc<SearchStore>> {
    let embedder = Arc::new(Embedder::from_config(config));
    let store = SearchStore::connect(&config.codesearch_dsn, embedder).await?;
    store.ensure_schema().await?;
    Ok(Arc::new(store))
}

pub async fn serve(host: String, port: u16, repo_root: PathBuf) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;

    let state = ServerState {
        config,
        store,
        analyzer: Analyzer::new(create_parser_pool()),
        repos: Arc::new(LocalRepoProvider::new(repo_root)),
    };
    let server = TaprootServer::new(state, ServerConfig { host, port });
    server.start().await
}

pub async fn ingest(feature_id: i64, path: PathBuf) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;

    let files = read_repo_files(&path)?;
    let blockset = build_blockset(&block_globs_for(&files))?;
    let files = filter_files(files, &blockset);
    tracing::info!("ingesting {} files", files.len());

    let retriever = Arc::new(Retriever::open(feature_id, &config, store)?);
    let analyzer = Analyzer::new(create_parser_pool());
    let mut events = std::pin::pin!(taproot_engine::ingest(
        retriever,
        analyzer,
        files,
        CancellationToken::new(),
    ));
    while let Some(event) = events.next().await {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

pub async fn search(
    feature_id: i64,
    query: String,
    only_tests: bool,
    top: usize,
    rerank: bool,
) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let rerank_url = config.rerank_url.clone();

    let mut retriever = Retriever::open(feature_id, &config, Arc::clone(&store))?;
    retriever.tuning.graph_top = top;

    if rerank {
        // Rerank operates on the raw hybrid hits rather than the graph walk.
        let mut conn = store.pool().acquire().await?;
        let hits = store
            .search(
                &retriever.graph_id(),
                &query,
                retriever.tuning.search_top,
                retriever.tuning.bm25_weight,
                retriever.tuning.vector_weight,
                &mut *conn,
                &CancellationToken::new(),
            )
            .await?;
        let rows: Vec<_> = hits.into_iter().map(|(row, _)| row).collect();
        let client = RerankClient::new(rerank_url);
        let reranked = retriever
            .rerank_docs(&client, &query, &rows, retriever.tuning.rerank_top)
            .await?;
        let by_id: HashMap<i64, &taproot_index::SearchRow> =
            rows.iter().map(|row| (row.id as i64, row)).collect();
        for result in reranked.iter().take(top) {
            if let Some(row) = by_id.get(&result.id) {
                println!("{:.4}  {}", result.score, row.file.as_deref().unwrap_or("?"));
            }
        }
        return Ok(());
    }

    let results = retriever
        .search(&query, &[], &HashMap::new(), only_tests, &CancellationToken::new())
        .await?;
    for (node, score) in results {
        println!(
            "{:.6}  {}  {}:{}-{}",
            score,
            node.symbol,
            node.file_name,
            node.line,
            node.end_line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string()),
        );
    }
    Ok(())
}

pub async fn delete(feature_id: i64) -> Result<()> {
    let config = Config::from_env();
    let store = open_store(&config).await?;
    let retriever = Retriever::open(feature_id, &config, store)?;
    retriever.delete().await?;
    tracing::info!("deleted graph for feature {}", feature_id);
    Ok(())
}

//! Taproot CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "taproot")]
#[command(about = "Code knowledge graph and hybrid retrieval engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the ingestion server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7372")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory holding one repository per feature id
        #[arg(long, default_value = ".")]
        repo_root: PathBuf,
    },
    /// Ingest a repository into a feature's graph
    Ingest {
        feature_id: i64,
        /// Repository root to index
        path: PathBuf,
    },
    /// Query a feature's graph
    Search {
        feature_id: i64,
        query: String,

        /// Bias the traversal toward test files
        #[arg(long)]
        only_tests: bool,

        /// Number of results to return
        #[arg(long, default_value = "50")]
        top: usize,

        /// Reorder raw search hits through the rerank sidecar
        #[arg(long)]
        rerank: bool,
    },
    /// Delete all graph data for a feature
    Delete { feature_id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("taproot={}", log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve { port, host, repo_root } => commands::serve(host, port, repo_root).await,
        Commands::Ingest { feature_id, path } => commands::ingest(feature_id, path).await,
        Commands::Search {
            feature_id,
            query,
            only_tests,
            top,
            rerank,
        } => commands::search(feature_id, query, only_tests, top, rerank).await,
        Commands::Delete { feature_id } => commands::delete(feature_id).await,
    }
}

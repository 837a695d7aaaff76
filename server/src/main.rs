use anyhow::{Context, Result};
use clap::Parser;
use search_core::Similarity;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

/// Serve ranked search over one committed index snapshot.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Directory holding the committed index
    #[arg(long, env = "SEARCH_INDEX", default_value = "./index")]
    index: PathBuf,
    /// tfidf, tfidf-raw, bm25 or ql
    #[arg(long, env = "SEARCH_SIMILARITY", default_value = "tfidf")]
    similarity: Similarity,
    #[arg(long, default_value = "0.0.0.0")]
    host: IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for ctrl-c");
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let app = server::build_app(&args.index, args.similarity)
        .with_context(|| format!("cannot serve {}", args.index.display()))?;

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr).await.with_context(|| format!("cannot bind {addr}"))?;
    tracing::info!(%addr, similarity = args.similarity.name(), "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

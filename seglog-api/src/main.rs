//! # Seglog Server
//!
//! Run with: `cargo run --bin seglog-server -- --dir ./data --port 8083`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};

use seglog_api::server::{create_router, AppState};
use seglog_core::config::{ApiConfig, StoreConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let dir = args
        .iter()
        .position(|a| a == "--dir")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data"));

    let port: u16 = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|p| p.parse().ok())
        .unwrap_or(8083);

    let segment_size: u64 = args
        .iter()
        .position(|a| a == "--segment-size")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| StoreConfig::default().segment_size);

    let config = ApiConfig {
        port,
        store: StoreConfig::new(dir, segment_size),
    };
    let addr = format!("0.0.0.0:{}", config.port);

    info!("Starting seglog server on {}", addr);
    info!("Data directory: {:?}", config.store.dir);
    let state = Arc::new(AppState::new(config).await?);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down");
    state.store.close().await?;

    Ok(())
}

//! # Seglog Balancer
//!
//! Run with:
//! `cargo run --bin seglog-balancer -- --port 8090 --backend http://server1:8080 --backend http://server2:8080`

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};

use seglog_balancer::{create_router, BackendPool, ProxyState};
use seglog_core::config::BalancerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let port = args
        .iter()
        .position(|a| a == "--port")
        .and_then(|i| args.get(i + 1))
        .and_then(|p| p.parse().ok())
        .unwrap_or(8090);
    let backends: Vec<String> = args
        .iter()
        .enumerate()
        .filter(|(_, a)| *a == "--backend")
        .filter_map(|(i, _)| args.get(i + 1).cloned())
        .collect();
    let config = BalancerConfig {
        port,
        backends,
        ..Default::default()
    };

    if config.backends.is_empty() {
        anyhow::bail!("at least one --backend is required");
    }

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting balancer on {}", addr);
    info!("Backends: {:?}", config.backends);

    let pool = Arc::new(BackendPool::new(config.backends.clone()));
    tokio::spawn(Arc::clone(&pool).run_health_checks(
        config.health_interval,
        config.health_timeout,
    ));

    let state = Arc::new(ProxyState {
        pool,
        client: reqwest::Client::new(),
    });
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

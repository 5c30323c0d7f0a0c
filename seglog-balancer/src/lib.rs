//! # Seglog Balancer
//!
//! Hash-based load balancer: the request path picks the backend, so the
//! same path always lands on the same server while the health set is
//! stable (session affinity without cookies or client state).
//!
//! A background task probes every backend's `/health` endpoint; the proxy
//! falls forward to the next healthy backend when the hashed choice is
//! down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

/// Largest request body the proxy will buffer and forward.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// FNV-1a, 32-bit. Stable across runs, so backend choice survives
/// balancer restarts.
pub fn hash(s: &str) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    s.bytes().fold(OFFSET_BASIS, |acc, byte| {
        (acc ^ byte as u32).wrapping_mul(PRIME)
    })
}

struct Backend {
    url: String,
    healthy: AtomicBool,
}

/// The backend set and its health state.
pub struct BackendPool {
    backends: Vec<Backend>,
}

impl BackendPool {
    /// Backends start healthy; the first probe round corrects that.
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        let backends = urls
            .into_iter()
            .map(|url| Backend {
                url: url.trim_end_matches('/').to_string(),
                healthy: AtomicBool::new(true),
            })
            .collect();
        Self { backends }
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn set_healthy(&self, index: usize, healthy: bool) {
        if let Some(backend) = self.backends.get(index) {
            backend.healthy.store(healthy, Ordering::Release);
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.backends
            .iter()
            .filter(|b| b.healthy.load(Ordering::Acquire))
            .count()
    }

    /// Pick the backend for a request path: hash the path, then fall
    /// forward to the next healthy backend. Returns its base URL.
    pub fn choose(&self, path: &str) -> Option<&str> {
        if self.backends.is_empty() {
            return None;
        }
        let start = hash(path) as usize % self.backends.len();
        (0..self.backends.len())
            .map(|i| &self.backends[(start + i) % self.backends.len()])
            .find(|b| b.healthy.load(Ordering::Acquire))
            .map(|b| b.url.as_str())
    }

    /// Probe every backend once and update the health set.
    pub async fn probe_all(&self, client: &reqwest::Client) {
        for (index, backend) in self.backends.iter().enumerate() {
            let healthy = client
                .get(format!("{}/health", backend.url))
                .send()
                .await
                .map(|resp| resp.status().is_success())
                .unwrap_or(false);
            let was = backend.healthy.swap(healthy, Ordering::AcqRel);
            if was != healthy {
                warn!(backend = %backend.url, healthy, "backend health changed");
            }
            debug!(index, backend = %backend.url, healthy, "health probe");
        }
    }

    /// Probe on an interval, forever. Spawn this on open.
    pub async fn run_health_checks(self: Arc<Self>, interval: Duration, timeout: Duration) {
        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "health probe client failed to build");
                return;
            }
        };
        loop {
            self.probe_all(&client).await;
            tokio::time::sleep(interval).await;
        }
    }
}

/// Shared state for the proxy handler.
pub struct ProxyState {
    pub pool: Arc<BackendPool>,
    pub client: reqwest::Client,
}

/// Forward one request to the backend the path hashes to, relaying the
/// status and body. The chosen backend is reported in the `lb-from`
/// response header.
pub async fn proxy(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let Some(backend) = state.pool.choose(&path).map(str::to_string) else {
        return (StatusCode::SERVICE_UNAVAILABLE, "no healthy backends").into_response();
    };

    let method = req.method().clone();
    let content_type = req.headers().get(axum::http::header::CONTENT_TYPE).cloned();
    let body: bytes::Bytes = match axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let url = format!("{}{}", backend, path_and_query);
    debug!(%method, %url, "forwarding request");

    let mut upstream = state.client.request(method, &url).body(body);
    if let Some(content_type) = content_type {
        upstream = upstream.header(axum::http::header::CONTENT_TYPE, content_type);
    }

    match upstream.send().await {
        Ok(resp) => {
            let status = resp.status();
            let payload = resp.bytes().await.unwrap_or_default();
            let mut response = (status, payload).into_response();
            if let Ok(value) = backend.parse() {
                response.headers_mut().insert("lb-from", value);
            }
            response
        }
        Err(e) => {
            warn!(%url, error = %e, "backend request failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// The balancer's own health endpoint.
pub async fn health() -> &'static str {
    "ok"
}

/// Build the proxy router: `/health` answered locally, everything else
/// forwarded.
pub fn create_router(state: Arc<ProxyState>) -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(health))
        .fallback(proxy)
        .with_state(state)
}

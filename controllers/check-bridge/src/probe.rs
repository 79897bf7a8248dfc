//! Health, readiness and metrics endpoints.

use crate::metrics::Metrics;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use checks::ResourceKind;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::info;

/// Tracks which controllers finished their initial listing
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    kinds: Arc<Mutex<BTreeMap<ResourceKind, bool>>>,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a controller that has to become ready
    pub fn register(&self, kind: ResourceKind) {
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.entry(kind).or_insert(false);
        }
    }

    pub fn mark_ready(&self, kind: ResourceKind) {
        if let Ok(mut kinds) = self.kinds.lock() {
            kinds.insert(kind, true);
        }
    }

    pub fn is_kind_ready(&self, kind: ResourceKind) -> bool {
        self.kinds
            .lock()
            .map(|kinds| kinds.get(&kind).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    /// True once every registered controller is ready
    pub fn is_ready(&self) -> bool {
        self.kinds
            .lock()
            .map(|kinds| !kinds.is_empty() && kinds.values().all(|ready| *ready))
            .unwrap_or(false)
    }

    /// Kinds still listing
    pub fn pending(&self) -> Vec<ResourceKind> {
        self.kinds
            .lock()
            .map(|kinds| {
                kinds
                    .iter()
                    .filter(|(_, ready)| !**ready)
                    .map(|(kind, _)| *kind)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Clone)]
struct ProbeState {
    readiness: Readiness,
    metrics: Arc<Metrics>,
}

/// Router serving `/healthz`, `/readyz` and `/metrics`
pub fn router(readiness: Readiness, metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(ProbeState { readiness, metrics })
}

/// Serves the probe endpoints until shutdown
pub async fn serve(
    addr: SocketAddr,
    readiness: Readiness,
    metrics: Arc<Metrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Probe server listening on {}", addr);

    axum::serve(listener, router(readiness, metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readyz(State(state): State<ProbeState>) -> impl IntoResponse {
    if state.readiness.is_ready() {
        return (StatusCode::OK, "OK".to_string());
    }

    let pending: Vec<&str> = state.readiness.pending().iter().map(|k| k.as_str()).collect();
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("waiting for: {}", pending.join(",")),
    )
}

async fn metrics_handler(State(state): State<ProbeState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

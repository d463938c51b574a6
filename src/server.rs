//! # Probe Server
//!
//! Serves `/metrics`, `/healthz` and `/readyz` on `METRICS_PORT`.
//!
//! Readiness follows the operator lifecycle rather than the socket: the pod
//! only reports ready between the informer caches syncing and the shutdown
//! signal, so a restarting operator drops out of endpoints before its worker
//! stops.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Where the operator is in its lifecycle, as reported by `/readyz`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Readiness {
    /// Informer caches still syncing
    Starting = 0,
    /// Caches synced, worker running
    Ready = 1,
    /// Shutdown signal received, worker draining
    Draining = 2,
}

impl Readiness {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Readiness::Ready,
            2 => Readiness::Draining,
            _ => Readiness::Starting,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Readiness::Starting => "informer caches not synced",
            Readiness::Ready => "ok",
            Readiness::Draining => "shutting down",
        }
    }
}

/// Lifecycle flags shared between the operator and its probe handlers
#[derive(Debug)]
pub struct ServerState {
    listening: AtomicBool,
    readiness: AtomicU8,
}

impl Default for ServerState {
    fn default() -> Self {
        Self {
            listening: AtomicBool::new(false),
            readiness: AtomicU8::new(Readiness::Starting as u8),
        }
    }
}

impl ServerState {
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    pub fn readiness(&self) -> Readiness {
        Readiness::from_u8(self.readiness.load(Ordering::Acquire))
    }

    /// Caches synced. Ignored once draining.
    pub fn mark_ready(&self) {
        // Only Starting moves to Ready
        let _ = self.readiness.compare_exchange(
            Readiness::Starting as u8,
            Readiness::Ready as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn mark_draining(&self) {
        self.readiness.store(Readiness::Draining as u8, Ordering::Release);
    }
}

pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

/// Bind `port` and serve until the task is dropped
pub async fn start_server(port: u16, state: Arc<ServerState>) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let local_addr = listener.local_addr()?;
    state.listening.store(true, Ordering::Release);
    info!(address = %local_addr, "Probe server listening");

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    let mut buffer = Vec::new();
    let families = crate::observability::metrics::REGISTRY.gather();
    match TextEncoder::new().encode(&families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let readiness = state.readiness();
    let code = if readiness == Readiness::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, readiness.reason())
}

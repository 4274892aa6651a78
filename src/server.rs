//! Health/readiness/metrics HTTP server (feature `metrics-server`), in the
//! same spirit as the teacher's optional `rest-api` server spawned
//! alongside the controller loop in `main.rs`.

use axum::routing::get;
use axum::{response::IntoResponse, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{Error, Result};

async fn healthz() -> impl IntoResponse {
    "ok"
}

async fn metrics() -> impl IntoResponse {
    (
        [("content-type", "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        crate::metrics::encode(),
    )
}

/// Serve `/healthz`, `/readyz`, and `/metrics` until the process is asked
/// to shut down. `/readyz` is identical to `/healthz`: the operator has no
/// separate warm-up phase distinguishing the two.
pub async fn run(bind_address: &str) -> Result<()> {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(healthz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| Error::Configuration(format!("invalid metrics bind address {bind_address}: {e}")))?;

    info!(%addr, "starting health/metrics server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Other(e.into()))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Other(e.into()))?;
    Ok(())
}

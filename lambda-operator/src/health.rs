//! `/healthz` and `/metrics` HTTP surface (spec.md SPEC_FULL ambient
//! stack), grounded on the axum router shape real kube-rs operators wire
//! alongside their `Controller` future.
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, Registry, TextEncoder};

use crate::context::Context;

#[derive(Clone)]
struct HealthState {
    context: Arc<Context>,
    registry: Registry,
}

pub fn router(context: Arc<Context>, registry: Registry) -> Router {
    let state = HealthState { context, registry };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Ready once at least one reconcile has completed, or the process has
/// been up long enough that a first reconcile is expected imminently.
async fn readyz(State(state): State<HealthState>) -> impl IntoResponse {
    let diagnostics = state.context.diagnostics.read().clone();
    let idle = chrono::Utc::now().signed_duration_since(diagnostics.last_reconcile);
    if idle.num_hours() > 1 {
        (StatusCode::SERVICE_UNAVAILABLE, "stalled: no reconcile in over an hour")
    } else {
        (StatusCode::OK, "ready")
    }
}

async fn metrics(State(state): State<HealthState>) -> impl IntoResponse {
    let families = state.registry.gather();
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, Vec::new());
    }
    (StatusCode::OK, buffer)
}

//! Ops health surface. Grounded on `mez-api::lib::app`'s router
//! composition: liveness always 200s if the process is up, readiness
//! probes the dependencies this engine actually owns (database, CFS).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use feerecon_core::{ReconcileError, TaskContext};
use feerecon_storage::Store;

#[derive(Clone)]
struct HealthState(Arc<TaskContext<Store>>);

pub fn app(ctx: TaskContext<Store>) -> Router {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .layer(TraceLayer::new_for_http())
        .with_state(HealthState(Arc::new(ctx)))
}

async fn liveness() -> &'static str {
    "ok"
}

/// Verifies the storage backend answers, per SPEC_FULL §6's health-probe
/// supplement. CFS reachability is not checked here since the reconciler
/// only calls CFS from inside a settlement file run, not on every probe.
async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    match state.0.store.ping().await {
        Ok(()) => (StatusCode::OK, "ready").into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, format!("storage unreachable: {e}")).into_response()
        }
    }
}

pub async fn run(ctx: TaskContext<Store>, addr: &str) -> Result<(), ReconcileError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ReconcileError::Storage(format!("bind {addr}: {e}")))?;
    tracing::info!(addr, "health server listening");
    axum::serve(listener, app(ctx))
        .await
        .map_err(|e| ReconcileError::Storage(format!("serve: {e}")))
}

//! Request handlers and the admission middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde_json::json;
use tracing::warn;

use crate::admission::{AdmissionController, Decision};
use crate::audit::{AuditRecord, AuditSink};
use crate::metrics::MetricsReporter;

/// Shared state for all request handlers.
pub struct AppState {
    /// The admission controller
    pub controller: Arc<AdmissionController>,
    /// Metrics reporter over the controller's registry
    pub metrics: MetricsReporter,
    /// Audit log handle
    pub audit: AuditSink,
}

impl AppState {
    /// Assemble the application state around a controller.
    pub fn new(controller: Arc<AdmissionController>, audit: AuditSink) -> Self {
        let metrics = MetricsReporter::new(Arc::clone(&controller));
        Self {
            controller,
            metrics,
            audit,
        }
    }
}

/// Admission middleware applied to every route.
///
/// Rejections short-circuit with 429 before routing; admitted requests
/// carry their [`Decision`] in the request extensions. Either way the
/// decision is audited with the final status once handling completes.
pub async fn admission_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_id = peer.ip().to_string();
    let path = request.uri().path().to_string();

    let decision = state.controller.admit_now(&client_id);
    if !decision.admitted {
        audit(&state, &client_id, &path, StatusCode::TOO_MANY_REQUESTS.as_u16());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "too many requests",
                "requests_in_window": decision.current_count,
            })),
        )
            .into_response();
    }

    request.extensions_mut().insert(decision);
    let response = next.run(request).await;

    audit(&state, &client_id, &path, response.status().as_u16());
    response
}

/// Queue an audit record; a failure degrades to a warning.
fn audit(state: &AppState, client_id: &str, path: &str, status: u16) {
    if let Err(e) = state.audit.append(AuditRecord::new(client_id, path, status)) {
        warn!(client_id, path, status, error = %e, "Audit append degraded");
    }
}

/// `GET /`: demo endpoint echoing the caller's identity and window count.
pub async fn index(Extension(decision): Extension<Decision>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "your_ip": decision.client_id,
        "requests_in_window": decision.current_count,
    }))
}

/// `GET /health`: liveness probe with the configured window and limit.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "window_secs": state.controller.window().as_secs(),
        "limit": state.controller.limit(),
    }))
}

/// `GET /metrics`: registry-derived counters.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

use axum::{extract::State, http::header, response::IntoResponse};

use crate::state::SharedState;

/// `GET /metrics`
///
/// Prometheus text exposition of the orchestrator metrics.
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.gather_text(),
    )
}

use axum::{Json, extract::State, http::StatusCode};

use sbt_mint::OrchestratorStatus;

use crate::error::ApiError;
use crate::state::SharedState;

/// `POST /mint`
///
/// Checks preconditions and starts the mint on its own task. Progress is
/// observed through `GET /status`; closing the request never cancels the
/// mint.
pub async fn start_mint(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<OrchestratorStatus>), ApiError> {
    let handle = state.orchestrator.start_mint().await?;
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(record)) => tracing::info!(address = %record.address, "mint finished"),
            Ok(Err(e)) => tracing::debug!(kind = e.kind(), "mint finished with error"),
            Err(e) => tracing::error!("mint task panicked: {e}"),
        }
    });
    Ok((StatusCode::ACCEPTED, Json(state.orchestrator.status())))
}

/// `GET /status`
pub async fn status(State(state): State<SharedState>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator.status())
}

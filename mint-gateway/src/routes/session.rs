//! Wallet connection routes.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use sbt_mint::OrchestratorStatus;

use crate::error::ApiError;
use crate::state::SharedState;

/// Query of `POST /connect`.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Pre-authenticated address from the session link.
    pub address: String,
}

/// `POST /connect?address=<expected>`
///
/// Connects the privacy wallet account matching `address` and returns the
/// resulting status.
pub async fn connect(
    State(state): State<SharedState>,
    Query(query): Query<ConnectQuery>,
) -> Result<Json<OrchestratorStatus>, ApiError> {
    state.orchestrator.connect(&query.address).await?;
    Ok(Json(state.orchestrator.status()))
}

/// `POST /credential/connect`
pub async fn connect_credential(
    State(state): State<SharedState>,
) -> Result<Json<OrchestratorStatus>, ApiError> {
    state.orchestrator.connect_credential().await?;
    Ok(Json(state.orchestrator.status()))
}

/// `POST /balances/refresh`
///
/// A busy private wallet is not an error; the previous balances stay.
pub async fn refresh_balances(
    State(state): State<SharedState>,
) -> Result<Json<OrchestratorStatus>, ApiError> {
    if state.orchestrator.refresh_balances().await?.is_none() {
        tracing::debug!("private wallet busy; balances unchanged");
    }
    Ok(Json(state.orchestrator.status()))
}

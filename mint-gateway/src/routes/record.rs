use axum::{
    Json,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use sbt_mint::decode_account;

use crate::error::{bad_request, not_found};
use crate::state::SharedState;

#[derive(Debug, Deserialize)]
pub struct RecordQuery {
    pub address: String,
}

/// `GET /record?address=<expected>`
///
/// Returns the proof record stored for `address`, or `404` when none can
/// be read. `address` must be an account reference; it becomes part of the
/// object key.
pub async fn get_record(
    State(state): State<SharedState>,
    Query(query): Query<RecordQuery>,
) -> Response {
    if let Err(e) = decode_account(&query.address) {
        return bad_request(format!("invalid address {:?}: {e}", query.address));
    }
    match state.orchestrator.publisher().fetch(&query.address).await {
        Some(record) => Json(record).into_response(),
        None => not_found(format!("no proof record for {}", query.address)),
    }
}

//! HTTP rendering of orchestrator errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use sbt_mint::{ErrorView, MintError};

/// Error body for non-orchestrator failures such as a missing record.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

/// Orchestrator error returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub MintError);

impl From<MintError> for ApiError {
    fn from(err: MintError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            MintError::PreconditionUnmet(_) => StatusCode::CONFLICT,
            MintError::UserDeclined(_) => StatusCode::FORBIDDEN,
            MintError::DecodeAbsent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            MintError::RemoteUnavailable(_) => StatusCode::BAD_GATEWAY,
            MintError::ProtocolInvariant(_) | MintError::DispatchFailed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorView::from(&self.0))).into_response()
    }
}

/// `400` with a JSON body.
pub fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            kind: "bad_request",
            message: message.into(),
        }),
    )
        .into_response()
}

/// `404` with a JSON body.
pub fn not_found(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            kind: "not_found",
            message: message.into(),
        }),
    )
        .into_response()
}

//! Error taxonomy for the HTTP/WS surface (spec §7), independent of the
//! business-level `{ok:false, ...}` outcomes `hub_core::Room` returns —
//! those are never errors at this layer, they're `Ok` response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("unknown path")]
    NotFound,

    #[error(transparent)]
    Core(#[from] hub_core::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(%status, error = %self, "request failed");
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

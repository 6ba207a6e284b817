//! HTTP error responses for the access API.
//!
//! Every failure maps to a status code plus a structured JSON body with a
//! machine-readable code. Store and task faults are logged server-side and
//! answered with a generic 500; their detail never reaches the client.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use keywarden_engine::ServiceError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Structured JSON error response body: `{"error": {"code", "message"}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. "NOT_FOUND" or "LIMIT_REACHED".
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Access API error; implements [`IntoResponse`] for axum handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request is missing a field or carries an invalid one (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No key matched the lookup (404).
    #[error("key not found")]
    NotFound,

    /// The key is bound to a different hardware id (403).
    #[error("key is bound to a different hardware id")]
    HwidMismatch,

    /// Every permitted use of the key is consumed (403).
    #[error("key usage limit reached")]
    LimitReached,

    /// The key was expired and has been removed (403).
    #[error("key expired")]
    Expired,

    /// The service failed; detail is logged, not returned (500).
    #[error("internal error: {0}")]
    Internal(#[from] ServiceError),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::HwidMismatch => (StatusCode::FORBIDDEN, "HWID_MISMATCH"),
            Self::LimitReached => (StatusCode::FORBIDDEN, "LIMIT_REACHED"),
            Self::Expired => (StatusCode::FORBIDDEN, "EXPIRED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            Self::Internal(e) => {
                error!(error = %e, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

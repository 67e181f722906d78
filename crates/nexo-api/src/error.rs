//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// API-facing error: carries the HTTP status the core error maps to.
#[derive(Debug)]
pub enum ApiError {
    Internal(nexo_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<nexo_core::Error> for ApiError {
    fn from(err: nexo_core::Error) -> Self {
        match &err {
            nexo_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            nexo_core::Error::JobNotFound(uid) => {
                ApiError::NotFound(format!("No job with UID {uid} is recorded."))
            }
            nexo_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "detail": message,
        }));

        (status, body).into_response()
    }
}

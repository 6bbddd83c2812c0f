//! HTTP mapping of domain errors.
//!
//! Authentication failures all collapse into one generic 401 so a caller
//! cannot tell a revoked session from an unknown one or a blocked account.

use crate::error::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    Forbidden,
    BadRequest(String),
    NotFound,
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            err if err.is_authentication_failure() => {
                debug!("authentication failed: {err}");
                Self::Unauthorized
            }
            AuthError::PermissionDenied(capability) => {
                debug!(%capability, "request denied");
                Self::Forbidden
            }
            AuthError::InvalidInput(message) => Self::BadRequest(message),
            other => {
                error!("{other}");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden".to_string()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub mod health;
pub mod password;
pub mod signup;
pub mod tokens;
pub mod types;
pub mod users;

use super::error::ApiError;
use crate::{error::AuthResult, principal::Principal, token::RequestMetadata};
use axum::http::HeaderMap;

pub(crate) fn metadata(headers: &HeaderMap) -> RequestMetadata {
    RequestMetadata::from_headers(headers)
}

/// The administrator is never visible or mutable through the API.
pub(crate) fn visible_target(found: AuthResult<Option<Principal>>) -> Result<Principal, ApiError> {
    match found? {
        Some(principal) if !principal.admin => Ok(principal),
        _ => Err(ApiError::NotFound),
    }
}

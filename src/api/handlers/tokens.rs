//! Login, validation, revocation and history endpoints.

use super::{
    metadata,
    types::{LoginRequest, TokenRequest, TokenResponse, ValidateResponse},
};
use crate::{
    api::{error::ApiError, state::ServiceState},
    ledger::HistoryRecord,
    principal::password::verify_password,
    token::TokenKind,
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = TokenResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    // Every failure below is the same 401 to avoid account probing.
    let deadline = state.deadline();
    let principal = match deadline
        .run("principal lookup", state.principals().get_by_email(&request.email))
        .await
    {
        Ok(Some(principal)) if !principal.blocked => principal,
        Ok(_) => return Err(ApiError::Unauthorized),
        Err(err) => {
            warn!("login lookup failed: {err}");
            return Err(ApiError::Unauthorized);
        }
    };

    let stored_hash = deadline
        .run("password lookup", state.principals().password_hash(principal.id))
        .await
        .ok()
        .flatten()
        .ok_or(ApiError::Unauthorized)?;
    if !verify_password(&request.password, &stored_hash) {
        debug!(principal_id = %principal.id, "password mismatch");
        return Err(ApiError::Unauthorized);
    }

    let token = state
        .tokens()
        .issue(&principal, TokenKind::User, deadline)
        .await
        .map_err(|err| {
            warn!("failed to issue token: {err}");
            ApiError::Unauthorized
        })?;

    let context = metadata(&headers).client_context();
    if let Err(err) = state
        .tokens()
        .record_authentication(&token, &context, deadline)
        .await
    {
        warn!(principal_id = %principal.id, "failed to record authentication: {err}");
    }

    info!(principal_id = %principal.id, device = %context.device, "principal authenticated");
    Ok(Json(TokenResponse {
        token,
        expires_in_seconds: state.config().ttl_for(TokenKind::User).as_secs(),
    }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/validate",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token is valid", body = ValidateResponse),
        (status = 401, description = "Token rejected")
    ),
    tag = "auth"
)]
/// Check a token on behalf of another service. Only the token in the body is
/// inspected; no caller credentials are required.
pub async fn validate_token(
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let claims = state
        .tokens()
        .validate(&request.token, TokenKind::User, state.deadline())
        .await?;
    if !claims.principal.has_identity() {
        return Err(ApiError::Unauthorized);
    }

    Ok(Json(ValidateResponse { valid: true }))
}

#[utoipa::path(
    post,
    path = "/v1/auth/revoke",
    request_body = TokenRequest,
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Caller or token rejected"),
        (status = 403, description = "Token belongs to another principal")
    ),
    tag = "auth"
)]
pub async fn revoke_token(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<TokenRequest>,
) -> Result<StatusCode, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    let deadline = state.deadline();

    let claims = state
        .tokens()
        .validate(&request.token, TokenKind::User, deadline)
        .await?;
    if claims.principal.id != caller.principal.id {
        return Err(ApiError::Forbidden);
    }

    state.tokens().revoke(&claims.session_id, deadline).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/auth/revoke/{session_id}",
    params(("session_id" = String, Path, description = "Session id from the caller's history")),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Session is not in the caller's history")
    ),
    tag = "auth"
)]
pub async fn revoke_session(
    headers: HeaderMap,
    Path(session_id): Path<String>,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<StatusCode, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    let deadline = state.deadline();

    let history = state.tokens().history(caller.principal.id, deadline).await?;
    if !history.iter().any(|entry| entry.session_id == session_id) {
        return Err(ApiError::Forbidden);
    }

    state.tokens().revoke(&session_id, deadline).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/auth/revoke-all",
    responses(
        (status = 204, description = "Every session of the caller revoked"),
        (status = 401, description = "Caller rejected")
    ),
    tag = "auth"
)]
pub async fn revoke_all(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<StatusCode, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    state
        .tokens()
        .revoke_all(caller.principal.id, state.deadline())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/auth/history",
    responses(
        (status = 200, description = "Authentication history, oldest first", body = [HistoryRecord]),
        (status = 401, description = "Caller rejected")
    ),
    tag = "auth"
)]
pub async fn history(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<Json<Vec<HistoryRecord>>, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    let entries = state
        .tokens()
        .history(caller.principal.id, state.deadline())
        .await?;
    Ok(Json(entries))
}

//! Password change and reset.

use super::{
    metadata,
    types::{ChangePasswordRequest, ResetPasswordRequest},
    visible_target,
};
use crate::{
    api::{error::ApiError, notify::ResetMessage, state::ServiceState},
    principal::password::{hash_password, validate_strength, verify_password},
    privilege::Capability,
    token::TokenKind,
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[utoipa::path(
    put,
    path = "/v1/me/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Old password mismatch or weak new password"),
        (status = 401, description = "Caller rejected")
    ),
    tag = "users"
)]
pub async fn change_password(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let caller = state.guard().authenticate(&metadata(&headers)).await?;
    let id = caller.principal.id;

    let stored_hash = state
        .deadline()
        .run("password lookup", state.principals().password_hash(id))
        .await?
        .ok_or(ApiError::NotFound)?;
    if !verify_password(&request.old_password, &stored_hash) {
        return Err(ApiError::BadRequest("old password does not match".to_string()));
    }
    validate_strength(&request.new_password)?;

    let password_hash = hash_password(&request.new_password)?;
    if !state
        .deadline()
        .run(
            "password update",
            state.principals().update_password(id, &password_hash),
        )
        .await?
    {
        return Err(ApiError::NotFound);
    }

    info!(principal_id = %id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v1/users/{id}/reset-token",
    params(("id" = Uuid, Path, description = "Principal id")),
    responses(
        (status = 202, description = "Reset token handed to the notifier"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing reset privilege"),
        (status = 404, description = "No such principal")
    ),
    tag = "users"
)]
pub async fn reset_token(
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Extension(state): Extension<Arc<ServiceState>>,
) -> Result<StatusCode, ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::SendResetEmail])
        .await?;
    let target = visible_target(
        state
            .deadline()
            .run("principal lookup", state.principals().get(id))
            .await,
    )?;

    let token = state
        .tokens()
        .issue(&target, TokenKind::ResetPassword, state.deadline())
        .await?;

    let message = ResetMessage {
        principal_id: target.id,
        email: target.email.clone(),
        token,
    };
    state.notifier().send(&message).map_err(|err| {
        error!(principal_id = %target.id, "failed to deliver reset token: {err}");
        ApiError::Internal
    })?;

    info!(principal_id = %target.id, requested_by = %caller.principal.id, "password reset requested");
    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password replaced"),
        (status = 400, description = "Weak password"),
        (status = 401, description = "Reset token rejected"),
        (status = 404, description = "Principal no longer exists")
    ),
    tag = "auth"
)]
pub async fn reset_password(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let claims = state
        .guard()
        .authenticate_token(&metadata(&headers), TokenKind::ResetPassword)
        .await?;
    validate_strength(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    if !state
        .deadline()
        .run(
            "password update",
            state
                .principals()
                .update_password(claims.principal.id, &password_hash),
        )
        .await?
    {
        return Err(ApiError::NotFound);
    }

    if let Err(err) = state
        .tokens()
        .revoke(&claims.session_id, state.deadline())
        .await
    {
        warn!(session_id = %claims.session_id, "failed to revoke reset token: {err}");
    }

    info!(principal_id = %claims.principal.id, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

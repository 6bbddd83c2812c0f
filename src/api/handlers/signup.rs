//! Signup by invitation.
//!
//! A principal holding `create` mints a signup token that embeds a fresh id
//! and the invitee's allowances. The invitee redeems it once; the embedded id
//! must not exist yet, and the token is revoked after use.

use super::{
    metadata,
    types::{SignupRequest, SignupTokenRequest, SignupTokenResponse},
};
use crate::{
    api::{error::ApiError, state::ServiceState},
    principal::{
        Principal,
        password::{hash_password, validate_strength},
    },
    privilege::Capability,
    token::TokenKind,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/v1/auth/signup-token",
    request_body = SignupTokenRequest,
    responses(
        (status = 201, description = "Signup token issued", body = SignupTokenResponse),
        (status = 400, description = "Inconsistent allowances"),
        (status = 401, description = "Caller rejected"),
        (status = 403, description = "Missing create privilege")
    ),
    tag = "auth"
)]
pub async fn signup_token(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<SignupTokenRequest>,
) -> Result<(StatusCode, Json<SignupTokenResponse>), ApiError> {
    let caller = state
        .guard()
        .authorize(&metadata(&headers), &[Capability::Create])
        .await?;
    request.allowances.validate()?;

    let invitee = Principal::new(Uuid::new_v4(), "", "").with_allowances(request.allowances);
    let token = state
        .tokens()
        .issue(&invitee, TokenKind::Signup, state.deadline())
        .await?;
    let url = state
        .signup_link_base()
        .map(|base| signup_link(base, &token));

    info!(invitee_id = %invitee.id, invited_by = %caller.principal.id, "signup token issued");
    Ok((
        StatusCode::CREATED,
        Json(SignupTokenResponse {
            token,
            expires_in_seconds: state.config().ttl_for(TokenKind::Signup).as_secs(),
            url,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Principal created from the signup token", body = Principal),
        (status = 400, description = "Invalid input or token already used"),
        (status = 401, description = "Signup token rejected")
    ),
    tag = "auth"
)]
pub async fn signup(
    headers: HeaderMap,
    Extension(state): Extension<Arc<ServiceState>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Principal>), ApiError> {
    let claims = state
        .guard()
        .authenticate_token(&metadata(&headers), TokenKind::Signup)
        .await?;

    if state
        .deadline()
        .run("principal lookup", state.principals().get(claims.principal.id))
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest("token already used".to_string()));
    }

    let principal = Principal::new(
        claims.principal.id,
        request.name.trim(),
        request.email.trim(),
    )
    .with_allowances(claims.principal.allowances);
    principal.validate_for_create()?;
    validate_strength(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    state
        .deadline()
        .run(
            "principal insert",
            state.principals().create(&principal, &password_hash),
        )
        .await?;

    if let Err(err) = state
        .tokens()
        .revoke(&claims.session_id, state.deadline())
        .await
    {
        warn!(session_id = %claims.session_id, "failed to revoke signup token: {err}");
    }

    info!(principal_id = %principal.id, "principal signed up");
    Ok((StatusCode::CREATED, Json(principal)))
}

fn signup_link(base: &Url, token: &str) -> String {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn signup_link_appends_the_token() {
        let base = Url::parse("https://app.example.com/signup").unwrap();
        assert_eq!(
            signup_link(&base, "abc.def"),
            "https://app.example.com/signup?token=abc.def"
        );
    }
}

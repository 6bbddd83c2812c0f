//! Request and response bodies.

use crate::principal::Allowances;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BlockedRequest {
    pub blocked: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePrincipalRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub allowances: Allowances,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SignupTokenRequest {
    #[serde(default)]
    pub allowances: Allowances,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupTokenResponse {
    pub token: String,
    pub expires_in_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub password: String,
}

//! Session tokens: claims, codec, request metadata, revocation and the
//! asynchronous last-used tracking.

pub mod codec;
pub mod metadata;
pub mod revocation;
pub mod touch;

pub use codec::{ClaimCodec, Claims};
pub use metadata::{ClientContext, RequestMetadata};
pub use revocation::RevocationService;
pub use touch::TouchDispatcher;

use crate::{deadline::Deadline, error::AuthResult, ledger::HistoryRecord, principal::Principal};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;
use uuid::Uuid;

/// What a token may be used for. Selects the signing key and the lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    User,
    Signup,
    ResetPassword,
}

impl TokenKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Signup => "signup",
            Self::ResetPassword => "reset_password",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "signup" => Ok(Self::Signup),
            "reset_password" => Ok(Self::ResetPassword),
            other => Err(format!("unknown token kind: {other}")),
        }
    }
}

/// Token lifecycle operations used by the guard and the handlers.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// Sign a token for `principal` and persist its session record.
    async fn issue(
        &self,
        principal: &Principal,
        kind: TokenKind,
        deadline: Deadline,
    ) -> AuthResult<String>;

    /// Verify the signature, then consult the session ledger.
    async fn validate(&self, token: &str, kind: TokenKind, deadline: Deadline)
    -> AuthResult<Claims>;

    /// Validate a user token and append an entry to the authentication history.
    async fn record_authentication(
        &self,
        token: &str,
        context: &ClientContext,
        deadline: Deadline,
    ) -> AuthResult<HistoryRecord>;

    async fn revoke(&self, session_id: &str, deadline: Deadline) -> AuthResult<()>;

    async fn revoke_all(&self, principal_id: Uuid, deadline: Deadline) -> AuthResult<()>;

    /// Non-expired history of `principal_id`, oldest first.
    async fn history(&self, principal_id: Uuid, deadline: Deadline)
    -> AuthResult<Vec<HistoryRecord>>;

    /// Drop every session and history row of a deleted principal.
    async fn purge_principal(&self, principal_id: Uuid, deadline: Deadline) -> AuthResult<()>;
}

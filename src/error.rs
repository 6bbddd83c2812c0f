//! Error taxonomy shared by the codec, the ledgers, the revocation service and
//! the guard.

use crate::privilege::Capability;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Missing, blank, malformed or badly signed credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("session has been revoked")]
    SessionRevoked,

    /// The session is unknown to the ledger or its expiry has passed.
    #[error("session is unknown or expired")]
    SessionExpired,

    #[error("principal is blocked")]
    PrincipalBlocked,

    #[error("principal not found")]
    PrincipalNotFound,

    #[error("missing privilege: {0}")]
    PermissionDenied(Capability),

    /// Storage failure or elapsed deadline. Always treated as a denial.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated(reason.into())
    }

    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }

    /// True for every failure that means "the caller is not who they claim to be
    /// or the session is not usable".
    #[must_use]
    pub const fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated(_)
                | Self::SessionRevoked
                | Self::SessionExpired
                | Self::PrincipalBlocked
                | Self::PrincipalNotFound
                | Self::LedgerUnavailable(_)
        )
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::LedgerUnavailable(err.to_string())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

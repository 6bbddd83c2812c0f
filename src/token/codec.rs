//! HS512 claim codec.
//!
//! Encoding signs the claims and persists the matching session record; a token
//! is never handed out without its record. Decoding is pure: it needs only the
//! token and the key.

use crate::{
    config::{SigningKey, TokenConfig},
    deadline::Deadline,
    error::{AuthError, AuthResult},
    ledger::{SessionLedger, SessionRecord},
    principal::Principal,
    token::TokenKind,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Signed payload: a principal snapshot plus the session id and expiry.
///
/// The snapshot is informational. Authorization decisions reload the principal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "jti")]
    pub session_id: String,
    pub principal: Principal,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    /// True once `now` is past `exp`. A missing or out-of-range `exp` counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        DateTime::from_timestamp(self.exp, 0).is_none_or(|exp| now > exp)
    }
}

/// Whole seconds for `exp`, rounded up so the claim never lapses before the
/// session record it mirrors.
fn expiry_seconds(expires_at: DateTime<Utc>) -> i64 {
    expires_at.timestamp() + i64::from(expires_at.timestamp_subsec_nanos() > 0)
}

#[derive(Clone)]
pub struct ClaimCodec {
    config: Arc<TokenConfig>,
    sessions: Arc<dyn SessionLedger>,
}

impl ClaimCodec {
    #[must_use]
    pub fn new(config: Arc<TokenConfig>, sessions: Arc<dyn SessionLedger>) -> Self {
        Self { config, sessions }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Sign a fresh token for `principal` and persist its session record.
    ///
    /// # Errors
    /// `InvalidInput` for a principal without identity, `Internal` if signing
    /// fails, `LedgerUnavailable` if the record cannot be stored in time.
    pub async fn encode(
        &self,
        principal: &Principal,
        kind: TokenKind,
        deadline: Deadline,
    ) -> AuthResult<String> {
        if !principal.has_identity() {
            return Err(AuthError::invalid_input("principal id is required"));
        }

        let ttl = chrono::Duration::from_std(self.config.ttl_for(kind))
            .map_err(|_| AuthError::Internal("token ttl out of range".to_string()))?;
        let created_at = Utc::now();
        let expires_at = created_at + ttl;
        let session_id = Uuid::new_v4().to_string();

        let claims = Claims {
            session_id: session_id.clone(),
            principal: principal.clone(),
            kind,
            iss: self.config.issuer().to_string(),
            iat: created_at.timestamp(),
            exp: expiry_seconds(expires_at),
        };
        let token = sign(&claims, self.config.key_for(kind))?;

        let record = SessionRecord {
            session_id,
            principal_id: principal.id,
            kind,
            valid: true,
            created_at,
            expires_at,
        };
        deadline
            .run("session insert", self.sessions.put(record))
            .await?;

        debug!(principal_id = %principal.id, %kind, "token issued");
        Ok(token)
    }

    /// Verify signature, issuer, kind and expiry.
    ///
    /// # Errors
    /// `Unauthenticated` for malformed, forged, mismatched or empty-session tokens,
    /// `SessionExpired` once `exp` has passed.
    pub fn decode(&self, token: &str, kind: TokenKind) -> AuthResult<Claims> {
        let claims = self.verify_signature(token, kind)?;
        if claims.is_expired_at(Utc::now()) {
            return Err(AuthError::SessionExpired);
        }
        Ok(claims)
    }

    /// Like [`Self::decode`] but leaves expiry to the caller, so an expired
    /// session can still be located and removed from the ledger.
    pub(crate) fn verify_signature(&self, token: &str, kind: TokenKind) -> AuthResult<Claims> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::unauthenticated("missing token"));
        }

        let mut validation = Validation::new(Algorithm::HS512);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_issuer(&[self.config.issuer()]);

        let data = decode::<Claims>(token, self.config.key_for(kind).decoding(), &validation)
            .map_err(|err| {
                debug!("token rejected: {err}");
                AuthError::unauthenticated("invalid token")
            })?;
        let claims = data.claims;

        if claims.session_id.trim().is_empty() {
            return Err(AuthError::unauthenticated("token has no session id"));
        }
        if claims.kind != kind {
            return Err(AuthError::unauthenticated(format!(
                "expected a {kind} token, got {}",
                claims.kind
            )));
        }
        Ok(claims)
    }
}

fn sign(claims: &Claims, key: &SigningKey) -> AuthResult<String> {
    encode(&Header::new(Algorithm::HS512), claims, key.encoding())
        .map_err(|err| AuthError::Internal(format!("failed to sign token: {err}")))
}

//! Validation and revocation over the session and history ledgers.
//!
//! The session ledger decides whether a signature-valid token is still usable.
//! The history ledger mirrors revocations on a best-effort basis: a failed
//! history write is logged and never undoes or blocks the session write.

use super::{ClaimCodec, Claims, ClientContext, TokenAuthority, TokenKind, TouchDispatcher};
use crate::{
    config::TokenConfig,
    deadline::Deadline,
    error::{AuthError, AuthResult},
    ledger::{HistoryLedger, HistoryRecord, SessionLedger},
    principal::Principal,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct RevocationService {
    codec: ClaimCodec,
    sessions: Arc<dyn SessionLedger>,
    history: Arc<dyn HistoryLedger>,
    touch: TouchDispatcher,
}

impl RevocationService {
    #[must_use]
    pub fn new(
        config: Arc<TokenConfig>,
        sessions: Arc<dyn SessionLedger>,
        history: Arc<dyn HistoryLedger>,
        touch: TouchDispatcher,
    ) -> Self {
        Self {
            codec: ClaimCodec::new(config, sessions.clone()),
            sessions,
            history,
            touch,
        }
    }

    #[must_use]
    pub const fn codec(&self) -> &ClaimCodec {
        &self.codec
    }

    async fn drop_expired_session(&self, session_id: &str, deadline: Deadline) {
        let result = deadline
            .run("expired session delete", self.sessions.delete(session_id))
            .await;
        if let Err(err) = result {
            warn!(%session_id, "failed to delete expired session: {err}");
        }
    }
}

#[async_trait]
impl TokenAuthority for RevocationService {
    async fn issue(
        &self,
        principal: &Principal,
        kind: TokenKind,
        deadline: Deadline,
    ) -> AuthResult<String> {
        self.codec.encode(principal, kind, deadline).await
    }

    async fn validate(
        &self,
        token: &str,
        kind: TokenKind,
        deadline: Deadline,
    ) -> AuthResult<Claims> {
        let claims = self.codec.verify_signature(token, kind)?;

        let record = deadline
            .run("session lookup", self.sessions.get(&claims.session_id))
            .await?
            .ok_or(AuthError::SessionExpired)?;

        if record.principal_id != claims.principal.id {
            warn!(session_id = %claims.session_id, "session belongs to another principal");
            return Err(AuthError::unauthenticated("session does not match token"));
        }
        if !record.valid {
            return Err(AuthError::SessionRevoked);
        }

        if record.is_expired_at(Utc::now()) {
            self.drop_expired_session(&claims.session_id, deadline).await;
            return Err(AuthError::SessionExpired);
        }

        self.touch.dispatch(&claims.session_id);
        Ok(claims)
    }

    async fn record_authentication(
        &self,
        token: &str,
        context: &ClientContext,
        deadline: Deadline,
    ) -> AuthResult<HistoryRecord> {
        let claims = self.validate(token, TokenKind::User, deadline).await?;

        let ttl = chrono::Duration::from_std(self.codec.config().history_ttl())
            .map_err(|_| AuthError::Internal("history ttl out of range".to_string()))?;
        let now = Utc::now();
        let record = HistoryRecord {
            session_id: claims.session_id,
            principal_id: claims.principal.id,
            device: context.device.clone(),
            latitude: context.latitude,
            longitude: context.longitude,
            valid: true,
            created_at: now,
            last_used_at: now,
            expires_at: now + ttl,
        };

        deadline
            .run("history append", self.history.append(record.clone()))
            .await?;
        Ok(record)
    }

    async fn revoke(&self, session_id: &str, deadline: Deadline) -> AuthResult<()> {
        let existed = deadline
            .run("session revoke", self.sessions.invalidate(session_id))
            .await?;
        if !existed {
            debug!(%session_id, "revoke of unknown session");
        }

        if let Err(err) = deadline
            .run("history revoke", self.history.invalidate(session_id))
            .await
        {
            warn!(%session_id, "failed to mark history entry revoked: {err}");
        }

        info!(%session_id, "session revoked");
        Ok(())
    }

    async fn revoke_all(&self, principal_id: Uuid, deadline: Deadline) -> AuthResult<()> {
        let count = deadline
            .run("session revoke all", self.sessions.invalidate_all(principal_id))
            .await?;

        if let Err(err) = deadline
            .run("history revoke all", self.history.invalidate_all(principal_id))
            .await
        {
            warn!(%principal_id, "failed to mark history entries revoked: {err}");
        }

        info!(%principal_id, count, "all sessions revoked");
        Ok(())
    }

    async fn history(
        &self,
        principal_id: Uuid,
        deadline: Deadline,
    ) -> AuthResult<Vec<HistoryRecord>> {
        let entries = deadline
            .run("history list", self.history.list_by_principal(principal_id))
            .await?;

        let now = Utc::now();
        let (expired, live): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| entry.is_expired_at(now));

        for entry in expired {
            // Pruning is opportunistic; the reaper catches anything left behind.
            let pruned = deadline
                .run("history prune", async {
                    self.sessions.delete(&entry.session_id).await?;
                    self.history.delete(&entry.session_id).await
                })
                .await;
            if let Err(err) = pruned {
                warn!(session_id = %entry.session_id, "failed to prune expired history: {err}");
            }
        }

        Ok(live)
    }

    async fn purge_principal(&self, principal_id: Uuid, deadline: Deadline) -> AuthResult<()> {
        let history = deadline
            .run(
                "history purge",
                self.history.delete_by_principal(principal_id),
            )
            .await?;
        let sessions = deadline
            .run(
                "session purge",
                self.sessions.delete_by_principal(principal_id),
            )
            .await?;
        info!(%principal_id, history, sessions, "principal ledgers purged");
        Ok(())
    }
}

//! Authorization guard.
//!
//! Every privileged operation goes through the same sequence: read the token
//! from request metadata, validate it against the session ledger, reload the
//! principal from the store, reject it if blocked, then ask the resolver for
//! each required capability. The whole sequence shares one deadline and any
//! failure denies the request.

use crate::{
    deadline::Deadline,
    error::{AuthError, AuthResult},
    principal::{Principal, PrincipalStore},
    privilege::{Capability, PrivilegeResolver},
    token::{Claims, RequestMetadata, TokenAuthority, TokenKind},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3000);

/// A caller that passed the guard. `principal` is the freshly loaded record.
#[derive(Clone, Debug)]
pub struct Authenticated {
    pub principal: Principal,
    pub claims: Claims,
}

impl Authenticated {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.claims.session_id
    }
}

#[derive(Clone)]
pub struct AuthorizationGuard {
    tokens: Arc<dyn TokenAuthority>,
    principals: Arc<dyn PrincipalStore>,
    privileges: Arc<dyn PrivilegeResolver>,
    timeout: Duration,
}

impl AuthorizationGuard {
    #[must_use]
    pub fn new(
        tokens: Arc<dyn TokenAuthority>,
        principals: Arc<dyn PrincipalStore>,
        privileges: Arc<dyn PrivilegeResolver>,
    ) -> Self {
        Self {
            tokens,
            principals,
            privileges,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a deadline with this guard's budget.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }

    /// Validate the presented user token and return the caller's fresh record.
    ///
    /// # Errors
    /// Any authentication-class `AuthError`; see [`Self::authorize`].
    pub async fn authenticate(&self, metadata: &RequestMetadata) -> AuthResult<Authenticated> {
        self.authorize(metadata, &[]).await
    }

    /// Authenticate, then require every capability in `required`.
    ///
    /// # Errors
    /// `Unauthenticated` for missing metadata (checked before any I/O),
    /// `SessionRevoked`/`SessionExpired` from the ledger, `PrincipalNotFound`,
    /// `PrincipalBlocked`, `PermissionDenied`, or `LedgerUnavailable` when the
    /// deadline passes.
    pub async fn authorize(
        &self,
        metadata: &RequestMetadata,
        required: &[Capability],
    ) -> AuthResult<Authenticated> {
        let token = metadata.token()?;
        let deadline = self.deadline();

        let claims = self.tokens.validate(token, TokenKind::User, deadline).await?;
        if !claims.principal.has_identity() {
            return Err(AuthError::unauthenticated("token carries no principal"));
        }

        let principal = deadline
            .run("principal lookup", self.principals.get(claims.principal.id))
            .await?
            .ok_or(AuthError::PrincipalNotFound)?;

        if principal.blocked {
            debug!(principal_id = %principal.id, "blocked principal rejected");
            return Err(AuthError::PrincipalBlocked);
        }

        for &capability in required {
            let allowed = deadline
                .run(
                    "privilege lookup",
                    self.privileges.has_capability(&principal, capability),
                )
                .await
                .unwrap_or_else(|err| {
                    warn!(principal_id = %principal.id, %capability, "privilege check failed: {err}");
                    false
                });
            if !allowed {
                return Err(AuthError::PermissionDenied(capability));
            }
        }

        Ok(Authenticated { principal, claims })
    }

    /// Validate a token of `kind` without loading the principal. Used where the
    /// embedded principal is not expected to exist yet (signup) or the caller is
    /// not the principal (password reset).
    ///
    /// # Errors
    /// `Unauthenticated` for missing metadata, or any validation failure.
    pub async fn authenticate_token(
        &self,
        metadata: &RequestMetadata,
        kind: TokenKind,
    ) -> AuthResult<Claims> {
        let token = metadata.token()?;
        let claims = self.tokens.validate(token, kind, self.deadline()).await?;
        if !claims.principal.has_identity() {
            return Err(AuthError::unauthenticated("token carries no principal"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        ledger::{
            HistoryRecord,
            memory::{MemoryHistoryLedger, MemorySessionLedger},
        },
        principal::{Allowances, memory::MemoryPrincipalStore},
        privilege::AllowanceResolver,
        token::{ClientContext, RevocationService, TouchDispatcher, codec::tests::test_config},
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct Fixture {
        guard: AuthorizationGuard,
        tokens: Arc<RevocationService>,
        principals: Arc<MemoryPrincipalStore>,
    }

    fn fixture() -> Fixture {
        let sessions = Arc::new(MemorySessionLedger::new());
        let history = Arc::new(MemoryHistoryLedger::new());
        let (touch, _worker) = TouchDispatcher::spawn(history.clone(), 64);
        let tokens = Arc::new(RevocationService::new(
            test_config(Duration::from_secs(60)),
            sessions,
            history,
            touch,
        ));
        let principals = Arc::new(MemoryPrincipalStore::new());
        let guard = AuthorizationGuard::new(tokens.clone(), principals.clone(), Arc::new(AllowanceResolver));
        Fixture {
            guard,
            tokens,
            principals,
        }
    }

    async fn enrolled(fixture: &Fixture, allowances: Allowances) -> (Principal, String) {
        let principal =
            Principal::new(Uuid::new_v4(), "Ada", format!("{}@example.com", Uuid::new_v4()))
                .with_allowances(allowances);
        fixture.principals.create(&principal, "hash").await.unwrap();
        let token = fixture
            .tokens
            .issue(&principal, TokenKind::User, fixture.guard.deadline())
            .await
            .unwrap();
        (principal, token)
    }

    fn viewer() -> Allowances {
        Allowances {
            view: true,
            ..Allowances::default()
        }
    }

    /// Counts every call that reaches the token layer.
    struct CountingAuthority(AtomicUsize);

    #[async_trait]
    impl TokenAuthority for CountingAuthority {
        async fn issue(&self, _: &Principal, _: TokenKind, _: Deadline) -> AuthResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::Internal("unused".into()))
        }
        async fn validate(&self, _: &str, _: TokenKind, _: Deadline) -> AuthResult<Claims> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::Internal("unused".into()))
        }
        async fn record_authentication(
            &self,
            _: &str,
            _: &ClientContext,
            _: Deadline,
        ) -> AuthResult<HistoryRecord> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AuthError::Internal("unused".into()))
        }
        async fn revoke(&self, _: &str, _: Deadline) -> AuthResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn revoke_all(&self, _: Uuid, _: Deadline) -> AuthResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn history(&self, _: Uuid, _: Deadline) -> AuthResult<Vec<HistoryRecord>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
        async fn purge_principal(&self, _: Uuid, _: Deadline) -> AuthResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Never answers, to exercise the deadline.
    struct StalledStore;

    #[async_trait]
    impl PrincipalStore for StalledStore {
        async fn get(&self, _: Uuid) -> AuthResult<Option<Principal>> {
            std::future::pending().await
        }
        async fn get_by_email(&self, _: &str) -> AuthResult<Option<Principal>> {
            std::future::pending().await
        }
        async fn list(&self) -> AuthResult<Vec<Principal>> {
            std::future::pending().await
        }
        async fn password_hash(&self, _: Uuid) -> AuthResult<Option<String>> {
            std::future::pending().await
        }
        async fn create(&self, _: &Principal, _: &str) -> AuthResult<()> {
            std::future::pending().await
        }
        async fn update_allowances(&self, _: Uuid, _: Allowances) -> AuthResult<bool> {
            std::future::pending().await
        }
        async fn set_blocked(&self, _: Uuid, _: bool) -> AuthResult<bool> {
            std::future::pending().await
        }
        async fn update_password(&self, _: Uuid, _: &str) -> AuthResult<bool> {
            std::future::pending().await
        }
        async fn delete(&self, _: Uuid) -> AuthResult<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn missing_metadata_fails_before_any_ledger_call() {
        let authority = Arc::new(CountingAuthority(AtomicUsize::new(0)));
        let guard = AuthorizationGuard::new(
            authority.clone(),
            Arc::new(MemoryPrincipalStore::new()),
            Arc::new(AllowanceResolver),
        );

        let missing = guard.authorize(&RequestMetadata::new(), &[Capability::View]).await;
        assert!(matches!(missing, Err(AuthError::Unauthenticated(_))));

        let blank = guard
            .authenticate(&RequestMetadata::new().with_token("  "))
            .await;
        assert!(matches!(blank, Err(AuthError::Unauthenticated(_))));

        let signup = guard
            .authenticate_token(&RequestMetadata::new(), TokenKind::Signup)
            .await;
        assert!(matches!(signup, Err(AuthError::Unauthenticated(_))));

        assert_eq!(authority.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authorized_caller_gets_fresh_principal() {
        let f = fixture();
        let (principal, token) = enrolled(&f, viewer()).await;

        // Widen allowances after the token was issued; the guard must see them.
        let widened = Allowances {
            view: true,
            delete: true,
            ..Allowances::default()
        };
        f.principals.update_allowances(principal.id, widened).await.unwrap();

        let caller = f
            .guard
            .authorize(&RequestMetadata::new().with_token(&token), &[Capability::Delete])
            .await
            .unwrap();
        assert_eq!(caller.principal.allowances, widened);
        assert_eq!(caller.claims.principal.allowances, viewer());
    }

    #[tokio::test]
    async fn missing_capability_is_permission_denied() {
        let f = fixture();
        let (_, token) = enrolled(&f, viewer()).await;
        let result = f
            .guard
            .authorize(
                &RequestMetadata::new().with_token(&token),
                &[Capability::View, Capability::Block],
            )
            .await;
        assert!(matches!(result, Err(AuthError::PermissionDenied(Capability::Block))));
    }

    #[tokio::test]
    async fn blocked_principal_is_locked_out_until_unblocked() {
        let f = fixture();
        let (principal, token) = enrolled(&f, viewer()).await;
        let metadata = RequestMetadata::new().with_token(&token);

        assert!(f.guard.authenticate(&metadata).await.is_ok());

        f.principals.set_blocked(principal.id, true).await.unwrap();
        for required in [&[][..], &[Capability::View][..]] {
            let result = f.guard.authorize(&metadata, required).await;
            assert!(matches!(result, Err(AuthError::PrincipalBlocked)));
        }

        f.principals.set_blocked(principal.id, false).await.unwrap();
        assert!(f.guard.authenticate(&metadata).await.is_ok());
    }

    #[tokio::test]
    async fn deleted_principal_is_not_found() {
        let f = fixture();
        let (principal, token) = enrolled(&f, viewer()).await;
        f.principals.delete(principal.id).await.unwrap();

        let result = f
            .guard
            .authenticate(&RequestMetadata::new().with_token(&token))
            .await;
        assert!(matches!(result, Err(AuthError::PrincipalNotFound)));
    }

    #[tokio::test]
    async fn revoked_session_is_rejected() {
        let f = fixture();
        let (_, token) = enrolled(&f, viewer()).await;
        let metadata = RequestMetadata::new().with_token(&token);
        let caller = f.guard.authenticate(&metadata).await.unwrap();

        f.tokens
            .revoke(caller.session_id(), f.guard.deadline())
            .await
            .unwrap();
        let result = f.guard.authenticate(&metadata).await;
        assert!(matches!(result, Err(AuthError::SessionRevoked)));
    }

    #[tokio::test]
    async fn signup_token_is_not_a_user_token() {
        let f = fixture();
        let invitee = Principal::new(Uuid::new_v4(), "New", "new@example.com");
        let token = f
            .tokens
            .issue(&invitee, TokenKind::Signup, f.guard.deadline())
            .await
            .unwrap();
        let metadata = RequestMetadata::new().with_token(&token);

        assert!(matches!(
            f.guard.authenticate(&metadata).await,
            Err(AuthError::Unauthenticated(_))
        ));
        let claims = f
            .guard
            .authenticate_token(&metadata, TokenKind::Signup)
            .await
            .unwrap();
        assert_eq!(claims.principal.id, invitee.id);
    }

    #[tokio::test]
    async fn stalled_store_fails_closed_at_the_deadline() {
        let f = fixture();
        let (_, token) = enrolled(&f, viewer()).await;
        let guard = AuthorizationGuard::new(
            f.tokens.clone(),
            Arc::new(StalledStore),
            Arc::new(AllowanceResolver),
        )
        .with_timeout(Duration::from_millis(50));

        let result = guard
            .authenticate(&RequestMetadata::new().with_token(&token))
            .await;
        assert!(matches!(result, Err(AuthError::LedgerUnavailable(_))));
    }
}

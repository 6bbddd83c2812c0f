//! Shared handler state.

use super::notify::{LogResetNotifier, ResetNotifier};
use crate::{
    config::TokenConfig,
    deadline::Deadline,
    guard::AuthorizationGuard,
    principal::PrincipalStore,
    token::TokenAuthority,
};
use sqlx::PgPool;
use std::sync::Arc;
use url::Url;

#[derive(Clone)]
pub struct ServiceState {
    config: Arc<TokenConfig>,
    tokens: Arc<dyn TokenAuthority>,
    principals: Arc<dyn PrincipalStore>,
    guard: AuthorizationGuard,
    notifier: Arc<dyn ResetNotifier>,
    signup_link_base: Option<Url>,
    pool: Option<PgPool>,
}

impl ServiceState {
    #[must_use]
    pub fn new(
        config: Arc<TokenConfig>,
        tokens: Arc<dyn TokenAuthority>,
        principals: Arc<dyn PrincipalStore>,
        guard: AuthorizationGuard,
    ) -> Self {
        Self {
            config,
            tokens,
            principals,
            guard,
            notifier: Arc::new(LogResetNotifier),
            signup_link_base: None,
            pool: None,
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn with_signup_link_base(mut self, base: Option<Url>) -> Self {
        self.signup_link_base = base;
        self
    }

    /// Attach the database pool reported by `/health`.
    #[must_use]
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &dyn TokenAuthority {
        self.tokens.as_ref()
    }

    #[must_use]
    pub fn principals(&self) -> &dyn PrincipalStore {
        self.principals.as_ref()
    }

    #[must_use]
    pub const fn guard(&self) -> &AuthorizationGuard {
        &self.guard
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn ResetNotifier {
        self.notifier.as_ref()
    }

    #[must_use]
    pub const fn signup_link_base(&self) -> Option<&Url> {
        self.signup_link_base.as_ref()
    }

    #[must_use]
    pub const fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    /// Deadline for storage calls made outside the guard.
    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.guard.deadline()
    }
}

//! Capabilities and the resolvers that decide whether a principal holds one.
//!
//! The guard always hands resolvers the principal freshly loaded from the
//! store, never the snapshot embedded in the token.

use crate::{
    APP_USER_AGENT,
    error::{AuthError, AuthResult},
    principal::{Allowances, Principal},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use tracing::{Instrument, debug, info_span, warn};
use url::Url;
use utoipa::ToSchema;

/// A named privilege required by an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    Create,
    ManagePermissions,
    Delete,
    Block,
    SendResetEmail,
}

impl Capability {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Create => "create",
            Self::ManagePermissions => "manage_permissions",
            Self::Delete => "delete",
            Self::Block => "block",
            Self::SendResetEmail => "send_reset_email",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait PrivilegeResolver: Send + Sync {
    /// Whether `principal` holds `requirement`. Errors are treated as denial by the guard.
    async fn has_capability(
        &self,
        principal: &Principal,
        requirement: Capability,
    ) -> AuthResult<bool>;
}

/// Reads the allowance flags stored on the principal itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowanceResolver;

#[async_trait]
impl PrivilegeResolver for AllowanceResolver {
    async fn has_capability(
        &self,
        principal: &Principal,
        requirement: Capability,
    ) -> AuthResult<bool> {
        Ok(principal.allowances.allows(requirement))
    }
}

/// Asks an external privilege service for the allowances referenced by
/// `Principal::privilege_id`. A principal without a reference holds nothing.
#[derive(Clone, Debug)]
pub struct RemotePrivilegeResolver {
    client: Client,
    base_url: Url,
}

impl RemotePrivilegeResolver {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: Url, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn privilege_url(&self, privilege_id: &str) -> AuthResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AuthError::Internal("privilege url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v1", "privileges", privilege_id]);
        Ok(url)
    }
}

#[async_trait]
impl PrivilegeResolver for RemotePrivilegeResolver {
    async fn has_capability(
        &self,
        principal: &Principal,
        requirement: Capability,
    ) -> AuthResult<bool> {
        let Some(privilege_id) = principal.privilege_id.as_deref() else {
            debug!(principal_id = %principal.id, "no privilege reference");
            return Ok(false);
        };

        let url = self.privilege_url(privilege_id)?;
        let span = info_span!("privilege.lookup", privilege_id, capability = %requirement);
        let response = self
            .client
            .get(url)
            .send()
            .instrument(span)
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| {
                warn!("privilege lookup failed: {err}");
                AuthError::PermissionDenied(requirement)
            })?;

        let allowances: Allowances = response.json().await.map_err(|err| {
            warn!("invalid privilege payload: {err}");
            AuthError::PermissionDenied(requirement)
        })?;

        Ok(allowances.allows(requirement))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn allowance_resolver_reads_flags() {
        let principal = Principal::new(Uuid::new_v4(), "Ada", "ada@example.com").with_allowances(
            Allowances {
                view: true,
                ..Allowances::default()
            },
        );
        let resolver = AllowanceResolver;
        assert!(
            resolver
                .has_capability(&principal, Capability::View)
                .await
                .unwrap()
        );
        assert!(
            !resolver
                .has_capability(&principal, Capability::Delete)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn remote_resolver_denies_without_reference() {
        let resolver = RemotePrivilegeResolver::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(50),
        )
        .unwrap();
        let principal = Principal::new(Uuid::new_v4(), "Ada", "ada@example.com")
            .with_allowances(Allowances::all());
        assert!(
            !resolver
                .has_capability(&principal, Capability::View)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn remote_resolver_failure_is_a_denial() {
        let resolver = RemotePrivilegeResolver::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            Duration::from_millis(200),
        )
        .unwrap();
        let principal =
            Principal::new(Uuid::new_v4(), "Ada", "ada@example.com").with_privilege_id("p-1");
        let result = resolver.has_capability(&principal, Capability::Block).await;
        assert_eq!(result, Err(AuthError::PermissionDenied(Capability::Block)));
    }

    #[test]
    fn privilege_url_appends_segments() {
        let resolver = RemotePrivilegeResolver::new(
            Url::parse("https://privileges.internal/api/").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = resolver.privilege_url("abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://privileges.internal/api/v1/privileges/abc"
        );
    }

    #[test]
    fn capability_names_are_snake_case() {
        assert_eq!(Capability::SendResetEmail.to_string(), "send_reset_email");
        assert_eq!(
            serde_json::to_string(&Capability::ManagePermissions).unwrap(),
            "\"manage_permissions\""
        );
    }
}

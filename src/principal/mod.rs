//! Principals (accounts) and the store that holds their authoritative state.
//!
//! The store is the only source the guard trusts for the blocked flag and for
//! allowances. Password hashes are kept apart from [`Principal`] so a principal
//! can be embedded in token claims without ever carrying credentials.

pub mod memory;
pub mod password;
pub mod postgres;

use crate::{
    error::{AuthError, AuthResult},
    privilege::Capability,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok());

/// Per-principal capability flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct Allowances {
    pub view: bool,
    pub create: bool,
    pub manage_permissions: bool,
    pub delete: bool,
    pub block: bool,
    pub send_reset_email: bool,
}

impl Allowances {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            view: true,
            create: true,
            manage_permissions: true,
            delete: true,
            block: true,
            send_reset_email: true,
        }
    }

    #[must_use]
    pub const fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::View => self.view,
            Capability::Create => self.create,
            Capability::ManagePermissions => self.manage_permissions,
            Capability::Delete => self.delete,
            Capability::Block => self.block,
            Capability::SendResetEmail => self.send_reset_email,
        }
    }

    /// Reject combinations that grant an action on principals the holder cannot see.
    ///
    /// # Errors
    /// Returns `InvalidInput` naming the first inconsistent flag.
    pub fn validate(&self) -> AuthResult<()> {
        if self.create && (!self.view || !self.manage_permissions) {
            return Err(AuthError::invalid_input(
                "create requires view and manage_permissions",
            ));
        }
        if self.delete && !self.view {
            return Err(AuthError::invalid_input("delete requires view"));
        }
        if self.manage_permissions && !self.view {
            return Err(AuthError::invalid_input("manage_permissions requires view"));
        }
        if self.block && !self.view {
            return Err(AuthError::invalid_input("block requires view"));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub allowances: Allowances,
    /// Reference into an external privilege service, when one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privilege_id: Option<String>,
}

impl Principal {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            blocked: false,
            admin: false,
            allowances: Allowances::default(),
            privilege_id: None,
        }
    }

    #[must_use]
    pub const fn with_allowances(mut self, allowances: Allowances) -> Self {
        self.allowances = allowances;
        self
    }

    #[must_use]
    pub fn with_privilege_id(mut self, privilege_id: impl Into<String>) -> Self {
        self.privilege_id = Some(privilege_id.into());
        self
    }

    #[must_use]
    pub const fn as_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// A principal with a nil id carries no identity.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        !self.id.is_nil()
    }

    /// Validate the fields required to create an account.
    ///
    /// # Errors
    /// Returns `InvalidInput` for an empty identity, name or malformed email,
    /// or for inconsistent allowances.
    pub fn validate_for_create(&self) -> AuthResult<()> {
        if !self.has_identity() {
            return Err(AuthError::invalid_input("principal id is required"));
        }
        if self.name.trim().is_empty() {
            return Err(AuthError::invalid_input("name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::invalid_input("email is invalid"));
        }
        self.allowances.validate()
    }
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .is_some_and(|re| re.is_match(email.trim()))
}

/// Authoritative principal storage.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn get(&self, id: Uuid) -> AuthResult<Option<Principal>>;

    async fn get_by_email(&self, email: &str) -> AuthResult<Option<Principal>>;

    /// Every principal except the administrator.
    async fn list(&self) -> AuthResult<Vec<Principal>>;

    async fn password_hash(&self, id: Uuid) -> AuthResult<Option<String>>;

    /// Insert a new principal. A duplicate id or email is `InvalidInput`.
    async fn create(&self, principal: &Principal, password_hash: &str) -> AuthResult<()>;

    async fn update_allowances(&self, id: Uuid, allowances: Allowances) -> AuthResult<bool>;

    async fn set_blocked(&self, id: Uuid, blocked: bool) -> AuthResult<bool>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> AuthResult<bool>;

    async fn delete(&self, id: Uuid) -> AuthResult<bool>;
}

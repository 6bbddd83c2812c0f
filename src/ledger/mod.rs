//! Server-side records of issued sessions and interactive authentications.
//!
//! The session ledger holds one record per issued token and is the source of
//! truth for whether a session is live. The history ledger holds one entry per
//! interactive authentication, correlated to its session by id. Both use a
//! soft `valid` flag for revocation; rows disappear only when they expire.

pub mod memory;
pub mod postgres;
pub mod reaper;

use crate::{error::AuthResult, token::TokenKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub principal_id: Uuid,
    pub kind: TokenKind,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryRecord {
    pub session_id: String,
    pub principal_id: Uuid,
    pub device: String,
    pub latitude: f64,
    pub longitude: f64,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl HistoryRecord {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn put(&self, record: SessionRecord) -> AuthResult<()>;

    async fn get(&self, session_id: &str) -> AuthResult<Option<SessionRecord>>;

    /// Mark one session invalid. Returns whether a record existed.
    async fn invalidate(&self, session_id: &str) -> AuthResult<bool>;

    /// Mark every session of `principal_id` invalid. Returns the number touched.
    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<u64>;

    async fn delete(&self, session_id: &str) -> AuthResult<()>;

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

#[async_trait]
pub trait HistoryLedger: Send + Sync {
    async fn append(&self, record: HistoryRecord) -> AuthResult<()>;

    /// Every stored entry of `principal_id`, oldest first, expired ones included.
    async fn list_by_principal(&self, principal_id: Uuid) -> AuthResult<Vec<HistoryRecord>>;

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<()>;

    async fn invalidate(&self, session_id: &str) -> AuthResult<()>;

    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<()>;

    async fn delete(&self, session_id: &str) -> AuthResult<()>;

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64>;
}

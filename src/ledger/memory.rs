//! In-process ledgers for tests and `--in-memory` mode.

use super::{HistoryLedger, HistoryRecord, SessionLedger, SessionRecord};
use crate::error::AuthResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemorySessionLedger {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionLedger for MemorySessionLedger {
    async fn put(&self, record: SessionRecord) -> AuthResult<()> {
        self.records
            .write()
            .await
            .insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> AuthResult<Option<SessionRecord>> {
        Ok(self.records.read().await.get(session_id).cloned())
    }

    async fn invalidate(&self, session_id: &str) -> AuthResult<bool> {
        Ok(self
            .records
            .write()
            .await
            .get_mut(session_id)
            .map(|record| record.valid = false)
            .is_some())
    }

    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<u64> {
        let mut touched = 0;
        for record in self.records.write().await.values_mut() {
            if record.principal_id == principal_id {
                record.valid = false;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete(&self, session_id: &str) -> AuthResult<()> {
        self.records.write().await.remove(session_id);
        Ok(())
    }

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.principal_id != principal_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

/// Entries are kept in insertion order, which is creation order.
#[derive(Debug, Default)]
pub struct MemoryHistoryLedger {
    records: RwLock<Vec<HistoryRecord>>,
}

impl MemoryHistoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLedger for MemoryHistoryLedger {
    async fn append(&self, record: HistoryRecord) -> AuthResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_by_principal(&self, principal_id: Uuid) -> AuthResult<Vec<HistoryRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| record.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn touch(&self, session_id: &str, at: DateTime<Utc>) -> AuthResult<()> {
        for record in self.records.write().await.iter_mut() {
            if record.session_id == session_id {
                record.last_used_at = at;
            }
        }
        Ok(())
    }

    async fn invalidate(&self, session_id: &str) -> AuthResult<()> {
        for record in self.records.write().await.iter_mut() {
            if record.session_id == session_id {
                record.valid = false;
            }
        }
        Ok(())
    }

    async fn invalidate_all(&self, principal_id: Uuid) -> AuthResult<()> {
        for record in self.records.write().await.iter_mut() {
            if record.principal_id == principal_id {
                record.valid = false;
            }
        }
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> AuthResult<()> {
        self.records
            .write()
            .await
            .retain(|record| record.session_id != session_id);
        Ok(())
    }

    async fn delete_by_principal(&self, principal_id: Uuid) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| record.principal_id != principal_id);
        Ok((before - records.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> AuthResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|record| !record.is_expired_at(now));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use chrono::Duration;

    fn session(id: &str, principal_id: Uuid, expires_in: Duration) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            session_id: id.to_string(),
            principal_id,
            kind: TokenKind::User,
            valid: true,
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    fn entry(id: &str, principal_id: Uuid) -> HistoryRecord {
        let now = Utc::now();
        HistoryRecord {
            session_id: id.to_string(),
            principal_id,
            device: "Unknown".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            valid: true,
            created_at: now,
            last_used_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn invalidate_all_is_scoped_to_the_principal() {
        let ledger = MemorySessionLedger::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        ledger.put(session("a1", alice, Duration::hours(1))).await.unwrap();
        ledger.put(session("a2", alice, Duration::hours(1))).await.unwrap();
        ledger.put(session("b1", bob, Duration::hours(1))).await.unwrap();

        assert_eq!(ledger.invalidate_all(alice).await.unwrap(), 2);
        assert!(!ledger.get("a1").await.unwrap().unwrap().valid);
        assert!(!ledger.get("a2").await.unwrap().unwrap().valid);
        assert!(ledger.get("b1").await.unwrap().unwrap().valid);
    }

    #[tokio::test]
    async fn delete_expired_keeps_live_sessions() {
        let ledger = MemorySessionLedger::new();
        let principal = Uuid::new_v4();
        ledger
            .put(session("old", principal, Duration::seconds(-1)))
            .await
            .unwrap();
        ledger
            .put(session("new", principal, Duration::hours(1)))
            .await
            .unwrap();

        assert_eq!(ledger.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(ledger.get("old").await.unwrap().is_none());
        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn history_keeps_creation_order_and_touches_by_session() {
        let ledger = MemoryHistoryLedger::new();
        let principal = Uuid::new_v4();
        ledger.append(entry("s1", principal)).await.unwrap();
        ledger.append(entry("s2", principal)).await.unwrap();
        ledger.append(entry("x1", Uuid::new_v4())).await.unwrap();

        let later = Utc::now() + Duration::minutes(5);
        ledger.touch("s2", later).await.unwrap();

        let listed = ledger.list_by_principal(principal).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(listed[1].last_used_at, later);
        assert_ne!(listed[0].last_used_at, later);
    }

    #[tokio::test]
    async fn history_delete_by_principal_counts_rows() {
        let ledger = MemoryHistoryLedger::new();
        let principal = Uuid::new_v4();
        ledger.append(entry("s1", principal)).await.unwrap();
        ledger.append(entry("s2", principal)).await.unwrap();
        assert_eq!(ledger.delete_by_principal(principal).await.unwrap(), 2);
        assert!(ledger.list_by_principal(principal).await.unwrap().is_empty());
    }
}

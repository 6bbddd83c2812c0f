//! Detached `last_used_at` updates.
//!
//! Validation must not wait on the history write, so session ids are pushed
//! onto a bounded queue drained by one worker. When the queue is full the
//! update is dropped; a missed touch only makes `last_used_at` slightly stale.

use crate::ledger::HistoryLedger;
use chrono::Utc;
use std::sync::Arc;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Clone, Debug)]
pub struct TouchDispatcher {
    tx: mpsc::Sender<String>,
}

impl TouchDispatcher {
    /// Start the worker. It stops once every dispatcher clone is dropped.
    pub fn spawn(history: Arc<dyn HistoryLedger>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(session_id) = rx.recv().await {
                if let Err(err) = history.touch(&session_id, Utc::now()).await {
                    warn!(%session_id, "failed to update last used: {err}");
                }
            }
            debug!("touch worker stopped");
        });

        (Self { tx }, handle)
    }

    /// Queue a touch for `session_id` without waiting.
    pub fn dispatch(&self, session_id: &str) {
        match self.tx.try_send(session_id.to_string()) {
            Ok(()) => {}
            Err(TrySendError::Full(session_id)) => {
                warn!(%session_id, "touch queue full, dropping update");
            }
            Err(TrySendError::Closed(session_id)) => {
                warn!(%session_id, "touch worker is gone, dropping update");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        error::{AuthError, AuthResult},
        ledger::{HistoryRecord, memory::MemoryHistoryLedger},
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use uuid::Uuid;

    struct BrokenHistory;

    #[async_trait]
    impl HistoryLedger for BrokenHistory {
        async fn append(&self, _: HistoryRecord) -> AuthResult<()> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn list_by_principal(&self, _: Uuid) -> AuthResult<Vec<HistoryRecord>> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn touch(&self, _: &str, _: DateTime<Utc>) -> AuthResult<()> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn invalidate(&self, _: &str) -> AuthResult<()> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn invalidate_all(&self, _: Uuid) -> AuthResult<()> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn delete(&self, _: &str) -> AuthResult<()> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn delete_by_principal(&self, _: Uuid) -> AuthResult<u64> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
        async fn delete_expired(&self, _: DateTime<Utc>) -> AuthResult<u64> {
            Err(AuthError::LedgerUnavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn dispatched_touch_reaches_history() {
        let history = Arc::new(MemoryHistoryLedger::new());
        let principal = Uuid::new_v4();
        let long_ago = Utc::now() - Duration::hours(1);
        history
            .append(HistoryRecord {
                session_id: "s1".to_string(),
                principal_id: principal,
                device: "Unknown".to_string(),
                latitude: 0.0,
                longitude: 0.0,
                valid: true,
                created_at: long_ago,
                last_used_at: long_ago,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .await
            .unwrap();

        let (dispatcher, handle) = TouchDispatcher::spawn(history.clone(), 8);
        dispatcher.dispatch("s1");
        drop(dispatcher);
        handle.await.unwrap();

        let entries = history.list_by_principal(principal).await.unwrap();
        assert!(entries[0].last_used_at > long_ago);
    }

    #[tokio::test]
    async fn worker_survives_ledger_failures() {
        let (dispatcher, handle) = TouchDispatcher::spawn(Arc::new(BrokenHistory), 8);
        dispatcher.dispatch("s1");
        dispatcher.dispatch("s2");
        drop(dispatcher);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (tx, _rx) = mpsc::channel::<String>(1);
        let dispatcher = TouchDispatcher { tx };
        dispatcher.dispatch("s1");
        dispatcher.dispatch("s2");
    }
}

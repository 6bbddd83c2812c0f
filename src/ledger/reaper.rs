//! Expiry sweeper.
//!
//! Postgres has no native TTL, so a background task deletes session and
//! history rows whose `expires_at` has passed. Reads re-check expiry anyway;
//! the sweep only keeps the tables from growing.

use super::{HistoryLedger, SessionLedger};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReaperConfig {
    interval: Duration,
}

impl ReaperConfig {
    /// Default cadence: one sweep per minute.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub const fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(if seconds == 0 { 1 } else { seconds });
        self
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub history: u64,
}

/// Delete every expired row from both ledgers. A failure on one ledger does not
/// stop the sweep of the other.
pub async fn sweep(sessions: &dyn SessionLedger, history: &dyn HistoryLedger) -> SweepReport {
    let now = Utc::now();
    let mut report = SweepReport::default();

    match sessions.delete_expired(now).await {
        Ok(count) => report.sessions = count,
        Err(err) => error!("session sweep failed: {err}"),
    }
    match history.delete_expired(now).await {
        Ok(count) => report.history = count,
        Err(err) => error!("history sweep failed: {err}"),
    }

    report
}

/// Spawn a background task that sweeps both ledgers on a fixed cadence.
pub fn spawn_reaper(
    sessions: Arc<dyn SessionLedger>,
    history: Arc<dyn HistoryLedger>,
    config: ReaperConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(config.interval()).await;

            let report = sweep(sessions.as_ref(), history.as_ref()).await;
            if report != SweepReport::default() {
                debug!(
                    sessions = report.sessions,
                    history = report.history,
                    "expired ledger rows removed"
                );
            }
        }
    })
}

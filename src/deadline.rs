//! Caller-supplied deadlines for ledger and guard calls.
//!
//! A `Deadline` is fixed when a request starts and shared by every storage call
//! made on its behalf. An elapsed deadline is reported as
//! [`AuthError::LedgerUnavailable`], so callers fail closed.

use crate::error::{AuthError, AuthResult};
use std::{future::Future, time::Duration};
use tokio::time::{Instant, timeout_at};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self(Instant::now() + budget)
    }

    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Run `fut` until it completes or the deadline passes.
    ///
    /// # Errors
    /// Returns the future's own error, or `LedgerUnavailable` naming `operation`
    /// when the deadline elapses first.
    pub async fn run<T, F>(self, operation: &'static str, fut: F) -> AuthResult<T>
    where
        F: Future<Output = AuthResult<T>>,
    {
        if let Ok(result) = timeout_at(self.0, fut).await {
            result
        } else {
            warn!(operation, "deadline exceeded");
            Err(AuthError::LedgerUnavailable(format!(
                "{operation}: deadline exceeded"
            )))
        }
    }
}

//! Delivery of password-reset tokens.
//!
//! Actual email dispatch lives outside this service. The default notifier
//! only records that a reset was requested.

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ResetMessage {
    pub principal_id: Uuid,
    pub email: String,
    pub token: String,
}

pub trait ResetNotifier: Send + Sync {
    /// Hand the reset token to the delivery channel.
    fn send(&self, message: &ResetMessage) -> Result<()>;
}

/// Local dev notifier that logs the request. The token itself is not logged.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogResetNotifier;

impl ResetNotifier for LogResetNotifier {
    fn send(&self, message: &ResetMessage) -> Result<()> {
        info!(
            principal_id = %message.principal_id,
            to_email = %message.email,
            "password reset token issued"
        );
        Ok(())
    }
}

use async_trait::async_trait;

use crate::domain::account::errors::DispatchError;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::ports::LinkDispatcher;

/// Link dispatcher that writes links to the log instead of sending mail.
#[derive(Debug, Default, Clone)]
pub struct LoggingLinkDispatcher;

impl LoggingLinkDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkDispatcher for LoggingLinkDispatcher {
    async fn send_verification_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError> {
        tracing::info!(email = %email, link = %link, "Verification link issued");
        Ok(())
    }

    async fn send_password_reset_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError> {
        tracing::info!(email = %email, link = %link, "Password reset link issued");
        Ok(())
    }
}

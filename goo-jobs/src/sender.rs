//! Email capabilities the jobs depend on.

use async_trait::async_trait;
use goo_email::{Email, EmailError, Emailer};

#[async_trait]
pub trait ConfirmationEmailSender: Send + Sync {
    async fn send_newsletter_confirmation_email(
        &self,
        to: &Email,
        token: &str,
    ) -> Result<(), EmailError>;
}

#[async_trait]
pub trait WelcomeEmailSender: Send + Sync {
    async fn send_newsletter_welcome_email(&self, to: &Email) -> Result<(), EmailError>;
}

#[async_trait]
impl ConfirmationEmailSender for Emailer {
    async fn send_newsletter_confirmation_email(
        &self,
        to: &Email,
        token: &str,
    ) -> Result<(), EmailError> {
        Emailer::send_newsletter_confirmation_email(self, to, token).await
    }
}

#[async_trait]
impl WelcomeEmailSender for Emailer {
    async fn send_newsletter_welcome_email(&self, to: &Email) -> Result<(), EmailError> {
        Emailer::send_newsletter_welcome_email(self, to).await
    }
}

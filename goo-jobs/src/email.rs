//! Newsletter email jobs.

use std::sync::Arc;

use goo_email::Email;
use goo_job_queue::{async_trait, JobContext, JobError, JobHandler, Message};
use tracing::info;

use crate::sender::{ConfirmationEmailSender, WelcomeEmailSender};

/// Read a required field from the message.
fn required<'a>(message: &'a Message, field: &str) -> Result<&'a str, JobError> {
    message.get(field).ok_or_else(|| JobError::missing(field))
}

fn recipient(message: &Message) -> Result<Email, JobError> {
    let address = required(message, "email")?;
    Email::parse(address)
        .ok_or_else(|| JobError::InvalidPayload(format!("invalid email address {address}")))
}

/// Sends the double opt-in email. Expects `email` and `token` fields.
pub struct ConfirmationEmailJob<S: ?Sized> {
    sender: Arc<S>,
}

impl<S: ?Sized> ConfirmationEmailJob<S> {
    pub fn new(sender: Arc<S>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<S> JobHandler for ConfirmationEmailJob<S>
where
    S: ConfirmationEmailSender + ?Sized + 'static,
{
    async fn handle(&self, _ctx: JobContext, message: Message) -> Result<(), JobError> {
        let to = recipient(&message)?;
        let token = required(&message, "token")?;

        info!(to = %to, "Sending newsletter confirmation email");
        self.sender
            .send_newsletter_confirmation_email(&to, token)
            .await
            .map_err(JobError::execution)
    }
}

/// Sends the welcome email after confirmation. Expects an `email` field.
pub struct WelcomeEmailJob<S: ?Sized> {
    sender: Arc<S>,
}

impl<S: ?Sized> WelcomeEmailJob<S> {
    pub fn new(sender: Arc<S>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl<S> JobHandler for WelcomeEmailJob<S>
where
    S: WelcomeEmailSender + ?Sized + 'static,
{
    async fn handle(&self, _ctx: JobContext, message: Message) -> Result<(), JobError> {
        let to = recipient(&message)?;

        info!(to = %to, "Sending newsletter welcome email");
        self.sender
            .send_newsletter_welcome_email(&to)
            .await
            .map_err(JobError::execution)
    }
}

use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use crate::address::Email;
use crate::error::EmailError;
use crate::templates::EmailContent;

const DEFAULT_SMTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Port of a local mail catcher.
pub const DEFAULT_SMTP_PORT: u16 = 1025;

/// Credentials and identity of one sending account.
#[derive(Debug, Clone, Default)]
pub struct SenderConfig {
    pub username: String,
    pub password: String,
    pub email_address: String,
    pub email_name: String,
}

impl SenderConfig {
    fn mailbox(&self) -> Result<Mailbox, EmailError> {
        let name = (!self.email_name.is_empty()).then(|| self.email_name.clone());
        Ok(Mailbox::new(name, self.email_address.parse()?))
    }
}

#[derive(Debug, Clone)]
pub struct EmailerConfig {
    /// Public URL of the site, used to build links in emails.
    pub base_url: String,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    /// Account for emails that respond to a visitor action.
    pub transactional: SenderConfig,
    /// Account for newsletter-style emails.
    pub marketing: SenderConfig,
}

impl Default for EmailerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            host: "localhost".to_string(),
            port: DEFAULT_SMTP_PORT,
            timeout: DEFAULT_SMTP_TIMEOUT,
            transactional: SenderConfig::default(),
            marketing: SenderConfig::default(),
        }
    }
}

/// Sends templated transactional and marketing emails over SMTP.
pub struct Emailer {
    base_url: String,
    transactional_from: Mailbox,
    marketing_from: Mailbox,
    transactional: AsyncSmtpTransport<Tokio1Executor>,
    marketing: AsyncSmtpTransport<Tokio1Executor>,
}

impl Emailer {
    /// Build the SMTP transports. No connection is opened until the first send.
    pub fn new(config: EmailerConfig) -> Result<Self, EmailError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(host = %config.host, port = config.port, "Configuring SMTP transports");

        Ok(Self {
            base_url,
            transactional_from: config.transactional.mailbox()?,
            marketing_from: config.marketing.mailbox()?,
            transactional: build_transport(&config, &config.transactional),
            marketing: build_transport(&config, &config.marketing),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send the double opt-in email with a link carrying `token`.
    pub async fn send_newsletter_confirmation_email(
        &self,
        to: &Email,
        token: &str,
    ) -> Result<(), EmailError> {
        let content = confirmation_email(&self.base_url, token)?;
        self.send(&self.transactional, &self.transactional_from, to, content)
            .await
    }

    /// Send the welcome email after a confirmed signup.
    pub async fn send_newsletter_welcome_email(&self, to: &Email) -> Result<(), EmailError> {
        let content = welcome_email(&self.base_url)?;
        self.send(&self.marketing, &self.marketing_from, to, content)
            .await
    }

    async fn send(
        &self,
        transport: &AsyncSmtpTransport<Tokio1Executor>,
        from: &Mailbox,
        to: &Email,
        content: EmailContent,
    ) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(from.clone())
            .to(Mailbox::new(None, to.as_str().parse()?))
            .subject(content.subject)
            .multipart(MultiPart::alternative_plain_html(content.text, content.html))?;

        transport.send(message).await?;
        debug!(to = %to, "Sent email");
        Ok(())
    }
}

fn build_transport(config: &EmailerConfig, sender: &SenderConfig) -> AsyncSmtpTransport<Tokio1Executor> {
    // Plain SMTP; TLS termination is left to the relay.
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        .port(config.port)
        .timeout(Some(config.timeout));
    if !sender.username.is_empty() {
        builder = builder.credentials(Credentials::new(
            sender.username.clone(),
            sender.password.clone(),
        ));
    }
    builder.build()
}

/// Content of the double opt-in email.
pub fn confirmation_email(base_url: &str, token: &str) -> Result<EmailContent, EmailError> {
    let action_url = format!("{base_url}/newsletter/confirm?token={token}");
    EmailContent::render(
        "Confirm your subscription to the newsletter",
        "confirmation_email",
        &[("base_url", base_url), ("action_url", &action_url)],
    )
}

pub fn welcome_email(base_url: &str) -> Result<EmailContent, EmailError> {
    EmailContent::render(
        "Welcome to the Goo newsletter",
        "welcome_email",
        &[("base_url", base_url)],
    )
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use goo_email::{Email, EmailError};
use goo_job_queue::{
    async_trait, CancellationToken, HandlerRegistry, JobContext, JobError, JobHandler,
    MemoryQueue, Message, Queue, Runner, RunnerConfig,
};
use goo_jobs::{
    register_all, ConfirmationEmailJob, ConfirmationEmailSender, WelcomeEmailJob,
    WelcomeEmailSender, CONFIRMATION_EMAIL, WELCOME_EMAIL,
};

#[derive(Default)]
struct MockSender {
    fail: bool,
    confirmations: Mutex<Vec<(String, String)>>,
    welcomes: Mutex<Vec<String>>,
    shutdown: Option<CancellationToken>,
}

impl MockSender {
    fn done(&self) {
        if let Some(token) = &self.shutdown {
            token.cancel();
        }
    }
}

#[async_trait]
impl ConfirmationEmailSender for MockSender {
    async fn send_newsletter_confirmation_email(
        &self,
        to: &Email,
        token: &str,
    ) -> Result<(), EmailError> {
        if self.fail {
            return Err(EmailError::TemplateMissing("confirmation_email.html".into()));
        }
        self.confirmations
            .lock()
            .unwrap()
            .push((to.to_string(), token.to_string()));
        self.done();
        Ok(())
    }
}

#[async_trait]
impl WelcomeEmailSender for MockSender {
    async fn send_newsletter_welcome_email(&self, to: &Email) -> Result<(), EmailError> {
        self.welcomes.lock().unwrap().push(to.to_string());
        self.done();
        Ok(())
    }
}

fn ctx(name: &str) -> JobContext {
    JobContext::new(name, Duration::from_secs(1))
}

#[tokio::test]
async fn confirmation_email_job_sends_to_recipient_with_token() {
    let sender = Arc::new(MockSender::default());
    let job = ConfirmationEmailJob::new(sender.clone());

    let message = Message::for_job(CONFIRMATION_EMAIL)
        .with("email", "me@example.com")
        .with("token", "123");
    job.handle(ctx(CONFIRMATION_EMAIL), message).await.unwrap();

    assert_eq!(
        *sender.confirmations.lock().unwrap(),
        vec![("me@example.com".to_string(), "123".to_string())]
    );
}

#[tokio::test]
async fn confirmation_email_job_requires_email_and_token() {
    let sender = Arc::new(MockSender::default());
    let job = ConfirmationEmailJob::new(sender.clone());

    let err = job
        .handle(ctx(CONFIRMATION_EMAIL), Message::for_job(CONFIRMATION_EMAIL).with("token", "123"))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::MissingField(field) if field == "email"));

    let err = job
        .handle(
            ctx(CONFIRMATION_EMAIL),
            Message::for_job(CONFIRMATION_EMAIL).with("email", "me@example.com"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "no token in message");
    assert!(sender.confirmations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn confirmation_email_job_rejects_invalid_address() {
    let job = ConfirmationEmailJob::new(Arc::new(MockSender::default()));
    let message = Message::for_job(CONFIRMATION_EMAIL)
        .with("email", "@example.com")
        .with("token", "123");

    let err = job.handle(ctx(CONFIRMATION_EMAIL), message).await.unwrap_err();
    assert!(matches!(err, JobError::InvalidPayload(_)));
}

#[tokio::test]
async fn sender_errors_fail_the_job() {
    let sender = Arc::new(MockSender {
        fail: true,
        ..MockSender::default()
    });
    let job = ConfirmationEmailJob::new(sender);
    let message = Message::for_job(CONFIRMATION_EMAIL)
        .with("email", "me@example.com")
        .with("token", "123");

    let err = job.handle(ctx(CONFIRMATION_EMAIL), message).await.unwrap_err();
    assert!(matches!(err, JobError::Execution(_)));
}

#[tokio::test]
async fn welcome_email_job_sends_to_recipient() {
    let sender = Arc::new(MockSender::default());
    let job = WelcomeEmailJob::new(sender.clone());

    let err = job
        .handle(ctx(WELCOME_EMAIL), Message::for_job(WELCOME_EMAIL))
        .await
        .unwrap_err();
    assert!(matches!(err, JobError::MissingField(_)));

    job.handle(
        ctx(WELCOME_EMAIL),
        Message::for_job(WELCOME_EMAIL).with("email", "me@example.com"),
    )
    .await
    .unwrap();
    assert_eq!(*sender.welcomes.lock().unwrap(), vec!["me@example.com"]);
}

#[tokio::test]
async fn registered_jobs_run_from_the_queue() {
    let shutdown = CancellationToken::new();
    let sender = Arc::new(MockSender {
        shutdown: Some(shutdown.clone()),
        ..MockSender::default()
    });

    let mut registry = HandlerRegistry::new();
    register_all(&mut registry, sender.clone());
    assert_eq!(registry.names(), vec![CONFIRMATION_EMAIL, WELCOME_EMAIL]);

    let queue = Arc::new(MemoryQueue::new(
        Duration::from_millis(20),
        Duration::from_secs(60),
    ));
    queue
        .send(
            &Message::for_job(CONFIRMATION_EMAIL)
                .with("email", "me@example.com")
                .with("token", "abc"),
        )
        .await
        .unwrap();

    let runner = Runner::new(
        queue.clone(),
        registry,
        RunnerConfig::default(),
        &prometheus::Registry::new(),
    )
    .unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner.start(shutdown))
        .await
        .expect("runner stops once the email is sent");

    assert_eq!(sender.confirmations.lock().unwrap().len(), 1);
    assert!(queue.is_empty().await);
}

//! Job handlers and the registry that maps job names to them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use crate::error::JobError;
use crate::types::Message;

/// Execution context handed to a job handler.
///
/// The deadline is fixed when the job is dispatched and is unrelated to the
/// runner's own shutdown signal, so a job that started before shutdown keeps
/// its full time budget.
#[derive(Debug, Clone)]
pub struct JobContext {
    name: String,
    deadline: Instant,
}

impl JobContext {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            deadline: Instant::now() + timeout,
        }
    }

    /// The job type being executed.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the runner gives up on this job.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Completes when the deadline has passed.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.deadline).await;
    }
}

/// Trait for implementing job handlers.
///
/// Handlers must tolerate running more than once for the same message: a
/// message is only removed from the queue after its handler succeeded, and a
/// crash in between leads to redelivery.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, ctx: JobContext, message: Message) -> Result<(), JobError>;
}

/// Adapter turning an async closure into a [`JobHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext, Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    async fn handle(&self, ctx: JobContext, message: Message) -> Result<(), JobError> {
        (self.0)(ctx, message).await
    }
}

/// Mapping from job name to handler.
///
/// Filled once at startup and handed to the runner, which owns it from then on.
/// Registering a name twice replaces the earlier handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an async closure for the given job name.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(JobContext, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.register_handler(name, FnHandler(f));
    }

    /// Register a handler value for the given job name.
    pub fn register_handler<H: JobHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        let name = name.into();
        if self.handlers.insert(name.clone(), Arc::new(handler)).is_some() {
            warn!(name = %name, "replacing previously registered job handler");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered job names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

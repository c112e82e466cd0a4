//! The job runner: a single poll loop dispatching queue messages to handlers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use prometheus::Registry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::JobError;
use crate::handler::{HandlerRegistry, JobContext, JobHandler};
use crate::metrics::RunnerMetrics;
use crate::queue::Queue;
use crate::types::{Delivery, Message};

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Tunables for [`Runner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time budget for a single job, counted from dispatch.
    pub job_timeout: Duration,
    /// Pause after a failed receive before polling again.
    pub error_backoff: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            job_timeout: DEFAULT_JOB_TIMEOUT,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

/// Pulls messages off a [`Queue`] and runs the handler registered for each
/// message's job type, one message at a time.
///
/// A message is deleted from the queue only after its handler succeeded.
/// Failed, timed out and unknown jobs are left for the queue to redeliver.
pub struct Runner {
    queue: Arc<dyn Queue>,
    registry: HandlerRegistry,
    config: RunnerConfig,
    metrics: RunnerMetrics,
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// Build a runner owning `registry`; its metrics are registered on `metrics_registry`.
    pub fn new(
        queue: Arc<dyn Queue>,
        registry: HandlerRegistry,
        config: RunnerConfig,
        metrics_registry: &Registry,
    ) -> Result<Self, prometheus::Error> {
        Ok(Self {
            queue,
            registry,
            config,
            metrics: RunnerMetrics::register(metrics_registry)?,
        })
    }

    /// Register an async closure for a job name. Only possible before `start`.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(JobContext, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), JobError>> + Send + 'static,
    {
        self.registry.register(name, f);
    }

    pub fn register_handler<H: JobHandler + 'static>(&mut self, name: impl Into<String>, handler: H) {
        self.registry.register_handler(name, handler);
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn metrics(&self) -> &RunnerMetrics {
        &self.metrics
    }

    pub fn config(&self) -> RunnerConfig {
        self.config
    }

    /// Run the poll loop until `shutdown` is cancelled.
    ///
    /// Cancellation is checked between iterations. A job that is already
    /// running is never interrupted by it; `start` returns after that job
    /// finished or hit its own timeout.
    pub async fn start(&self, shutdown: CancellationToken) {
        info!(jobs = ?self.registry.names(), "Starting");

        while !shutdown.is_cancelled() {
            let delivery = match self.queue.receive(&shutdown).await {
                Ok(delivery) => {
                    self.metrics.record_receive(true);
                    delivery
                }
                Err(error) => {
                    self.metrics.record_receive(false);
                    error!(%error, "Error receiving message");
                    self.back_off(&shutdown).await;
                    continue;
                }
            };

            if let Some(delivery) = delivery {
                self.dispatch(delivery).await;
            }
        }

        info!("Stopping");
    }

    async fn dispatch(&self, delivery: Delivery) {
        let Delivery { message, receipt } = delivery;

        let Some(name) = message.job().map(str::to_owned) else {
            warn!(receipt = %receipt, "Message has no job name");
            return;
        };
        let Some(handler) = self.registry.get(&name) else {
            warn!(name = %name, "No job with this name");
            return;
        };

        let started = Instant::now();
        let outcome = self.execute(&name, handler, message).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                self.metrics.record_job(&name, true, elapsed);
                info!(name = %name, duration = ?elapsed, "Successfully ran job");

                if let Err(error) = self.queue.delete(&receipt).await {
                    error!(name = %name, %error, "Error deleting message");
                }
            }
            Err(error) => {
                self.metrics.record_job(&name, false, elapsed);
                error!(name = %name, duration = ?elapsed, %error, "Error running job");
            }
        }
    }

    /// Run one handler on its own task with a fresh deadline.
    async fn execute(
        &self,
        name: &str,
        handler: Arc<dyn JobHandler>,
        message: Message,
    ) -> Result<(), JobError> {
        let timeout = self.config.job_timeout;
        let ctx = JobContext::new(name, timeout);
        debug!(name, ?timeout, "dispatching job");

        let task = tokio::spawn(
            async move { tokio::time::timeout(timeout, handler.handle(ctx, message)).await }
                .instrument(info_span!("job", name)),
        );

        match task.await {
            Ok(Ok(result)) => result,
            Ok(Err(_elapsed)) => Err(JobError::Timeout(timeout)),
            Err(join_error) => Err(JobError::Panicked(join_error.to_string())),
        }
    }

    async fn back_off(&self, shutdown: &CancellationToken) {
        tokio::select! {
            _ = shutdown.cancelled() => {}
            _ = tokio::time::sleep(self.config.error_backoff) => {}
        }
    }
}

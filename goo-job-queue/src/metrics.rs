//! Prometheus series recorded by the runner.

use std::time::Duration;

use prometheus::{CounterVec, IntCounterVec, Opts, Registry};

/// Counters for queue receives and job outcomes.
#[derive(Debug, Clone)]
pub struct RunnerMetrics {
    pub receives: IntCounterVec,
    pub jobs: IntCounterVec,
    pub job_duration: CounterVec,
}

impl RunnerMetrics {
    /// Create the runner series and register them on `registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let receives = IntCounterVec::new(
            Opts::new(
                "app_job_runner_receives_total",
                "Number of queue receive attempts by outcome.",
            ),
            &["success"],
        )?;
        let jobs = IntCounterVec::new(
            Opts::new("app_jobs_total", "Number of dispatched jobs by name and outcome."),
            &["name", "success"],
        )?;
        let job_duration = CounterVec::new(
            Opts::new(
                "app_job_duration_seconds_total",
                "Total seconds spent running jobs by name and outcome.",
            ),
            &["name", "success"],
        )?;

        registry.register(Box::new(receives.clone()))?;
        registry.register(Box::new(jobs.clone()))?;
        registry.register(Box::new(job_duration.clone()))?;

        Ok(Self {
            receives,
            jobs,
            job_duration,
        })
    }

    pub fn record_receive(&self, success: bool) {
        self.receives.with_label_values(&[label(success)]).inc();
    }

    pub fn record_job(&self, name: &str, success: bool, elapsed: Duration) {
        let labels = [name, label(success)];
        self.jobs.with_label_values(&labels).inc();
        self.job_duration
            .with_label_values(&labels)
            .inc_by(elapsed.as_secs_f64());
    }
}

#[inline]
fn label(success: bool) -> &'static str {
    if success {
        "true"
    } else {
        "false"
    }
}

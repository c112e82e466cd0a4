use std::sync::Arc;

use goo_db::Database;
use goo_job_queue::Queue;
use prometheus::Registry;

use crate::metrics::HttpMetrics;

/// Shared application state passed to every route handler.
pub struct AppState {
    pub db: Database,
    pub queue: Arc<dyn Queue>,
    pub registry: Registry,
    pub http_metrics: HttpMetrics,
    admin_password: Option<String>,
    metrics_password: Option<String>,
}

impl AppState {
    /// Build the state and register the HTTP and connection pool series on `registry`.
    pub fn new(
        db: Database,
        queue: Arc<dyn Queue>,
        registry: Registry,
    ) -> Result<Self, prometheus::Error> {
        let http_metrics = HttpMetrics::register(&registry)?;
        db.register_metrics(&registry)?;
        Ok(Self {
            db,
            queue,
            registry,
            http_metrics,
            admin_password: None,
            metrics_password: None,
        })
    }

    pub fn with_admin_password(mut self, password: Option<String>) -> Self {
        self.admin_password = password;
        self
    }

    pub fn with_metrics_password(mut self, password: Option<String>) -> Self {
        self.metrics_password = password;
        self
    }

    pub fn admin_password(&self) -> Option<&str> {
        self.admin_password.as_deref()
    }

    pub fn metrics_password(&self) -> Option<&str> {
        self.metrics_password.as_deref()
    }
}

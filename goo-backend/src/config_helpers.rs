//! Translate [`goo_config::Config`] into the settings of each component.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use goo_config::Config;
use goo_db::{DbConnectionConfig, DbPool, DbQueue, DbQueueConfig};
use goo_email::{EmailerConfig, SenderConfig};
use goo_job_queue::{MemoryQueue, Queue, RunnerConfig};

/// Build database connection config from application config.
pub fn database_config_from_config(cfg: &Config) -> DbConnectionConfig {
    DbConnectionConfig {
        url: cfg.database.connection_url(),
        max_connections: cfg.database.max_connections,
        min_connections: cfg.database.min_connections,
        ..DbConnectionConfig::default()
    }
}

pub fn emailer_config_from_config(cfg: &Config) -> EmailerConfig {
    let email = &cfg.email;
    EmailerConfig {
        base_url: cfg.server.base_url(),
        host: email.host.clone(),
        port: email.port,
        transactional: SenderConfig {
            username: email.transactional_username.clone(),
            password: email.transactional_password.clone(),
            email_address: email.transactional_email.clone(),
            email_name: email.transactional_name.clone(),
        },
        marketing: SenderConfig {
            username: email.marketing_username.clone(),
            password: email.marketing_password.clone(),
            email_address: email.marketing_email.clone(),
            email_name: email.marketing_name.clone(),
        },
        ..EmailerConfig::default()
    }
}

pub fn runner_config_from_config(cfg: &Config) -> RunnerConfig {
    RunnerConfig {
        job_timeout: Duration::from_secs(cfg.jobs.timeout_secs),
        error_backoff: Duration::from_millis(cfg.jobs.error_backoff_ms),
    }
}

/// The configured queue: the `jobs` table, or an in-process queue for `memory`.
pub fn build_queue(cfg: &Config, pool: DbPool) -> Arc<dyn Queue> {
    let wait_time = Duration::from_secs(cfg.queue.wait_time_secs);
    let visibility_timeout = Duration::from_secs(cfg.queue.visibility_timeout_secs);

    match cfg.queue.backend.as_str() {
        "memory" => {
            tracing::warn!("Using in-memory job queue, queued jobs are lost on restart");
            Arc::new(MemoryQueue::new(wait_time, visibility_timeout))
        }
        _ => Arc::new(DbQueue::new(
            pool,
            DbQueueConfig {
                wait_time,
                visibility_timeout,
                poll_interval: Duration::from_millis(cfg.queue.poll_interval_ms),
            },
        )),
    }
}

/// Parse host:port into a SocketAddr, with fallback to 0.0.0.0.
pub fn parse_bind_address(host: &str, port: u16) -> SocketAddr {
    host.parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, port))
        .or_else(|_| host.parse::<SocketAddr>())
        .or_else(|_| {
            host.trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<Ipv6Addr>()
                .map(|ip| SocketAddr::new(IpAddr::V6(ip), port))
        })
        .unwrap_or_else(|_| {
            if host != "localhost" {
                tracing::warn!(%host, "Unparseable bind host, listening on all interfaces");
            }
            SocketAddr::from(([0, 0, 0, 0], port))
        })
}

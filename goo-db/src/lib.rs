//! Database access for the Goo newsletter service: connection pool,
//! newsletter signups, migrations and the database-backed job queue.

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("Enable exactly one of the `postgres` or `sqlite` features for goo-db.");

#[cfg(all(feature = "postgres", feature = "sqlite"))]
compile_error!("Activate only one backend feature (`postgres` or `sqlite`) for goo-db.");

#[cfg(feature = "postgres")]
pub type DbBackend = sqlx::Postgres;
#[cfg(feature = "sqlite")]
pub type DbBackend = sqlx::Sqlite;

pub mod config;
mod database;
pub mod error;
mod metrics;
mod newsletter;
pub mod pool;
mod queue;
pub mod utils;

pub use config::DbConnectionConfig;
pub use database::{migrator, Database};
pub use error::{DbConnectionError, DbError};
pub use metrics::PoolCollector;
pub use newsletter::{create_secret, Subscriber};
pub use pool::{create_pool, DbPool};
pub use queue::{DbQueue, DbQueueConfig, DEFAULT_POLL_INTERVAL};

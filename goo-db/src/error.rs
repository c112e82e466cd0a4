use std::time::Duration;

use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Errors that can occur while configuring or creating the database pool.
#[derive(Debug, Error)]
pub enum DbConnectionError {
    #[error("database url cannot be empty")]
    EmptyDatabaseUrl,
    #[error("file/directory creation error: {0}")]
    FileCreation(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] MigrateError),
    #[error("unknown migration version {0}")]
    UnknownVersion(i64),
    #[error("database did not answer within {0:?}")]
    Timeout(Duration),
}

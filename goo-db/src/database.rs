use std::collections::HashSet;
use std::time::Duration;

use sqlx::migrate::{Migrate, Migrator};
use tracing::{debug, info};

use crate::error::DbError;
use crate::pool::DbPool;

const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Migrations for the compiled-in backend.
pub fn migrator() -> &'static Migrator {
    #[cfg(feature = "postgres")]
    return goo_migrations::postgres_migrator();
    #[cfg(feature = "sqlite")]
    return goo_migrations::sqlite_migrator();
}

/// Newsletter storage on top of a connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pub(crate) pool: DbPool,
}

impl Database {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check that the database answers queries.
    pub async fn ping(&self) -> Result<(), DbError> {
        tokio::time::timeout(PING_TIMEOUT, async {
            let mut conn = self.pool.acquire().await?;
            sqlx::Connection::ping(&mut *conn).await?;
            sqlx::query("select 1").execute(&mut *conn).await?;
            Ok::<_, DbError>(())
        })
        .await
        .map_err(|_| DbError::Timeout(PING_TIMEOUT))?
    }

    /// Apply every pending migration.
    pub async fn migrate_up(&self) -> Result<(), DbError> {
        info!("Migrating database up");
        migrator().run(&self.pool).await?;
        Ok(())
    }

    /// Revert every applied migration.
    pub async fn migrate_down(&self) -> Result<(), DbError> {
        info!("Migrating database down");
        migrator().undo(&self.pool, 0).await?;
        Ok(())
    }

    /// Migrate up or down until `version` is the latest applied migration.
    /// Version 0 reverts everything.
    pub async fn migrate_to(&self, version: i64) -> Result<(), DbError> {
        let migrator = migrator();
        if version != 0 && !migrator.iter().any(|m| m.version == version) {
            return Err(DbError::UnknownVersion(version));
        }

        let current = self.migration_version().await?;
        info!(from = current, to = version, "Migrating database");
        if version < current {
            migrator.undo(&self.pool, version).await?;
            return Ok(());
        }

        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        let applied: HashSet<i64> = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();

        for migration in migrator
            .iter()
            .filter(|m| m.migration_type.is_up_migration() && m.version <= version)
            .filter(|m| !applied.contains(&m.version))
        {
            debug!(version = migration.version, description = %migration.description, "Applying migration");
            conn.apply(migration).await?;
        }
        Ok(())
    }

    /// Latest applied migration version, 0 when none.
    pub async fn migration_version(&self) -> Result<i64, DbError> {
        let mut conn = self.pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        let version = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.version)
            .max()
            .unwrap_or(0);
        Ok(version)
    }
}

use sqlx::migrate::Migrator;

pub static SQLITE_MIGRATOR: Migrator = sqlx_macros::migrate!("src/migrations_sqlite");
pub static POSTGRES_MIGRATOR: Migrator = sqlx_macros::migrate!("src/migrations_postgres");

pub fn sqlite_migrator() -> &'static Migrator {
    &SQLITE_MIGRATOR
}

pub fn postgres_migrator() -> &'static Migrator {
    &POSTGRES_MIGRATOR
}

/// Highest version known to both migrators.
pub fn latest_version() -> i64 {
    SQLITE_MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .max()
        .unwrap_or(0)
}

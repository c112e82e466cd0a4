#![cfg(feature = "sqlite")]

use goo_db::{create_pool, Database, DbConnectionConfig, DbError};
use goo_email::Email;

async fn migrated_db() -> Database {
    let pool = create_pool(&DbConnectionConfig::in_memory()).await.unwrap();
    let db = Database::new(pool);
    db.migrate_up().await.unwrap();
    db
}

#[tokio::test]
async fn ping_succeeds_on_open_database() {
    let db = migrated_db().await;
    db.ping().await.unwrap();
}

#[tokio::test]
async fn signup_stores_email_and_token() {
    let db = migrated_db().await;
    let email = Email::new("me@example.com");

    let token = db.signup_for_newsletter(&email).await.unwrap();
    assert_eq!(token.len(), 64);

    let subscriber = db.get_subscriber(&email).await.unwrap().unwrap();
    assert_eq!(subscriber.email, "me@example.com");
    assert_eq!(subscriber.token, token);
    assert!(!subscriber.confirmed);
}

#[tokio::test]
async fn signing_up_again_replaces_token_and_resets_confirmation() {
    let db = migrated_db().await;
    let email = Email::new("me@example.com");

    let first = db.signup_for_newsletter(&email).await.unwrap();
    db.confirm_newsletter_signup(&first).await.unwrap().unwrap();

    let second = db.signup_for_newsletter(&email).await.unwrap();
    assert_ne!(first, second);

    let subscriber = db.get_subscriber(&email).await.unwrap().unwrap();
    assert_eq!(subscriber.token, second);
    assert!(!subscriber.confirmed);

    let count: i64 = sqlx::query_scalar("select count(*) from newsletter_subscribers")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn confirm_marks_signup_and_returns_email() {
    let db = migrated_db().await;
    let email = Email::new("me@example.com");
    let token = db.signup_for_newsletter(&email).await.unwrap();

    let confirmed = db.confirm_newsletter_signup(&token).await.unwrap();
    assert_eq!(confirmed, Some(email.clone()));
    assert!(db.get_subscriber(&email).await.unwrap().unwrap().confirmed);
}

#[tokio::test]
async fn confirm_with_unknown_token_returns_none() {
    let db = migrated_db().await;
    assert_eq!(db.confirm_newsletter_signup("nope").await.unwrap(), None);
    assert!(db
        .get_subscriber(&Email::new("nobody@example.com"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn migrate_to_moves_between_versions() {
    let pool = create_pool(&DbConnectionConfig::in_memory()).await.unwrap();
    let db = Database::new(pool);

    db.migrate_to(1).await.unwrap();
    assert_eq!(db.migration_version().await.unwrap(), 1);
    assert!(sqlx::query("select count(*) from jobs")
        .execute(db.pool())
        .await
        .is_err());

    db.migrate_to(2).await.unwrap();
    assert_eq!(db.migration_version().await.unwrap(), 2);

    db.migrate_to(1).await.unwrap();
    assert_eq!(db.migration_version().await.unwrap(), 1);

    db.migrate_down().await.unwrap();
    assert_eq!(db.migration_version().await.unwrap(), 0);

    db.migrate_up().await.unwrap();
    assert_eq!(db.migration_version().await.unwrap(), 2);
}

#[tokio::test]
async fn migrate_to_unknown_version_fails() {
    let db = migrated_db().await;
    let err = db.migrate_to(99).await.unwrap_err();
    assert!(matches!(err, DbError::UnknownVersion(99)));
}

#[tokio::test]
async fn pool_gauges_are_sampled_on_gather() {
    let db = migrated_db().await;
    let registry = prometheus::Registry::new();
    db.register_metrics(&registry).unwrap();

    let mut text = String::new();
    prometheus::TextEncoder::new()
        .encode_utf8(&registry.gather(), &mut text)
        .unwrap();
    assert!(text.contains("app_db_connections_open 1"), "{text}");
    assert!(text.contains("app_db_connections_idle"));
    assert!(text.contains("app_db_connections_in_use"));

    // The same pool cannot be registered twice on one registry.
    assert!(db.register_metrics(&registry).is_err());
}

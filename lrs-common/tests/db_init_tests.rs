//! Tests for database initialization and migrations

use lrs_common::db::init::{init_database, init_memory_database};
use lrs_common::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};

async fn table_exists(pool: &sqlx::SqlitePool, name: &str) -> bool {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name = ?)")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sub").join("lrs.db");

    let pool = init_database(&db_path).await;

    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lrs.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());
}

#[tokio::test]
async fn test_all_tables_created() {
    let pool = init_memory_database().await.unwrap();

    for table in [
        "schema_version",
        "settings",
        "courses",
        "statements",
        "progress",
        "verb_configuration",
        "verb_usage",
    ] {
        assert!(table_exists(&pool, table).await, "missing table {}", table);
    }
}

#[tokio::test]
async fn test_schema_version_is_current() {
    let pool = init_memory_database().await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_reinitialization_keeps_settings() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lrs.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = '40' WHERE key = 'progress_calibration_statements'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: String = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'progress_calibration_statements'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(value, "40");
}

#[tokio::test]
async fn test_null_setting_reset_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("lrs.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'active_time_idle_gap_seconds'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let value: Option<String> = sqlx::query_scalar(
        "SELECT value FROM settings WHERE key = 'active_time_idle_gap_seconds'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(value.as_deref(), Some("300"));
}

#[tokio::test]
async fn test_migration_adds_course_calibration_column() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("legacy.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    // Database as written by a build that predates per-course calibration
    {
        let legacy = sqlx::SqlitePool::connect(&url).await.unwrap();
        sqlx::query(
            "CREATE TABLE courses (course_id TEXT PRIMARY KEY, activity_id TEXT NOT NULL, title TEXT, updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP)",
        )
        .execute(&legacy)
        .await
        .unwrap();
        legacy.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('courses') WHERE name = 'expected_statements'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(has_column, 1);
}

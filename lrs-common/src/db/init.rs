//! Database initialization
//!
//! Creates the database on first run, applies connection pragmas, creates
//! every table idempotently, runs versioned migrations and fills in default
//! settings. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{info, warn};

/// Settings keys and their built-in defaults
pub mod setting_keys {
    /// Statement count treated as a "typical full course"
    pub const PROGRESS_CALIBRATION_STATEMENTS: &str = "progress_calibration_statements";
    /// Highest percentage an unfinished course can report
    pub const PROGRESS_IN_PROGRESS_CAP_PERCENT: &str = "progress_in_progress_cap_percent";
    /// Gaps longer than this are idle time
    pub const ACTIVE_TIME_IDLE_GAP_SECONDS: &str = "active_time_idle_gap_seconds";
    pub const STORE_RETRY_MAX_ATTEMPTS: &str = "store_retry_max_attempts";
    pub const STORE_RETRY_INITIAL_BACKOFF_MS: &str = "store_retry_initial_backoff_ms";
    pub const STORE_RETRY_MAX_BACKOFF_MS: &str = "store_retry_max_backoff_ms";

    pub const DEFAULTS: &[(&str, &str)] = &[
        (PROGRESS_CALIBRATION_STATEMENTS, "80"),
        (PROGRESS_IN_PROGRESS_CAP_PERCENT, "95"),
        (ACTIVE_TIME_IDLE_GAP_SECONDS, "300"),
        (STORE_RETRY_MAX_ATTEMPTS, "5"),
        (STORE_RETRY_INITIAL_BACKOFF_MS, "10"),
        (STORE_RETRY_MAX_BACKOFF_MS, "1000"),
    ];
}

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers with one writer: ingestion writes while
    // background materializations read statement history
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database
///
/// Limited to a single connection that is never recycled, since each
/// SQLite in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // Table creation is idempotent - safe to call multiple times
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_courses_table(pool).await?;
    create_statements_table(pool).await?;
    create_progress_table(pool).await?;
    create_verb_configuration_table(pool).await?;
    create_verb_usage_table(pool).await?;

    crate::db::migrations::run_migrations(pool).await?;

    init_default_settings(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime tuning as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the courses table
///
/// Written by the course catalog; the learning-record engine only reads it.
/// `expected_statements` overrides the global progress calibration.
pub async fn create_courses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS courses (
            course_id TEXT PRIMARY KEY,
            activity_id TEXT NOT NULL,
            title TEXT,
            expected_statements INTEGER,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (expected_statements IS NULL OR expected_statements > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_courses_activity ON courses(activity_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the statements table
///
/// Append-only. `partition_key` is a bounded hash prefix of `actor_key`;
/// `verb_id`, `activity_id` and `registration` are denormalized out of the
/// payload for server-side filtering.
pub async fn create_statements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statements (
            id TEXT PRIMARY KEY,
            partition_key TEXT NOT NULL,
            actor_key TEXT NOT NULL,
            verb_id TEXT NOT NULL,
            activity_id TEXT NOT NULL,
            registration TEXT,
            timestamp TEXT NOT NULL,
            stored TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            result_json TEXT,
            payload TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_statements_actor ON statements(partition_key, actor_key, timestamp)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_statements_verb ON statements(verb_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_statements_activity ON statements(activity_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the progress table
///
/// One row per (actor, course), overwritten whole on every materialization.
pub async fn create_progress_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress (
            actor_key TEXT NOT NULL,
            course_id TEXT NOT NULL,
            completion_status TEXT NOT NULL CHECK (completion_status IN ('not_started', 'in_progress', 'completed', 'passed', 'failed')),
            score INTEGER,
            time_spent_seconds INTEGER NOT NULL DEFAULT 0,
            progress_percent INTEGER NOT NULL DEFAULT 0,
            started_at TEXT,
            completed_at TEXT,
            statement_count INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (actor_key, course_id),
            CHECK (score IS NULL OR (score >= 0 AND score <= 100)),
            CHECK (time_spent_seconds >= 0),
            CHECK (progress_percent >= 0 AND progress_percent <= 100)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the verb_configuration table (administrator overrides)
pub async fn create_verb_configuration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verb_configuration (
            verb_id TEXT PRIMARY KEY,
            category TEXT NOT NULL,
            action TEXT NOT NULL,
            description TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the verb_usage table (monitoring counters only)
pub async fn create_verb_usage_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS verb_usage (
            verb_id TEXT PRIMARY KEY,
            statement_count INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or repair default settings
///
/// Missing settings are created; settings holding NULL are reset.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    for (key, default_value) in setting_keys::DEFAULTS {
        ensure_setting(pool, key, default_value).await?;
    }
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}

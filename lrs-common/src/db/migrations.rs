//! Database schema migrations
//!
//! Versioned, idempotent schema changes tracked in the `schema_version`
//! table. Tables are created in `init` with their current shape; migrations
//! bring databases created by older builds up to that shape.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for older databases
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before altering** - every migration must be a no-op on a current schema

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: per-course progress calibration
///
/// Adds `courses.expected_statements` to databases created before courses
/// could override the global calibration constant.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('courses') WHERE name = 'expected_statements'",
    )
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        return Ok(());
    }

    match sqlx::query("ALTER TABLE courses ADD COLUMN expected_statements INTEGER")
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  ✓ Added expected_statements column to courses table");
            Ok(())
        }
        // Another process migrated concurrently
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Migration v2: registration filter index
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_statements_registration ON statements(registration)",
    )
    .execute(pool)
    .await?;

    info!("  ✓ Ensured idx_statements_registration");
    Ok(())
}

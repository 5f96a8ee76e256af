//! Progress store
//!
//! One row per (actor, course). Every write replaces the whole row, so a
//! reader sees either the previous record or the new one.

use sqlx::{Row, SqlitePool};

use lrs_common::{time, Error, Result};

use super::statements::parse_stored_time;
use crate::models::{CompletionStatus, Progress};

/// Overwrite the progress record of one (actor, course) pair
pub async fn put(pool: &SqlitePool, progress: &Progress) -> Result<()> {
    let score = progress.score.map(i64::from);
    let time_spent = i64::try_from(progress.time_spent_seconds)
        .map_err(|_| Error::Internal("time_spent_seconds out of range".to_string()))?;
    let statement_count = i64::try_from(progress.statement_count)
        .map_err(|_| Error::Internal("statement_count out of range".to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO progress (
            actor_key, course_id, completion_status, score, time_spent_seconds,
            progress_percent, started_at, completed_at, statement_count, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(actor_key, course_id) DO UPDATE SET
            completion_status = excluded.completion_status,
            score = excluded.score,
            time_spent_seconds = excluded.time_spent_seconds,
            progress_percent = excluded.progress_percent,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            statement_count = excluded.statement_count,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&progress.actor_key)
    .bind(&progress.course_id)
    .bind(progress.completion_status.as_str())
    .bind(score)
    .bind(time_spent)
    .bind(i64::from(progress.progress_percent))
    .bind(progress.started_at.as_ref().map(time::to_storage_string))
    .bind(progress.completed_at.as_ref().map(time::to_storage_string))
    .bind(statement_count)
    .bind(time::to_storage_string(&time::now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Current record for one (actor, course) pair
pub async fn get(pool: &SqlitePool, actor_key: &str, course_id: &str) -> Result<Option<Progress>> {
    let row = sqlx::query(
        r#"
        SELECT actor_key, course_id, completion_status, score, time_spent_seconds,
               progress_percent, started_at, completed_at, statement_count
        FROM progress
        WHERE actor_key = ? AND course_id = ?
        "#,
    )
    .bind(actor_key)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| progress_from_row(&row)).transpose()
}

/// Every record of one learner, ordered by course id
pub async fn list_for_actor(pool: &SqlitePool, actor_key: &str) -> Result<Vec<Progress>> {
    let rows = sqlx::query(
        r#"
        SELECT actor_key, course_id, completion_status, score, time_spent_seconds,
               progress_percent, started_at, completed_at, statement_count
        FROM progress
        WHERE actor_key = ?
        ORDER BY course_id
        "#,
    )
    .bind(actor_key)
    .fetch_all(pool)
    .await?;

    rows.iter().map(progress_from_row).collect()
}

fn progress_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Progress> {
    let status: String = row.get("completion_status");
    let score: Option<i64> = row.get("score");
    let time_spent: i64 = row.get("time_spent_seconds");
    let percent: i64 = row.get("progress_percent");
    let started_at: Option<String> = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");
    let statement_count: i64 = row.get("statement_count");

    Ok(Progress {
        actor_key: row.get("actor_key"),
        course_id: row.get("course_id"),
        completion_status: status.parse::<CompletionStatus>()?,
        score: score.map(|s| s.clamp(0, 100) as u8),
        time_spent_seconds: time_spent.max(0) as u64,
        progress_percent: percent.clamp(0, 100) as u8,
        started_at: started_at.map(parse_stored_time).transpose()?,
        completed_at: completed_at.map(parse_stored_time).transpose()?,
        statement_count: statement_count.max(0) as u64,
    })
}

//! Statement store
//!
//! Append-only. Rows are keyed by statement id and located per learner via
//! `(partition_key, actor_key, timestamp)`. Appends are idempotent: the same
//! id with the same content hash is a no-op, a different hash is a conflict.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use tracing::warn;

use lrs_common::{hash, time, Error, Result};

use crate::models::{Statement, StatementRecord, StatementResult};

/// Result of appending one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    /// Same id and identical content already stored
    Duplicate,
}

/// Optional narrowing for [`query_by_actor`]
#[derive(Debug, Clone, Default)]
pub struct StatementFilter {
    /// Exact activity id
    pub activity_id: Option<String>,
    /// Course activity id: matches it exactly or any `id/...` below it
    pub course_activity_id: Option<String>,
    pub verb_id: Option<String>,
    pub registration: Option<String>,
    /// Inclusive lower bound on event timestamp
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on event timestamp
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// A stored statement with the full JSON it was stored as
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStatement {
    pub statement: Statement,
    pub payload: Value,
}

/// Append one statement on an existing connection or transaction
///
/// The primary key makes the insert atomic per id; the content hash of an
/// existing row decides between duplicate and conflict.
pub async fn append(conn: &mut SqliteConnection, record: &StatementRecord) -> Result<AppendOutcome> {
    let statement = &record.statement;
    let result_json = statement
        .result
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let payload = serde_json::to_string(&record.payload)?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO statements (
            id, partition_key, actor_key, verb_id, activity_id, registration,
            timestamp, stored, content_hash, result_json, payload
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&statement.id)
    .bind(hash::partition_key(&statement.actor_key))
    .bind(&statement.actor_key)
    .bind(&statement.verb_id)
    .bind(&statement.activity_id)
    .bind(&statement.registration)
    .bind(time::to_storage_string(&statement.timestamp))
    .bind(time::to_storage_string(&statement.stored))
    .bind(&record.content_hash)
    .bind(&result_json)
    .bind(&payload)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted > 0 {
        return Ok(AppendOutcome::Inserted);
    }

    let existing_hash: String = sqlx::query_scalar("SELECT content_hash FROM statements WHERE id = ?")
        .bind(&statement.id)
        .fetch_one(&mut *conn)
        .await?;

    if existing_hash == record.content_hash {
        Ok(AppendOutcome::Duplicate)
    } else {
        warn!(statement_id = %statement.id, "Rejected statement: id reused with different content");
        Err(Error::Conflict(format!(
            "statement {} already exists with different content",
            statement.id
        )))
    }
}

/// Append a batch in one transaction
///
/// All-or-nothing: any conflict rolls back every statement of the batch.
pub async fn append_batch(pool: &SqlitePool, records: &[StatementRecord]) -> Result<Vec<AppendOutcome>> {
    let mut tx = pool.begin().await?;
    let mut outcomes = Vec::with_capacity(records.len());

    for record in records {
        outcomes.push(append(&mut tx, record).await?);
    }

    tx.commit().await?;
    Ok(outcomes)
}

/// Load one statement by id
pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<StoredStatement>> {
    let row = sqlx::query(
        r#"
        SELECT id, actor_key, verb_id, activity_id, registration,
               timestamp, stored, result_json, payload
        FROM statements
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| stored_from_row(&row)).transpose()
}

/// All statements of one learner, oldest first, optionally narrowed
///
/// Ordered by `(timestamp, id)`.
pub async fn query_by_actor(
    pool: &SqlitePool,
    actor_key: &str,
    filter: &StatementFilter,
) -> Result<Vec<StoredStatement>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT id, actor_key, verb_id, activity_id, registration,
               timestamp, stored, result_json, payload
        FROM statements
        WHERE partition_key = "#,
    );
    query.push_bind(hash::partition_key(actor_key));
    query.push(" AND actor_key = ").push_bind(actor_key.to_string());

    if let Some(activity_id) = &filter.activity_id {
        query.push(" AND activity_id = ").push_bind(activity_id.clone());
    }
    if let Some(course_activity_id) = &filter.course_activity_id {
        let prefix = format!("{}/", course_activity_id);
        query
            .push(" AND (activity_id = ")
            .push_bind(course_activity_id.clone())
            .push(" OR substr(activity_id, 1, ")
            .push_bind(prefix.chars().count() as i64)
            .push(") = ")
            .push_bind(prefix)
            .push(")");
    }
    if let Some(verb_id) = &filter.verb_id {
        query.push(" AND verb_id = ").push_bind(verb_id.clone());
    }
    if let Some(registration) = &filter.registration {
        query.push(" AND registration = ").push_bind(registration.clone());
    }
    if let Some(since) = &filter.since {
        query.push(" AND timestamp >= ").push_bind(time::to_storage_string(since));
    }
    if let Some(until) = &filter.until {
        query.push(" AND timestamp < ").push_bind(time::to_storage_string(until));
    }

    query.push(" ORDER BY timestamp ASC, id ASC");

    if let Some(limit) = filter.limit {
        query.push(" LIMIT ").push_bind(i64::from(limit));
    }

    let rows = query.build().fetch_all(pool).await?;
    rows.iter().map(stored_from_row).collect()
}

/// Total number of stored statements
pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statements")
        .fetch_one(pool)
        .await?;
    Ok(total)
}

fn stored_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredStatement> {
    let result_json: Option<String> = row.get("result_json");
    let result: Option<StatementResult> = result_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;

    let payload: String = row.get("payload");

    Ok(StoredStatement {
        statement: Statement {
            id: row.get("id"),
            actor_key: row.get("actor_key"),
            verb_id: row.get("verb_id"),
            activity_id: row.get("activity_id"),
            result,
            registration: row.get("registration"),
            timestamp: parse_stored_time(row.get("timestamp"))?,
            stored: parse_stored_time(row.get("stored"))?,
        },
        payload: serde_json::from_str(&payload)?,
    })
}

pub(crate) fn parse_stored_time(value: String) -> Result<DateTime<Utc>> {
    time::parse_rfc3339(&value)
        .map_err(|e| Error::Internal(format!("Corrupt stored timestamp: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::parse_statement;
    use chrono::TimeZone;
    use lrs_common::db::init_memory_database;
    use serde_json::json;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, minute, 0).unwrap()
    }

    fn record(id: &str, actor: &str, verb: &str, activity: &str, minute: u32) -> StatementRecord {
        parse_statement(
            json!({
                "id": id,
                "actor": {"mbox": format!("mailto:{}", actor)},
                "verb": {"id": format!("http://adlnet.gov/expapi/verbs/{}", verb)},
                "object": {"id": activity},
                "context": {"registration": "reg-1"},
                "timestamp": time::to_storage_string(&at(minute)),
            }),
            at(59),
        )
        .unwrap()
    }

    async fn append_one(pool: &SqlitePool, record: &StatementRecord) -> Result<AppendOutcome> {
        let mut conn = pool.acquire().await?;
        append(&mut conn, record).await
    }

    #[tokio::test]
    async fn test_append_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let first = record("s1", "alice@example.com", "initialized", "course:ABC", 0);

        assert_eq!(append_one(&pool, &first).await.unwrap(), AppendOutcome::Inserted);
        assert_eq!(append_one(&pool, &first).await.unwrap(), AppendOutcome::Duplicate);
        assert_eq!(count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_conflicting_content_is_rejected() {
        let pool = init_memory_database().await.unwrap();
        let original = record("s1", "alice@example.com", "initialized", "course:ABC", 0);
        let altered = record("s1", "alice@example.com", "completed", "course:ABC", 0);

        append_one(&pool, &original).await.unwrap();
        let result = append_one(&pool, &altered).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        let stored = get(&pool, "s1").await.unwrap().unwrap();
        assert!(stored.statement.verb_id.ends_with("initialized"));
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let pool = init_memory_database().await.unwrap();
        append_one(&pool, &record("s1", "alice@example.com", "initialized", "course:ABC", 0))
            .await
            .unwrap();

        let batch = vec![
            record("s2", "alice@example.com", "answered", "course:ABC/q1", 1),
            record("s1", "alice@example.com", "failed", "course:ABC", 0),
        ];
        assert!(append_batch(&pool, &batch).await.is_err());
        assert!(get(&pool, "s2").await.unwrap().is_none());

        let batch = vec![
            record("s2", "alice@example.com", "answered", "course:ABC/q1", 1),
            record("s1", "alice@example.com", "initialized", "course:ABC", 0),
        ];
        let outcomes = append_batch(&pool, &batch).await.unwrap();
        assert_eq!(outcomes, vec![AppendOutcome::Inserted, AppendOutcome::Duplicate]);
    }

    #[tokio::test]
    async fn test_query_by_actor_orders_and_filters() {
        let pool = init_memory_database().await.unwrap();
        let batch = vec![
            record("s3", "alice@example.com", "completed", "course:ABC", 30),
            record("s1", "alice@example.com", "initialized", "course:ABC", 0),
            record("s2", "alice@example.com", "answered", "course:ABC/q1", 10),
            record("s4", "alice@example.com", "answered", "course:ABCD/q1", 15),
            record("s5", "bob@example.com", "answered", "course:ABC/q1", 12),
        ];
        append_batch(&pool, &batch).await.unwrap();

        let all = query_by_actor(&pool, "alice@example.com", &StatementFilter::default())
            .await
            .unwrap();
        let ids: Vec<&str> = all.iter().map(|s| s.statement.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s4", "s3"]);

        let course = StatementFilter {
            course_activity_id: Some("course:ABC".to_string()),
            ..Default::default()
        };
        let ids: Vec<String> = query_by_actor(&pool, "alice@example.com", &course)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.statement.id)
            .collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);

        let answered = StatementFilter {
            verb_id: Some("http://adlnet.gov/expapi/verbs/answered".to_string()),
            since: Some(at(11)),
            ..Default::default()
        };
        let ids: Vec<String> = query_by_actor(&pool, "alice@example.com", &answered)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.statement.id)
            .collect();
        assert_eq!(ids, vec!["s4"]);

        let limited = StatementFilter {
            registration: Some("reg-1".to_string()),
            until: Some(at(30)),
            limit: Some(2),
            ..Default::default()
        };
        let limited = query_by_actor(&pool, "alice@example.com", &limited).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_get_returns_payload_with_assigned_fields() {
        let pool = init_memory_database().await.unwrap();
        let stored = record("s1", "alice@example.com", "initialized", "course:ABC", 0);
        append_one(&pool, &stored).await.unwrap();

        let loaded = get(&pool, "s1").await.unwrap().unwrap();
        assert_eq!(loaded.statement, stored.statement);
        assert_eq!(loaded.payload["id"], json!("s1"));
        assert_eq!(loaded.payload["stored"], json!("2024-05-01T09:59:00.000Z"));
        assert!(get(&pool, "missing").await.unwrap().is_none());
    }
}

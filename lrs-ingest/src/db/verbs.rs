//! Verb configuration and usage counters

use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use lrs_common::{time, Result};

use crate::models::{VerbConfiguration, VerbUsage};

/// All administrator overrides, ordered by verb id
pub async fn list(pool: &SqlitePool) -> Result<Vec<VerbConfiguration>> {
    let rows = sqlx::query(
        "SELECT verb_id, category, action, description FROM verb_configuration ORDER BY verb_id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(configuration_from_row).collect()
}

pub async fn get(pool: &SqlitePool, verb_id: &str) -> Result<Option<VerbConfiguration>> {
    let row = sqlx::query(
        "SELECT verb_id, category, action, description FROM verb_configuration WHERE verb_id = ?",
    )
    .bind(verb_id)
    .fetch_optional(pool)
    .await?;

    row.map(|row| configuration_from_row(&row)).transpose()
}

/// Create or replace an override
pub async fn upsert(pool: &SqlitePool, config: &VerbConfiguration) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO verb_configuration (verb_id, category, action, description, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(verb_id) DO UPDATE SET
            category = excluded.category,
            action = excluded.action,
            description = excluded.description,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&config.verb_id)
    .bind(config.category.as_str())
    .bind(config.action.as_str())
    .bind(&config.description)
    .bind(time::to_storage_string(&time::now()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Remove an override; returns false if none existed
pub async fn delete(pool: &SqlitePool, verb_id: &str) -> Result<bool> {
    let removed = sqlx::query("DELETE FROM verb_configuration WHERE verb_id = ?")
        .bind(verb_id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(removed > 0)
}

/// Count one more statement for a verb
pub async fn record_usage(conn: &mut SqliteConnection, verb_id: &str, seen_at: &DateTime<Utc>) -> Result<()> {
    let seen_at = time::to_storage_string(seen_at);
    sqlx::query(
        r#"
        INSERT INTO verb_usage (verb_id, statement_count, last_seen)
        VALUES (?, 1, ?)
        ON CONFLICT(verb_id) DO UPDATE SET
            statement_count = statement_count + 1,
            last_seen = MAX(last_seen, excluded.last_seen)
        "#,
    )
    .bind(verb_id)
    .bind(&seen_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Usage counters with distinct actor/activity counts, busiest verbs first
pub async fn usage_stats(pool: &SqlitePool) -> Result<Vec<VerbUsage>> {
    let rows = sqlx::query(
        r#"
        SELECT u.verb_id, u.statement_count, u.last_seen,
               (SELECT COUNT(DISTINCT s.actor_key) FROM statements s WHERE s.verb_id = u.verb_id) AS distinct_actors,
               (SELECT COUNT(DISTINCT s.activity_id) FROM statements s WHERE s.verb_id = u.verb_id) AS distinct_activities
        FROM verb_usage u
        ORDER BY u.statement_count DESC, u.verb_id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| VerbUsage {
            verb_id: row.get("verb_id"),
            statement_count: row.get("statement_count"),
            distinct_actors: row.get("distinct_actors"),
            distinct_activities: row.get("distinct_activities"),
            last_seen: row.get("last_seen"),
        })
        .collect())
}

fn configuration_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VerbConfiguration> {
    let category: String = row.get("category");
    let action: String = row.get("action");

    Ok(VerbConfiguration {
        verb_id: row.get("verb_id"),
        category: category.parse()?,
        action: action.parse()?,
        description: row.get("description"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VerbAction, VerbCategory};
    use chrono::TimeZone;
    use lrs_common::db::init_memory_database;

    fn config(verb_id: &str, action: VerbAction) -> VerbConfiguration {
        VerbConfiguration {
            verb_id: verb_id.to_string(),
            category: VerbCategory::Custom,
            action,
            description: Some("test verb".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_get_delete() {
        let pool = init_memory_database().await.unwrap();
        let verb = "https://acme.example/verbs/signed-off";

        upsert(&pool, &config(verb, VerbAction::MarkCompleted)).await.unwrap();
        upsert(&pool, &config(verb, VerbAction::MarkPassed)).await.unwrap();

        let stored = get(&pool, verb).await.unwrap().unwrap();
        assert_eq!(stored.action, VerbAction::MarkPassed);
        assert_eq!(list(&pool).await.unwrap().len(), 1);

        assert!(delete(&pool, verb).await.unwrap());
        assert!(!delete(&pool, verb).await.unwrap());
        assert!(get(&pool, verb).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_usage_counters() {
        let pool = init_memory_database().await.unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();

        let mut conn = pool.acquire().await.unwrap();
        record_usage(&mut conn, "verb:a", &late).await.unwrap();
        record_usage(&mut conn, "verb:a", &early).await.unwrap();
        record_usage(&mut conn, "verb:b", &early).await.unwrap();
        drop(conn);

        let stats = usage_stats(&pool).await.unwrap();
        assert_eq!(stats[0].verb_id, "verb:a");
        assert_eq!(stats[0].statement_count, 2);
        assert_eq!(stats[0].last_seen, time::to_storage_string(&late));
        assert_eq!(stats[0].distinct_actors, 0);
        assert_eq!(stats[1].verb_id, "verb:b");
    }
}

//! Materialization driver
//!
//! Loads what [`materialize`](crate::materializer::materialize) needs from
//! the stores, runs it, and overwrites the progress record. Triggered
//! fire-and-forget after ingestion and synchronously from the admin API.

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use lrs_common::events::LrsEvent;
use lrs_common::retry::retry_transient;
use lrs_common::{time, Result};

use crate::classifier::{VerbClassifier, VerbOverrides};
use crate::config::RuntimeSettings;
use crate::db::{courses, progress, statements, verbs};
use crate::materializer::materialize;
use crate::models::Progress;
use crate::AppState;

/// Recompute and store progress for one (actor, course) pair
///
/// Returns `None`, writing nothing, when the course is unknown or no
/// progress-relevant statement exists.
pub async fn materialize_and_store(
    db: &SqlitePool,
    settings: &RuntimeSettings,
    actor_key: &str,
    course_id: &str,
) -> Result<Option<Progress>> {
    let directory = courses::load_directory(db).await?;
    let Some(course) = directory.get(course_id).cloned() else {
        debug!(course_id = %course_id, "Materialization skipped: course not in directory");
        return Ok(None);
    };

    let classifier = VerbClassifier::new(VerbOverrides::new(verbs::list(db).await?));

    let filter = statements::StatementFilter {
        course_activity_id: Some(course.activity_id.clone()),
        ..Default::default()
    };
    let history: Vec<_> = statements::query_by_actor(db, actor_key, &filter)
        .await?
        .into_iter()
        .map(|stored| stored.statement)
        .collect();

    let Some(record) = materialize(
        actor_key,
        &course,
        &directory,
        &classifier,
        &settings.materializer,
        &history,
    ) else {
        return Ok(None);
    };

    progress::put(db, &record).await?;
    Ok(Some(record))
}

/// Materialize with retries and report the outcome on the event bus
///
/// Failures after retry exhaustion are logged and counted; the previous
/// progress record stays in place.
pub async fn run_materialization(state: &AppState, actor_key: &str, course_id: &str) -> Result<Option<Progress>> {
    let db = &state.db;
    let settings = state.settings.as_ref();
    let result = retry_transient("materialize progress", &settings.store_retry, move || {
        materialize_and_store(db, settings, actor_key, course_id)
    })
    .await;

    match &result {
        Ok(Some(record)) => {
            state.stats.record_materialization_succeeded();
            info!(
                actor_key = %actor_key,
                course_id = %course_id,
                status = %record.completion_status,
                progress_percent = record.progress_percent,
                "Progress materialized"
            );
            state.event_bus.emit_lossy(LrsEvent::ProgressMaterialized {
                actor_key: actor_key.to_string(),
                course_id: course_id.to_string(),
                completion_status: record.completion_status.to_string(),
                progress_percent: record.progress_percent,
                score: record.score,
                timestamp: time::now(),
            });
        }
        Ok(None) => {
            state.stats.record_materialization_skipped();
            debug!(actor_key = %actor_key, course_id = %course_id, "No progress-relevant statements");
            state.event_bus.emit_lossy(LrsEvent::MaterializationSkipped {
                actor_key: actor_key.to_string(),
                course_id: course_id.to_string(),
                timestamp: time::now(),
            });
        }
        Err(e) => {
            state.stats.record_materialization_failed();
            error!(actor_key = %actor_key, course_id = %course_id, "Materialization failed: {}", e);
            state.event_bus.emit_lossy(LrsEvent::MaterializationFailed {
                actor_key: actor_key.to_string(),
                course_id: course_id.to_string(),
                error: e.to_string(),
                timestamp: time::now(),
            });
        }
    }

    result
}

/// Schedule materialization without waiting for it
pub fn spawn_materialization(state: AppState, actor_key: String, course_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        // Outcome is already logged and published
        let _ = run_materialization(&state, &actor_key, &course_id).await;
    })
}

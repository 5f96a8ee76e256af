//! Materialization through the stores
//!
//! Statements go in through ingestion, progress is recomputed with
//! `materialize_and_store` and read back from the progress store.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;

use lrs_common::db::init_memory_database;
use lrs_common::events::{EventBus, LrsEvent};
use lrs_common::retry::RetryPolicy;
use lrs_ingest::config::RuntimeSettings;
use lrs_ingest::db::{courses, progress, verbs};
use lrs_ingest::models::{CompletionStatus, Course, Progress, VerbAction, VerbCategory, VerbConfiguration};
use lrs_ingest::services::{ingest_statements, materialize_and_store, run_materialization};
use lrs_ingest::AppState;

const ALICE: &str = "alice@example.com";

async fn state_with_courses(catalog: &[Course]) -> AppState {
    let db = init_memory_database().await.unwrap();
    for course in catalog {
        courses::upsert_course(&db, course).await.unwrap();
    }
    AppState::new(db, EventBus::new(64), RuntimeSettings::default())
}

fn statement(id: &str, verb: &str, activity: &str, second: u32) -> Value {
    json!({
        "id": id,
        "actor": {"mbox": "mailto:alice@example.com"},
        "verb": {"id": verb},
        "object": {"id": activity},
        "timestamp": format!("2024-05-01T09:{:02}:{:02}Z", second / 60, second % 60)
    })
}

fn adl(name: &str) -> String {
    format!("http://adlnet.gov/expapi/verbs/{}", name)
}

fn course_history() -> Vec<Value> {
    let mut passed = statement("s5", &adl("passed"), "course:ABC/exam", 900);
    passed["result"] = json!({"success": true, "score": {"scaled": 0.9, "raw": 100, "max": 100}});
    vec![
        statement("s1", &adl("launched"), "course:ABC", 0),
        statement("s2", &adl("answered"), "course:ABC/q1", 60),
        statement("s3", &adl("answered"), "course:ABC/q2", 90),
        statement("s4", &adl("completed"), "course:ABC", 500),
        passed,
    ]
}

async fn materialize(state: &AppState, course_id: &str) -> Option<Progress> {
    materialize_and_store(&state.db, &state.settings, ALICE, course_id)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_history_materializes_passed() {
    let state = state_with_courses(&[Course::new("abc", "course:ABC")]).await;
    ingest_statements(&state, Value::Array(course_history())).await.unwrap();

    let record = materialize(&state, "abc").await.unwrap();
    assert_eq!(record.completion_status, CompletionStatus::Passed);
    assert_eq!(record.score, Some(90));
    assert_eq!(record.progress_percent, 100);
    // 60 + 30 counted; 410s and 400s gaps are idle
    assert_eq!(record.time_spent_seconds, 90);
    assert_eq!(record.statement_count, 5);

    let stored = progress::get(&state.db, ALICE, "abc").await.unwrap();
    assert_eq!(stored, Some(record));
}

#[tokio::test]
async fn test_arrival_order_does_not_change_progress() {
    let in_order = state_with_courses(&[Course::new("abc", "course:ABC")]).await;
    for item in course_history() {
        ingest_statements(&in_order, item).await.unwrap();
    }

    let shuffled = state_with_courses(&[Course::new("abc", "course:ABC")]).await;
    let mut history = course_history();
    history.swap(0, 4);
    history.swap(1, 3);
    for item in history {
        ingest_statements(&shuffled, item).await.unwrap();
    }

    let a = materialize(&in_order, "abc").await.unwrap();
    let b = materialize(&shuffled, "abc").await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_replay_and_rematerialize_are_idempotent() {
    let state = state_with_courses(&[Course::new("abc", "course:ABC")]).await;
    ingest_statements(&state, Value::Array(course_history())).await.unwrap();
    let first = materialize(&state, "abc").await.unwrap();

    let replay = ingest_statements(&state, Value::Array(course_history())).await.unwrap();
    assert_eq!(replay.inserted, 0);
    assert_eq!(replay.duplicates, 5);

    let second = materialize(&state, "abc").await.unwrap();
    let third = materialize(&state, "abc").await.unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(second, third);
}

#[tokio::test]
async fn test_unknown_course_writes_nothing() {
    let state = state_with_courses(&[Course::new("abc", "course:ABC")]).await;
    ingest_statements(&state, statement("s1", &adl("initialized"), "course:ABC", 0))
        .await
        .unwrap();

    assert!(materialize(&state, "missing").await.is_none());
    assert!(progress::get(&state.db, ALICE, "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_ingestion_schedules_resolved_pairs_only() {
    let state = state_with_courses(&[
        Course::new("abc", "course:ABC"),
        Course::new("xyz", "course:XYZ"),
    ])
    .await;

    let outcome = ingest_statements(
        &state,
        json!([
            statement("s1", &adl("initialized"), "course:ABC/slide-1", 0),
            statement("s2", &adl("answered"), "course:ABC/slide-2", 10),
            statement("s3", &adl("initialized"), "course:XYZ", 20),
            statement("s4", &adl("initialized"), "course:NOPE", 30),
        ]),
    )
    .await
    .unwrap();

    assert_eq!(outcome.inserted, 4);
    assert_eq!(
        outcome.scheduled,
        vec![
            (ALICE.to_string(), "abc".to_string()),
            (ALICE.to_string(), "xyz".to_string()),
        ]
    );
    assert_eq!(state.stats.snapshot().unresolved, 1);
}

#[tokio::test]
async fn test_course_calibration_and_verb_override() {
    let mut short_course = Course::new("abc", "course:ABC");
    short_course.expected_statements = Some(4);
    let state = state_with_courses(&[short_course]).await;

    let sign_off = "https://acme.example/verbs/signed-off";
    ingest_statements(
        &state,
        json!([
            statement("s1", &adl("launched"), "course:ABC", 0),
            statement("s2", sign_off, "course:ABC", 30),
        ]),
    )
    .await
    .unwrap();

    // Unknown verb is stored but ignored: 1 of 4 expected statements
    let before = materialize(&state, "abc").await.unwrap();
    assert_eq!(before.completion_status, CompletionStatus::InProgress);
    assert_eq!(before.progress_percent, 25);

    verbs::upsert(
        &state.db,
        &VerbConfiguration {
            verb_id: sign_off.to_string(),
            category: VerbCategory::Custom,
            action: VerbAction::MarkCompleted,
            description: None,
        },
    )
    .await
    .unwrap();

    let after = materialize(&state, "abc").await.unwrap();
    assert_eq!(after.completion_status, CompletionStatus::Completed);
    assert_eq!(after.time_spent_seconds, 30);
}

async fn next_event<F>(rx: &mut broadcast::Receiver<LrsEvent>, mut matches: F) -> LrsEvent
where
    F: FnMut(&LrsEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if matches(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not received in time")
}

#[tokio::test]
async fn test_failed_materialization_keeps_previous_record() {
    let db = init_memory_database().await.unwrap();
    courses::upsert_course(&db, &Course::new("abc", "course:ABC")).await.unwrap();
    let settings = RuntimeSettings {
        store_retry: RetryPolicy::no_retry(),
        ..RuntimeSettings::default()
    };
    let state = AppState::new(db, EventBus::new(64), settings);
    let mut rx = state.event_bus.subscribe();

    ingest_statements(
        &state,
        json!([
            statement("s1", &adl("launched"), "course:ABC", 0),
            statement("s2", &adl("answered"), "course:ABC/q1", 45),
        ]),
    )
    .await
    .unwrap();
    next_event(&mut rx, |e| matches!(e, LrsEvent::ProgressMaterialized { .. })).await;

    let before = progress::get(&state.db, ALICE, "abc").await.unwrap().unwrap();
    assert_eq!(before.completion_status, CompletionStatus::InProgress);
    assert_eq!(before.statement_count, 2);

    sqlx::query("UPDATE statements SET timestamp = 'not-a-time' WHERE id = 's2'")
        .execute(&state.db)
        .await
        .unwrap();

    let result = run_materialization(&state, ALICE, "abc").await;
    assert!(result.is_err());
    assert_eq!(state.stats.snapshot().materializations_failed, 1);

    let event = next_event(&mut rx, |e| matches!(e, LrsEvent::MaterializationFailed { .. })).await;
    if let LrsEvent::MaterializationFailed { actor_key, course_id, .. } = event {
        assert_eq!(actor_key, ALICE);
        assert_eq!(course_id, "abc");
    }

    let after = progress::get(&state.db, ALICE, "abc").await.unwrap();
    assert_eq!(after, Some(before));
}

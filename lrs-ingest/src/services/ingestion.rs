//! Statement ingestion
//!
//! **Flow:**
//! 1. Validate every submitted statement (any malformed one rejects the batch)
//! 2. Append the batch in one transaction, retrying transient store failures
//! 3. Best-effort bookkeeping: verb usage counters, unknown verbs, unresolved activities
//! 4. Spawn one materialization per affected (actor, course) pair
//!
//! The caller is acknowledged once step 2 commits; materialization runs after.

use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use lrs_common::events::LrsEvent;
use lrs_common::retry::retry_transient;
use lrs_common::{time, Error, Result};

use crate::classifier::{VerbClassifier, VerbOverrides};
use crate::db::statements::{self, AppendOutcome};
use crate::db::{courses, verbs};
use crate::identity::CourseMatch;
use crate::models::{parse_statement, StatementRecord};
use crate::services::materialization::spawn_materialization;
use crate::AppState;

/// Acknowledgment of an accepted batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Statement ids in input order
    pub ids: Vec<String>,
    pub inserted: usize,
    pub duplicates: usize,
    /// (actor_key, course_id) pairs scheduled for materialization
    pub scheduled: Vec<(String, String)>,
}

/// Accept one statement object or an array of them
pub async fn ingest_statements(state: &AppState, submitted: Value) -> Result<IngestOutcome> {
    let stored = time::now();

    let submitted = match submitted {
        Value::Array(items) => items,
        single => vec![single],
    };
    if submitted.is_empty() {
        state.stats.record_rejected();
        return Err(Error::InvalidInput("no statements submitted".to_string()));
    }

    let mut records = Vec::with_capacity(submitted.len());
    for (index, value) in submitted.into_iter().enumerate() {
        match parse_statement(value, stored) {
            Ok(record) => records.push(record),
            Err(e) => {
                state.stats.record_rejected();
                debug!("Rejected statement batch at index {}: {}", index, e);
                return Err(match e {
                    Error::InvalidInput(msg) => {
                        Error::InvalidInput(format!("statement {}: {}", index, msg))
                    }
                    other => other,
                });
            }
        }
    }

    let db = &state.db;
    let batch = records.as_slice();
    let outcomes = retry_transient("append statements", &state.settings.store_retry, move || {
        statements::append_batch(db, batch)
    })
    .await?;

    let inserted: Vec<&StatementRecord> = records
        .iter()
        .zip(&outcomes)
        .filter(|(_, outcome)| **outcome == AppendOutcome::Inserted)
        .map(|(record, _)| record)
        .collect();
    let duplicates = outcomes.len() - inserted.len();

    state.stats.record_accepted(inserted.len() as u64);
    state.stats.record_duplicates(duplicates as u64);

    let ids: Vec<String> = records.iter().map(|r| r.statement.id.clone()).collect();
    info!(
        received = records.len(),
        inserted = inserted.len(),
        duplicates,
        "Statements stored"
    );

    state.event_bus.emit_lossy(LrsEvent::StatementsStored {
        statement_ids: ids.clone(),
        inserted: inserted.len(),
        timestamp: time::now(),
    });

    record_usage(state, &inserted).await;

    let scheduled = match affected_pairs(state, &inserted).await {
        Ok(pairs) => pairs,
        Err(e) => {
            // Statements are committed; the next arrival re-triggers these pairs
            warn!("Could not resolve affected courses, materialization not scheduled: {}", e);
            Vec::new()
        }
    };

    for (actor_key, course_id) in &scheduled {
        spawn_materialization(state.clone(), actor_key.clone(), course_id.clone());
    }

    Ok(IngestOutcome {
        ids,
        inserted: inserted.len(),
        duplicates,
        scheduled,
    })
}

/// Update verb usage counters; failures are logged only
async fn record_usage(state: &AppState, inserted: &[&StatementRecord]) {
    if inserted.is_empty() {
        return;
    }

    let mut conn = match state.db.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            warn!("Verb usage not recorded: {}", e);
            return;
        }
    };

    for record in inserted {
        let statement = &record.statement;
        if let Err(e) = verbs::record_usage(&mut conn, &statement.verb_id, &statement.stored).await {
            warn!(verb_id = %statement.verb_id, "Verb usage not recorded: {}", e);
        }
    }
}

/// Classify and resolve inserted statements into distinct (actor, course) pairs
///
/// Unknown verbs and unresolvable activities are counted and logged here;
/// neither prevents storage.
async fn affected_pairs(
    state: &AppState,
    inserted: &[&StatementRecord],
) -> Result<Vec<(String, String)>> {
    if inserted.is_empty() {
        return Ok(Vec::new());
    }

    let directory = courses::load_directory(&state.db).await?;
    let classifier = VerbClassifier::new(VerbOverrides::new(verbs::list(&state.db).await?));

    let mut pairs = BTreeSet::new();
    for record in inserted {
        let statement = &record.statement;

        if !classifier.classify(&statement.verb_id).affects_progress() {
            state.stats.record_unknown_verb();
            debug!(
                statement_id = %statement.id,
                verb_id = %statement.verb_id,
                "Verb does not affect progress"
            );
        }

        match directory.match_activity(&statement.activity_id) {
            CourseMatch::Matched(course) => {
                pairs.insert((statement.actor_key.clone(), course.course_id.clone()));
            }
            CourseMatch::Unresolved => {
                state.stats.record_unresolved();
                warn!(
                    statement_id = %statement.id,
                    activity_id = %statement.activity_id,
                    "Activity does not resolve to any course"
                );
                state.event_bus.emit_lossy(LrsEvent::ActivityUnresolved {
                    statement_id: statement.id.clone(),
                    activity_id: statement.activity_id.clone(),
                    ambiguous: false,
                    timestamp: time::now(),
                });
            }
            CourseMatch::Ambiguous(candidates) => {
                state.stats.record_unresolved();
                let candidates: Vec<&str> = candidates.iter().map(|c| c.course_id.as_str()).collect();
                warn!(
                    statement_id = %statement.id,
                    activity_id = %statement.activity_id,
                    candidates = ?candidates,
                    "Activity matches several courses, not assigned to any"
                );
                state.event_bus.emit_lossy(LrsEvent::ActivityUnresolved {
                    statement_id: statement.id.clone(),
                    activity_id: statement.activity_id.clone(),
                    ambiguous: true,
                    timestamp: time::now(),
                });
            }
        }
    }

    Ok(pairs.into_iter().collect())
}

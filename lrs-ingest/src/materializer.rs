//! Progress materialization
//!
//! [`materialize`] is a pure function from a statement set, the course
//! directory and the verb classifier to one [`Progress`] record. It never
//! reads the previous record, so repeated or concurrent recomputation from
//! the same statements always produces the same output.
//!
//! **Algorithm:**
//! 1. Restrict the input to statements of this actor that resolve to this
//!    course and whose verb affects progress (the set `S`); empty `S` yields `None`
//! 2. Order `S` by `(timestamp, id)`, dropping repeated ids
//! 3. `started_at` = earliest start statement
//! 4. `completed_at` = earliest completed/passed/failed statement, which also
//!    backfills `started_at` when no start statement exists. The status comes
//!    from the earliest pass/fail statement when one exists, else `completed`
//! 5. Score from the status statement: scaled, then raw/max, then bare raw
//! 6. Active time = sum of consecutive gaps not longer than the idle gap
//! 7. Progress percent = 100 when finished, else `min(cap, count / calibration)`

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::classifier::VerbClassifier;
use crate::identity::CourseDirectory;
use crate::models::{CompletionStatus, Course, Progress, Score, Statement, VerbAction};

/// Tuning constants for progress derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializerConfig {
    /// Statement count treated as a typical full course
    pub calibration_statements: u32,
    /// Highest percentage an unfinished course reports
    pub in_progress_cap_percent: u8,
    /// Gaps between statements longer than this count as idle
    pub idle_gap_seconds: u64,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            calibration_statements: 80,
            in_progress_cap_percent: 95,
            idle_gap_seconds: 300,
        }
    }
}

impl MaterializerConfig {
    /// Calibration for one course; the course's own value wins
    pub fn calibration_for(&self, course: &Course) -> u32 {
        course
            .expected_statements
            .filter(|&expected| expected > 0)
            .unwrap_or(self.calibration_statements)
            .max(1)
    }
}

/// A statement of `S` with its resolved action
struct Classified<'a> {
    statement: &'a Statement,
    action: VerbAction,
}

/// Derive the progress record of `actor_key` in `course`
///
/// Returns `None` when no progress-relevant statement of the pair exists.
pub fn materialize(
    actor_key: &str,
    course: &Course,
    directory: &CourseDirectory,
    classifier: &VerbClassifier,
    config: &MaterializerConfig,
    statements: &[Statement],
) -> Option<Progress> {
    let relevant = relevant_statements(actor_key, course, directory, classifier, statements);
    if relevant.is_empty() {
        return None;
    }

    let completed_at = relevant
        .iter()
        .find(|c| c.action.is_completion())
        .map(|c| c.statement.timestamp);

    let started_at = relevant
        .iter()
        .find(|c| c.action == VerbAction::MarkStarted)
        .map(|c| c.statement.timestamp)
        .or(completed_at);

    let mut completion_status = CompletionStatus::InProgress;
    let mut score = None;

    if let Some(selected) = select_status(&relevant) {
        completion_status = match selected.action {
            VerbAction::MarkPassed => CompletionStatus::Passed,
            VerbAction::MarkFailed => CompletionStatus::Failed,
            _ => CompletionStatus::Completed,
        };
        score = selected
            .statement
            .result
            .as_ref()
            .and_then(|result| result.score.as_ref())
            .and_then(extract_score);
    }

    let timestamps: Vec<DateTime<Utc>> = relevant.iter().map(|c| c.statement.timestamp).collect();
    let count = relevant.len() as u64;

    Some(Progress {
        actor_key: actor_key.to_string(),
        course_id: course.course_id.clone(),
        completion_status,
        score,
        time_spent_seconds: active_time_seconds(&timestamps, config.idle_gap_seconds),
        progress_percent: progress_percent(
            completion_status,
            count,
            config.calibration_for(course),
            config.in_progress_cap_percent,
        ),
        started_at,
        completed_at,
        statement_count: count,
    })
}

fn relevant_statements<'a>(
    actor_key: &str,
    course: &Course,
    directory: &CourseDirectory,
    classifier: &VerbClassifier,
    statements: &'a [Statement],
) -> Vec<Classified<'a>> {
    let mut relevant: Vec<Classified<'a>> = statements
        .iter()
        .filter(|s| s.actor_key == actor_key)
        .filter(|s| {
            directory
                .resolve_course(&s.activity_id)
                .is_some_and(|resolved| resolved.course_id == course.course_id)
        })
        .filter_map(|s| {
            let classification = classifier.classify(&s.verb_id);
            classification.affects_progress().then_some(Classified {
                statement: s,
                action: classification.action,
            })
        })
        .collect();

    relevant.sort_by(|a, b| {
        a.statement
            .timestamp
            .cmp(&b.statement.timestamp)
            .then_with(|| a.statement.id.cmp(&b.statement.id))
    });

    let mut seen = HashSet::new();
    relevant.retain(|c| seen.insert(c.statement.id.as_str()));
    relevant
}

/// Earliest pass/fail statement, falling back to the earliest completion
fn select_status<'a, 'b>(relevant: &'b [Classified<'a>]) -> Option<&'b Classified<'a>> {
    relevant
        .iter()
        .find(|c| matches!(c.action, VerbAction::MarkPassed | VerbAction::MarkFailed))
        .or_else(|| relevant.iter().find(|c| c.action == VerbAction::MarkCompleted))
}

/// Score as an integer percentage, or `None` when nothing usable was reported
///
/// Priority: `scaled` (fraction of 1), then `raw / max`, then bare `raw`
/// taken as a percentage. A `max` of zero or less makes the pair unusable.
/// Results are clamped into 0..=100.
pub fn extract_score(score: &Score) -> Option<u8> {
    let percent = match (score.scaled, score.raw, score.max) {
        (Some(scaled), _, _) => scaled * 100.0,
        (None, _, Some(max)) if max <= 0.0 => return None,
        (None, Some(raw), Some(max)) => raw / max * 100.0,
        (None, raw, _) => raw?,
    };

    if !percent.is_finite() {
        return None;
    }
    Some(percent.round().clamp(0.0, 100.0) as u8)
}

/// Active time in whole seconds from sorted event timestamps
///
/// Gaps longer than `idle_gap_seconds` are excluded. A single statement
/// counts as one second; a zero sum over several statements falls back to
/// the statement count.
pub fn active_time_seconds(sorted: &[DateTime<Utc>], idle_gap_seconds: u64) -> u64 {
    match sorted.len() {
        0 => return 0,
        1 => return 1,
        _ => {}
    }

    let idle_gap_ms = idle_gap_seconds.saturating_mul(1000);
    let active_ms: u64 = sorted
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds().max(0) as u64)
        .filter(|&delta| delta <= idle_gap_ms)
        .sum();

    let seconds = (active_ms + 500) / 1000;
    if seconds == 0 {
        sorted.len() as u64
    } else {
        seconds
    }
}

/// Progress percentage for a status and statement count
pub fn progress_percent(status: CompletionStatus, count: u64, calibration: u32, cap: u8) -> u8 {
    if status.is_finished() {
        return 100;
    }
    let calibration = u64::from(calibration.max(1));
    let percent = (count * 100 + calibration / 2) / calibration;
    percent.min(u64::from(cap.min(100))) as u8
}

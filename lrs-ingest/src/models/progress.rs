//! Derived progress record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use lrs_common::Error;

/// Learner status in a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    InProgress,
    Completed,
    Passed,
    Failed,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::NotStarted => "not_started",
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Passed => "passed",
            CompletionStatus::Failed => "failed",
        }
    }

    /// Completed, passed or failed
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            CompletionStatus::Completed | CompletionStatus::Passed | CompletionStatus::Failed
        )
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(CompletionStatus::NotStarted),
            "in_progress" => Ok(CompletionStatus::InProgress),
            "completed" => Ok(CompletionStatus::Completed),
            "passed" => Ok(CompletionStatus::Passed),
            "failed" => Ok(CompletionStatus::Failed),
            other => Err(Error::Internal(format!("unknown completion status '{}'", other))),
        }
    }
}

/// Current summary of one learner in one course
///
/// A pure function of the statement set it was computed from; carries no
/// wall-clock data so recomputation from the same set is identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub actor_key: String,
    pub course_id: String,
    pub completion_status: CompletionStatus,
    /// Percentage 0-100; absent when no score was reported
    pub score: Option<u8>,
    pub time_spent_seconds: u64,
    pub progress_percent: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Statements that contributed to this record
    pub statement_count: u64,
}

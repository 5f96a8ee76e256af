//! Verb categories, actions and administrator overrides

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use lrs_common::Error;

/// Coarse grouping of a verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbCategory {
    Start,
    Completion,
    Interaction,
    Custom,
    Unknown,
}

/// What a verb does to derived progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbAction {
    MarkStarted,
    MarkCompleted,
    MarkPassed,
    MarkFailed,
    TrackInteraction,
    /// Ignored by progress computation
    None,
}

impl VerbCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerbCategory::Start => "start",
            VerbCategory::Completion => "completion",
            VerbCategory::Interaction => "interaction",
            VerbCategory::Custom => "custom",
            VerbCategory::Unknown => "unknown",
        }
    }
}

impl VerbAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerbAction::MarkStarted => "mark_started",
            VerbAction::MarkCompleted => "mark_completed",
            VerbAction::MarkPassed => "mark_passed",
            VerbAction::MarkFailed => "mark_failed",
            VerbAction::TrackInteraction => "track_interaction",
            VerbAction::None => "none",
        }
    }

    /// Completion-type actions: completed, passed or failed
    pub fn is_completion(&self) -> bool {
        matches!(
            self,
            VerbAction::MarkCompleted | VerbAction::MarkPassed | VerbAction::MarkFailed
        )
    }
}

impl fmt::Display for VerbCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for VerbAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerbCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(VerbCategory::Start),
            "completion" => Ok(VerbCategory::Completion),
            "interaction" => Ok(VerbCategory::Interaction),
            "custom" => Ok(VerbCategory::Custom),
            "unknown" => Ok(VerbCategory::Unknown),
            other => Err(Error::InvalidInput(format!("unknown verb category '{}'", other))),
        }
    }
}

impl FromStr for VerbAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark_started" => Ok(VerbAction::MarkStarted),
            "mark_completed" => Ok(VerbAction::MarkCompleted),
            "mark_passed" => Ok(VerbAction::MarkPassed),
            "mark_failed" => Ok(VerbAction::MarkFailed),
            "track_interaction" => Ok(VerbAction::TrackInteraction),
            "none" => Ok(VerbAction::None),
            other => Err(Error::InvalidInput(format!("unknown verb action '{}'", other))),
        }
    }
}

/// Administrator-defined classification for one verb id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbConfiguration {
    pub verb_id: String,
    pub category: VerbCategory,
    pub action: VerbAction,
    #[serde(default)]
    pub description: Option<String>,
}

/// Which classification rule produced an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationRule {
    Builtin,
    Override,
    Heuristic,
    Default,
}

/// Result of classifying a verb id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category: VerbCategory,
    pub action: VerbAction,
    pub rule: ClassificationRule,
}

impl Classification {
    /// Whether statements with this verb feed progress computation
    pub fn affects_progress(&self) -> bool {
        self.action != VerbAction::None
    }
}

/// Usage counters for one verb id (monitoring data)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbUsage {
    pub verb_id: String,
    pub statement_count: i64,
    pub distinct_actors: i64,
    pub distinct_activities: i64,
    pub last_seen: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_action_parse_roundtrip() {
        for category in [
            VerbCategory::Start,
            VerbCategory::Completion,
            VerbCategory::Interaction,
            VerbCategory::Custom,
            VerbCategory::Unknown,
        ] {
            assert_eq!(category.as_str().parse::<VerbCategory>().unwrap(), category);
        }
        for action in [
            VerbAction::MarkStarted,
            VerbAction::MarkCompleted,
            VerbAction::MarkPassed,
            VerbAction::MarkFailed,
            VerbAction::TrackInteraction,
            VerbAction::None,
        ] {
            assert_eq!(action.as_str().parse::<VerbAction>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!("mark_exploded".parse::<VerbAction>().is_err());
        assert!("misc".parse::<VerbCategory>().is_err());
    }

    #[test]
    fn test_configuration_json_shape() {
        let config: VerbConfiguration = serde_json::from_str(
            r#"{"verb_id": "https://acme.example/verbs/finished-module", "category": "completion", "action": "mark_completed"}"#,
        )
        .unwrap();
        assert_eq!(config.action, VerbAction::MarkCompleted);
        assert!(config.description.is_none());
    }
}

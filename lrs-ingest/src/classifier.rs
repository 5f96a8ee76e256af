//! Verb classification
//!
//! Maps an open-vocabulary verb id onto the small set of actions progress
//! computation understands. Rules are tried in order, first match wins:
//!
//! 1. Built-in registry of well-known verb IRIs
//! 2. Administrator overrides ([`VerbOverrides`])
//! 3. Keyword heuristics on the lowercased verb id
//! 4. Default: `unknown` / `none`
//!
//! The classifier holds no global state. Overrides are loaded from the store
//! by the caller and passed in, so tests can supply isolated tables.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::{
    Classification, ClassificationRule, VerbAction, VerbCategory, VerbConfiguration,
};

const ADL_VERBS: &str = "http://adlnet.gov/expapi/verbs/";
const TINCAN_VERBS: &str = "http://id.tincanapi.com/verb/";

/// Well-known verbs, keyed by full IRI
static BUILTIN_VERBS: Lazy<HashMap<String, (VerbCategory, VerbAction)>> = Lazy::new(|| {
    use VerbAction::*;
    use VerbCategory::*;

    let adl = [
        ("initialized", Start, MarkStarted),
        ("launched", Start, MarkStarted),
        ("completed", Completion, MarkCompleted),
        ("passed", Completion, MarkPassed),
        ("failed", Completion, MarkFailed),
        ("answered", Interaction, TrackInteraction),
        ("attempted", Interaction, TrackInteraction),
        ("interacted", Interaction, TrackInteraction),
        ("shared", Interaction, TrackInteraction),
    ];
    let tincan = [
        ("downloaded", Interaction, TrackInteraction),
        ("bookmarked", Interaction, TrackInteraction),
    ];

    adl.into_iter()
        .map(|(name, category, action)| (format!("{}{}", ADL_VERBS, name), (category, action)))
        .chain(
            tincan
                .into_iter()
                .map(|(name, category, action)| (format!("{}{}", TINCAN_VERBS, name), (category, action))),
        )
        .collect()
});

/// Keyword heuristics, checked in order against the lowercased verb id
const HEURISTICS: &[(&[&str], VerbCategory, VerbAction)] = &[
    (&["complet"], VerbCategory::Completion, VerbAction::MarkCompleted),
    (&["pass"], VerbCategory::Completion, VerbAction::MarkPassed),
    (&["fail"], VerbCategory::Completion, VerbAction::MarkFailed),
    (&["init", "launch", "start"], VerbCategory::Start, VerbAction::MarkStarted),
    (&["download"], VerbCategory::Interaction, VerbAction::TrackInteraction),
];

/// Administrator-configured verb table
#[derive(Debug, Clone, Default)]
pub struct VerbOverrides {
    entries: HashMap<String, VerbConfiguration>,
}

impl VerbOverrides {
    pub fn new(configurations: impl IntoIterator<Item = VerbConfiguration>) -> Self {
        Self {
            entries: configurations
                .into_iter()
                .map(|config| (config.verb_id.clone(), config))
                .collect(),
        }
    }

    pub fn get(&self, verb_id: &str) -> Option<&VerbConfiguration> {
        self.entries.get(verb_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Classifies verb ids against built-ins, overrides and heuristics
#[derive(Debug, Clone, Default)]
pub struct VerbClassifier {
    overrides: VerbOverrides,
}

impl VerbClassifier {
    pub fn new(overrides: VerbOverrides) -> Self {
        Self { overrides }
    }

    pub fn overrides(&self) -> &VerbOverrides {
        &self.overrides
    }

    /// Classify a verb id; never fails
    pub fn classify(&self, verb_id: &str) -> Classification {
        if let Some(&(category, action)) = BUILTIN_VERBS.get(verb_id) {
            return Classification {
                category,
                action,
                rule: ClassificationRule::Builtin,
            };
        }

        if let Some(config) = self.overrides.get(verb_id) {
            return Classification {
                category: config.category,
                action: config.action,
                rule: ClassificationRule::Override,
            };
        }

        let lowered = verb_id.to_lowercase();
        for (keywords, category, action) in HEURISTICS {
            if keywords.iter().any(|keyword| lowered.contains(keyword)) {
                return Classification {
                    category: *category,
                    action: *action,
                    rule: ClassificationRule::Heuristic,
                };
            }
        }

        Classification {
            category: VerbCategory::Unknown,
            action: VerbAction::None,
            rule: ClassificationRule::Default,
        }
    }
}

/// True if the verb id is in the built-in registry
pub fn is_builtin(verb_id: &str) -> bool {
    BUILTIN_VERBS.contains_key(verb_id)
}

//! Course directory entry (owned by the course catalog)

use serde::{Deserialize, Serialize};

/// A course as seen by identity resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    /// The course's own base activity identifier
    pub activity_id: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Per-course progress calibration; falls back to the global setting
    #[serde(default)]
    pub expected_statements: Option<u32>,
}

impl Course {
    pub fn new(course_id: impl Into<String>, activity_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            activity_id: activity_id.into(),
            title: None,
            expected_statements: None,
        }
    }
}

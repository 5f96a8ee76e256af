//! Data models for statements, progress, verbs and courses

pub mod course;
pub mod progress;
pub mod statement;
pub mod verb;

pub use course::Course;
pub use progress::{CompletionStatus, Progress};
pub use statement::{parse_statement, Score, Statement, StatementRecord, StatementResult};
pub use verb::{
    Classification, ClassificationRule, VerbAction, VerbCategory, VerbConfiguration, VerbUsage,
};

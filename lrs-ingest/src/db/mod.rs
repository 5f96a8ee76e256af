//! Database access for lrs-ingest
//!
//! Schema creation lives in `lrs_common::db`; these modules hold the queries.

pub mod courses;
pub mod progress;
pub mod statements;
pub mod verbs;

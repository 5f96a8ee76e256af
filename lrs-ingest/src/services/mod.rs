//! Ingestion and materialization services

pub mod ingestion;
pub mod materialization;

pub use ingestion::{ingest_statements, IngestOutcome};
pub use materialization::{materialize_and_store, run_materialization, spawn_materialization};

//! HTTP API handlers for lrs-ingest

pub mod health;
pub mod progress;
pub mod sse;
pub mod statements;
pub mod verbs;

pub use health::health_routes;
pub use progress::progress_routes;
pub use sse::event_routes;
pub use statements::statement_routes;
pub use verbs::verb_routes;

//! lrs-ingest library interface
//!
//! Learning-record ingestion and progress materialization. Exposes the
//! router and the core modules for integration testing.

pub mod api;
pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod materializer;
pub mod models;
pub mod services;
pub mod stats;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use lrs_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::RuntimeSettings;
use crate::stats::IngestStats;

/// Application state shared across handlers and materialization tasks
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Tuning loaded from the settings table at startup
    pub settings: Arc<RuntimeSettings>,
    pub stats: Arc<IngestStats>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, event_bus: EventBus, settings: RuntimeSettings) -> Self {
        Self {
            db,
            event_bus,
            settings: Arc::new(settings),
            stats: Arc::new(IngestStats::new()),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::statement_routes())
        .merge(api::progress_routes())
        .merge(api::verb_routes())
        .merge(api::health_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

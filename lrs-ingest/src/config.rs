//! Runtime settings for lrs-ingest
//!
//! Tuning values live in the database `settings` table (initialized with
//! defaults by `init_database`). They are read once at startup and shared
//! through `AppState`.

use std::time::Duration;

use lrs_common::db::{get_setting_or, setting_keys};
use lrs_common::retry::RetryPolicy;
use lrs_common::Result;
use sqlx::SqlitePool;
use tracing::info;

use crate::materializer::MaterializerConfig;

/// Settings resolved from the database
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub materializer: MaterializerConfig,
    /// Applies to store writes on the ingestion path and to materialization
    pub store_retry: RetryPolicy,
}

impl RuntimeSettings {
    /// Load every runtime setting, falling back to built-in defaults
    pub async fn load(db: &SqlitePool) -> Result<Self> {
        let defaults = Self::default();

        let materializer = MaterializerConfig {
            calibration_statements: get_setting_or(
                db,
                setting_keys::PROGRESS_CALIBRATION_STATEMENTS,
                defaults.materializer.calibration_statements,
            )
            .await?
            .max(1),
            in_progress_cap_percent: get_setting_or(
                db,
                setting_keys::PROGRESS_IN_PROGRESS_CAP_PERCENT,
                defaults.materializer.in_progress_cap_percent,
            )
            .await?
            .min(100),
            idle_gap_seconds: get_setting_or(
                db,
                setting_keys::ACTIVE_TIME_IDLE_GAP_SECONDS,
                defaults.materializer.idle_gap_seconds,
            )
            .await?,
        };

        let initial_ms: u64 = get_setting_or(
            db,
            setting_keys::STORE_RETRY_INITIAL_BACKOFF_MS,
            defaults.store_retry.initial_backoff.as_millis() as u64,
        )
        .await?;
        let max_ms: u64 = get_setting_or(
            db,
            setting_keys::STORE_RETRY_MAX_BACKOFF_MS,
            defaults.store_retry.max_backoff.as_millis() as u64,
        )
        .await?;
        let store_retry = RetryPolicy {
            max_attempts: get_setting_or(
                db,
                setting_keys::STORE_RETRY_MAX_ATTEMPTS,
                defaults.store_retry.max_attempts,
            )
            .await?
            .max(1),
            initial_backoff: Duration::from_millis(initial_ms),
            max_backoff: Duration::from_millis(max_ms.max(initial_ms)),
        };

        info!(
            calibration = materializer.calibration_statements,
            cap = materializer.in_progress_cap_percent,
            idle_gap_s = materializer.idle_gap_seconds,
            retry_attempts = store_retry.max_attempts,
            "Runtime settings loaded"
        );

        Ok(Self {
            materializer,
            store_retry,
        })
    }
}

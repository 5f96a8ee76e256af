//! Ingestion counters
//!
//! Monitoring data only; nothing reads these for correctness.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestStats {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    rejected: AtomicU64,
    unresolved: AtomicU64,
    unknown_verbs: AtomicU64,
    materializations_succeeded: AtomicU64,
    materializations_skipped: AtomicU64,
    materializations_failed: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub unresolved: u64,
    pub unknown_verbs: u64,
    pub materializations_succeeded: u64,
    pub materializations_skipped: u64,
    pub materializations_failed: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self, count: u64) {
        self.accepted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_duplicates(&self, count: u64) {
        self.duplicates.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unresolved(&self) {
        self.unresolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unknown_verb(&self) {
        self.unknown_verbs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_materialization_succeeded(&self) {
        self.materializations_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_materialization_skipped(&self) {
        self.materializations_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_materialization_failed(&self) {
        self.materializations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.accepted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unresolved: self.unresolved.load(Ordering::Relaxed),
            unknown_verbs: self.unknown_verbs.load(Ordering::Relaxed),
            materializations_succeeded: self.materializations_succeeded.load(Ordering::Relaxed),
            materializations_skipped: self.materializations_skipped.load(Ordering::Relaxed),
            materializations_failed: self.materializations_failed.load(Ordering::Relaxed),
        }
    }
}

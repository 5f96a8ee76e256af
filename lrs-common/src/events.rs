//! Event types for the LRS event system
//!
//! Provides shared event definitions and the EventBus used to observe
//! ingestion and materialization from outside the request path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// LRS event types
///
/// Events are broadcast via EventBus and can be serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LrsEvent {
    /// A batch of statements was committed to the statement store
    ///
    /// Triggers:
    /// - SSE: Live statement feed
    StatementsStored {
        /// Ids in input order (duplicates included)
        statement_ids: Vec<String>,
        /// Number of statements newly inserted
        inserted: usize,
        timestamp: DateTime<Utc>,
    },

    /// A statement's activity could not be matched to any course
    ///
    /// The statement is stored but contributes to no progress record.
    ActivityUnresolved {
        statement_id: String,
        activity_id: String,
        /// True when more than one course matched
        ambiguous: bool,
        timestamp: DateTime<Utc>,
    },

    /// Progress for one (actor, course) pair was recomputed and written
    ProgressMaterialized {
        actor_key: String,
        course_id: String,
        completion_status: String,
        progress_percent: u8,
        score: Option<u8>,
        timestamp: DateTime<Utc>,
    },

    /// Materialization produced no record (no relevant statements)
    MaterializationSkipped {
        actor_key: String,
        course_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Materialization gave up after retries
    ///
    /// The previous progress record (if any) is left in place.
    MaterializationFailed {
        actor_key: String,
        course_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl LrsEvent {
    /// Event name used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            LrsEvent::StatementsStored { .. } => "StatementsStored",
            LrsEvent::ActivityUnresolved { .. } => "ActivityUnresolved",
            LrsEvent::ProgressMaterialized { .. } => "ProgressMaterialized",
            LrsEvent::MaterializationSkipped { .. } => "MaterializationSkipped",
            LrsEvent::MaterializationFailed { .. } => "MaterializationFailed",
        }
    }
}

/// Broadcast channel for [`LrsEvent`]s
///
/// Cloning shares the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LrsEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow subscribers
    ///   start missing old events
    ///
    /// # Examples
    ///
    /// ```
    /// use lrs_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<LrsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: LrsEvent) -> Result<usize, broadcast::error::SendError<LrsEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: LrsEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

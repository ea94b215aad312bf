//! Event types for the Cooktime event system
//!
//! Provides the shared [`CooktimeEvent`] enum and the [`EventBus`] that the
//! session engine publishes on. Subscribers include the SSE stream and the
//! foreground `run` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timeline::TimelineEvent;

/// Cooktime event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission
/// with a `type` tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CooktimeEvent {
    /// A session was armed for a meal
    SessionArmed {
        meal_id: String,
        meal_name: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        serve_when: DateTime<Utc>,
        /// Timers scheduled (events at or after arm time)
        scheduled: usize,
        /// Events already in the past at arm time
        skipped: usize,
        timestamp: DateTime<Utc>,
    },

    /// A persisted session was picked up again after a restart
    SessionRecovered {
        meal_id: String,
        scheduled: usize,
        timestamp: DateTime<Utc>,
    },

    /// A persisted session references a meal that is not the active one
    ///
    /// The record is left in place; stopping the session clears it.
    SessionOrphaned {
        session_meal_id: String,
        active_meal_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The session was stopped and its record removed
    SessionStopped {
        meal_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// The last scheduled timer of the session has fired
    SessionCompleted {
        meal_id: String,
        fired: usize,
        timestamp: DateTime<Utc>,
    },

    /// An alert was dispatched
    AlertFired {
        event: TimelineEvent,
        title: String,
        body: String,
        timestamp: DateTime<Utc>,
    },

    /// Meal catalog or active selection changed
    CatalogChanged {
        active_meal_id: Option<String>,
        meal_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A storage write or read failed; in-memory state remains authoritative
    StorageDegraded {
        operation: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl CooktimeEvent {
    /// Event type name as used in the SSE `event:` field
    pub fn event_type(&self) -> &str {
        match self {
            CooktimeEvent::SessionArmed { .. } => "SessionArmed",
            CooktimeEvent::SessionRecovered { .. } => "SessionRecovered",
            CooktimeEvent::SessionOrphaned { .. } => "SessionOrphaned",
            CooktimeEvent::SessionStopped { .. } => "SessionStopped",
            CooktimeEvent::SessionCompleted { .. } => "SessionCompleted",
            CooktimeEvent::AlertFired { .. } => "AlertFired",
            CooktimeEvent::CatalogChanged { .. } => "CatalogChanged",
            CooktimeEvent::StorageDegraded { .. } => "StorageDegraded",
        }
    }

    pub fn storage_degraded(
        operation: impl Into<String>,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        CooktimeEvent::StorageDegraded {
            operation: operation.into(),
            message: message.into(),
            timestamp,
        }
    }
}

/// Central event distribution bus
///
/// Thin wrapper over a tokio broadcast channel. Slow subscribers lag and
/// lose the oldest events rather than blocking publishers.
pub struct EventBus {
    tx: broadcast::Sender<CooktimeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use cooktime_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.capacity(), 100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<CooktimeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CooktimeEvent,
    ) -> Result<usize, broadcast::error::SendError<CooktimeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: CooktimeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

//! Live cooking session
//!
//! - [`Session`]: the durable record of a run (what is persisted)
//! - [`SessionController`]: the state machine that arms, recovers, fires
//!   and stops, owning the timer handles
//! - [`timers`]: the timer facility abstraction and its Tokio implementation
//!
//! Only the record is persisted. Timer handles live and die with the process;
//! after a restart they are rebuilt from the record by
//! [`SessionController::recover_on_startup`].

pub mod controller;
pub mod timers;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cooktime_common::TimelineEvent;

pub use controller::{ArmOutcome, RecoveryOutcome, SessionController, TimerFired};
pub use timers::{ManualTimers, TimerCallback, TimerFacility, TimerHandle, TokioTimers};

/// Durable record of a live cooking run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub meal_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,
    /// Serve instant at arm time
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub serve_when: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub armed_at: DateTime<Utc>,
    /// Ids of events already dispatched
    #[serde(default)]
    pub fired_event_ids: BTreeSet<String>,
}

impl Session {
    pub fn new(meal_id: impl Into<String>, serve_when: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            meal_id: meal_id.into(),
            started_at: now,
            serve_when,
            armed_at: now,
            fired_event_ids: BTreeSet::new(),
        }
    }

    pub fn has_fired(&self, event_id: &str) -> bool {
        self.fired_event_ids.contains(event_id)
    }

    /// Record an event as fired; false if it already was
    pub fn mark_fired(&mut self, event_id: &str) -> bool {
        self.fired_event_ids.insert(event_id.to_string())
    }
}

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No session record
    Idle,
    /// Session record with live timers
    Armed,
    /// Session record for a meal other than the active one; no timers
    Orphaned,
}

/// Snapshot of the session for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub status: SessionStatus,
    pub session: Option<Session>,
    /// Timers scheduled and not yet fired
    pub pending: usize,
    pub next_event: Option<TimelineEvent>,
}

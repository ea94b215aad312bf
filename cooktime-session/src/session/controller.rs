//! Session state machine
//!
//! ```text
//!            arm                      stop
//!   Idle ────────────► Armed ───────────────► Idle
//!    ▲                   │ timer fires → fire(event), stays Armed
//!    │      stop         │
//!    └──────────── Orphaned ◄── recover_on_startup (record for another meal)
//! ```
//!
//! Invariants:
//! - the session record is persisted before any timer is scheduled
//! - a failed scheduling pass leaves no timers and no record behind
//! - every arm/recover/stop bumps `generation`; expiries carrying an older
//!   generation are dropped
//! - an event id in `fired_event_ids` never dispatches again

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use cooktime_common::events::{CooktimeEvent, EventBus};
use cooktime_common::time::Clock;
use cooktime_common::timeline::derive_events_at;
use cooktime_common::{Meal, TimelineEvent, Zone};

use super::timers::{TimerFacility, TimerHandle};
use super::{Session, SessionStatus, SessionView};
use crate::audio::Cue;
use crate::dispatch::AlertDispatcher;
use crate::error::{Error, Result};
use crate::notify::Notification;
use crate::store::SessionStore;

/// Message posted by an expired timer
#[derive(Debug, Clone)]
pub struct TimerFired {
    pub generation: u64,
    pub event: TimelineEvent,
}

/// Result of a successful [`SessionController::arm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmOutcome {
    pub serve_when: DateTime<Utc>,
    /// Events with a timer
    pub scheduled: usize,
    /// Events already in the past at arm time
    pub skipped: usize,
}

/// Result of [`SessionController::recover_on_startup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No persisted session
    NoSession,
    /// Session resumed for the active meal
    Resumed { scheduled: usize },
    /// Session references a different meal; left untouched
    Orphaned { session_meal_id: String },
}

enum Slot {
    Idle,
    Armed(Session),
    Orphaned(Session),
}

pub struct SessionController {
    store: Arc<dyn SessionStore>,
    timers: Arc<dyn TimerFacility>,
    clock: Arc<dyn Clock>,
    dispatcher: AlertDispatcher,
    bus: Arc<EventBus>,
    zone: Zone,
    fire_tx: UnboundedSender<TimerFired>,

    slot: Slot,
    generation: u64,
    handles: Vec<TimerHandle>,
    /// Scheduled, not yet fired; in timeline order
    pending: Vec<TimelineEvent>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        timers: Arc<dyn TimerFacility>,
        clock: Arc<dyn Clock>,
        dispatcher: AlertDispatcher,
        bus: Arc<EventBus>,
        fire_tx: UnboundedSender<TimerFired>,
    ) -> Self {
        Self {
            store,
            timers,
            clock,
            dispatcher,
            bus,
            zone: Zone::Local,
            fire_tx,
            slot: Slot::Idle,
            generation: 0,
            handles: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    pub fn status(&self) -> SessionStatus {
        match self.slot {
            Slot::Idle => SessionStatus::Idle,
            Slot::Armed(_) => SessionStatus::Armed,
            Slot::Orphaned(_) => SessionStatus::Orphaned,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.slot {
            Slot::Idle => None,
            Slot::Armed(session) | Slot::Orphaned(session) => Some(session),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Events with a live timer, in timeline order
    pub fn pending(&self) -> &[TimelineEvent] {
        &self.pending
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status(),
            session: self.session().cloned(),
            pending: self.pending.len(),
            next_event: self.pending.first().cloned(),
        }
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    /// Arm a session for `meal`, replacing any existing one
    ///
    /// # Errors
    ///
    /// - `Validation` when the meal has no serve date/time or no alerting
    ///   stage (nothing changes)
    /// - the timer facility's error when scheduling fails (session removed,
    ///   state Idle)
    pub async fn arm(&mut self, meal: &Meal) -> Result<ArmOutcome> {
        let serve_when = self.zone.serve_instant(meal).ok_or_else(|| {
            Error::Validation("Set a serve date and time before starting a session".to_string())
        })?;

        let events = derive_events_at(meal, serve_when);
        if events.is_empty() {
            return Err(Error::Validation(
                "Nothing to schedule: add at least one stage with alerts enabled".to_string(),
            ));
        }

        self.cancel_all();

        let now = self.clock.now();
        let session = Session::new(meal.id.clone(), serve_when, now);
        self.save_record(&session).await;
        self.slot = Slot::Armed(session);

        let skipped = events.iter().filter(|e| e.when < now).count();
        let scheduled = match self.schedule(events, now) {
            Ok(scheduled) => scheduled,
            Err(e) => {
                error!("Failed to arm session for meal {}: {}", meal.id, e);
                self.cancel_all();
                self.slot = Slot::Idle;
                self.clear_record().await;
                return Err(e);
            }
        };

        info!(
            "Session armed for '{}': {} alerts scheduled, {} already past, serve at {}",
            meal.name,
            scheduled,
            skipped,
            self.zone.label(serve_when)
        );

        self.dispatcher.play(Cue::Armed);
        self.bus.emit_lossy(CooktimeEvent::SessionArmed {
            meal_id: meal.id.clone(),
            meal_name: meal.name.clone(),
            serve_when,
            scheduled,
            skipped,
            timestamp: now,
        });

        Ok(ArmOutcome {
            serve_when,
            scheduled,
            skipped,
        })
    }

    /// Cancel all timers and delete the session record
    ///
    /// Returns false when there was nothing to stop.
    pub async fn stop(&mut self) -> Result<bool> {
        let meal_id = match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Idle => {
                debug!("Stop requested with no session");
                return Ok(false);
            }
            Slot::Armed(session) | Slot::Orphaned(session) => session.meal_id,
        };

        self.cancel_all();
        self.clear_record().await;

        info!("Session stopped for meal {}", meal_id);
        self.bus.emit_lossy(CooktimeEvent::SessionStopped {
            meal_id: Some(meal_id),
            timestamp: self.clock.now(),
        });
        Ok(true)
    }

    /// Load the persisted record without scheduling or announcing anything
    ///
    /// For one-shot commands that only act on the record. The record is held
    /// without timers (reported as Orphaned) until stopped. A live session is
    /// left untouched. Returns whether a record is now held.
    pub async fn load_record(&mut self) -> bool {
        if !matches!(self.slot, Slot::Idle) {
            return true;
        }
        match self.store.load().await {
            Ok(Some(session)) => {
                debug!("Loaded session record for meal {}", session.meal_id);
                self.slot = Slot::Orphaned(session);
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.degraded("load_session", &e);
                false
            }
        }
    }

    /// Pick up a persisted session after a restart
    ///
    /// Resumes only when the record belongs to `active`; otherwise the record
    /// is kept as is and the state becomes Orphaned.
    pub async fn recover_on_startup(&mut self, active: Option<&Meal>) -> Result<RecoveryOutcome> {
        let record = match self.store.load().await {
            Ok(record) => record,
            Err(e) => {
                self.degraded("load_session", &e);
                None
            }
        };

        let Some(session) = record else {
            debug!("No session to recover");
            return Ok(RecoveryOutcome::NoSession);
        };

        let meal = match active {
            Some(meal) if meal.id == session.meal_id => meal,
            _ => {
                let active_meal_id = active.map(|m| m.id.clone());
                warn!(
                    "Session belongs to meal {} but active meal is {:?}; leaving it orphaned",
                    session.meal_id, active_meal_id
                );
                let session_meal_id = session.meal_id.clone();
                self.slot = Slot::Orphaned(session);
                self.bus.emit_lossy(CooktimeEvent::SessionOrphaned {
                    session_meal_id: session_meal_id.clone(),
                    active_meal_id,
                    timestamp: self.clock.now(),
                });
                return Ok(RecoveryOutcome::Orphaned { session_meal_id });
            }
        };

        self.cancel_all();
        let now = self.clock.now();
        let events: Vec<_> = self
            .zone
            .derive(meal)
            .into_iter()
            .filter(|e| !session.has_fired(&e.id))
            .collect();

        let scheduled = match self.schedule(events, now) {
            Ok(scheduled) => scheduled,
            Err(e) => {
                error!("Failed to resume session for meal {}: {}", meal.id, e);
                self.cancel_all();
                self.slot = Slot::Idle;
                return Err(e);
            }
        };

        info!(
            "Recovered session for '{}': {} alerts rescheduled, {} already fired",
            meal.name,
            scheduled,
            session.fired_event_ids.len()
        );

        self.slot = Slot::Armed(session);
        self.bus.emit_lossy(CooktimeEvent::SessionRecovered {
            meal_id: meal.id.clone(),
            scheduled,
            timestamp: now,
        });

        Ok(RecoveryOutcome::Resumed { scheduled })
    }

    /// Handle a timer expiry posted by the timer facility
    pub async fn on_timer(&mut self, fired: TimerFired) -> Option<Notification> {
        if fired.generation != self.generation {
            debug!(
                "Dropping stale timer for {} (generation {} != {})",
                fired.event.id, fired.generation, self.generation
            );
            return None;
        }
        self.fire(&fired.event).await
    }

    /// Dispatch an event at most once per session
    ///
    /// Returns the notification produced, or `None` when there is no armed
    /// session or the event already fired.
    pub async fn fire(&mut self, event: &TimelineEvent) -> Option<Notification> {
        let (meal_id, snapshot) = {
            let Slot::Armed(session) = &mut self.slot else {
                debug!("Ignoring {}: no armed session", event.id);
                return None;
            };
            self.pending.retain(|e| e.id != event.id);
            if !session.mark_fired(&event.id) {
                debug!("Ignoring {}: already fired", event.id);
                return None;
            }
            (session.meal_id.clone(), session.clone())
        };

        self.save_record(&snapshot).await;

        let notification = self.dispatcher.dispatch(event);
        let now = self.clock.now();
        self.bus.emit_lossy(CooktimeEvent::AlertFired {
            event: event.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            timestamp: now,
        });

        if self.pending.is_empty() {
            info!("All alerts for meal {} have fired", meal_id);
            self.bus.emit_lossy(CooktimeEvent::SessionCompleted {
                meal_id,
                fired: snapshot.fired_event_ids.len(),
                timestamp: now,
            });
        }

        Some(notification)
    }

    /// Cancel every live timer and invalidate in-flight expiries
    fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            self.timers.cancel(handle);
        }
        self.pending.clear();
        self.generation += 1;
    }

    /// Schedule a timer for every event at or after `now`
    fn schedule(&mut self, events: Vec<TimelineEvent>, now: DateTime<Utc>) -> Result<usize> {
        let mut scheduled = 0;

        for event in events {
            if event.when < now {
                continue;
            }

            let delay = (event.when - now).to_std().unwrap_or(Duration::ZERO);
            let message = TimerFired {
                generation: self.generation,
                event: event.clone(),
            };
            let tx = self.fire_tx.clone();

            let handle = self.timers.schedule_once(
                delay,
                Box::new(move || {
                    // Receiver gone means the app is shutting down
                    let _ = tx.send(message);
                }),
            )?;

            debug!("Scheduled {} in {:?}", event.id, delay);
            self.handles.push(handle);
            self.pending.push(event);
            scheduled += 1;
        }

        Ok(scheduled)
    }

    async fn save_record(&self, session: &Session) {
        if let Err(e) = self.store.save(session).await {
            self.degraded("save_session", &e);
        }
    }

    async fn clear_record(&self) {
        if let Err(e) = self.store.clear().await {
            self.degraded("clear_session", &e);
        }
    }

    fn degraded(&self, operation: &str, e: &Error) {
        warn!("Storage degraded during {}: {}", operation, e);
        self.bus.emit_lossy(CooktimeEvent::storage_degraded(
            operation,
            e.to_string(),
            self.clock.now(),
        ));
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.timers.cancel(handle);
        }
    }
}

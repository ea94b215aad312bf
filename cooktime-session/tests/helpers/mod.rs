//! Shared fixtures for cooktime-session integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use cooktime_common::events::{CooktimeEvent, EventBus};
use cooktime_common::time::ManualClock;
use cooktime_common::{Dish, Meal, Stage, Zone};
use cooktime_session::audio::{AudioCueSink, Beep};
use cooktime_session::dispatch::AlertDispatcher;
use cooktime_session::notify::{Notification, NotificationSink};
use cooktime_session::session::{ManualTimers, SessionController, TimerFired};
use cooktime_session::store::MemoryStore;
use cooktime_session::Result;

/// Captures notifications
#[derive(Default)]
pub struct RecordingNotifier {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.notes.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.notes.lock().unwrap().push(notification.clone());
    }
}

/// Captures beeps
#[derive(Default)]
pub struct RecordingAudio {
    beeps: Mutex<Vec<Beep>>,
}

impl RecordingAudio {
    pub fn all(&self) -> Vec<Beep> {
        self.beeps.lock().unwrap().clone()
    }
}

impl AudioCueSink for RecordingAudio {
    fn play_cue(&self, beep: &Beep) -> Result<()> {
        self.beeps.lock().unwrap().push(*beep);
        Ok(())
    }
}

pub fn serve_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
}

/// Instant on the serve date, in UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, minute, 0).unwrap()
}

/// "Roast" with Temper 45 min then Roast 40 min, served 18:30
pub fn roast_meal() -> Meal {
    let mut meal = Meal::new("Sunday roast").with_dish(
        Dish::new("Roast")
            .with_stage(Stage::new("Temper", 45))
            .with_stage(Stage::new("Roast", 40).with_notes("220°C")),
    );
    meal.set_serve(Some(serve_date()), NaiveTime::from_hms_opt(18, 30, 0));
    meal
}

/// One 30-minute stage: start at 18:00, end at 18:30
pub fn single_stage_meal() -> Meal {
    let mut meal = Meal::new("Rice")
        .with_dish(Dish::new("Rice").with_stage(Stage::new("Simmer", 30)));
    meal.set_serve(Some(serve_date()), NaiveTime::from_hms_opt(18, 30, 0));
    meal
}

/// Session controller over manual timers, a manual clock and UTC
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub timers: Arc<ManualTimers>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub audio: Arc<RecordingAudio>,
    pub bus: Arc<EventBus>,
    pub controller: SessionController,
    pub fire_rx: UnboundedReceiver<TimerFired>,
}

impl Harness {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with(Arc::new(MemoryStore::new()), Arc::new(ManualTimers::new()), now)
    }

    pub fn with(store: Arc<MemoryStore>, timers: Arc<ManualTimers>, now: DateTime<Utc>) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let notifier = Arc::new(RecordingNotifier::default());
        let audio = Arc::new(RecordingAudio::default());
        let bus = Arc::new(EventBus::new(64));
        let (fire_tx, fire_rx) = tokio::sync::mpsc::unbounded_channel();

        let dispatcher =
            AlertDispatcher::new(notifier.clone(), audio.clone()).with_zone(Zone::utc());
        let controller = SessionController::new(
            store.clone(),
            timers.clone(),
            clock.clone(),
            dispatcher,
            bus.clone(),
            fire_tx,
        )
        .with_zone(Zone::utc());

        Self {
            store,
            timers,
            clock,
            notifier,
            audio,
            bus,
            controller,
            fire_rx,
        }
    }

    /// Fire timers due within `elapsed` and feed the expiries to the controller
    pub async fn advance(&mut self, elapsed: std::time::Duration) -> Vec<Notification> {
        self.timers.fire_due(elapsed);
        let mut out = Vec::new();
        while let Ok(fired) = self.fire_rx.try_recv() {
            if let Some(notification) = self.controller.on_timer(fired).await {
                out.push(notification);
            }
        }
        out
    }
}

/// Drain pending bus events, returning their type names
pub fn drain_types(rx: &mut tokio::sync::broadcast::Receiver<CooktimeEvent>) -> Vec<String> {
    let mut types = Vec::new();
    while let Ok(event) = rx.try_recv() {
        types.push(event.event_type().to_string());
    }
    types
}

//! Application orchestrator
//!
//! [`CookApp`] owns the meal catalog, the session controller and the event
//! bus. It is the only mutation entry point: HTTP handlers, CLI commands and
//! timer expiries all lock the same [`SharedApp`] and run to completion.
//!
//! Timer expiries arrive as [`TimerFired`] messages on an unbounded channel;
//! [`run_fire_loop`] drains it and feeds each message back into the app.

use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cooktime_common::config::TomlConfig;
use cooktime_common::events::EventBus;
use cooktime_common::human_time::{format_countdown, format_minutes};
use cooktime_common::time::{Clock, SystemClock};
use cooktime_common::timeline::{filter_events, next_upcoming, Granularity, TimelineFilter};
use cooktime_common::{TimelineEvent, Zone};

use crate::audio::{AudioCueSink, Cue};
use crate::catalog::Catalog;
use crate::dispatch::AlertDispatcher;
use crate::error::Result;
use crate::notify::{Notification, NotificationSink};
use crate::session::{
    ArmOutcome, RecoveryOutcome, SessionController, SessionView, TimerFacility, TimerFired,
    TokioTimers,
};
use crate::store::{MealStore, SessionStore};

/// Default broadcast capacity of the event bus
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Application state shared between handlers and the fire loop
pub type SharedApp = Arc<Mutex<CookApp>>;

/// Collaborators the orchestrator is assembled from
pub struct AppDeps {
    pub meal_store: Arc<dyn MealStore>,
    pub session_store: Arc<dyn SessionStore>,
    pub timers: Arc<dyn TimerFacility>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn NotificationSink>,
    pub audio: Arc<dyn AudioCueSink>,
    pub bus: Arc<EventBus>,
    pub zone: Zone,
    pub default_serve_time: NaiveTime,
    pub sound_enabled: bool,
}

impl AppDeps {
    /// Production wiring: Tokio timers, system clock, local zone
    pub fn new(
        meal_store: Arc<dyn MealStore>,
        session_store: Arc<dyn SessionStore>,
        notifier: Arc<dyn NotificationSink>,
        audio: Arc<dyn AudioCueSink>,
    ) -> Self {
        Self {
            meal_store,
            session_store,
            timers: Arc::new(TokioTimers::new()),
            clock: Arc::new(SystemClock),
            notifier,
            audio,
            bus: Arc::new(EventBus::new(EVENT_BUS_CAPACITY)),
            zone: Zone::Local,
            default_serve_time: TomlConfig::default().default_serve_time(),
            sound_enabled: true,
        }
    }
}

/// One row of the timeline view
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    #[serde(flatten)]
    pub event: TimelineEvent,
    /// `HH:MM` in the app's zone
    pub time_label: String,
    pub title: String,
    pub meta: String,
    pub done: bool,
    /// `"in 1:05:00"` / `"10:00 ago"` relative to now
    pub countdown: String,
}

/// Derived timeline of the active meal, filtered for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineView {
    pub meal_id: String,
    pub meal_name: String,
    pub meta: String,
    /// Length of the longest dish, e.g. `"1 h 25 min"`
    pub cook_time: String,
    pub filter: TimelineFilter,
    pub granularity: Granularity,
    pub events: Vec<TimelineEntry>,
    /// First event not yet due, across the unfiltered timeline
    pub next_id: Option<String>,
}

pub struct CookApp {
    catalog: Catalog,
    session: SessionController,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    zone: Zone,
}

impl CookApp {
    /// Load the catalog and build the session controller
    ///
    /// Returns the receiving end of the timer channel; hand it to
    /// [`run_fire_loop`] (or drain it by hand in tests).
    pub async fn new(deps: AppDeps) -> (Self, UnboundedReceiver<TimerFired>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();

        let catalog = Catalog::load(
            deps.meal_store,
            deps.bus.clone(),
            deps.clock.clone(),
            deps.default_serve_time,
        )
        .await;

        let dispatcher = AlertDispatcher::new(deps.notifier, deps.audio)
            .with_zone(deps.zone)
            .with_sound(deps.sound_enabled);
        let session = SessionController::new(
            deps.session_store,
            deps.timers,
            deps.clock.clone(),
            dispatcher,
            deps.bus.clone(),
            fire_tx,
        )
        .with_zone(deps.zone);

        let app = Self {
            catalog,
            session,
            bus: deps.bus,
            clock: deps.clock,
            zone: deps.zone,
        };
        (app, fire_rx)
    }

    /// Build the app, wrap it for sharing and spawn its fire loop
    pub async fn start(deps: AppDeps) -> (SharedApp, JoinHandle<()>) {
        let (app, fire_rx) = Self::new(deps).await;
        let app = Arc::new(Mutex::new(app));
        let fire_loop = tokio::spawn(run_fire_loop(app.clone(), fire_rx));
        (app, fire_loop)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    pub fn zone(&self) -> Zone {
        self.zone
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Resume a persisted session for the active meal
    pub async fn recover_on_startup(&mut self) -> Result<RecoveryOutcome> {
        let active = self.catalog.active();
        self.session.recover_on_startup(Some(active)).await
    }

    /// Stop whatever session is persisted, without resuming it first
    pub async fn stop_persisted(&mut self) -> Result<bool> {
        self.session.load_record().await;
        self.session.stop().await
    }

    /// Arm a session for the active meal, replacing any existing one
    pub async fn arm_active(&mut self) -> Result<ArmOutcome> {
        let active = self.catalog.active();
        self.session.arm(active).await
    }

    pub async fn stop(&mut self) -> Result<bool> {
        self.session.stop().await
    }

    pub fn session_view(&self) -> SessionView {
        self.session.view()
    }

    pub async fn on_timer(&mut self, fired: TimerFired) -> Option<Notification> {
        self.session.on_timer(fired).await
    }

    /// Play the sound-check cue
    pub fn test_sound(&self) -> bool {
        let dispatcher = self.session.dispatcher();
        if dispatcher.sound_enabled() {
            dispatcher.play(Cue::SoundCheck);
        }
        dispatcher.sound_enabled()
    }

    /// Timeline of the active meal as of now
    pub fn timeline(&self, filter: TimelineFilter, granularity: Granularity) -> TimelineView {
        let meal = self.catalog.active();
        let now = self.clock.now();
        let all = self.zone.derive(meal);
        let next_id = next_upcoming(&all, now).map(|e| e.id.clone());

        let events = filter_events(&all, now, filter, granularity)
            .into_iter()
            .map(|event| TimelineEntry {
                time_label: self.zone.label(event.when),
                title: event.title(),
                meta: event.meta(),
                done: event.is_done(now),
                countdown: format_countdown((event.when - now).num_seconds()),
                event,
            })
            .collect();

        TimelineView {
            meal_id: meal.id.clone(),
            meal_name: meal.name.clone(),
            meta: self.zone.meta(meal),
            cook_time: format_minutes(
                meal.dishes.iter().map(|d| d.total_minutes()).max().unwrap_or(0),
            ),
            filter,
            granularity,
            events,
            next_id,
        }
    }
}

/// Feed timer expiries into the app until the channel closes
pub async fn run_fire_loop(app: SharedApp, mut fire_rx: UnboundedReceiver<TimerFired>) {
    info!("Alert fire loop started");
    while let Some(fired) = fire_rx.recv().await {
        let mut app = app.lock().await;
        app.on_timer(fired).await;
    }
    debug!("Alert fire loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::LogCueSink;
    use crate::notify::LogNotificationSink;
    use crate::session::{ManualTimers, SessionStatus};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone};
    use cooktime_common::time::ManualClock;

    async fn app_at(now: DateTime<Utc>) -> (CookApp, Arc<ManualTimers>) {
        let store = Arc::new(MemoryStore::new());
        let timers = Arc::new(ManualTimers::new());
        let mut deps = AppDeps::new(
            store.clone(),
            store,
            Arc::new(LogNotificationSink),
            Arc::new(LogCueSink),
        );
        deps.timers = timers.clone();
        deps.clock = Arc::new(ManualClock::new(now));
        deps.zone = Zone::utc();
        let (app, _rx) = CookApp::new(deps).await;
        (app, timers)
    }

    #[tokio::test]
    async fn test_bootstraps_template_and_builds_timeline() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (mut app, _timers) = app_at(now).await;
        assert_eq!(app.catalog().meals().len(), 1);
        assert_eq!(app.catalog().active().name, "Roast Beef Dinner");

        app.catalog_mut()
            .set_serve(NaiveDate::from_ymd_opt(2026, 3, 1), NaiveTime::from_hms_opt(18, 30, 0))
            .await;

        let view = app.timeline(TimelineFilter::All, Granularity::All);
        assert_eq!(view.meta, "Serve at 18:30 on 2026-03-01");
        assert_eq!(view.events.len(), 30);
        assert_eq!(view.next_id.as_deref(), Some(view.events[0].event.id.as_str()));
        assert!(view.events.iter().all(|e| !e.done));

        let starts = app.timeline(TimelineFilter::All, Granularity::Start);
        assert_eq!(starts.events.len(), 15);
        assert!(starts.events.iter().all(|e| e.title.starts_with("START: ")));
    }

    #[tokio::test]
    async fn test_arm_active_schedules_future_events() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let (mut app, timers) = app_at(now).await;
        app.catalog_mut()
            .set_serve(NaiveDate::from_ymd_opt(2026, 3, 1), NaiveTime::from_hms_opt(18, 30, 0))
            .await;

        let outcome = app.arm_active().await.unwrap();
        assert_eq!(outcome.scheduled, 30);
        assert_eq!(outcome.skipped, 0);
        assert_eq!(timers.pending(), 30);
        assert_eq!(app.session_view().status, SessionStatus::Armed);

        assert!(app.stop().await.unwrap());
        assert_eq!(timers.pending(), 0);
        assert_eq!(app.session_view().status, SessionStatus::Idle);
    }
}

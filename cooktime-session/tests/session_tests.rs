//! Session state machine tests
//!
//! Arm, fire, stop and recover against manual timers and a manual clock so
//! every expiry is driven explicitly.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use cooktime_common::timeline::derive_events_at;
use cooktime_common::Zone;
use cooktime_session::error::ErrorKind;
use cooktime_session::session::{ManualTimers, RecoveryOutcome, Session, SessionStatus};
use cooktime_session::store::{MemoryStore, SessionStore};

use helpers::{at, drain_types, roast_meal, single_stage_meal, Harness};

const MIN: u64 = 60;

fn mins(n: u64) -> Duration {
    Duration::from_secs(n * MIN)
}

// ============================================================================
// Arm
// ============================================================================

#[tokio::test]
async fn test_arm_persists_record_and_schedules_future_events() {
    let mut h = Harness::new(at(12, 0));
    let meal = roast_meal();

    let outcome = h.controller.arm(&meal).await.unwrap();

    assert_eq!(outcome.serve_when, at(18, 30));
    assert_eq!(outcome.scheduled, 4);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(h.controller.status(), SessionStatus::Armed);

    let record = h.store.session_snapshot().expect("session record");
    assert_eq!(record.meal_id, meal.id);
    assert_eq!(record.serve_when, at(18, 30));
    assert_eq!(record.armed_at, at(12, 0));
    assert!(record.fired_event_ids.is_empty());

    assert_eq!(
        h.timers.pending_delays(),
        vec![mins(305), mins(350), mins(350), mins(390)]
    );
}

#[tokio::test]
async fn test_arm_skips_past_events() {
    let mut h = Harness::new(at(17, 30));

    let outcome = h.controller.arm(&roast_meal()).await.unwrap();

    assert_eq!(outcome.scheduled, 3);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(h.timers.pending(), 3);
    assert_eq!(h.controller.pending()[0].when, at(17, 50));
}

#[tokio::test]
async fn test_arm_without_serve_time_creates_no_session() {
    let mut h = Harness::new(at(12, 0));
    let mut meal = roast_meal();
    meal.serve_time = None;

    let err = h.controller.arm(&meal).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.controller.status(), SessionStatus::Idle);
    assert!(h.store.session_snapshot().is_none());
    assert_eq!(h.timers.pending(), 0);
}

#[tokio::test]
async fn test_arm_with_no_alerting_stage_fails() {
    let mut h = Harness::new(at(12, 0));
    let mut meal = roast_meal();
    for stage in &mut meal.dishes[0].stages {
        stage.alert_start = false;
        stage.alert_end = false;
    }

    let err = h.controller.arm(&meal).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.store.session_snapshot().is_none());
}

#[tokio::test]
async fn test_rearm_replaces_previous_timers() {
    let mut h = Harness::new(at(12, 0));
    let meal = roast_meal();

    h.controller.arm(&meal).await.unwrap();
    let first_generation = h.controller.generation();
    h.controller.arm(&meal).await.unwrap();

    assert_eq!(h.timers.pending(), 4);
    assert!(h.controller.generation() > first_generation);
}

#[tokio::test]
async fn test_arm_plays_armed_cue() {
    let mut h = Harness::new(at(12, 0));
    h.controller.arm(&roast_meal()).await.unwrap();

    let freqs: Vec<f32> = h.audio.all().iter().map(|b| b.frequency_hz).collect();
    assert_eq!(freqs, vec![740.0, 520.0]);
}

// ============================================================================
// Fire
// ============================================================================

#[tokio::test]
async fn test_timer_expiry_produces_notification() {
    let mut h = Harness::new(at(12, 0));
    h.controller.arm(&roast_meal()).await.unwrap();

    let fired = h.advance(mins(305)).await;

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].title, "START: Roast");
    assert_eq!(fired[0].body, "17:05 - Temper");
    assert_eq!(h.notifier.count(), 1);
    assert_eq!(h.controller.pending().len(), 3);

    let record = h.store.session_snapshot().unwrap();
    assert_eq!(record.fired_event_ids.len(), 1);
}

#[tokio::test]
async fn test_same_event_dispatches_once() {
    let mut h = Harness::new(at(12, 0));
    let meal = roast_meal();
    h.controller.arm(&meal).await.unwrap();
    let event = derive_events_at(&meal, at(18, 30)).remove(0);

    assert!(h.controller.fire(&event).await.is_some());
    assert!(h.controller.fire(&event).await.is_none());

    assert_eq!(h.notifier.count(), 1);
    assert!(h.store.session_snapshot().unwrap().has_fired(&event.id));
}

#[tokio::test]
async fn test_notes_appear_on_second_line() {
    let mut h = Harness::new(at(12, 0));
    h.controller.arm(&roast_meal()).await.unwrap();

    let fired = h.advance(mins(350)).await;

    // End of Temper sorts before start of Roast at 17:50
    assert_eq!(fired.len(), 3);
    assert_eq!(fired[1].title, "END: Roast");
    assert_eq!(fired[1].body, "17:50 - Temper");
    assert_eq!(fired[2].title, "START: Roast");
    assert_eq!(fired[2].body, "17:50 - Roast\n220°C");
}

#[tokio::test]
async fn test_stale_expiry_is_dropped_after_rearm() {
    let mut h = Harness::new(at(12, 0));
    let meal = roast_meal();
    h.controller.arm(&meal).await.unwrap();

    h.timers.fire_due(mins(305));
    let stale = h.fire_rx.try_recv().unwrap();

    h.controller.arm(&meal).await.unwrap();
    assert!(h.controller.on_timer(stale).await.is_none());
    assert_eq!(h.notifier.count(), 0);
    assert_eq!(h.controller.pending().len(), 4);
}

#[tokio::test]
async fn test_expiry_after_stop_is_ignored() {
    let mut h = Harness::new(at(12, 0));
    h.controller.arm(&roast_meal()).await.unwrap();

    h.timers.fire_due(mins(305));
    let late = h.fire_rx.try_recv().unwrap();
    h.controller.stop().await.unwrap();

    assert!(h.controller.on_timer(late).await.is_none());
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn test_session_completes_after_last_alert() {
    let mut h = Harness::new(at(12, 0));
    let mut events = h.bus.subscribe();
    h.controller.arm(&roast_meal()).await.unwrap();

    let fired = h.advance(mins(390)).await;

    assert_eq!(fired.len(), 4);
    assert!(h.controller.pending().is_empty());
    // Stays armed until explicitly stopped
    assert_eq!(h.controller.status(), SessionStatus::Armed);

    let types = drain_types(&mut events);
    assert_eq!(types.first().map(String::as_str), Some("SessionArmed"));
    assert_eq!(types.iter().filter(|t| *t == "AlertFired").count(), 4);
    assert_eq!(types.last().map(String::as_str), Some("SessionCompleted"));
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn test_stop_while_idle_is_noop() {
    let mut h = Harness::new(at(12, 0));
    let mut events = h.bus.subscribe();

    assert!(!h.controller.stop().await.unwrap());
    assert!(!h.controller.stop().await.unwrap());

    assert_eq!(h.controller.status(), SessionStatus::Idle);
    assert!(drain_types(&mut events).is_empty());
}

#[tokio::test]
async fn test_stop_cancels_timers_and_clears_record() {
    let mut h = Harness::new(at(12, 0));
    h.controller.arm(&roast_meal()).await.unwrap();

    assert!(h.controller.stop().await.unwrap());

    assert_eq!(h.timers.pending(), 0);
    assert!(h.store.session_snapshot().is_none());
    assert_eq!(h.controller.status(), SessionStatus::Idle);
    assert!(h.controller.session().is_none());
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_recovery_reschedules_only_unfired_events() {
    let store = Arc::new(MemoryStore::new());
    let meal = single_stage_meal();

    // First run: arm at 17:00, the 18:00 start fires
    {
        let mut h = Harness::with(store.clone(), Arc::new(ManualTimers::new()), at(17, 0));
        h.controller.arm(&meal).await.unwrap();
        let fired = h.advance(mins(60)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].title, "START: Rice");
    }

    // Restart at 18:00 exactly, before the 18:30 end
    let mut h = Harness::with(store.clone(), Arc::new(ManualTimers::new()), at(18, 0));
    let mut events = h.bus.subscribe();
    let outcome = h.controller.recover_on_startup(Some(&meal)).await.unwrap();

    assert_eq!(outcome, RecoveryOutcome::Resumed { scheduled: 1 });
    assert_eq!(h.controller.status(), SessionStatus::Armed);
    assert_eq!(h.timers.pending_delays(), vec![mins(30)]);
    assert_eq!(h.controller.pending()[0].when, at(18, 30));
    assert_eq!(drain_types(&mut events), vec!["SessionRecovered"]);

    let fired = h.advance(mins(30)).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].title, "END: Rice");
    assert_eq!(store.session_snapshot().unwrap().fired_event_ids.len(), 2);
}

#[tokio::test]
async fn test_recovery_without_record() {
    let mut h = Harness::new(at(12, 0));
    let outcome = h.controller.recover_on_startup(Some(&roast_meal())).await.unwrap();

    assert_eq!(outcome, RecoveryOutcome::NoSession);
    assert_eq!(h.controller.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn test_recovery_for_other_meal_leaves_record_orphaned() {
    let store = Arc::new(MemoryStore::new());
    let record = Session::new("some-other-meal", at(18, 30), at(12, 0));
    SessionStore::save(store.as_ref(), &record).await.unwrap();

    let mut h = Harness::with(store.clone(), Arc::new(ManualTimers::new()), at(12, 0));
    let outcome = h.controller.recover_on_startup(Some(&roast_meal())).await.unwrap();

    assert_eq!(
        outcome,
        RecoveryOutcome::Orphaned {
            session_meal_id: "some-other-meal".to_string()
        }
    );
    assert_eq!(h.controller.status(), SessionStatus::Orphaned);
    assert_eq!(h.timers.pending(), 0);
    assert_eq!(store.session_snapshot(), Some(record));

    // An explicit stop clears it
    assert!(h.controller.stop().await.unwrap());
    assert!(store.session_snapshot().is_none());
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_scheduling_failure_rolls_back() {
    let timers = Arc::new(ManualTimers::failing_after(1));
    let mut h = Harness::with(Arc::new(MemoryStore::new()), timers, at(12, 0));
    let mut events = h.bus.subscribe();

    let err = h.controller.arm(&roast_meal()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(h.timers.pending(), 0);
    assert!(h.store.session_snapshot().is_none());
    assert_eq!(h.controller.status(), SessionStatus::Idle);
    assert!(!drain_types(&mut events).contains(&"SessionArmed".to_string()));
}

#[tokio::test]
async fn test_storage_failure_degrades_without_stopping_session() {
    let mut h = Harness::new(at(12, 0));
    let mut events = h.bus.subscribe();
    h.store.set_fail_writes(true);

    let outcome = h.controller.arm(&roast_meal()).await.unwrap();
    assert_eq!(outcome.scheduled, 4);
    assert_eq!(h.controller.status(), SessionStatus::Armed);

    let fired = h.advance(mins(305)).await;
    assert_eq!(fired.len(), 1);

    let types = drain_types(&mut events);
    assert_eq!(types[0], "StorageDegraded");
    assert!(types.contains(&"SessionArmed".to_string()));
    assert_eq!(types.iter().filter(|t| *t == "StorageDegraded").count(), 2);
}

#[tokio::test]
async fn test_fixed_offset_zone_labels_local_wall_clock() {
    // Serve 18:30 at UTC+02:00 is 16:30 UTC
    let zone = Zone::Fixed(chrono::FixedOffset::east_opt(2 * 3600).unwrap());
    let meal = roast_meal();
    assert_eq!(zone.serve_instant(&meal), Some(at(16, 30)));
    assert_eq!(zone.label(at(15, 5)), "17:05");
}

#[tokio::test]
async fn test_load_record_then_stop_schedules_nothing() {
    let store = Arc::new(MemoryStore::new());
    let meal = roast_meal();
    {
        let mut h = Harness::with(store.clone(), Arc::new(ManualTimers::new()), at(12, 0));
        h.controller.arm(&meal).await.unwrap();
    }

    let mut h = Harness::with(store.clone(), Arc::new(ManualTimers::new()), at(13, 0));
    let mut events = h.bus.subscribe();

    assert!(h.controller.load_record().await);
    assert_eq!(h.timers.pending(), 0);
    assert_eq!(h.controller.status(), SessionStatus::Orphaned);

    assert!(h.controller.stop().await.unwrap());
    assert!(store.session_snapshot().is_none());
    assert_eq!(drain_types(&mut events), vec!["SessionStopped"]);
}

#[tokio::test]
async fn test_load_record_without_record() {
    let mut h = Harness::new(at(12, 0));
    assert!(!h.controller.load_record().await);
    assert!(!h.controller.stop().await.unwrap());
    assert_eq!(h.controller.status(), SessionStatus::Idle);
}

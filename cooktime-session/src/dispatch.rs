//! Alert dispatcher
//!
//! Turns a due [`TimelineEvent`] into its side effects: exactly one
//! notification and one audio cue. Deciding *whether* an event may fire
//! (the fired-set check) belongs to the session controller; the dispatcher
//! only renders.

use std::sync::Arc;

use tracing::warn;

use cooktime_common::{TimelineEvent, Zone};

use crate::audio::{AudioCueSink, Cue};
use crate::notify::{Notification, NotificationSink};

pub struct AlertDispatcher {
    notifier: Arc<dyn NotificationSink>,
    audio: Arc<dyn AudioCueSink>,
    sound_enabled: bool,
    zone: Zone,
}

impl AlertDispatcher {
    pub fn new(notifier: Arc<dyn NotificationSink>, audio: Arc<dyn AudioCueSink>) -> Self {
        Self {
            notifier,
            audio,
            sound_enabled: true,
            zone: Zone::Local,
        }
    }

    /// Zone used for the `HH:MM` label in notification bodies
    pub fn with_zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_sound(mut self, enabled: bool) -> Self {
        self.sound_enabled = enabled;
        self
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    /// Title `"START: {dish}"`, body `"{HH:MM} - {stage}"` plus notes on a new line
    pub fn notification_for(&self, event: &TimelineEvent) -> Notification {
        let mut body = format!("{} - {}", self.zone.label(event.when), event.stage);
        if !event.notes.is_empty() {
            body.push('\n');
            body.push_str(&event.notes);
        }
        Notification::new(format!("{}: {}", event.kind.label(), event.dish), body)
    }

    /// Notify and play the cue for an event
    pub fn dispatch(&self, event: &TimelineEvent) -> Notification {
        let notification = self.notification_for(event);
        self.play(Cue::for_event(event.kind));
        self.notifier.notify(&notification);
        notification
    }

    /// Play a cue; failures are logged, never returned
    pub fn play(&self, cue: Cue) {
        if !self.sound_enabled {
            return;
        }
        for beep in cue.beeps() {
            if let Err(e) = self.audio.play_cue(beep) {
                warn!("Audio cue {:?} failed: {}", cue, e);
                return;
            }
        }
    }
}

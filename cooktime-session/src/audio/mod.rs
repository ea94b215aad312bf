//! Audio cues
//!
//! A cue is a short pattern of beeps. Each beep is handed to an
//! [`AudioCueSink`] as `(waveform, pitch, duration, delay)`; the sink decides
//! how (or whether) to make a sound. Playing is best-effort: callers log
//! failures and carry on.
//!
//! Sinks:
//! - [`LogCueSink`]: logs each beep at debug level (always available)
//! - `ToneCueSink`: synthesizes sine beeps on the default output device
//!   (`tone` feature, needs cpal)

#[cfg(feature = "tone")]
mod tone;

#[cfg(feature = "tone")]
pub use tone::ToneCueSink;

use serde::Serialize;
use tracing::debug;

use cooktime_common::EventKind;

use crate::error::Result;

/// Peak gain of a beep before volume scaling
pub const BEEP_PEAK_GAIN: f32 = 0.18;

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
}

/// One tone in a cue
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Beep {
    pub waveform: Waveform,
    pub frequency_hz: f32,
    pub duration_s: f32,
    /// Offset from the start of the cue
    pub delay_s: f32,
}

const fn sine(duration_s: f32, frequency_hz: f32, delay_s: f32) -> Beep {
    Beep {
        waveform: Waveform::Sine,
        frequency_hz,
        duration_s,
        delay_s,
    }
}

/// Named beep patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    /// A stage is starting: two descending beeps
    StageStart,
    /// A stage has ended: three low beeps
    StageEnd,
    /// A session was armed
    Armed,
    /// Sound check
    SoundCheck,
}

const STAGE_START: [Beep; 2] = [sine(0.07, 880.0, 0.0), sine(0.07, 660.0, 0.10)];
const STAGE_END: [Beep; 3] = [
    sine(0.09, 520.0, 0.0),
    sine(0.09, 520.0, 0.12),
    sine(0.09, 420.0, 0.24),
];
const ARMED: [Beep; 2] = [sine(0.08, 740.0, 0.0), sine(0.08, 520.0, 0.11)];
const SOUND_CHECK: [Beep; 2] = [sine(0.06, 880.0, 0.0), sine(0.06, 660.0, 0.09)];

impl Cue {
    pub fn for_event(kind: EventKind) -> Self {
        match kind {
            EventKind::Start => Cue::StageStart,
            EventKind::End => Cue::StageEnd,
        }
    }

    pub fn beeps(&self) -> &'static [Beep] {
        match self {
            Cue::StageStart => &STAGE_START,
            Cue::StageEnd => &STAGE_END,
            Cue::Armed => &ARMED,
            Cue::SoundCheck => &SOUND_CHECK,
        }
    }
}

/// Consumer of beeps
pub trait AudioCueSink: Send + Sync {
    fn play_cue(&self, beep: &Beep) -> Result<()>;
}

/// Sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCueSink;

impl AudioCueSink for LogCueSink {
    fn play_cue(&self, beep: &Beep) -> Result<()> {
        debug!(
            "beep {:?} {} Hz for {:.2}s after {:.2}s",
            beep.waveform, beep.frequency_hz, beep.duration_s, beep.delay_s
        );
        Ok(())
    }
}

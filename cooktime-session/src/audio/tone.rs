//! Sine-beep synthesis using cpal
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated audio
//! thread. [`ToneCueSink::play_cue`] only posts the beep over a channel; the
//! audio thread schedules it on a shared voice list that the output callback
//! renders.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use tracing::{debug, error, info, warn};

use super::{AudioCueSink, Beep, BEEP_PEAK_GAIN};
use crate::error::{Error, Result};

/// Gain floor of the exponential envelope
const GAIN_FLOOR: f32 = 0.0001;

/// Attack time of each beep (seconds)
const ATTACK_S: f32 = 0.01;

/// Extra silence rendered after the envelope reaches the floor (seconds)
const RELEASE_TAIL_S: f32 = 0.02;

struct Voice {
    start: u64,
    frequency_hz: f32,
    duration_s: f32,
}

/// Exponential attack to peak, then exponential decay to the floor
fn envelope(t: f32, duration_s: f32, peak: f32) -> f32 {
    if peak <= GAIN_FLOOR {
        return 0.0;
    }
    if t < ATTACK_S {
        GAIN_FLOOR * (peak / GAIN_FLOOR).powf(t / ATTACK_S)
    } else if t < duration_s {
        let decay = (duration_s - ATTACK_S).max(f32::EPSILON);
        peak * (GAIN_FLOOR / peak).powf((t - ATTACK_S) / decay)
    } else {
        0.0
    }
}

struct Mixer {
    voices: Vec<Voice>,
    position: u64,
    sample_rate: f32,
    peak: f32,
}

impl Mixer {
    fn schedule(&mut self, beep: &Beep) {
        let offset = (beep.delay_s.max(0.0) * self.sample_rate) as u64;
        self.voices.push(Voice {
            start: self.position + offset,
            frequency_hz: beep.frequency_hz,
            duration_s: beep.duration_s.max(ATTACK_S),
        });
    }

    fn next_sample(&mut self) -> f32 {
        let position = self.position;
        self.position += 1;

        let sample_rate = self.sample_rate;
        let peak = self.peak;
        let mut out = 0.0;
        self.voices.retain(|voice| {
            if position < voice.start {
                return true;
            }
            let t = (position - voice.start) as f32 / sample_rate;
            if t > voice.duration_s + RELEASE_TAIL_S {
                return false;
            }
            let phase = 2.0 * std::f32::consts::PI * voice.frequency_hz * t;
            out += phase.sin() * envelope(t, voice.duration_s, peak);
            true
        });
        out.clamp(-1.0, 1.0)
    }
}

/// Audio cue sink playing beeps on the default output device
pub struct ToneCueSink {
    tx: Mutex<Sender<Beep>>,
}

impl ToneCueSink {
    /// Open the default output device on a dedicated audio thread
    ///
    /// `volume` (0.0 - 1.0) scales the peak beep gain.
    pub fn new(volume: f32) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Beep>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let peak = BEEP_PEAK_GAIN * volume.clamp(0.0, 1.0);

        thread::Builder::new()
            .name("cooktime-audio".to_string())
            .spawn(move || audio_thread(rx, ready_tx, peak))?;

        ready_rx
            .recv()
            .map_err(|_| Error::Audio("Audio thread exited during startup".to_string()))??;

        Ok(Self { tx: Mutex::new(tx) })
    }
}

impl AudioCueSink for ToneCueSink {
    fn play_cue(&self, beep: &Beep) -> Result<()> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(*beep)
            .map_err(|_| Error::Audio("Audio thread is not running".to_string()))
    }
}

fn open_default_device() -> Result<(Device, StreamConfig)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("No default output device found".to_string()))?;

    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    info!("Using audio device for cues: {}", name);

    let supported = device
        .default_output_config()
        .map_err(|e| Error::Audio(format!("Failed to get default config: {}", e)))?;

    if supported.sample_format() != SampleFormat::F32 {
        return Err(Error::Audio(format!(
            "Unsupported sample format: {:?}",
            supported.sample_format()
        )));
    }

    Ok((device, supported.config()))
}

fn audio_thread(rx: Receiver<Beep>, ready: Sender<Result<()>>, peak: f32) {
    let (device, config) = match open_default_device() {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let channels = config.channels as usize;
    let mixer = Arc::new(Mutex::new(Mixer {
        voices: Vec::new(),
        position: 0,
        sample_rate: config.sample_rate.0 as f32,
        peak,
    }));

    let render = Arc::clone(&mixer);
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut mixer = render.lock().unwrap_or_else(PoisonError::into_inner);
            for frame in data.chunks_mut(channels) {
                let sample = mixer.next_sample();
                frame.iter_mut().for_each(|s| *s = sample);
            }
        },
        move |err| {
            error!("Audio stream error: {}", err);
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(Error::Audio(format!("Failed to build stream: {}", e))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(Error::Audio(format!("Failed to start stream: {}", e))));
        return;
    }

    let _ = ready.send(Ok(()));
    debug!("Audio cue thread running");

    // Runs until every sender is dropped
    while let Ok(beep) = rx.recv() {
        mixer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .schedule(&beep);
    }

    warn!("Audio cue thread stopping");
}

//! The audio context seam: what the race core needs from a sound backend.

use serde::Serialize;

use crate::config::EngineVoicing;
use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;
use crate::error::AudioError;

use super::param::{AudioParam, Automation};

/// Lifecycle state of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextState {
    /// Waiting for a user gesture; the clock does not advance.
    Suspended,
    Running,
    Closed,
}

/// The live parameters of the engine voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineParam {
    /// Sawtooth frequency (Hz), before rumble modulation.
    Pitch,
    /// Rumble LFO frequency (Hz).
    RumbleRate,
    /// Lowpass cutoff (Hz).
    Cutoff,
    /// Output gain.
    Volume,
}

impl EngineParam {
    pub const ALL: [EngineParam; 4] = [
        EngineParam::Pitch,
        EngineParam::RumbleRate,
        EngineParam::Cutoff,
        EngineParam::Volume,
    ];
}

/// A backend able to run one engine voice and fire one-shot sounds.
pub trait AudioContext {
    fn state(&self) -> ContextState;

    /// Leave the suspended state. Resuming a running context is a no-op.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Release every resource. Further calls fail with [`AudioError::Closed`].
    fn close(&mut self);

    /// Seconds on the audio clock.
    fn current_time(&self) -> f64;

    /// Build and start the engine voice: sawtooth tone, rumble LFO into
    /// its pitch, lowpass filter and a gain starting at silence.
    fn start_engine_voice(&mut self, voicing: &EngineVoicing) -> Result<(), AudioError>;

    /// A handle on a running engine parameter, `None` when no voice runs.
    fn engine_param(&mut self, param: EngineParam) -> Option<&mut dyn AudioParam>;

    fn stop_engine_voice(&mut self);

    /// Schedule a fire-and-forget sound.
    fn play(&mut self, event: &SoundEvent) -> Result<(), AudioError>;
}

/// A fully scheduled one-shot sound.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SoundEvent {
    Noise(NoiseBurst),
    Tone(ToneBurst),
}

impl SoundEvent {
    pub fn start(&self) -> f64 {
        match self {
            SoundEvent::Noise(n) => n.start,
            SoundEvent::Tone(t) => t.start,
        }
    }

    /// Time at which the source stops producing sound.
    pub fn end(&self) -> f64 {
        match self {
            SoundEvent::Noise(n) => n.start + n.duration,
            SoundEvent::Tone(t) => t.stop,
        }
    }
}

/// White noise through a biquad filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseBurst {
    pub start: f64,
    /// Length of the noise buffer in seconds.
    pub duration: f64,
    /// Peak amplitude of the raw noise.
    pub amplitude: f64,
    pub filter: FilterType,
    pub q: f64,
    pub cutoff: Vec<Automation>,
    pub gain: Vec<Automation>,
}

/// A fixed-pitch oscillator note.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneBurst {
    pub start: f64,
    pub stop: f64,
    pub waveform: Waveform,
    pub frequency: f64,
    pub gain: Vec<Automation>,
}

//! Synth context: a pure-Rust audio context for the race.
//!
//! Plays the part a platform audio API plays in a browser: it owns the
//! running engine voice and the scheduled one-shots, and renders them
//! block by block. The same code serves offline WAV export, AudioWorklet
//! playback through WASM, and tests.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::audio::context::{AudioContext, ContextState, EngineParam, NoiseBurst, SoundEvent, ToneBurst};
use crate::audio::param::{AudioParam, AutomatedParam};
use crate::config::EngineVoicing;
use crate::error::AudioError;

use super::filter::{BiquadFilter, FilterType};
use super::mixer::Mixer;
use super::noise::white_noise;
use super::oscillator::{Oscillator, Waveform};

/// WebAudio's default biquad frequency, used before any automation.
const DEFAULT_FILTER_FREQUENCY: f64 = 350.0;

/// Sawtooth through a lowpass, pitch wobbled by a sine rumble.
struct EngineVoice {
    tone: Oscillator,
    rumble: Oscillator,
    rumble_depth: f64,
    filter: BiquadFilter,
    pitch: AutomatedParam,
    rumble_rate: AutomatedParam,
    cutoff: AutomatedParam,
    volume: AutomatedParam,
}

impl EngineVoice {
    fn new(voicing: &EngineVoicing, sample_rate: f64, now: f64) -> Self {
        let mut volume = AutomatedParam::new(1.0);
        volume.set_value_at_time(0.0, now);
        EngineVoice {
            tone: Oscillator::new(Waveform::Sawtooth, sample_rate),
            rumble: Oscillator::new(Waveform::Sine, sample_rate),
            rumble_depth: voicing.rumble_depth,
            filter: BiquadFilter::new(FilterType::Lowpass, voicing.filter_q, sample_rate),
            pitch: AutomatedParam::new(voicing.base_pitch),
            rumble_rate: AutomatedParam::new(voicing.rumble_rate),
            cutoff: AutomatedParam::new(voicing.base_cutoff),
            volume,
        }
    }

    fn next_sample(&mut self, t: f64) -> f64 {
        let wobble = self.rumble.next_sample(self.rumble_rate.value_at(t)) * self.rumble_depth;
        let raw = self.tone.next_sample(self.pitch.value_at(t) + wobble);
        self.filter.process(raw, self.cutoff.value_at(t)) * self.volume.value_at(t)
    }

    fn param_mut(&mut self, param: EngineParam) -> &mut AutomatedParam {
        match param {
            EngineParam::Pitch => &mut self.pitch,
            EngineParam::RumbleRate => &mut self.rumble_rate,
            EngineParam::Cutoff => &mut self.cutoff,
            EngineParam::Volume => &mut self.volume,
        }
    }

    fn prune(&mut self, t: f64) {
        for param in EngineParam::ALL {
            self.param_mut(param).prune(t);
        }
    }
}

enum Source {
    Noise { buffer: Vec<f64>, cursor: usize },
    Tone { osc: Oscillator, frequency: f64 },
}

/// A scheduled fire-and-forget sound.
struct OneShotVoice {
    start: f64,
    end: f64,
    source: Source,
    filter: Option<(BiquadFilter, AutomatedParam)>,
    gain: AutomatedParam,
}

impl OneShotVoice {
    fn noise(burst: &NoiseBurst, sample_rate: f64, rng: &mut Pcg32) -> Self {
        let len = (burst.duration * sample_rate).round().max(0.0) as usize;
        let buffer = white_noise(len, burst.amplitude, rng);

        let mut cutoff = AutomatedParam::new(DEFAULT_FILTER_FREQUENCY);
        for event in &burst.cutoff {
            cutoff.apply(event);
        }
        let mut gain = AutomatedParam::new(1.0);
        for event in &burst.gain {
            gain.apply(event);
        }

        OneShotVoice {
            start: burst.start,
            end: burst.start + len as f64 / sample_rate,
            source: Source::Noise { buffer, cursor: 0 },
            filter: Some((BiquadFilter::new(burst.filter, burst.q, sample_rate), cutoff)),
            gain,
        }
    }

    fn tone(burst: &ToneBurst, sample_rate: f64) -> Self {
        let mut gain = AutomatedParam::new(1.0);
        for event in &burst.gain {
            gain.apply(event);
        }
        OneShotVoice {
            start: burst.start,
            end: burst.stop,
            source: Source::Tone {
                osc: Oscillator::new(burst.waveform, sample_rate),
                frequency: burst.frequency,
            },
            filter: None,
            gain,
        }
    }

    fn next_sample(&mut self, t: f64) -> f64 {
        if t < self.start || t >= self.end {
            return 0.0;
        }
        let raw = match &mut self.source {
            Source::Noise { buffer, cursor } => {
                let s = buffer.get(*cursor).copied().unwrap_or(0.0);
                *cursor += 1;
                s
            }
            Source::Tone { osc, frequency } => osc.next_sample(*frequency),
        };
        let shaped = match &mut self.filter {
            Some((filter, cutoff)) => filter.process(raw, cutoff.value_at(t)),
            None => raw,
        };
        shaped * self.gain.value_at(t)
    }
}

/// In-process audio context rendering the engine voice and one-shots.
pub struct SynthContext {
    sample_rate: f64,
    frame: u64,
    state: ContextState,
    engine: Option<EngineVoice>,
    one_shots: Vec<OneShotVoice>,
    one_shots_played: usize,
    rng: Pcg32,
    mixer: Mixer,
}

impl SynthContext {
    /// A suspended context; noise buffers are drawn from `seed`.
    pub fn new(sample_rate: f64, seed: u64) -> Self {
        SynthContext {
            sample_rate,
            frame: 0,
            state: ContextState::Suspended,
            engine: None,
            one_shots: Vec::new(),
            one_shots_played: 0,
            rng: Pcg32::seed_from_u64(seed),
            mixer: Mixer::new(1.0),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Render the next `frames` mono samples and advance the clock.
    ///
    /// A context that is not running yields silence and its clock stays
    /// put.
    pub fn render(&mut self, frames: usize) -> Vec<f64> {
        self.mixer.clear(frames);
        if self.state != ContextState::Running {
            return self.mixer.output();
        }

        for i in 0..frames {
            let t = self.frame as f64 / self.sample_rate;
            let mut sample = 0.0;
            if let Some(engine) = self.engine.as_mut() {
                sample += engine.next_sample(t);
            }
            for voice in self.one_shots.iter_mut() {
                sample += voice.next_sample(t);
            }
            self.mixer.add(i, sample);
            self.frame += 1;
        }

        let now = self.current_time();
        if let Some(engine) = self.engine.as_mut() {
            engine.prune(now);
        }
        self.one_shots.retain(|voice| voice.end > now);
        self.mixer.output()
    }

    /// Engine gain at the current time, 0 without a voice.
    pub fn engine_volume(&self) -> f64 {
        self.engine
            .as_ref()
            .map(|e| e.volume.value_at(self.current_time()))
            .unwrap_or(0.0)
    }

    pub fn has_engine_voice(&self) -> bool {
        self.engine.is_some()
    }

    /// One-shots accepted since the context was created.
    pub fn one_shots_played(&self) -> usize {
        self.one_shots_played
    }

    /// One-shots scheduled or sounding right now.
    pub fn active_one_shots(&self) -> usize {
        self.one_shots.len()
    }
}

impl AudioContext for SynthContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        match self.state {
            ContextState::Closed => Err(AudioError::Closed),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) {
        self.state = ContextState::Closed;
        self.engine = None;
        self.one_shots.clear();
    }

    fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate
    }

    fn start_engine_voice(&mut self, voicing: &EngineVoicing) -> Result<(), AudioError> {
        if self.state == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        if self.engine.is_some() {
            return Err(AudioError::VoiceAlreadyRunning);
        }
        self.engine = Some(EngineVoice::new(voicing, self.sample_rate, self.current_time()));
        Ok(())
    }

    fn engine_param(&mut self, param: EngineParam) -> Option<&mut dyn AudioParam> {
        // Settled history goes before every retarget, so a host that ticks
        // without pulling audio still keeps each timeline short.
        let now = self.current_time();
        self.engine.as_mut().map(|e| {
            let automated = e.param_mut(param);
            automated.prune(now);
            automated as &mut dyn AudioParam
        })
    }

    fn stop_engine_voice(&mut self) {
        self.engine = None;
    }

    fn play(&mut self, event: &SoundEvent) -> Result<(), AudioError> {
        if self.state == ContextState::Closed {
            return Err(AudioError::Closed);
        }
        let voice = match event {
            SoundEvent::Noise(burst) => OneShotVoice::noise(burst, self.sample_rate, &mut self.rng),
            SoundEvent::Tone(burst) => OneShotVoice::tone(burst, self.sample_rate),
        };
        self.one_shots.push(voice);
        self.one_shots_played += 1;
        Ok(())
    }
}

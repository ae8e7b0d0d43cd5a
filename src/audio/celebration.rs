//! Finish-line celebration: crowd roar, scattered claps and a fanfare.
//!
//! A celebration is planned into an immutable [`CelebrationSchedule`] at
//! trigger time, then handed to the audio context as fire-and-forget
//! one-shots. Nothing survives playback.

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::dsp::filter::FilterType;
use crate::dsp::oscillator::Waveform;

use super::context::{AudioContext, NoiseBurst, SoundEvent, ToneBurst};
use super::engine_node::AudioEngineNode;
use super::param::Automation;

/// Time constant of the engine fade when the race ends.
pub const ENGINE_FADE_TIME_CONSTANT: f64 = 0.5;

// Crowd roar
const ROAR_DURATION: f64 = 3.0;
const ROAR_AMPLITUDE: f64 = 0.5;
const ROAR_CUTOFF_FROM: f64 = 400.0;
const ROAR_CUTOFF_TO: f64 = 800.0;
const ROAR_CUTOFF_RISE: f64 = 2.0;
const ROAR_PEAK: f64 = 0.4;
const ROAR_ATTACK: f64 = 0.5;
const ROAR_FLOOR: f64 = 0.01;
const ROAR_DECAY_END: f64 = 4.0;

// Claps
pub const DEFAULT_CLAP_COUNT: usize = 20;
const CLAP_EARLIEST: f64 = 0.2;
const CLAP_SPREAD: f64 = 2.5;
const CLAP_DURATION: f64 = 0.1;
const CLAP_CENTER_LOW: f64 = 1000.0;
const CLAP_CENTER_SPREAD: f64 = 500.0;
const CLAP_LEVEL: f64 = 0.1;
const CLAP_FLOOR: f64 = 0.001;

// Fanfare
const NOTE_ATTACK: f64 = 0.05;
const NOTE_LEVEL: f64 = 0.3;
const NOTE_TAIL: f64 = 0.1;

/// C5 E5 G5 C6 as (frequency, onset, duration).
const FANFARE: [(f64, f64, f64); 4] = [
    (523.25, 0.0, 0.15),
    (659.25, 0.15, 0.15),
    (783.99, 0.30, 0.15),
    (1046.50, 0.45, 0.8),
];

/// Every sound of one celebration, with absolute start times.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CelebrationSchedule {
    pub start: f64,
    pub roar: NoiseBurst,
    pub claps: Vec<NoiseBurst>,
    pub fanfare: Vec<ToneBurst>,
}

impl CelebrationSchedule {
    /// All sounds as context events, roar first.
    pub fn events(&self) -> Vec<SoundEvent> {
        std::iter::once(SoundEvent::Noise(self.roar.clone()))
            .chain(self.claps.iter().cloned().map(SoundEvent::Noise))
            .chain(self.fanfare.iter().cloned().map(SoundEvent::Tone))
            .collect()
    }

    pub fn len(&self) -> usize {
        1 + self.claps.len() + self.fanfare.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// When the last sound stops.
    pub fn end(&self) -> f64 {
        self.events()
            .iter()
            .map(SoundEvent::end)
            .fold(self.start, f64::max)
    }
}

/// Stateless builder and trigger of the celebration.
#[derive(Debug, Clone)]
pub struct CelebrationSynth {
    clap_count: usize,
}

impl Default for CelebrationSynth {
    fn default() -> Self {
        CelebrationSynth {
            clap_count: DEFAULT_CLAP_COUNT,
        }
    }
}

impl CelebrationSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clap_count(clap_count: usize) -> Self {
        CelebrationSynth { clap_count }
    }

    /// Lay out a celebration starting at `start` seconds.
    pub fn plan<R: Rng>(&self, start: f64, rng: &mut R) -> CelebrationSchedule {
        let claps = (0..self.clap_count)
            .map(|_| {
                let at = start + CLAP_EARLIEST + rng.random::<f64>() * CLAP_SPREAD;
                let center = CLAP_CENTER_LOW + rng.random::<f64>() * CLAP_CENTER_SPREAD;
                clap(at, center)
            })
            .collect();

        let fanfare = FANFARE
            .iter()
            .map(|&(frequency, onset, duration)| note(start + onset, frequency, duration))
            .collect();

        CelebrationSchedule {
            start,
            roar: roar(start),
            claps,
            fanfare,
        }
    }

    /// Fade the engine out and fire the celebration on the engine's
    /// context. Returns the schedule that was played, or `None` when
    /// audio is not up.
    pub fn play<C, R>(&self, engine: &mut AudioEngineNode<C>, rng: &mut R) -> Option<CelebrationSchedule>
    where
        C: AudioContext,
        R: Rng,
    {
        let Some(now) = engine.current_time() else {
            debug!("celebration skipped: no audio");
            return None;
        };

        engine.fade_out(ENGINE_FADE_TIME_CONSTANT);
        let schedule = self.plan(now, rng);
        let events = schedule.events();
        let accepted = engine.play_one_shots(&events);
        info!(at = now, sounds = accepted, "celebration scheduled");
        Some(schedule)
    }
}

fn roar(t: f64) -> NoiseBurst {
    NoiseBurst {
        start: t,
        duration: ROAR_DURATION,
        amplitude: ROAR_AMPLITUDE,
        filter: FilterType::Lowpass,
        q: 1.0,
        cutoff: vec![
            Automation::SetValue {
                value: ROAR_CUTOFF_FROM,
                time: t,
            },
            Automation::LinearRamp {
                value: ROAR_CUTOFF_TO,
                end_time: t + ROAR_CUTOFF_RISE,
            },
        ],
        gain: vec![
            Automation::SetValue { value: 0.0, time: t },
            Automation::LinearRamp {
                value: ROAR_PEAK,
                end_time: t + ROAR_ATTACK,
            },
            Automation::ExponentialRamp {
                value: ROAR_FLOOR,
                end_time: t + ROAR_DECAY_END,
            },
        ],
    }
}

fn clap(at: f64, center: f64) -> NoiseBurst {
    NoiseBurst {
        start: at,
        duration: CLAP_DURATION,
        amplitude: 1.0,
        filter: FilterType::Bandpass,
        q: 1.0,
        cutoff: vec![Automation::SetValue {
            value: center,
            time: at,
        }],
        gain: vec![
            Automation::SetValue {
                value: CLAP_LEVEL,
                time: at,
            },
            Automation::ExponentialRamp {
                value: CLAP_FLOOR,
                end_time: at + CLAP_DURATION,
            },
        ],
    }
}

fn note(at: f64, frequency: f64, duration: f64) -> ToneBurst {
    ToneBurst {
        start: at,
        stop: at + duration + NOTE_TAIL,
        waveform: Waveform::Triangle,
        frequency,
        gain: vec![
            Automation::SetValue { value: 0.0, time: at },
            Automation::LinearRamp {
                value: NOTE_LEVEL,
                end_time: at + NOTE_ATTACK,
            },
            Automation::LinearRamp {
                value: 0.0,
                end_time: at + duration,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineVoicing;
    use crate::dsp::synth::SynthContext;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn plan_at(start: f64, seed: u64) -> CelebrationSchedule {
        CelebrationSynth::new().plan(start, &mut Pcg32::seed_from_u64(seed))
    }

    #[test]
    fn plan_has_roar_twenty_claps_and_four_notes() {
        let s = plan_at(0.0, 1);
        assert_eq!(s.claps.len(), 20);
        assert_eq!(s.fanfare.len(), 4);
        assert_eq!(s.len(), 25);
        assert_eq!(s.events().len(), 25);
    }

    #[test]
    fn claps_land_in_window_with_varied_tone() {
        for seed in 0..16 {
            let t = 7.25;
            let s = plan_at(t, seed);
            for c in &s.claps {
                assert!(c.start >= t + 0.2 && c.start < t + 2.7, "clap at {}", c.start);
                assert_eq!(c.duration, 0.1);
                assert_eq!(c.filter, FilterType::Bandpass);
                let Automation::SetValue { value: center, .. } = c.cutoff[0] else {
                    panic!("clap cutoff should be fixed");
                };
                assert!((1000.0..1500.0).contains(&center));
            }
        }
    }

    #[test]
    fn clap_envelope_is_fast_exponential_decay() {
        let s = plan_at(0.0, 3);
        for c in &s.claps {
            assert_eq!(c.gain.len(), 2);
            assert_eq!(c.gain[0], Automation::SetValue { value: 0.1, time: c.start });
            assert_eq!(
                c.gain[1],
                Automation::ExponentialRamp {
                    value: 0.001,
                    end_time: c.start + 0.1
                }
            );
        }
    }

    #[test]
    fn roar_rises_then_decays() {
        let s = plan_at(2.0, 4);
        let roar = &s.roar;
        assert_eq!(roar.start, 2.0);
        assert_eq!(roar.duration, 3.0);
        assert_eq!(roar.filter, FilterType::Lowpass);
        assert_eq!(roar.cutoff[0], Automation::SetValue { value: 400.0, time: 2.0 });
        assert_eq!(roar.cutoff[1], Automation::LinearRamp { value: 800.0, end_time: 4.0 });
        assert_eq!(roar.gain[1], Automation::LinearRamp { value: 0.4, end_time: 2.5 });
        assert_eq!(
            roar.gain[2],
            Automation::ExponentialRamp {
                value: 0.01,
                end_time: 6.0
            }
        );
    }

    #[test]
    fn fanfare_is_fixed_arpeggio() {
        let s = plan_at(1.0, 5);
        let freqs: Vec<f64> = s.fanfare.iter().map(|n| n.frequency).collect();
        assert_eq!(freqs, vec![523.25, 659.25, 783.99, 1046.50]);
        let last = &s.fanfare[3];
        assert!((last.start - 1.45).abs() < 1e-12);
        assert!((last.stop - (1.45 + 0.8 + 0.1)).abs() < 1e-12);
        for n in &s.fanfare {
            assert_eq!(n.waveform, Waveform::Triangle);
            assert_eq!(n.gain.len(), 3);
            assert!(matches!(n.gain[2], Automation::LinearRamp { value, .. } if value == 0.0));
            assert!(n.stop > n.gain[2].time());
        }
    }

    #[test]
    fn fanfare_ignores_randomness() {
        assert_eq!(plan_at(0.0, 1).fanfare, plan_at(0.0, 2).fanfare);
        assert_eq!(plan_at(0.0, 1).roar, plan_at(0.0, 2).roar);
    }

    #[test]
    fn same_seed_same_plan() {
        assert_eq!(plan_at(0.0, 42), plan_at(0.0, 42));
        assert_ne!(plan_at(0.0, 42).claps, plan_at(0.0, 43).claps);
    }

    #[test]
    fn schedule_ends_after_roar() {
        let s = plan_at(0.0, 6);
        assert!(s.end() >= 3.0);
        assert!(s.end() < 3.1);
    }

    #[test]
    fn custom_clap_count() {
        let s = CelebrationSynth::with_clap_count(3).plan(0.0, &mut Pcg32::seed_from_u64(0));
        assert_eq!(s.claps.len(), 3);
    }

    #[test]
    fn play_without_audio_is_noop() {
        let mut engine = AudioEngineNode::new(
            EngineVoicing::default(),
            Box::new(|| Ok(SynthContext::new(8000.0, 0))),
        );
        let played = CelebrationSynth::new().play(&mut engine, &mut Pcg32::seed_from_u64(0));
        assert!(played.is_none());
    }

    #[test]
    fn play_schedules_everything_and_fades_engine() {
        let mut engine = AudioEngineNode::new(
            EngineVoicing::default(),
            Box::new(|| Ok(SynthContext::new(8000.0, 0))),
        );
        engine.init();
        engine.update(25.0);
        let played = CelebrationSynth::new()
            .play(&mut engine, &mut Pcg32::seed_from_u64(0))
            .expect("audio is up");
        assert_eq!(played.len(), 25);

        let ctx = engine.context_mut().unwrap();
        assert_eq!(ctx.one_shots_played(), 25);
        ctx.render(8000 * 3);
        assert!(ctx.engine_volume() < 1e-3, "engine should have faded out");
    }
}

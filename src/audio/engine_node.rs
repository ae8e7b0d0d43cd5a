//! The continuously running engine voice.
//!
//! The node is the only code that touches live engine parameters. It is
//! built lazily on the first user gesture and degrades to a silent no-op
//! when the platform has no audio to offer.

use tracing::{debug, info, warn};

use crate::config::EngineVoicing;
use crate::error::AudioError;
use crate::sim::clock::EngineSound;

use super::context::{AudioContext, ContextState, EngineParam, SoundEvent};

/// Creates the platform audio context on first activation.
pub type ContextFactory<C> = Box<dyn FnMut() -> Result<C, AudioError>>;

pub struct AudioEngineNode<C: AudioContext> {
    factory: ContextFactory<C>,
    context: Option<C>,
    voicing: EngineVoicing,
    voice_running: bool,
}

impl<C: AudioContext> AudioEngineNode<C> {
    pub fn new(voicing: EngineVoicing, factory: ContextFactory<C>) -> Self {
        AudioEngineNode {
            factory,
            context: None,
            voicing,
            voice_running: false,
        }
    }

    /// Bring audio up. Safe to call on every user gesture.
    pub fn init(&mut self) {
        if self.context.is_none() {
            match (self.factory)() {
                Ok(ctx) => {
                    debug!("audio context created");
                    self.context = Some(ctx);
                }
                Err(e) => {
                    warn!("audio unavailable, continuing silently: {e}");
                    return;
                }
            }
        }
        let Some(ctx) = self.context.as_mut() else {
            return;
        };

        if ctx.state() == ContextState::Suspended {
            if let Err(e) = ctx.resume() {
                debug!("audio context resume failed: {e}");
            }
        }

        if !self.voice_running {
            match ctx.start_engine_voice(&self.voicing) {
                Ok(()) => {
                    info!("engine voice started");
                    self.voice_running = true;
                }
                Err(AudioError::VoiceAlreadyRunning) => self.voice_running = true,
                Err(e) => warn!("engine voice failed to start: {e}"),
            }
        }
    }

    /// Retarget pitch, rumble, cutoff and volume for `velocity`.
    pub fn update(&mut self, velocity: f64) {
        if !self.voice_running {
            return;
        }
        let Some(ctx) = self.context.as_mut() else {
            return;
        };
        let now = ctx.current_time();
        let targets = self.voicing.targets(velocity);
        let smoothing = self.voicing.smoothing;

        for param in EngineParam::ALL {
            let target = match param {
                EngineParam::Pitch => targets.pitch,
                EngineParam::RumbleRate => targets.rumble_rate,
                EngineParam::Cutoff => targets.cutoff,
                EngineParam::Volume => targets.volume,
            };
            if let Some(p) = ctx.engine_param(param) {
                p.ramp_to(target, now, smoothing);
            }
        }
    }

    /// Glide the engine volume to silence.
    pub fn fade_out(&mut self, time_constant: f64) {
        if !self.voice_running {
            return;
        }
        if let Some(ctx) = self.context.as_mut() {
            let now = ctx.current_time();
            if let Some(volume) = ctx.engine_param(EngineParam::Volume) {
                volume.ramp_to(0.0, now, time_constant);
            }
        }
    }

    /// Hand one-shot sounds to the context. Returns how many were accepted.
    pub fn play_one_shots<'a>(&mut self, events: impl IntoIterator<Item = &'a SoundEvent>) -> usize {
        let Some(ctx) = self.context.as_mut() else {
            return 0;
        };
        let mut accepted = 0;
        for event in events {
            match ctx.play(event) {
                Ok(()) => accepted += 1,
                Err(e) => debug!("one-shot dropped: {e}"),
            }
        }
        accepted
    }

    /// Stop the voice and close the context. Safe without `init()`.
    pub fn teardown(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            if self.voice_running {
                ctx.stop_engine_voice();
            }
            ctx.close();
            info!("audio torn down");
        }
        self.voice_running = false;
    }

    /// Audio clock time, if audio is up.
    pub fn current_time(&self) -> Option<f64> {
        self.context.as_ref().map(|ctx| ctx.current_time())
    }

    pub fn is_active(&self) -> bool {
        self.voice_running
    }

    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut C> {
        self.context.as_mut()
    }
}

impl<C: AudioContext> EngineSound for AudioEngineNode<C> {
    fn set_speed(&mut self, velocity: f64) {
        self.update(velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::param::{AudioParam, AutomatedParam, Automation};

    /// Records everything the node asks of it.
    struct RecordingContext {
        state: ContextState,
        time: f64,
        params: Option<[AutomatedParam; 4]>,
        voices_started: usize,
        resumes: usize,
        played: Vec<SoundEvent>,
    }

    impl RecordingContext {
        fn new() -> Self {
            RecordingContext {
                state: ContextState::Suspended,
                time: 0.0,
                params: None,
                voices_started: 0,
                resumes: 0,
                played: Vec::new(),
            }
        }

        fn param(&self, param: EngineParam) -> &AutomatedParam {
            &self.params.as_ref().expect("no voice")[param as usize]
        }
    }

    impl AudioContext for RecordingContext {
        fn state(&self) -> ContextState {
            self.state
        }

        fn resume(&mut self) -> Result<(), AudioError> {
            self.resumes += 1;
            self.state = ContextState::Running;
            Ok(())
        }

        fn close(&mut self) {
            self.state = ContextState::Closed;
        }

        fn current_time(&self) -> f64 {
            self.time
        }

        fn start_engine_voice(&mut self, voicing: &EngineVoicing) -> Result<(), AudioError> {
            if self.params.is_some() {
                return Err(AudioError::VoiceAlreadyRunning);
            }
            self.voices_started += 1;
            let mut volume = AutomatedParam::new(1.0);
            volume.set_value_at_time(0.0, self.time);
            self.params = Some([
                AutomatedParam::new(voicing.base_pitch),
                AutomatedParam::new(voicing.rumble_rate),
                AutomatedParam::new(voicing.base_cutoff),
                volume,
            ]);
            Ok(())
        }

        fn engine_param(&mut self, param: EngineParam) -> Option<&mut dyn AudioParam> {
            self.params
                .as_mut()
                .map(|p| &mut p[param as usize] as &mut dyn AudioParam)
        }

        fn stop_engine_voice(&mut self) {
            self.params = None;
        }

        fn play(&mut self, event: &SoundEvent) -> Result<(), AudioError> {
            self.played.push(event.clone());
            Ok(())
        }
    }

    fn node() -> AudioEngineNode<RecordingContext> {
        AudioEngineNode::new(
            EngineVoicing::default(),
            Box::new(|| Ok(RecordingContext::new())),
        )
    }

    fn unavailable() -> AudioEngineNode<RecordingContext> {
        AudioEngineNode::new(
            EngineVoicing::default(),
            Box::new(|| Err(AudioError::Unavailable("no device".into()))),
        )
    }

    fn last_target(ctx: &RecordingContext, param: EngineParam) -> f64 {
        match ctx.param(param).events().last() {
            Some(Automation::SetTarget { target, .. }) => *target,
            other => panic!("expected a SetTarget, got {other:?}"),
        }
    }

    #[test]
    fn update_before_init_is_silent_noop() {
        let mut n = node();
        n.update(12.0);
        n.fade_out(0.5);
        assert!(!n.is_active());
        assert!(n.context().is_none());
    }

    #[test]
    fn init_builds_one_voice_and_resumes() {
        let mut n = node();
        n.init();
        n.init();
        n.init();
        let ctx = n.context().unwrap();
        assert_eq!(ctx.voices_started, 1);
        assert_eq!(ctx.resumes, 1, "only a suspended context is resumed");
        assert_eq!(ctx.state, ContextState::Running);
        assert_eq!(ctx.param(EngineParam::Volume).value_at(0.0), 0.0);
    }

    #[test]
    fn init_resumes_after_platform_suspends() {
        let mut n = node();
        n.init();
        n.context_mut().unwrap().state = ContextState::Suspended;
        n.init();
        assert_eq!(n.context().unwrap().resumes, 2);
        assert_eq!(n.context().unwrap().voices_started, 1);
    }

    #[test]
    fn update_retargets_all_four_params() {
        let mut n = node();
        n.init();
        n.context_mut().unwrap().time = 1.5;
        n.update(10.0);

        let ctx = n.context().unwrap();
        assert_eq!(last_target(ctx, EngineParam::Pitch), 120.0);
        assert_eq!(last_target(ctx, EngineParam::RumbleRate), 25.0);
        assert_eq!(last_target(ctx, EngineParam::Cutoff), 900.0);
        assert!((last_target(ctx, EngineParam::Volume) - 0.1).abs() < 1e-12);

        for param in EngineParam::ALL {
            match ctx.param(param).events().last() {
                Some(Automation::SetTarget {
                    start_time,
                    time_constant,
                    ..
                }) => {
                    assert_eq!(*start_time, 1.5);
                    assert_eq!(*time_constant, 0.1);
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn standstill_mutes_volume() {
        let mut n = node();
        n.init();
        n.update(0.0);
        assert_eq!(last_target(n.context().unwrap(), EngineParam::Volume), 0.0);
    }

    #[test]
    fn updates_never_start_new_voices() {
        let mut n = node();
        n.init();
        for i in 0..100 {
            n.update(i as f64 * 0.25);
        }
        assert_eq!(n.context().unwrap().voices_started, 1);
    }

    #[test]
    fn unavailable_audio_degrades_silently() {
        let mut n = unavailable();
        n.init();
        n.update(5.0);
        n.fade_out(0.5);
        assert_eq!(n.play_one_shots(Vec::<SoundEvent>::new().iter()), 0);
        n.teardown();
        assert!(!n.is_active());
        assert_eq!(n.current_time(), None);
    }

    #[test]
    fn teardown_without_init_is_noop() {
        let mut n = node();
        n.teardown();
        n.teardown();
        assert!(n.context().is_none());
    }

    #[test]
    fn teardown_releases_context() {
        let mut n = node();
        n.init();
        n.teardown();
        assert!(n.context().is_none());
        assert!(!n.is_active());
        // A later gesture may bring audio back.
        n.init();
        assert!(n.is_active());
    }

    #[test]
    fn one_shots_reach_the_context() {
        use crate::audio::context::ToneBurst;
        use crate::dsp::oscillator::Waveform;

        let mut n = node();
        n.init();
        let tone = SoundEvent::Tone(ToneBurst {
            start: 0.0,
            stop: 0.25,
            waveform: Waveform::Triangle,
            frequency: 523.25,
            gain: Vec::new(),
        });
        assert_eq!(n.play_one_shots([&tone, &tone]), 2);
        assert_eq!(n.context().unwrap().played.len(), 2);
    }

    #[test]
    fn fade_out_targets_silence() {
        let mut n = node();
        n.init();
        n.update(20.0);
        n.fade_out(0.5);
        match n.context().unwrap().param(EngineParam::Volume).events().last() {
            Some(Automation::SetTarget {
                target,
                time_constant,
                ..
            }) => {
                assert_eq!(*target, 0.0);
                assert_eq!(*time_constant, 0.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

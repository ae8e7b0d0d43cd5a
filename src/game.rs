//! Game controller: the single owner of race state.
//!
//! Input handlers, the frame scheduler and the renderer all go through
//! [`GameController`]. It starts and stops the frame loop, feeds the gas
//! flag to the simulation clock, and fires the celebration exactly once
//! per race.

use std::fmt;
use std::str::FromStr;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::Serialize;
use tracing::{debug, info};

use crate::audio::celebration::CelebrationSynth;
use crate::audio::context::AudioContext;
use crate::audio::engine_node::{AudioEngineNode, ContextFactory};
use crate::config::RacerConfig;
use crate::error::RacerError;
use crate::sim::clock::{KinematicState, SimulationClock};
use crate::sim::scheduler::{FrameId, FrameLoop, FrameScheduler, VirtualScheduler};

/// Where the race is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RaceState {
    Idle,
    Racing,
    Finished,
}

/// Cosmetic driver choice, passed straight through to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    Male,
    Female,
}

impl FromStr for Driver {
    type Err = RacerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Driver::Male),
            "female" => Ok(Driver::Female),
            other => Err(RacerError::invalid("driver", format!("unknown driver '{other}'"))),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Driver::Male => write!(f, "male"),
            Driver::Female => write!(f, "female"),
        }
    }
}

/// Player input, written by the input handlers only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub gas_held: bool,
}

/// Read-only view published to the renderer once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceSnapshot {
    pub velocity: f64,
    pub distance: f64,
    pub status: RaceState,
    pub gas_held: bool,
    pub driver: Option<Driver>,
    /// Percent of the finish distance covered, capped at 100.
    pub progress: f64,
}

pub struct GameController<S: FrameScheduler, C: AudioContext> {
    status: RaceState,
    input: InputState,
    clock: SimulationClock,
    frames: FrameLoop<S>,
    audio: AudioEngineNode<C>,
    celebration: CelebrationSynth,
    celebrated: bool,
    finished_races: u64,
    driver: Option<Driver>,
    rng: Pcg32,
}

impl<S: FrameScheduler, C: AudioContext> GameController<S, C> {
    /// `seed` drives the randomised parts of the celebration. Fails when
    /// `config` does not validate.
    pub fn new(config: RacerConfig, scheduler: S, audio: ContextFactory<C>, seed: u64) -> Result<Self, RacerError> {
        config.engine.validate()?;
        Ok(GameController {
            status: RaceState::Idle,
            input: InputState::default(),
            clock: SimulationClock::new(config.race)?,
            frames: FrameLoop::new(scheduler),
            audio: AudioEngineNode::new(config.engine, audio),
            celebration: CelebrationSynth::new(),
            celebrated: false,
            finished_races: 0,
            driver: None,
            rng: Pcg32::seed_from_u64(seed),
        })
    }

    // ── Input ───────────────────────────────────────────────

    /// Pick a driver. Counts as a user gesture for audio activation.
    pub fn select_driver(&mut self, driver: Driver) {
        self.audio.init();
        self.driver = Some(driver);
        debug!(%driver, "driver selected");
    }

    pub fn gas_pressed(&mut self) {
        self.audio.init();
        match self.status {
            RaceState::Finished => {
                debug!("gas ignored: race finished");
                return;
            }
            RaceState::Idle => {
                self.status = RaceState::Racing;
                self.frames.start();
                info!("race started");
            }
            RaceState::Racing => {}
        }
        self.input.gas_held = true;
    }

    pub fn gas_released(&mut self) {
        self.input.gas_held = false;
    }

    // ── Frame loop ──────────────────────────────────────────

    /// Handle a display-refresh callback delivered by the host.
    ///
    /// Frames other than the one currently requested are ignored, so a
    /// callback that was already in flight when the loop stopped is
    /// harmless.
    pub fn on_frame(&mut self, id: FrameId) {
        if !self.frames.accept(id) {
            debug!(frame = id.0, "stale frame ignored");
            return;
        }
        if self.status != RaceState::Racing {
            return;
        }

        self.clock.tick(self.input.gas_held, &mut self.audio);

        if self.clock.reached_finish() {
            self.finish();
        } else {
            self.frames.request_next();
        }
    }

    fn finish(&mut self) {
        self.frames.stop();
        self.status = RaceState::Finished;
        self.finished_races += 1;
        info!(
            ticks = self.clock.ticks(),
            distance = self.clock.state().distance,
            "race finished"
        );

        if !self.celebrated {
            self.celebrated = true;
            self.celebration.play(&mut self.audio, &mut self.rng);
        }
    }

    // ── Lifecycle ───────────────────────────────────────────

    /// Back to the start line. Only a finished race is reset; from any
    /// other state this does nothing.
    pub fn reset(&mut self) {
        match self.status {
            RaceState::Finished => {
                self.frames.stop();
                self.clock.reset();
                self.input = InputState::default();
                self.celebrated = false;
                self.driver = None;
                self.status = RaceState::Idle;
                info!("race reset");
            }
            RaceState::Idle => {}
            RaceState::Racing => debug!("reset ignored while racing"),
        }
    }

    /// Stop ticking and release audio. Idempotent.
    ///
    /// A race in progress is abandoned and the controller goes back to
    /// `Idle`, so the next gas press starts a fresh race. A finished race
    /// stays finished until [`reset`](Self::reset).
    pub fn teardown(&mut self) {
        self.frames.stop();
        self.input = InputState::default();
        self.audio.teardown();
        if self.status == RaceState::Racing {
            self.clock.reset();
            self.celebrated = false;
            self.status = RaceState::Idle;
            info!("race abandoned on teardown");
        }
    }

    // ── Readers ─────────────────────────────────────────────

    pub fn status(&self) -> RaceState {
        self.status
    }

    pub fn kinematics(&self) -> KinematicState {
        self.clock.state()
    }

    pub fn input(&self) -> InputState {
        self.input
    }

    pub fn driver(&self) -> Option<Driver> {
        self.driver
    }

    /// Ticks applied in the current race.
    pub fn ticks(&self) -> u64 {
        self.clock.ticks()
    }

    /// Races finished this session.
    pub fn finished_races(&self) -> u64 {
        self.finished_races
    }

    pub fn is_ticking(&self) -> bool {
        self.frames.is_running()
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        let state = self.clock.state();
        let finish = self.clock.config().finish_distance;
        RaceSnapshot {
            velocity: state.velocity,
            distance: state.distance,
            status: self.status,
            gas_held: self.input.gas_held,
            driver: self.driver,
            progress: (state.distance / finish * 100.0).min(100.0),
        }
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        self.frames.scheduler_mut()
    }

    /// The audio context, for hosts that pull rendered samples from it.
    pub fn audio_context(&self) -> Option<&C> {
        self.audio.context()
    }

    pub fn audio_context_mut(&mut self) -> Option<&mut C> {
        self.audio.context_mut()
    }
}

impl<C: AudioContext> GameController<VirtualScheduler, C> {
    /// Deliver every frame that is due. Returns how many were delivered.
    pub fn pump_frames(&mut self) -> usize {
        let due = self.frames.scheduler_mut().take_due();
        let delivered = due.len();
        for id in due {
            self.on_frame(id);
        }
        delivered
    }

    pub fn wants_frame(&self) -> bool {
        self.frames.scheduler().pending() > 0
    }
}

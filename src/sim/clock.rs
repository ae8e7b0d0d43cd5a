//! Simulation clock: per-frame Euler integration of the car's progress.

use serde::Serialize;

use crate::config::RaceConfig;
use crate::error::RacerError;

/// Velocities below this are snapped to zero so coasting lands on an
/// exact standstill instead of a float residue.
const STANDSTILL_EPSILON: f64 = 1e-9;

/// Velocity and distance of the car.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct KinematicState {
    /// Track units per frame, always in `[0, max_speed]`.
    pub velocity: f64,
    /// Track units travelled, never negative.
    pub distance: f64,
}

/// Receives the velocity after every tick, before the state is published.
pub trait EngineSound {
    fn set_speed(&mut self, velocity: f64);
}

/// The authoritative owner of [`KinematicState`].
#[derive(Debug, Clone)]
pub struct SimulationClock {
    config: RaceConfig,
    state: KinematicState,
    ticks: u64,
}

impl SimulationClock {
    /// Fails when `config` does not validate, so `tick` never sees a
    /// negative or non-finite speed limit.
    pub fn new(config: RaceConfig) -> Result<Self, RacerError> {
        config.validate()?;
        Ok(SimulationClock {
            config,
            state: KinematicState::default(),
            ticks: 0,
        })
    }

    /// Advance the simulation by one frame.
    ///
    /// Velocity is integrated first, then distance, then `engine` hears
    /// the new velocity. The win check belongs to the caller and reads
    /// [`reached_finish`](Self::reached_finish) afterwards.
    pub fn tick<E: EngineSound + ?Sized>(&mut self, gas_held: bool, engine: &mut E) -> KinematicState {
        let cfg = &self.config;
        let mut velocity = self.state.velocity;

        if gas_held && self.state.distance < cfg.acceleration_limit() {
            velocity += cfg.acceleration;
        } else {
            velocity -= cfg.friction;
        }

        velocity = velocity.clamp(0.0, cfg.max_speed);
        if velocity < STANDSTILL_EPSILON {
            velocity = 0.0;
        }

        self.state.velocity = velocity;
        self.state.distance += velocity;
        self.ticks += 1;

        engine.set_speed(velocity);
        self.state
    }

    /// True once distance has reached the finish line.
    pub fn reached_finish(&self) -> bool {
        self.state.distance >= self.config.finish_distance
    }

    pub fn state(&self) -> KinematicState {
        self.state
    }

    /// Ticks applied since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    /// Return to a standstill at the start line.
    pub fn reset(&mut self) {
        self.state = KinematicState::default();
        self.ticks = 0;
    }
}

impl EngineSound for () {
    fn set_speed(&mut self, _velocity: f64) {}
}

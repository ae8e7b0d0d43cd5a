//! Tunable constants for the race and the engine voice.
//!
//! Everything that changes pacing or timbre lives here as a named,
//! overridable field. Configs deserialize from JSON with every field
//! optional, so a host only has to spell out what it changes.

use serde::{Deserialize, Serialize};

use crate::error::RacerError;

/// Top-level configuration handed to the game controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RacerConfig {
    pub race: RaceConfig,
    pub engine: EngineVoicing,
}

impl RacerConfig {
    /// Parse a JSON document and validate it.
    pub fn from_json(source: &str) -> Result<Self, RacerError> {
        let config: RacerConfig = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RacerError> {
        self.race.validate()?;
        self.engine.validate()
    }
}

// ── Race physics ────────────────────────────────────────────

/// Physics constants for the per-frame simulation.
///
/// Units are "track units" and "frames": velocity is units per frame,
/// acceleration and friction are units per frame per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RaceConfig {
    /// Velocity ceiling.
    pub max_speed: f64,
    /// Added to velocity on every tick the gas is held.
    pub acceleration: f64,
    /// Removed from velocity on every tick the gas is released.
    pub friction: f64,
    /// Distance at which the race is won.
    pub finish_distance: f64,
    /// Past `finish_distance + overrun_margin` the gas stops accelerating.
    pub overrun_margin: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            max_speed: 25.0,
            acceleration: 0.5,
            friction: 0.2,
            finish_distance: 4000.0,
            overrun_margin: 500.0,
        }
    }
}

impl RaceConfig {
    pub fn validate(&self) -> Result<(), RacerError> {
        positive("maxSpeed", self.max_speed)?;
        positive("acceleration", self.acceleration)?;
        positive("friction", self.friction)?;
        positive("finishDistance", self.finish_distance)?;
        non_negative("overrunMargin", self.overrun_margin)
    }

    /// Distance beyond which holding the gas no longer accelerates.
    pub fn acceleration_limit(&self) -> f64 {
        self.finish_distance + self.overrun_margin
    }
}

// ── Engine voicing ──────────────────────────────────────────

/// Linear mapping from velocity onto the engine voice parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineVoicing {
    /// Sawtooth pitch at standstill (Hz).
    pub base_pitch: f64,
    pub pitch_per_speed: f64,
    /// Rumble LFO rate at standstill (Hz).
    pub rumble_rate: f64,
    pub rumble_rate_per_speed: f64,
    /// Rumble LFO depth, in Hz of pitch deviation.
    pub rumble_depth: f64,
    /// Lowpass cutoff at standstill (Hz).
    pub base_cutoff: f64,
    pub cutoff_per_speed: f64,
    pub filter_q: f64,
    /// At or below this velocity the engine is muted.
    pub mute_below: f64,
    pub base_volume: f64,
    pub volume_per_speed: f64,
    pub max_volume: f64,
    /// Time constant (seconds) of every parameter transition.
    pub smoothing: f64,
}

impl Default for EngineVoicing {
    fn default() -> Self {
        EngineVoicing {
            base_pitch: 60.0,
            pitch_per_speed: 6.0,
            rumble_rate: 15.0,
            rumble_rate_per_speed: 1.0,
            rumble_depth: 10.0,
            base_cutoff: 400.0,
            cutoff_per_speed: 50.0,
            filter_q: 1.0,
            mute_below: 0.1,
            base_volume: 0.05,
            volume_per_speed: 0.005,
            max_volume: 0.2,
            smoothing: 0.1,
        }
    }
}

/// Parameter targets for one velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineTargets {
    pub pitch: f64,
    pub rumble_rate: f64,
    pub cutoff: f64,
    pub volume: f64,
}

impl EngineVoicing {
    pub fn validate(&self) -> Result<(), RacerError> {
        positive("basePitch", self.base_pitch)?;
        positive("rumbleRate", self.rumble_rate)?;
        non_negative("rumbleDepth", self.rumble_depth)?;
        positive("baseCutoff", self.base_cutoff)?;
        positive("filterQ", self.filter_q)?;
        non_negative("maxVolume", self.max_volume)?;
        positive("smoothing", self.smoothing)?;
        if self.rumble_depth >= self.base_pitch {
            return Err(RacerError::invalid(
                "rumbleDepth",
                format!(
                    "must stay below basePitch ({}), got {}",
                    self.base_pitch, self.rumble_depth
                ),
            ));
        }
        Ok(())
    }

    pub fn targets(&self, velocity: f64) -> EngineTargets {
        let volume = if velocity > self.mute_below {
            (self.base_volume + velocity * self.volume_per_speed).min(self.max_volume)
        } else {
            0.0
        };
        EngineTargets {
            pitch: self.base_pitch + velocity * self.pitch_per_speed,
            rumble_rate: self.rumble_rate + velocity * self.rumble_rate_per_speed,
            cutoff: self.base_cutoff + velocity * self.cutoff_per_speed,
            volume,
        }
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), RacerError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RacerError::invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), RacerError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(RacerError::invalid(field, format!("must be >= 0, got {value}")))
    }
}

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod game;
pub mod sim;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use wasm_bindgen::prelude::*;

use crate::audio::celebration::CelebrationSynth;
use crate::config::RacerConfig;
use crate::dsp::synth::SynthContext;
use crate::error::RacerError;
use crate::game::{Driver, GameController};
use crate::sim::scheduler::VirtualScheduler;

pub use crate::error::AudioError;
pub use crate::game::{RaceSnapshot, RaceState};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the nye-racer-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Parse an optional JSON config, falling back to the defaults.
pub fn load_config(source: Option<&str>) -> Result<RacerConfig, RacerError> {
    match source {
        Some(json) => RacerConfig::from_json(json),
        None => Ok(RacerConfig::default()),
    }
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed race session.
///
/// The page forwards input to it, calls `frame()` from its
/// `requestAnimationFrame` callback while that returns `true`, and pulls
/// engine and celebration audio with `render_audio()` from an
/// AudioWorklet.
#[wasm_bindgen]
pub struct WasmRacer {
    game: GameController<VirtualScheduler, SynthContext>,
}

#[wasm_bindgen]
impl WasmRacer {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64, seed: u32, config_json: Option<String>) -> Result<WasmRacer, JsValue> {
        let config = load_config(config_json.as_deref()).map_err(js_err)?;
        let seed = u64::from(seed);
        let factory = Box::new(move || {
            if sample_rate > 0.0 {
                Ok(SynthContext::new(sample_rate, seed))
            } else {
                Err(AudioError::Unavailable(format!("bad sample rate {sample_rate}")))
            }
        });
        let game = GameController::new(config, VirtualScheduler::new(), factory, seed).map_err(js_err)?;
        Ok(WasmRacer { game })
    }

    /// `"male"` or `"female"`.
    pub fn select_driver(&mut self, driver: &str) -> Result<(), JsValue> {
        let driver: Driver = driver.parse().map_err(js_err)?;
        self.game.select_driver(driver);
        Ok(())
    }

    pub fn gas_pressed(&mut self) {
        self.game.gas_pressed();
    }

    pub fn gas_released(&mut self) {
        self.game.gas_released();
    }

    /// Advance one display frame. Returns whether another frame is wanted.
    pub fn frame(&mut self) -> bool {
        self.game.pump_frames();
        self.game.wants_frame()
    }

    pub fn reset(&mut self) {
        self.game.reset();
    }

    /// Current [`RaceSnapshot`] as a JS object.
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.game.snapshot()).map_err(js_err)
    }

    /// Next `frames` mono samples; silence while audio is not running.
    pub fn render_audio(&mut self, frames: usize) -> Vec<f32> {
        match self.game.audio_context_mut() {
            Some(ctx) => ctx.render(frames).iter().map(|&s| s as f32).collect(),
            None => vec![0.0; frames],
        }
    }

    pub fn teardown(&mut self) {
        self.game.teardown();
    }
}

/// WASM-exposed: lay out a celebration starting at `start` seconds and
/// return it as a JSON-like object.
#[wasm_bindgen]
pub fn plan_celebration(start: f64, seed: u32) -> Result<JsValue, JsValue> {
    let plan = CelebrationSynth::new().plan(start, &mut Pcg32::seed_from_u64(seed.into()));
    serde_wasm_bindgen::to_value(&plan).map_err(js_err)
}

/// WASM-exposed: render the celebration to a WAV byte array.
#[wasm_bindgen]
pub fn render_celebration(sample_rate: u32, seed: u32) -> Vec<u8> {
    dsp::renderer::render_celebration_wav(sample_rate, seed.into())
}

/// WASM-exposed: render a scripted full-throttle race to a WAV byte array.
#[wasm_bindgen]
pub fn render_demo_race(sample_rate: u32, seed: u32, config_json: Option<String>) -> Result<Vec<u8>, JsValue> {
    let config = load_config(config_json.as_deref()).map_err(js_err)?;
    dsp::renderer::render_demo_race_wav(config, sample_rate, seed.into()).map_err(js_err)
}

//! DSP: pure Rust synthesis for the race audio.
//!
//! The same code backs offline WAV export, AudioWorklet playback through
//! WASM, and the tests.

pub mod filter;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod renderer;
pub mod synth;

pub use synth::SynthContext;

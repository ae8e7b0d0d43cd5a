//! WAV renderer: offline export of the celebration and of a scripted
//! full-throttle race through [`SynthContext`].

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::audio::celebration::CelebrationSynth;
use crate::audio::context::AudioContext;
use crate::config::RacerConfig;
use crate::error::RacerError;
use crate::game::GameController;
use crate::sim::scheduler::VirtualScheduler;

use super::synth::SynthContext;

/// Display refresh rate the demo race is paced at.
pub const DEMO_FRAME_RATE: u32 = 60;

/// Frames after which the demo race gives up waiting for the finish.
const MAX_DEMO_FRAMES: usize = 60 * 60 * 5;

/// Longest tail rendered after the finish, in seconds.
const MAX_TAIL_SECONDS: f64 = 10.0;

/// Render the finish celebration alone to a mono WAV.
pub fn render_celebration_wav(sample_rate: u32, seed: u64) -> Vec<u8> {
    let mut ctx = SynthContext::new(sample_rate as f64, seed);
    if let Err(e) = ctx.resume() {
        tracing::warn!(error = %e, "celebration render: context would not start");
    }

    let plan = CelebrationSynth::new().plan(0.0, &mut Pcg32::seed_from_u64(seed));
    for event in plan.events() {
        if let Err(e) = ctx.play(&event) {
            tracing::warn!(error = %e, "celebration render: dropped a sound");
        }
    }

    let frames = (plan.end() * sample_rate as f64).ceil() as usize;
    encode_wav(&to_pcm_i16(&ctx.render(frames)), sample_rate, 1)
}

/// Drive a full-throttle race at 60 frames per second and render its
/// audio, engine and celebration, to a mono WAV.
pub fn render_demo_race_wav(config: RacerConfig, sample_rate: u32, seed: u64) -> Result<Vec<u8>, RacerError> {
    let sr = sample_rate as f64;
    let mut game = GameController::new(
        config,
        VirtualScheduler::new(),
        Box::new(move || Ok(SynthContext::new(sr, seed))),
        seed,
    )?;
    let block = (sample_rate / DEMO_FRAME_RATE).max(1) as usize;
    let mut samples = Vec::new();

    game.gas_pressed();
    let mut frames = 0;
    while game.wants_frame() && frames < MAX_DEMO_FRAMES {
        frames += game.pump_frames();
        if let Some(ctx) = game.audio_context_mut() {
            samples.extend(ctx.render(block));
        }
    }
    tracing::debug!(frames, status = ?game.status(), "demo race driven");

    if let Some(ctx) = game.audio_context_mut() {
        let tail_limit = (MAX_TAIL_SECONDS * sr) as usize;
        let mut tail = 0;
        while ctx.active_one_shots() > 0 && tail < tail_limit {
            samples.extend(ctx.render(block));
            tail += block;
        }
    }
    game.teardown();

    Ok(encode_wav(&to_pcm_i16(&samples), sample_rate, 1))
}

/// Convert float samples in [-1, 1] to 16-bit PCM.
pub fn to_pcm_i16(samples: &[f64]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f64) as i16)
        .collect()
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

//! Deterministic WAV generation for decode and streaming tests.
//!
//! All generated files are canonical PCM WAVE: `RIFF`/`WAVE` header, a
//! 16-byte `fmt ` chunk, then one `data` chunk, which is exactly the layout
//! the in-crate parser accepts.

use std::f32::consts::PI;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Sample rate used by every generated file.
pub const SAMPLE_RATE: u32 = 44100;

fn spec(channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write a silent 16-bit WAV of the given duration.
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    duration_ms: u64,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(channels))?;
    let total_samples = (SAMPLE_RATE as u64 * duration_ms / 1000) * channels as u64;
    for _ in 0..total_samples {
        writer.write_sample(0i16)?;
    }
    writer.finalize()
}

/// Write a 16-bit WAV holding a sine tone.
///
/// `amplitude` is linear in [0.0, 1.0]; keep it at or below 0.5 so rounding
/// never lands on the saturation bound.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    duration_ms: u64,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, spec(channels))?;
    let frames = SAMPLE_RATE as u64 * duration_ms / 1000;
    let peak = amplitude * i16::MAX as f32;

    for frame in 0..frames {
        let t = frame as f32 / SAMPLE_RATE as f32;
        let sample = ((2.0 * PI * frequency_hz * t).sin() * peak) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize()
}

//! Audio Test File Generation Utilities
//!
//! Deterministic WAV files for clip library and playback tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Standard test sample rate (44.1 kHz)
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Generate a sine wave WAV file
///
/// # Arguments
/// * `path` - Output file path
/// * `duration_ms` - Duration in milliseconds
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - 1 (mono) or 2 (stereo)
/// * `frequency_hz` - Sine wave frequency in Hz
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    duration_ms: u64,
    sample_rate: u32,
    channels: u16,
    frequency_hz: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let total_frames = (sample_rate as u64 * duration_ms) / 1000;

    for frame in 0..total_frames {
        let t = frame as f32 / sample_rate as f32;
        let value = (2.0 * PI * frequency_hz * t).sin() * 0.25;
        let sample = (value * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(sample)?;
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Stereo 44.1kHz sine, the format the null output runs at
pub fn generate_clip<P: AsRef<Path>>(path: P, duration_ms: u64) -> Result<(), hound::Error> {
    generate_sine_wav(path, duration_ms, TEST_SAMPLE_RATE, 2, 440.0)
}

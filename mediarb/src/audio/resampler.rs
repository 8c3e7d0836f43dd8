//! Sample rate and channel layout conversion
//!
//! Every clip is converted once at load time to the output device format, so
//! the mixer never converts on the audio thread.

use super::decoder::DecodedAudio;
use super::types::OutputFormat;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler using rubato.
pub struct Resampler;

impl Resampler {
    /// Convert decoded audio to `target` (channel layout, then sample rate).
    pub fn convert(decoded: DecodedAudio, target: OutputFormat) -> Result<Vec<f32>> {
        let remixed = remix_channels(&decoded.samples, decoded.channels, target.channels);
        Self::resample(
            remixed,
            decoded.sample_rate,
            target.sample_rate,
            target.channels,
        )
    }

    /// Resample interleaved audio from `input_rate` to `output_rate`.
    ///
    /// If the rates already match, the input is returned untouched.
    pub fn resample(
        input: Vec<f32>,
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>> {
        if input_rate == output_rate || input.is_empty() {
            return Ok(input);
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, output_rate, channels
        );

        // rubato expects planar input
        let planar_input = deinterleave(&input, channels);
        let input_frames = planar_input[0].len();

        // Whole clip in one chunk
        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels as usize,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        let output = interleave(&planar_output);

        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames,
            output.len() / channels as usize
        );

        Ok(output)
    }
}

/// Convert between channel layouts.
///
/// Mono is duplicated to every output channel; multichannel to mono is
/// averaged; otherwise channels map by index and missing ones are silent.
pub fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    let (from, to) = (from.max(1) as usize, to.max(1) as usize);
    if from == to {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);

    for frame in samples.chunks_exact(from) {
        if from == 1 {
            output.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            output.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            output.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
        }
    }

    output
}

/// [L, R, L, R, ...] → [[L, L, ...], [R, R, ...]]
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels.max(1) as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame in samples.chunks_exact(num_channels) {
        for (ch, sample) in frame.iter().enumerate() {
            planar[ch].push(*sample);
        }
    }
    planar
}

/// [[L, L, ...], [R, R, ...]] → [L, R, L, R, ...]
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = planar.first() else {
        return Vec::new();
    };

    let num_frames = first.len();
    let mut interleaved = Vec::with_capacity(num_frames * planar.len());
    for frame_idx in 0..num_frames {
        for channel in planar {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

//! Core audio data types

use std::sync::Arc;
use std::time::Duration;

/// Sample rate and channel count shared by the mixer and every loaded clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl OutputFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Number of interleaved samples covering `duration`
    pub fn samples_for(&self, duration: Duration) -> usize {
        let frames = (duration.as_secs_f64() * self.sample_rate as f64).round() as usize;
        frames * self.channels as usize
    }
}

impl Default for OutputFormat {
    /// 44.1kHz stereo
    fn default() -> Self {
        Self::new(44100, 2)
    }
}

/// A decoded clip held in RAM, already in the output format.
///
/// Samples are f32 (-1.0 to 1.0), interleaved by channel.
#[derive(Debug, Clone)]
pub struct ClipBuffer {
    /// Logical clip name from the clip tables
    pub name: String,

    /// Interleaved PCM samples
    pub samples: Vec<f32>,

    pub format: OutputFormat,

    /// Number of frames (samples.len() / channels)
    pub frame_count: usize,
}

impl ClipBuffer {
    pub fn new(name: impl Into<String>, samples: Vec<f32>, format: OutputFormat) -> Self {
        let frame_count = samples.len() / format.channels.max(1) as usize;
        Self {
            name: name.into(),
            samples,
            format,
            frame_count,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frame_count as f64 / self.format.sample_rate.max(1) as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }
}

/// Shared, immutable clip handle
pub type Clip = Arc<ClipBuffer>;

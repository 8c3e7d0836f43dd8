//! Audio engine: decode, convert, mix and output
//!
//! Clips are decoded entirely into memory at load time and converted to the
//! output format, so playback is a plain copy from RAM into the device buffer.

pub mod decoder;
pub mod mixer;
pub mod output;
pub mod resampler;
pub mod types;

pub use mixer::{Mixer, VoiceHandle};
pub use output::OutputThread;
pub use types::{Clip, ClipBuffer, OutputFormat};

//! Audio decoder using symphonia
//!
//! Decodes a whole file (WAV, FLAC, MP3, AAC, Vorbis) to interleaved f32 PCM.
//! Clips are short, so there is no streaming or seeking.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Raw decoder output, still in the source format
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved f32 samples
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Decode entire audio file to PCM samples.
///
/// # Errors
/// - `Error::FileRead` when the file cannot be opened
/// - `Error::Decode` for unsupported formats, missing audio tracks or files
///   that decode to nothing
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    debug!("Decoding entire file: {}", path.display());

    let file = std::fs::File::open(path).map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint to help the format registry guess the format
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

    let mut channels = codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                warn!("Stream reset required in {}, stopping decode", path.display());
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                channels.get_or_insert(spec.channels.count() as u16);

                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
                });
                if buf.capacity() < decoded.capacity() * spec.channels.count() {
                    *buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                }

                buf.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buf.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet: skip it, keep the rest of the clip
                warn!("Decode error: {}", e);
                continue;
            }
            Err(e) => {
                return Err(Error::Decode(format!("Fatal decode error: {}", e)));
            }
        }
    }

    let channels = channels.ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

    if samples.is_empty() {
        return Err(Error::Decode(format!(
            "No samples decoded from {}",
            path.display()
        )));
    }

    let decoded = DecodedAudio {
        samples,
        sample_rate,
        channels,
    };

    debug!(
        "Decoded {} frames at {}Hz, {} channel(s)",
        decoded.frame_count(),
        sample_rate,
        channels
    );

    Ok(decoded)
}

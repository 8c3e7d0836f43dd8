//! Audio output
//!
//! Two backends feed the mixer to the outside world:
//! - `Device`: a cpal output stream on the host's audio device
//! - `Null`: a thread that renders the mixer in real time and discards the
//!   result, for hosts without audio hardware
//!
//! cpal streams are not `Send`, so the stream is created on a dedicated
//! thread which keeps it alive until shutdown.

use super::mixer::Mixer;
use super::types::OutputFormat;
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use mediarb_common::config::AudioBackend;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Preferred device rate
const PREFERRED_SAMPLE_RATE: u32 = 44100;

/// Render period of the null backend
const NULL_PERIOD: Duration = Duration::from_millis(10);

/// Running output thread; dropping it (or calling `stop`) ends playback
pub struct OutputThread {
    mixer: Mixer,
    error_flag: Arc<AtomicBool>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputThread {
    /// Start the configured backend and return once it is producing sound.
    ///
    /// The mixer format is taken from the device configuration; clips must be
    /// loaded against `mixer().format()`.
    pub fn start(backend: AudioBackend, device: Option<String>, gain: f32) -> Result<Self> {
        match backend {
            AudioBackend::Device => Self::start_device(device, gain),
            AudioBackend::Null => Ok(Self::start_null(OutputFormat::default())),
        }
    }

    /// Device backend on a dedicated thread
    pub fn start_device(device_name: Option<String>, gain: f32) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(Mixer, Arc<AtomicBool>)>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let started = AudioOutput::open(device_name).and_then(|output| {
                    let mixer = Mixer::new(output.format());
                    let stream = output.start(mixer.clone(), gain)?;
                    Ok((output, stream, mixer))
                });

                let (output, stream, mixer) = match started {
                    Ok(parts) => parts,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let _ = ready_tx.send(Ok((mixer, Arc::clone(&output.error_flag))));

                // Keep the stream alive until shutdown is requested or the
                // owner goes away
                let _ = shutdown_rx.recv();

                if let Err(e) = stream.pause() {
                    warn!("Failed to pause audio stream: {}", e);
                }
                drop(stream);
                info!("Audio output stopped ({})", output.device_name());
            })?;

        match ready_rx.recv() {
            Ok(Ok((mixer, error_flag))) => Ok(Self {
                mixer,
                error_flag,
                shutdown_tx: Some(shutdown_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::AudioOutput(
                    "Audio output thread exited during startup".to_string(),
                ))
            }
        }
    }

    /// Null backend: renders `format` in real time without a device
    pub fn start_null(format: OutputFormat) -> Self {
        let mixer = Mixer::new(format);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let render_mixer = mixer.clone();

        let thread = std::thread::spawn(move || {
            let mut buffer = vec![0.0f32; format.samples_for(NULL_PERIOD)];
            info!(
                "Null audio output running ({}Hz, {} channels)",
                format.sample_rate, format.channels
            );

            loop {
                match shutdown_rx.recv_timeout(NULL_PERIOD) {
                    Err(RecvTimeoutError::Timeout) => render_mixer.render(&mut buffer),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            info!("Null audio output stopped");
        });

        Self {
            mixer,
            error_flag: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// True once the stream reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }

    /// Stop the stream and join the output thread
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opened cpal device, not yet streaming
struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// Open the named device, falling back to the default device.
    fn open(device_name: Option<String>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name.as_ref() {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_ref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let (config, sample_format) = Self::best_config(&device)?;

        let output = Self {
            device,
            config,
            sample_format,
            error_flag: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
        };

        info!(
            "Using audio device '{}': {}Hz, {} channels, {:?}",
            output.device_name(),
            output.config.sample_rate.0,
            output.config.channels,
            output.sample_format
        );

        Ok(output)
    }

    /// Prefer 44.1kHz stereo f32, otherwise the device default.
    fn best_config(device: &Device) -> Result<(StreamConfig, SampleFormat)> {
        let mut supported = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

        let preferred = supported.find(|config| {
            config.channels() == 2
                && config.min_sample_rate().0 <= PREFERRED_SAMPLE_RATE
                && config.max_sample_rate().0 >= PREFERRED_SAMPLE_RATE
                && config.sample_format() == SampleFormat::F32
        });

        if let Some(config) = preferred {
            let sample_format = config.sample_format();
            let config = config
                .with_sample_rate(cpal::SampleRate(PREFERRED_SAMPLE_RATE))
                .config();
            return Ok((config, sample_format));
        }

        let fallback = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;

        Ok((fallback.config(), fallback.sample_format()))
    }

    fn format(&self) -> OutputFormat {
        OutputFormat::new(self.config.sample_rate.0, self.config.channels)
    }

    fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    /// Build and start the stream pulling from `mixer`.
    fn start(&self, mixer: Mixer, gain: f32) -> Result<Stream> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream(mixer, gain, |s| s)?,
            SampleFormat::I16 => self.build_stream(mixer, gain, |s| (s * i16::MAX as f32) as i16)?,
            SampleFormat::U16 => self.build_stream(mixer, gain, |s| ((s + 1.0) * 32767.5) as u16)?,
            other => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        debug!("Audio stream started");
        Ok(stream)
    }

    fn build_stream<T, F>(&self, mixer: Mixer, gain: f32, convert: F) -> Result<Stream>
    where
        T: cpal::SizedSample + Send + 'static,
        F: Fn(f32) -> T + Send + 'static,
    {
        let error_flag = Arc::clone(&self.error_flag);
        let error_count = Arc::clone(&self.error_count);
        let mut scratch: Vec<f32> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if scratch.len() != data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    mixer.render(&mut scratch);
                    for (dst, src) in data.iter_mut().zip(&scratch) {
                        *dst = convert((src * gain).clamp(-1.0, 1.0));
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                    error_count.fetch_add(1, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

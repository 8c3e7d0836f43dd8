//! Test helper modules for mediarb integration tests
//!
//! Provides reusable test infrastructure components:
//! - audio_generator: WAV files with known length and format
//! - doubles: recording status reporter, scripted video launcher
//! - `TestMedia` / `TestArbiter`: temp media tree and a running arbiter on
//!   the null audio output

#![allow(dead_code)]

pub mod audio_generator;
pub mod doubles;

pub use audio_generator::{generate_clip, generate_sine_wav};
pub use doubles::{wait_until, RecordingReporter, ScriptedLauncher, StatusLine};

use mediarb::audio::{OutputFormat, OutputThread};
use mediarb::status::StatusReporter;
use mediarb::video::VideoLauncher;
use mediarb::Arbiter;
use mediarb_common::config::AudioBackend;
use mediarb_common::ArbiterConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Background tracks loop, so one second is plenty
pub const TRACK_MS: u64 = 1000;

/// Long enough to observe, short enough to keep tests quick
pub const EFFECT_MS: u64 = 300;

/// Temp directory holding the stock clip set and placeholder videos
pub struct TestMedia {
    pub dir: TempDir,
}

impl TestMedia {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();

        generate_clip(dir.path().join("futur.wav"), TRACK_MS).unwrap();
        generate_clip(dir.path().join("medieval.wav"), TRACK_MS).unwrap();
        generate_clip(dir.path().join("effet1.wav"), EFFECT_MS).unwrap();
        std::fs::write(dir.path().join("videoFr.mp4"), b"not really a video").unwrap();
        std::fs::write(dir.path().join("videoEn.mp4"), b"not really a video").unwrap();

        Self { dir }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Stock configuration rooted at this tree, null audio backend
    pub fn config(&self) -> ArbiterConfig {
        let mut config = ArbiterConfig::default();
        config.media_root = Some(self.dir.path().to_path_buf());
        config.player = PathBuf::from("/usr/bin/fake-player");
        config.player_args = vec!["--fs".to_string()];
        config.audio.backend = AudioBackend::Null;
        config.validate().unwrap();
        config
    }
}

/// Arbiter wired to test doubles, rendering in real time on the null output
pub struct TestArbiter {
    pub arbiter: Arc<Arbiter>,
    pub launcher: Arc<ScriptedLauncher>,
    pub reporter: Arc<RecordingReporter>,
    pub output: OutputThread,
    pub media: TestMedia,
}

impl TestArbiter {
    pub async fn start() -> Self {
        let media = TestMedia::new();
        let config = media.config();
        Self::start_with(media, config).await
    }

    pub async fn start_with(media: TestMedia, config: ArbiterConfig) -> Self {
        let output = OutputThread::start_null(OutputFormat::default());
        let launcher = Arc::new(ScriptedLauncher::default());
        let reporter = Arc::new(RecordingReporter::default());

        let arbiter = Arbiter::start(
            config,
            output.mixer().clone(),
            Arc::clone(&launcher) as Arc<dyn VideoLauncher>,
            Arc::clone(&reporter) as Arc<dyn StatusReporter>,
        )
        .await
        .unwrap();

        Self {
            arbiter: Arc::new(arbiter),
            launcher,
            reporter,
            output,
            media,
        }
    }

    /// Clip names currently sounding on the mixer
    pub fn sounding(&self) -> Vec<String> {
        let mut clips = self.output.mixer().sounding_clips();
        clips.sort();
        clips
    }

    pub fn is_silent(&self) -> bool {
        self.output.mixer().is_silent()
    }

    /// Name of the playing background clip
    pub fn background(&self) -> Option<String> {
        self.arbiter
            .resources()
            .background()
            .filter(|v| v.is_playing())
            .map(|v| v.clip_name().to_string())
    }
}

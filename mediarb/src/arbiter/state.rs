//! Arbitration state
//!
//! The selections handlers read and mutate. The live voice and video handles
//! are not here; they belong to the resource manager.

use crate::library::ClipLibrary;
use mediarb_common::ArbiterConfig;
use std::path::PathBuf;

/// Video selected for the next `playVideo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub language: String,
    pub path: PathBuf,
}

/// Mutable state guarded by the arbiter lock
#[derive(Debug, Clone)]
pub struct ArbiterState {
    pub library: ClipLibrary,
    pub language: String,
    pub current_track: String,
    pub video_source: VideoSource,
}

impl ArbiterState {
    /// Initial selections: default language and default track.
    ///
    /// The config has been validated, so both defaults are present.
    pub fn initial(config: &ArbiterConfig, library: ClipLibrary) -> Self {
        let language = config.default_language.clone();
        let path = config
            .language_path(&language)
            .unwrap_or_else(|| PathBuf::from(&language));

        Self {
            library,
            current_track: config.default_track.clone(),
            video_source: VideoSource {
                language: language.clone(),
                path,
            },
            language,
        }
    }
}

/// What the arbiter is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    /// Background audio (or nothing) is playing
    Idle,
    /// A video is occupying the output
    Video,
    /// An effect is occupying the output
    Effect,
}

impl Activity {
    /// Video or effect phase; other commands are rejected meanwhile
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, Activity::Idle)
    }
}

/// Session state, derived from video liveness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AudioIdleOrPlaying,
    VideoPlaying,
}

/// Point-in-time view of the arbiter, for logs and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub session: SessionState,
    pub activity: Activity,
    pub language: String,
    pub current_track: String,
    pub video_source: VideoSource,
    /// Clip name of the sounding background voice
    pub background: Option<String>,
}

//! Error types for mediarb
//!
//! Two families:
//! - [`Error`]: startup and engine failures (config, decode, audio device,
//!   control socket). Clip load failures are fatal at startup.
//! - [`CommandError`]: why a single command was rejected or cut short. These
//!   are reported through the status sink and never terminate the daemon.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for mediarb
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error(transparent)]
    Config(#[from] mediarb_common::Error),

    /// Audio file could not be opened
    #[error("Failed to open audio file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// A configured clip could not be loaded
    #[error("Failed to load clip '{name}' from {path}: {source}")]
    ClipLoad {
        name: String,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Video player executable missing
    #[error("Video player not found: {path}")]
    PlayerNotFound { path: PathBuf },

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Control channel encode/decode errors
    #[error("Control channel error: {0}")]
    Osc(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using mediarb Error
pub type Result<T> = std::result::Result<T, Error>;

/// What is occupying the exclusive playback resources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Busy {
    /// Reported to `setSource` and `playVideo`
    VideoAlreadyPlaying,
    /// Reported to `changeMusic` and `playEffect`
    VideoPlaying,
    /// An effect is playing to completion
    EffectPlaying,
}

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Busy::VideoAlreadyPlaying => write!(f, "Video is already playing"),
            Busy::VideoPlaying => write!(f, "Video is playing"),
            Busy::EffectPlaying => write!(f, "Effect is playing"),
        }
    }
}

/// Static table a name was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Track,
    Effect,
    Language,
}

impl NameKind {
    fn message(&self) -> &'static str {
        match self {
            NameKind::Track => "No such sound",
            NameKind::Effect => "No such effect",
            NameKind::Language => "No path to set for language",
        }
    }
}

/// Why a command was rejected or did not complete
///
/// Rejections (`AlreadyBusy`, `UnknownName`) leave all state unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    AlreadyBusy(Busy),

    #[error("{}: {name}", .kind.message())]
    UnknownName { kind: NameKind, name: String },

    #[error("Failed to start video player {}: {reason}", .player.display())]
    ExternalProcess { player: PathBuf, reason: String },

    #[error("{what} did not finish within {}s and was stopped", .limit.as_secs())]
    Timeout { what: String, limit: Duration },

    #[error("{what} interrupted by reset")]
    Interrupted { what: String },

    #[error("Reset could not reload clips, keeping previous library: {0}")]
    Reload(String),
}

impl CommandError {
    pub fn unknown(kind: NameKind, name: &str) -> Self {
        CommandError::UnknownName {
            kind,
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_texts() {
        assert_eq!(
            CommandError::AlreadyBusy(Busy::VideoAlreadyPlaying).to_string(),
            "Video is already playing"
        );
        assert_eq!(
            CommandError::AlreadyBusy(Busy::VideoPlaying).to_string(),
            "Video is playing"
        );
        assert_eq!(
            CommandError::unknown(NameKind::Track, "jazz").to_string(),
            "No such sound: jazz"
        );
        assert_eq!(
            CommandError::unknown(NameKind::Language, "deutsch").to_string(),
            "No path to set for language: deutsch"
        );
        assert_eq!(
            CommandError::Timeout {
                what: "Video".to_string(),
                limit: Duration::from_secs(30),
            }
            .to_string(),
            "Video did not finish within 30s and was stopped"
        );
    }
}

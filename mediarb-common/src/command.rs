//! Command vocabulary and control-address routing
//!
//! A controller addresses the arbiter with path-like strings. The leading
//! segment selects the handler; the parameter (language, track or effect
//! name) is either the segment itself (`/anglais`, `/medieval`, `/effet1`)
//! or the second segment of an explicit form (`/source/anglais`,
//! `/music/medieval`, `/effect/effet1`).

use crate::config::ArbiterConfig;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Segments with a fixed meaning; configured names may not shadow them
pub const RESERVED_SEGMENTS: [&str; 5] = ["video", "reset", "source", "music", "effect"];

/// Characters OSC reserves for address patterns
const PATTERN_CHARS: &[char] = &['*', '?', '[', ']', '{', '}', '#', ','];

/// One arbitration command, parsed once and matched exhaustively
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Select the video language for the next `PlayVideo`
    SetSource(String),
    /// Switch the background track
    ChangeMusic(String),
    /// Suspend background audio and play an effect to completion
    PlayEffect(String),
    /// Suspend background audio and play the selected video to completion
    PlayVideo,
    /// Kill everything and return to the initial state
    Reset,
}

impl Command {
    /// Handler name, for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetSource(_) => "setSource",
            Command::ChangeMusic(_) => "changeMusic",
            Command::PlayEffect(_) => "playEffect",
            Command::PlayVideo => "playVideo",
            Command::Reset => "reset",
        }
    }

    /// Canonical explicit address for this command
    pub fn address(&self) -> String {
        match self {
            Command::SetSource(lang) => format!("/source/{}", lang),
            Command::ChangeMusic(track) => format!("/music/{}", track),
            Command::PlayEffect(effect) => format!("/effect/{}", effect),
            Command::PlayVideo => "/video".to_string(),
            Command::Reset => "/reset".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetSource(p) | Command::ChangeMusic(p) | Command::PlayEffect(p) => {
                write!(f, "{}({})", self.name(), p)
            }
            Command::PlayVideo | Command::Reset => write!(f, "{}", self.name()),
        }
    }
}

/// Address could not be routed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Malformed address '{address}': {reason}")]
    Malformed { address: String, reason: &'static str },

    #[error("Address '{address}' is missing its {expected} parameter")]
    MissingParameter {
        address: String,
        expected: &'static str,
    },
}

/// True when `name` can be used as a single address segment
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.chars().any(|c| c.is_whitespace() || PATTERN_CHARS.contains(&c))
}

/// Maps control addresses to commands.
///
/// The route table is fixed at construction (startup or reset) and only read
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: HashMap<String, Command>,
}

impl Router {
    /// Router knowing only `/video` and `/reset`
    pub fn new() -> Self {
        let mut router = Self::default();
        router.map("video", Command::PlayVideo);
        router.map("reset", Command::Reset);
        router
    }

    /// Router with one route per configured language, track and effect
    pub fn from_config(config: &ArbiterConfig) -> Self {
        let mut router = Self::new();
        for lang in config.languages.keys() {
            router.map(lang, Command::SetSource(lang.clone()));
        }
        for track in config.tracks.keys() {
            router.map(track, Command::ChangeMusic(track.clone()));
        }
        for effect in config.effects.keys() {
            router.map(effect, Command::PlayEffect(effect.clone()));
        }
        router
    }

    /// Map a single leading segment to a command
    pub fn map(&mut self, segment: &str, command: Command) {
        self.routes.insert(segment.to_string(), command);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route an address.
    ///
    /// Returns `Ok(None)` when the leading segment is not mapped; those
    /// addresses are ignored by the transport.
    pub fn route(&self, address: &str) -> Result<Option<Command>, RouteError> {
        let malformed = |reason| RouteError::Malformed {
            address: address.to_string(),
            reason,
        };

        let Some(path) = address.strip_prefix('/') else {
            return Err(malformed("addresses must start with '/'"));
        };

        if address.contains(PATTERN_CHARS) {
            return Err(malformed("address patterns are not supported"));
        }

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(malformed("empty path segment"));
        }

        match segments.as_slice() {
            [segment] => {
                if let Some(command) = self.routes.get(*segment) {
                    return Ok(Some(command.clone()));
                }
                match Self::parameter_kind(segment) {
                    Some(expected) => Err(RouteError::MissingParameter {
                        address: address.to_string(),
                        expected,
                    }),
                    None => Ok(None),
                }
            }
            [verb, param] => Ok(match *verb {
                "source" => Some(Command::SetSource(param.to_string())),
                "music" => Some(Command::ChangeMusic(param.to_string())),
                "effect" => Some(Command::PlayEffect(param.to_string())),
                _ => None,
            }),
            _ => Err(malformed("too many path segments")),
        }
    }

    fn parameter_kind(verb: &str) -> Option<&'static str> {
        match verb {
            "source" => Some("language"),
            "music" => Some("track"),
            "effect" => Some("effect"),
            _ => None,
        }
    }
}

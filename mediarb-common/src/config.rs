//! Configuration model and config file resolution
//!
//! The arbiter is configured by a single TOML file. Every key is optional: a
//! missing file or a missing key falls back to compiled defaults which
//! reproduce the stock installation (two background tracks, one effect, two
//! video languages, `mpv` as the player, control channel on 127.0.0.1:9999).
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `MEDIARB_CONFIG` environment variable
//! 3. User config directory (`~/.config/mediarb/config.toml` on Linux)
//! 4. System config file (`/etc/mediarb/config.toml`, Linux only)
//! 5. Compiled defaults (fallback)

use crate::command::{is_valid_name, RESERVED_SEGMENTS};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MEDIARB_CONFIG";

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserFile(PathBuf),
    SystemFile(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Path of the file backing this source, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserFile(p)
            | ConfigSource::SystemFile(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }

    /// Explicitly requested files must load; discovered ones are best-effort
    fn is_explicit(&self) -> bool {
        matches!(
            self,
            ConfigSource::CommandLine(_) | ConfigSource::Environment(_)
        )
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CommandLine(p) => write!(f, "command line ({})", p.display()),
            ConfigSource::Environment(p) => write!(f, "{} ({})", CONFIG_ENV_VAR, p.display()),
            ConfigSource::UserFile(p) => write!(f, "user config ({})", p.display()),
            ConfigSource::SystemFile(p) => write!(f, "system config ({})", p.display()),
            ConfigSource::Defaults => write!(f, "compiled defaults"),
        }
    }
}

/// Complete arbiter configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArbiterConfig {
    /// Base directory for relative clip and video paths
    pub media_root: Option<PathBuf>,

    /// Video player executable
    pub player: PathBuf,

    /// Extra player arguments, placed before the video path
    pub player_args: Vec<String>,

    /// Track selected and playing in the initial state
    pub default_track: String,

    /// Video language selected in the initial state
    pub default_language: String,

    /// Background tracks loop until stopped
    pub loop_background: bool,

    /// Master output gain (0.0-1.0)
    pub volume: f32,

    pub control: ControlConfig,
    pub audio: AudioConfig,
    pub limits: LimitsConfig,

    /// Background track name → audio file
    pub tracks: BTreeMap<String, PathBuf>,

    /// Effect name → audio file
    pub effects: BTreeMap<String, PathBuf>,

    /// Language name → video file
    pub languages: BTreeMap<String, PathBuf>,

    pub logging: LoggingConfig,
}

/// Control channel bind address
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlConfig {
    pub host: String,
    pub port: u16,
}

/// Audio output selection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AudioConfig {
    pub backend: AudioBackend,

    /// Output device name (None = system default)
    pub device: Option<String>,
}

/// Audio output backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// Hardware output through the host audio API
    #[default]
    Device,
    /// Real-time silent sink, for hosts without an audio device
    Null,
}

/// Optional upper bounds on exclusive playback
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub video_timeout_secs: Option<u64>,
    pub effect_timeout_secs: Option<u64>,
}

impl LimitsConfig {
    pub fn video_timeout(&self) -> Option<Duration> {
        self.video_timeout_secs.map(Duration::from_secs)
    }

    pub fn effect_timeout(&self) -> Option<Duration> {
        self.effect_timeout_secs.map(Duration::from_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9999,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        let table = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(name, path)| (name.to_string(), PathBuf::from(path)))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            media_root: None,
            player: PathBuf::from("/bin/mpv"),
            player_args: Vec::new(),
            default_track: "futur".to_string(),
            default_language: "francais".to_string(),
            loop_background: true,
            volume: 1.0,
            control: ControlConfig::default(),
            audio: AudioConfig::default(),
            limits: LimitsConfig::default(),
            tracks: table(&[("futur", "futur.wav"), ("medieval", "medieval.wav")]),
            effects: table(&[("effet1", "effet1.wav")]),
            languages: table(&[("francais", "videoFr.mp4"), ("anglais", "videoEn.mp4")]),
            logging: LoggingConfig::default(),
        }
    }
}

impl ArbiterConfig {
    /// Parse a TOML document. Does not validate.
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Read, parse and validate a config file.
    ///
    /// Relative paths in the file are resolved against `media_root`, which
    /// defaults to the directory containing the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        if config.media_root.is_none() {
            config.media_root = path.parent().map(Path::to_path_buf);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-table consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.tracks.contains_key(&self.default_track) {
            return Err(Error::Config(format!(
                "default_track '{}' is not listed in [tracks]",
                self.default_track
            )));
        }

        if !self.languages.contains_key(&self.default_language) {
            return Err(Error::Config(format!(
                "default_language '{}' is not listed in [languages]",
                self.default_language
            )));
        }

        if !self.volume.is_finite() {
            return Err(Error::Config(format!("volume must be a number, got {}", self.volume)));
        }

        let mut seen: BTreeMap<&str, &str> = BTreeMap::new();
        let tables = [
            ("tracks", &self.tracks),
            ("effects", &self.effects),
            ("languages", &self.languages),
        ];

        for (table, entries) in tables {
            for name in entries.keys() {
                if !is_valid_name(name) {
                    return Err(Error::Config(format!(
                        "invalid name '{}' in [{}]: names must be non-empty and contain no '/', whitespace or OSC pattern characters",
                        name, table
                    )));
                }
                if RESERVED_SEGMENTS.contains(&name.as_str()) {
                    return Err(Error::Config(format!(
                        "name '{}' in [{}] is reserved",
                        name, table
                    )));
                }
                if let Some(other) = seen.insert(name, table) {
                    return Err(Error::Config(format!(
                        "name '{}' appears in both [{}] and [{}]",
                        name, other, table
                    )));
                }
            }
        }

        Ok(())
    }

    /// Resolve a table path against `media_root`.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.media_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub fn track_path(&self, name: &str) -> Option<PathBuf> {
        self.tracks.get(name).map(|p| self.resolve_path(p))
    }

    pub fn effect_path(&self, name: &str) -> Option<PathBuf> {
        self.effects.get(name).map(|p| self.resolve_path(p))
    }

    pub fn language_path(&self, name: &str) -> Option<PathBuf> {
        self.languages.get(name).map(|p| self.resolve_path(p))
    }

    /// Master gain clamped to 0.0-1.0
    pub fn gain(&self) -> f32 {
        self.volume.clamp(0.0, 1.0)
    }

    /// `host:port` string for binding the control channel
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.control.host, self.control.port)
    }
}

/// Find the config file to use, without reading it.
///
/// Returns `ConfigSource::Defaults` when nothing is found.
pub fn resolve_config_source(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
        return ConfigSource::Environment(PathBuf::from(path));
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("mediarb").join("config.toml")) {
        if path.is_file() {
            return ConfigSource::UserFile(path);
        }
    }

    // Priority 4: System config file
    if cfg!(target_os = "linux") {
        let path = PathBuf::from("/etc/mediarb/config.toml");
        if path.is_file() {
            return ConfigSource::SystemFile(path);
        }
    }

    ConfigSource::Defaults
}

/// Resolve and load the configuration.
///
/// Explicitly named files (command line, environment) must load. A discovered
/// file that fails to load is logged and compiled defaults are used instead.
pub fn load_config(cli_arg: Option<&Path>) -> Result<(ArbiterConfig, ConfigSource)> {
    let source = resolve_config_source(cli_arg);
    debug!("Config source resolved to {}", source);

    let Some(path) = source.path() else {
        warn!("No config file found, using compiled defaults");
        let config = ArbiterConfig::default();
        config.validate()?;
        return Ok((config, source));
    };

    match ArbiterConfig::from_file(path) {
        Ok(config) => {
            info!("Loaded configuration from {}", source);
            Ok((config, source))
        }
        Err(e) if !source.is_explicit() => {
            warn!("Ignoring {}: {}. Using compiled defaults", source, e);
            Ok((ArbiterConfig::default(), ConfigSource::Defaults))
        }
        Err(e) => Err(e),
    }
}

//! Clip Library
//!
//! Every configured background track and effect, decoded and converted to the
//! output format once at startup (and again on reset). Immutable after load.

use crate::audio::decoder::decode_file;
use crate::audio::resampler::Resampler;
use crate::audio::{Clip, ClipBuffer, OutputFormat};
use crate::error::{Error, Result};
use mediarb_common::ArbiterConfig;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Table a clip was configured in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Track,
    Effect,
}

#[derive(Debug, Clone)]
struct LibraryEntry {
    kind: ClipKind,
    clip: Clip,
}

/// Loaded clips by name
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    entries: HashMap<String, LibraryEntry>,
}

impl ClipLibrary {
    /// Load every track and effect named in `config`.
    ///
    /// Fails on the first clip that cannot be read or decoded; a partially
    /// loaded library is never returned.
    pub fn load(config: &ArbiterConfig, format: OutputFormat) -> Result<Self> {
        let started = Instant::now();
        let mut library = Self::default();

        let tables = [
            (ClipKind::Track, &config.tracks),
            (ClipKind::Effect, &config.effects),
        ];

        for (kind, table) in tables {
            for (name, path) in table {
                let path = config.resolve_path(path);
                let clip = load_clip(name, &path, format).map_err(|source| Error::ClipLoad {
                    name: name.clone(),
                    path: path.clone(),
                    source: Box::new(source),
                })?;

                debug!(
                    "Loaded {:?} '{}' ({:.2}s) from {}",
                    kind,
                    name,
                    clip.duration().as_secs_f32(),
                    path.display()
                );
                library.insert(kind, clip);
            }
        }

        info!(
            "Clip library loaded: {} track(s), {} effect(s) in {}ms",
            config.tracks.len(),
            config.effects.len(),
            started.elapsed().as_millis()
        );

        Ok(library)
    }

    /// Add an already decoded clip
    pub fn insert(&mut self, kind: ClipKind, clip: Clip) {
        self.entries
            .insert(clip.name.clone(), LibraryEntry { kind, clip });
    }

    /// Any clip by name
    pub fn get(&self, name: &str) -> Option<&Clip> {
        self.entries.get(name).map(|e| &e.clip)
    }

    pub fn track(&self, name: &str) -> Option<&Clip> {
        self.get_kind(name, ClipKind::Track)
    }

    pub fn effect(&self, name: &str) -> Option<&Clip> {
        self.get_kind(name, ClipKind::Effect)
    }

    fn get_kind(&self, name: &str, kind: ClipKind) -> Option<&Clip> {
        self.entries
            .get(name)
            .filter(|e| e.kind == kind)
            .map(|e| &e.clip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_clip(name: &str, path: &Path, format: OutputFormat) -> Result<Clip> {
    let decoded = decode_file(path)?;
    let samples = Resampler::convert(decoded, format)?;
    Ok(Arc::new(ClipBuffer::new(name, samples, format)))
}

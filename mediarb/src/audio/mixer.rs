//! Voice mixer
//!
//! The mixer owns every sounding voice. The output thread pulls frames with
//! [`Mixer::render`]; control code starts and stops voices from any thread.
//!
//! A voice is silent as soon as it leaves the voice list: `stop` removes it
//! under the same lock `render` takes, so once `stop` returns the voice can
//! never be rendered again. Completion is published through a watch channel
//! when the voice is dropped, whichever way it ends (finished, stopped,
//! `stop_all`, mixer dropped).

use super::types::{Clip, OutputFormat};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, trace};

struct Voice {
    id: u64,
    clip: Clip,
    /// Next frame to render
    cursor: usize,
    looping: bool,
    done: watch::Sender<bool>,
}

impl Voice {
    /// Mix into `out`. Returns false once a one-shot voice has ended.
    fn mix_into(&mut self, out: &mut [f32], channels: usize) -> bool {
        let frames = self.clip.frame_count;
        if frames == 0 {
            return false;
        }

        for frame in out.chunks_exact_mut(channels) {
            if self.cursor >= frames {
                if !self.looping {
                    return false;
                }
                self.cursor = 0;
            }

            let start = self.cursor * channels;
            for (dst, src) in frame.iter_mut().zip(&self.clip.samples[start..start + channels]) {
                *dst += *src;
            }
            self.cursor += 1;
        }

        self.looping || self.cursor < frames
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        self.done.send_replace(true);
    }
}

/// Handle to a running voice (one `play` call)
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    id: u64,
    clip_name: Arc<str>,
    done: watch::Receiver<bool>,
}

impl VoiceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the clip this voice plays
    pub fn clip_name(&self) -> &str {
        &self.clip_name
    }

    /// Non-blocking poll
    pub fn is_playing(&self) -> bool {
        !*self.done.borrow()
    }

    /// Wait until the voice has ended or been stopped
    pub async fn wait_done(&self) {
        let mut done = self.done.clone();
        // The sender publishes `true` before it is dropped, so a closed
        // channel has already reported completion.
        let _ = done.wait_for(|finished| *finished).await;
    }
}

struct MixerInner {
    format: OutputFormat,
    voices: Mutex<Vec<Voice>>,
    next_id: AtomicU64,
}

/// Shared voice mixer (cheap to clone)
#[derive(Clone)]
pub struct Mixer {
    inner: Arc<MixerInner>,
}

impl Mixer {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            inner: Arc::new(MixerInner {
                format,
                voices: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.inner.format
    }

    fn voices(&self) -> MutexGuard<'_, Vec<Voice>> {
        // Voices stay consistent even if a holder panicked mid-render
        self.inner.voices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a voice. Returns immediately.
    pub fn play(&self, clip: &Clip, looping: bool) -> VoiceHandle {
        debug_assert_eq!(clip.format, self.inner.format, "clip not converted to mixer format");

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (done_tx, done_rx) = watch::channel(false);
        let handle = VoiceHandle {
            id,
            clip_name: Arc::from(clip.name.as_str()),
            done: done_rx,
        };

        let voice = Voice {
            id,
            clip: Arc::clone(clip),
            cursor: 0,
            looping,
            done: done_tx,
        };

        if clip.is_empty() {
            // Nothing to render; dropping the voice completes the handle
            debug!("Clip '{}' is empty, voice {} ends immediately", clip.name, id);
            drop(voice);
        } else {
            debug!("Voice {} started: '{}' (looping={})", id, clip.name, looping);
            self.voices().push(voice);
        }

        handle
    }

    /// Stop a voice. Returns false if it had already ended.
    pub fn stop(&self, handle: &VoiceHandle) -> bool {
        let removed = {
            let mut voices = self.voices();
            voices
                .iter()
                .position(|v| v.id == handle.id)
                .map(|idx| voices.swap_remove(idx))
        };

        match removed {
            Some(voice) => {
                debug!("Voice {} stopped: '{}'", voice.id, voice.clip.name);
                true
            }
            None => false,
        }
    }

    /// Stop every voice. Returns how many were sounding.
    pub fn stop_all(&self) -> usize {
        let drained: Vec<Voice> = self.voices().drain(..).collect();
        if !drained.is_empty() {
            debug!("Stopped all {} voice(s)", drained.len());
        }
        drained.len()
    }

    pub fn active_voices(&self) -> usize {
        self.voices().len()
    }

    pub fn is_silent(&self) -> bool {
        self.active_voices() == 0
    }

    /// Clip names of the sounding voices, in no particular order
    pub fn sounding_clips(&self) -> Vec<String> {
        self.voices().iter().map(|v| v.clip.name.clone()).collect()
    }

    /// Render interleaved frames into `out`, overwriting it.
    ///
    /// Finished one-shot voices are removed (and their handles completed)
    /// after the buffer is written.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let channels = self.inner.format.channels.max(1) as usize;

        let finished: Vec<Voice> = {
            let mut voices = self.voices();
            let mut finished = Vec::new();
            let mut idx = 0;
            while idx < voices.len() {
                if voices[idx].mix_into(out, channels) {
                    idx += 1;
                } else {
                    finished.push(voices.swap_remove(idx));
                }
            }
            finished
        };

        for voice in &finished {
            trace!("Voice {} finished: '{}'", voice.id, voice.clip.name);
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::types::ClipBuffer;

    fn clip(name: &str, frames: usize, value: f32) -> Clip {
        let format = OutputFormat::new(1000, 2);
        Arc::new(ClipBuffer::new(name, vec![value; frames * 2], format))
    }

    fn mixer() -> Mixer {
        Mixer::new(OutputFormat::new(1000, 2))
    }

    #[test]
    fn test_one_shot_voice_finishes() {
        let mixer = mixer();
        let handle = mixer.play(&clip("blip", 4, 0.25), false);
        assert!(handle.is_playing());

        let mut out = vec![0.0; 6 * 2];
        mixer.render(&mut out);

        assert_eq!(&out[..8], &[0.25; 8]);
        assert_eq!(&out[8..], &[0.0; 4]);
        assert!(!handle.is_playing());
        assert!(mixer.is_silent());
    }

    #[test]
    fn test_looping_voice_wraps() {
        let mixer = mixer();
        let handle = mixer.play(&clip("bed", 2, 0.5), true);

        let mut out = vec![0.0; 10 * 2];
        mixer.render(&mut out);

        assert!(out.iter().all(|s| *s == 0.5));
        assert!(handle.is_playing());
        assert_eq!(mixer.sounding_clips(), vec!["bed".to_string()]);
    }

    #[test]
    fn test_stop_silences_immediately() {
        let mixer = mixer();
        let handle = mixer.play(&clip("bed", 100, 0.5), true);

        assert!(mixer.stop(&handle));
        assert!(!handle.is_playing());
        assert!(!mixer.stop(&handle), "second stop is a no-op");

        let mut out = vec![1.0; 8];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_stop_all_completes_every_handle() {
        let mixer = mixer();
        let a = mixer.play(&clip("a", 100, 0.1), true);
        let b = mixer.play(&clip("b", 100, 0.1), false);

        assert_eq!(mixer.stop_all(), 2);
        assert!(!a.is_playing());
        assert!(!b.is_playing());
    }

    #[test]
    fn test_output_is_clamped() {
        let mixer = mixer();
        mixer.play(&clip("loud", 10, 0.8), false);
        mixer.play(&clip("louder", 10, 0.8), false);

        let mut out = vec![0.0; 4];
        mixer.render(&mut out);
        assert!(out.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_empty_clip_ends_immediately() {
        let mixer = mixer();
        let handle = mixer.play(&clip("empty", 0, 0.0), true);
        assert!(!handle.is_playing());
        assert!(mixer.is_silent());
    }

    #[tokio::test]
    async fn test_wait_done_returns_after_render() {
        let mixer = mixer();
        let handle = mixer.play(&clip("blip", 3, 0.1), false);

        let waiter = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.wait_done().await })
        };

        let mut out = vec![0.0; 8];
        mixer.render(&mut out);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_done should return once the voice ends")
            .unwrap();
    }
}

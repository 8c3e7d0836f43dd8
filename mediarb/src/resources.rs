//! Playback Resource Manager
//!
//! Sole owner of the two exclusive playback resources:
//! - the background voice on the shared mixer
//! - the single video-player process slot
//!
//! Every operation that starts something (background, effect, video) takes
//! the interrupt epoch the caller observed when its command was accepted. The
//! epoch is compared under the slot lock, and [`PlaybackResources::interrupt`]
//! bumps it under the same lock, so a start can never slip in after a reset
//! has silenced everything.

use crate::audio::{Clip, Mixer, VoiceHandle};
use crate::error::{Busy, CommandError};
use crate::video::{VideoLauncher, VideoProcess};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long a killed player gets to exit before its slot is cleared anyway
pub const KILL_GRACE: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Slots {
    epoch: u64,
    background: Option<VoiceHandle>,
    video: Option<VideoProcess>,
}

/// Shared audio output slot and video process slot
pub struct PlaybackResources {
    mixer: Mixer,
    launcher: Arc<dyn VideoLauncher>,
    slots: Mutex<Slots>,
}

impl PlaybackResources {
    pub fn new(mixer: Mixer, launcher: Arc<dyn VideoLauncher>) -> Self {
        Self {
            mixer,
            launcher,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_epoch(slots: &Slots, epoch: u64, what: &str) -> Result<(), CommandError> {
        if slots.epoch == epoch {
            Ok(())
        } else {
            debug!("{} start refused: interrupted (epoch {} != {})", what, epoch, slots.epoch);
            Err(CommandError::Interrupted {
                what: what.to_string(),
            })
        }
    }

    /// Current interrupt epoch
    pub fn epoch(&self) -> u64 {
        self.slots().epoch
    }

    // ========================================
    // Audio
    // ========================================

    /// Start `clip` as the background voice. Returns immediately.
    ///
    /// A previous background voice is stopped without waiting; the new voice
    /// supersedes it.
    pub fn start_background(
        &self,
        clip: &Clip,
        looping: bool,
        epoch: u64,
    ) -> Result<VoiceHandle, CommandError> {
        let mut slots = self.slots();
        Self::check_epoch(&slots, epoch, "Background")?;

        if slots.video.as_ref().is_some_and(|v| v.is_alive()) {
            warn!("Refusing to start background '{}' while video is alive", clip.name);
            return Err(CommandError::AlreadyBusy(Busy::VideoPlaying));
        }

        if let Some(previous) = slots.background.take() {
            self.mixer.stop(&previous);
        }

        let voice = self.mixer.play(clip, looping);
        info!("Background started: '{}'", clip.name);
        slots.background = Some(voice.clone());
        Ok(voice)
    }

    /// Current background voice, if any
    pub fn background(&self) -> Option<VoiceHandle> {
        self.slots().background.clone()
    }

    /// Non-blocking poll
    pub fn is_audio_active(&self, voice: &VoiceHandle) -> bool {
        voice.is_playing()
    }

    /// Stop `voice`; with `wait`, return only once it can no longer sound
    pub async fn stop_audio(&self, voice: &VoiceHandle, wait: bool) {
        if self.mixer.stop(voice) {
            debug!("Stopped voice {} ('{}')", voice.id(), voice.clip_name());
        }
        if wait {
            voice.wait_done().await;
        }
    }

    /// Stop and forget the background voice
    pub async fn stop_background(&self, wait: bool) {
        let background = self.slots().background.take();
        if let Some(voice) = background {
            self.stop_audio(&voice, wait).await;
        }
    }

    /// Play `clip` once and wait until it ends.
    ///
    /// The output must already be silent. With a `timeout`, an effect still
    /// sounding at the deadline is stopped and `Timeout` returned.
    pub async fn play_effect_to_completion(
        &self,
        clip: &Clip,
        timeout: Option<Duration>,
        epoch: u64,
    ) -> Result<(), CommandError> {
        let what = format!("Effect {}", clip.name);

        let voice = {
            let slots = self.slots();
            Self::check_epoch(&slots, epoch, &what)?;
            self.mixer.play(clip, false)
        };
        debug!("Effect '{}' playing ({:.2}s)", clip.name, clip.duration().as_secs_f32());

        match timeout {
            None => voice.wait_done().await,
            Some(limit) => {
                if tokio::time::timeout(limit, voice.wait_done()).await.is_err() {
                    warn!("Effect '{}' exceeded {:?}, stopping it", clip.name, limit);
                    self.stop_audio(&voice, true).await;
                    return Err(CommandError::Timeout { what, limit });
                }
            }
        }

        // A reset silences the effect through `interrupt`
        Self::check_epoch(&self.slots(), epoch, &what)
    }

    // ========================================
    // Video
    // ========================================

    /// Launch the player for `source` and occupy the video slot.
    pub fn spawn_video(
        &self,
        player: &Path,
        args: &[String],
        source: &Path,
        epoch: u64,
    ) -> Result<VideoProcess, CommandError> {
        let mut slots = self.slots();
        Self::check_epoch(&slots, epoch, "Video")?;

        if slots.video.as_ref().is_some_and(|v| v.is_alive()) {
            return Err(CommandError::AlreadyBusy(Busy::VideoAlreadyPlaying));
        }

        let process = self
            .launcher
            .launch(player, args, source)
            .map_err(|e| CommandError::ExternalProcess {
                player: player.to_path_buf(),
                reason: e.to_string(),
            })?;

        slots.video = Some(process.clone());
        Ok(process)
    }

    /// True while the process in the video slot is running
    pub fn is_video_alive(&self) -> bool {
        self.slots().video.as_ref().is_some_and(|v| v.is_alive())
    }

    /// Request termination of the live video, if any. Idempotent.
    pub fn kill_video(&self) {
        if let Some(video) = self.slots().video.as_ref() {
            video.kill();
        }
    }

    /// Wait for `process` to exit, then release the video slot.
    ///
    /// With a `timeout`, a player still running at the deadline is killed and
    /// `Timeout` returned once it has gone.
    pub async fn wait_video(
        &self,
        process: &VideoProcess,
        timeout: Option<Duration>,
    ) -> Result<(), CommandError> {
        let outcome = match timeout {
            None => {
                process.wait().await;
                Ok(())
            }
            Some(limit) => match tokio::time::timeout(limit, process.wait()).await {
                Ok(()) => Ok(()),
                Err(_) => {
                    warn!("Video exceeded {:?}, killing the player", limit);
                    process.kill();
                    self.await_exit(process).await;
                    Err(CommandError::Timeout {
                        what: "Video".to_string(),
                        limit,
                    })
                }
            },
        };

        self.release_video(process);
        outcome
    }

    /// Wait (bounded) for the video in the slot to exit and empty the slot
    pub async fn reap_video(&self) {
        let video = self.slots().video.clone();
        if let Some(process) = video {
            process.kill();
            self.await_exit(&process).await;
            self.release_video(&process);
        }
    }

    async fn await_exit(&self, process: &VideoProcess) {
        if tokio::time::timeout(KILL_GRACE, process.wait()).await.is_err() {
            warn!(
                "Video player {:?} did not exit within {:?} of being killed",
                process.pid(),
                KILL_GRACE
            );
        }
    }

    fn release_video(&self, process: &VideoProcess) {
        let mut slots = self.slots();
        if slots.video.as_ref().is_some_and(|v| v.same_process(process)) {
            slots.video = None;
        }
    }

    // ========================================
    // Interrupt
    // ========================================

    /// Cut short whatever is playing: kill the video, stop every voice.
    ///
    /// Returns the new epoch. Starts tagged with an older epoch are refused
    /// from now on.
    pub fn interrupt(&self) -> u64 {
        let mut slots = self.slots();
        slots.epoch += 1;

        if let Some(video) = slots.video.as_ref() {
            video.kill();
        }
        slots.background = None;
        let stopped = self.mixer.stop_all();

        info!(
            "Interrupted playback (epoch {}, {} voice(s) stopped)",
            slots.epoch, stopped
        );
        slots.epoch
    }
}

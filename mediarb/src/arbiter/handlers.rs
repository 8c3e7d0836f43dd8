//! Command handlers
//!
//! Each handler runs with exclusive access to the [`ArbiterState`] and checks
//! the video guard first. Rejections leave state untouched.

use super::state::{Activity, ArbiterState, VideoSource};
use super::{ActivityGuard, Arbiter};
use crate::error::{Busy, CommandError, NameKind};
use tracing::{debug, info, warn};

type HandlerResult = Result<String, CommandError>;

impl Arbiter {
    fn video_guard(&self, busy: Busy) -> Result<(), CommandError> {
        if self.resources.is_video_alive() {
            Err(CommandError::AlreadyBusy(busy))
        } else {
            Ok(())
        }
    }

    /// Select the video for the next `playVideo`
    pub(super) fn set_source(&self, state: &mut ArbiterState, language: &str) -> HandlerResult {
        self.video_guard(Busy::VideoAlreadyPlaying)?;

        let path = self
            .config
            .language_path(language)
            .ok_or_else(|| CommandError::unknown(NameKind::Language, language))?;

        info!("Video source set to '{}' ({})", language, path.display());
        state.language = language.to_string();
        state.video_source = VideoSource {
            language: language.to_string(),
            path,
        };

        Ok(format!("Language set to {}", language))
    }

    /// Switch the background track.
    ///
    /// The old track is stopped without waiting; the new voice supersedes it.
    pub(super) fn change_music(
        &self,
        state: &mut ArbiterState,
        track: &str,
        epoch: u64,
    ) -> HandlerResult {
        self.video_guard(Busy::VideoPlaying)?;

        let clip = state
            .library
            .track(track)
            .cloned()
            .ok_or_else(|| CommandError::unknown(NameKind::Track, track))?;

        let already_playing = state.current_track == track
            && self
                .resources
                .background()
                .is_some_and(|v| v.clip_name() == track && v.is_playing());

        if already_playing {
            debug!("Track '{}' already playing", track);
        } else {
            self.resources
                .start_background(&clip, self.config.loop_background, epoch)?;
            state.current_track = track.to_string();
        }

        Ok(format!("Music changed to {}", track))
    }

    /// Suspend background audio, play an effect to completion, resume.
    pub(super) async fn play_effect(
        &self,
        state: &mut ArbiterState,
        effect: &str,
        epoch: u64,
    ) -> HandlerResult {
        self.video_guard(Busy::VideoPlaying)?;

        let clip = state
            .library
            .effect(effect)
            .cloned()
            .ok_or_else(|| CommandError::unknown(NameKind::Effect, effect))?;

        let _phase = ActivityGuard::enter(&self.activity, Activity::Effect);

        self.resources.stop_background(true).await;
        info!("Playing effect '{}'", effect);

        let played = self
            .resources
            .play_effect_to_completion(&clip, self.config.limits.effect_timeout(), epoch)
            .await;

        match played {
            Err(e @ CommandError::Interrupted { .. }) => Err(e),
            played => {
                self.resume_background(state, epoch)?;
                played.map(|_| format!("Effect {} finished", effect))
            }
        }
    }

    /// Suspend background audio, run the player to completion, resume.
    ///
    /// A player that fails to start is reported and background audio resumes
    /// as if the command never happened.
    pub(super) async fn play_video(&self, state: &mut ArbiterState, epoch: u64) -> HandlerResult {
        self.video_guard(Busy::VideoAlreadyPlaying)?;

        let _phase = ActivityGuard::enter(&self.activity, Activity::Video);
        let source = state.video_source.path.clone();

        if !source.is_file() {
            warn!("Video file for '{}' not found: {}", state.language, source.display());
        }

        self.resources.stop_background(true).await;

        let process = match self.resources.spawn_video(
            &self.config.player,
            &self.config.player_args,
            &source,
            epoch,
        ) {
            Ok(process) => process,
            Err(e @ CommandError::Interrupted { .. }) => return Err(e),
            Err(e) => {
                warn!("Video did not start: {}", e);
                self.resume_background(state, epoch)?;
                return Err(e);
            }
        };

        info!("Video playing: {} (pid {:?})", source.display(), process.pid());

        let finished = self
            .resources
            .wait_video(&process, self.config.limits.video_timeout())
            .await;

        if self.resources.epoch() != epoch {
            return Err(CommandError::Interrupted {
                what: "Video".to_string(),
            });
        }

        self.resume_background(state, epoch)?;
        finished.map(|_| "Video finished".to_string())
    }

    /// Start the current track as background audio
    pub(super) fn resume_background(
        &self,
        state: &ArbiterState,
        epoch: u64,
    ) -> Result<(), CommandError> {
        let clip = state
            .library
            .track(&state.current_track)
            .ok_or_else(|| CommandError::unknown(NameKind::Track, &state.current_track))?;

        self.resources
            .start_background(clip, self.config.loop_background, epoch)?;
        Ok(())
    }
}

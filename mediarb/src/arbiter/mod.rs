//! Arbitration State Machine
//!
//! Serializes the five commands against the exclusive playback resources.
//!
//! **Serialization:** every handler except `reset` runs under one
//! `tokio::sync::Mutex<ArbiterState>`, held for the whole handler including
//! its waits for a video or effect to finish.
//!
//! **Rejection:** while the lock holder is in an exclusive phase (video or
//! effect playing) the published [`Activity`] says so, and a command that
//! cannot get the lock is rejected with `AlreadyBusy` instead of waiting.
//! A command that finds the lock held by a short handler simply waits for it.
//!
//! **Reset:** bypasses the lock to interrupt first (kill the video, stop all
//! audio, bump the interrupt epoch), then takes the lock, which the
//! interrupted handler releases promptly, and re-enters the initial state.
//!
//! Commands from the control channel go through a [`CommandQueue`]: a single
//! worker task accepts them in arrival order and hands each accepted command,
//! together with its lock guard, to its own task.

mod handlers;
pub mod state;

pub use state::{Activity, ArbiterState, SessionState, StatusSnapshot, VideoSource};

use crate::audio::Mixer;
use crate::error::{Busy, CommandError, Error, Result};
use crate::library::ClipLibrary;
use crate::resources::PlaybackResources;
use crate::status::StatusReporter;
use crate::video::VideoLauncher;
use mediarb_common::{ArbiterConfig, Command};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default capacity of the command queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// The media arbiter
pub struct Arbiter {
    config: Arc<ArbiterConfig>,
    resources: PlaybackResources,
    state: Arc<Mutex<ArbiterState>>,
    activity: watch::Sender<Activity>,
    reporter: Arc<dyn StatusReporter>,
}

/// Publishes an exclusive activity for as long as it lives
struct ActivityGuard<'a> {
    activity: &'a watch::Sender<Activity>,
}

impl<'a> ActivityGuard<'a> {
    fn enter(activity: &'a watch::Sender<Activity>, phase: Activity) -> Self {
        activity.send_replace(phase);
        Self { activity }
    }
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.activity.send_replace(Activity::Idle);
    }
}

impl Arbiter {
    /// Load the clip library and enter the initial state.
    ///
    /// Clip load failures are fatal. `config.player` must already be
    /// resolved to an executable.
    pub async fn start(
        config: ArbiterConfig,
        mixer: Mixer,
        launcher: Arc<dyn VideoLauncher>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        let config = Arc::new(config);

        for (language, path) in &config.languages {
            let path = config.resolve_path(path);
            if !path.is_file() {
                warn!("Video for language '{}' not found: {}", language, path.display());
            }
        }

        let library = Self::load_library(&config, &mixer).await?;
        let state = ArbiterState::initial(&config, library);
        let resources = PlaybackResources::new(mixer, launcher);
        let (activity, _) = watch::channel(Activity::Idle);

        let arbiter = Self {
            config,
            resources,
            state: Arc::new(Mutex::new(state)),
            activity,
            reporter,
        };

        {
            let state = arbiter.state.lock().await;
            let epoch = arbiter.resources.epoch();
            arbiter
                .resume_background(&state, epoch)
                .map_err(|e| Error::Internal(format!("Failed to start default track: {}", e)))?;
        }

        info!(
            "Arbiter ready: track '{}', language '{}'",
            arbiter.config.default_track, arbiter.config.default_language
        );
        Ok(arbiter)
    }

    async fn load_library(config: &Arc<ArbiterConfig>, mixer: &Mixer) -> Result<ClipLibrary> {
        let config = Arc::clone(config);
        let format = mixer.format();
        tokio::task::spawn_blocking(move || ClipLibrary::load(&config, format))
            .await
            .map_err(|e| Error::Internal(format!("Clip loading task failed: {}", e)))?
    }

    pub fn config(&self) -> &ArbiterConfig {
        &self.config
    }

    pub fn resources(&self) -> &PlaybackResources {
        &self.resources
    }

    pub fn reporter(&self) -> &Arc<dyn StatusReporter> {
        &self.reporter
    }

    /// Current activity
    pub fn activity(&self) -> Activity {
        *self.activity.borrow()
    }

    /// `VideoPlaying` exactly while a player process is alive
    pub fn session_state(&self) -> SessionState {
        if self.resources.is_video_alive() {
            SessionState::VideoPlaying
        } else {
            SessionState::AudioIdleOrPlaying
        }
    }

    /// Snapshot of the selections and resources.
    ///
    /// Waits for the state lock, so it blocks while a video or effect plays.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let state = self.state.lock().await;
        StatusSnapshot {
            session: self.session_state(),
            activity: self.activity(),
            language: state.language.clone(),
            current_track: state.current_track.clone(),
            video_source: state.video_source.clone(),
            background: self
                .resources
                .background()
                .filter(|v| v.is_playing())
                .map(|v| v.clip_name().to_string()),
        }
    }

    // ========================================
    // Command execution
    // ========================================

    /// Run one command to completion and return its status text.
    pub async fn execute(&self, command: Command) -> std::result::Result<String, CommandError> {
        if command == Command::Reset {
            return self.reset().await;
        }

        let epoch = self.resources.epoch();
        let guard = self.acquire(&command).await?;
        self.run(guard, &command, epoch).await
    }

    /// Run one command and report its outcome
    pub async fn dispatch(&self, command: Command) {
        let result = self.execute(command.clone()).await;
        self.report(&command, result);
    }

    /// Take the state lock, or reject if the holder is playing a video or
    /// an effect.
    async fn acquire(
        &self,
        command: &Command,
    ) -> std::result::Result<OwnedMutexGuard<ArbiterState>, CommandError> {
        let mut activity = self.activity.subscribe();

        tokio::select! {
            biased;
            guard = Arc::clone(&self.state).lock_owned() => Ok(guard),
            busy = activity.wait_for(Activity::is_exclusive) => {
                let phase = busy.map(|a| *a).unwrap_or(Activity::Video);
                debug!("Rejecting {} during {:?}", command, phase);
                Err(CommandError::AlreadyBusy(busy_for(command, phase)))
            }
        }
    }

    /// Run a handler under an already acquired guard
    async fn run(
        &self,
        mut guard: OwnedMutexGuard<ArbiterState>,
        command: &Command,
        epoch: u64,
    ) -> std::result::Result<String, CommandError> {
        debug!("Handling {}", command);

        match command {
            Command::SetSource(language) => self.set_source(&mut guard, language),
            Command::ChangeMusic(track) => self.change_music(&mut guard, track, epoch),
            Command::PlayEffect(effect) => self.play_effect(&mut guard, effect, epoch).await,
            Command::PlayVideo => self.play_video(&mut guard, epoch).await,
            Command::Reset => {
                drop(guard);
                self.reset().await
            }
        }
    }

    fn report(&self, command: &Command, result: std::result::Result<String, CommandError>) {
        match result {
            Ok(text) => self.reporter.report_success(&text),
            Err(e) => {
                debug!("{} failed: {:?}", command, e);
                self.reporter.report_error(&e.to_string());
            }
        }
    }

    // ========================================
    // Reset and shutdown
    // ========================================

    /// Interrupt everything and re-enter the initial state.
    ///
    /// The clip library is reloaded from disk; if that fails the previous
    /// library is kept and `Reload` is returned after the initial state has
    /// been restored.
    pub async fn reset(&self) -> std::result::Result<String, CommandError> {
        info!("Reset requested");
        let epoch = self.resources.interrupt();

        let mut state = self.state.lock().await;
        self.resources.reap_video().await;

        let (library, reload) = match Self::load_library(&self.config, self.resources.mixer()).await {
            Ok(library) => (library, Ok(())),
            Err(e) => {
                error!("Reset could not reload clips: {}", e);
                (state.library.clone(), Err(CommandError::Reload(e.to_string())))
            }
        };

        *state = ArbiterState::initial(&self.config, library);
        self.resume_background(&state, epoch)?;
        reload?;

        info!("Reset complete");
        Ok("Reset complete".to_string())
    }

    /// Stop playback for process exit
    pub async fn shutdown(&self) {
        info!("Stopping playback");
        self.resources.interrupt();
        self.resources.reap_video().await;
    }

    // ========================================
    // Command queue
    // ========================================

    /// Start the worker that executes queued commands in arrival order.
    pub fn spawn_worker(self: &Arc<Self>, capacity: usize) -> (CommandQueue, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(Arc::clone(self).run_worker(rx));

        let queue = CommandQueue {
            tx,
            reporter: Arc::clone(&self.reporter),
        };
        (queue, worker)
    }

    async fn run_worker(self: Arc<Self>, mut rx: mpsc::Receiver<Command>) {
        debug!("Command worker started");

        while let Some(command) = rx.recv().await {
            if command == Command::Reset {
                // Later commands must observe the initial state
                let result = self.reset().await;
                self.report(&command, result);
                continue;
            }

            let epoch = self.resources.epoch();
            match self.acquire(&command).await {
                Ok(guard) => {
                    let arbiter = Arc::clone(&self);
                    tokio::spawn(async move {
                        let result = arbiter.run(guard, &command, epoch).await;
                        arbiter.report(&command, result);
                    });
                }
                Err(e) => self.report(&command, Err(e)),
            }
        }

        debug!("Command worker stopped");
    }
}

/// Rejection text for `command` while `phase` holds the output
fn busy_for(command: &Command, phase: Activity) -> Busy {
    match (phase, command) {
        (Activity::Effect, _) => Busy::EffectPlaying,
        (_, Command::SetSource(_) | Command::PlayVideo) => Busy::VideoAlreadyPlaying,
        _ => Busy::VideoPlaying,
    }
}

/// Sending side of the command worker
#[derive(Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<Command>,
    reporter: Arc<dyn StatusReporter>,
}

impl CommandQueue {
    /// Enqueue without waiting. A full queue drops the command and reports it.
    pub fn submit(&self, command: Command) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(command)) => {
                warn!("Command queue full, dropping {}", command);
                self.reporter
                    .report_error(&format!("Command queue full, dropped {}", command));
                false
            }
            Err(mpsc::error::TrySendError::Closed(command)) => {
                warn!("Command worker stopped, dropping {}", command);
                false
            }
        }
    }
}

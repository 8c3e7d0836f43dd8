//! Video player process supervision
//!
//! The player is an external program run as `player [args..] <video>`. Its
//! exit code is not inspected; only "still running" vs "exited" matters.
//!
//! A [`VideoProcess`] is a cloneable handle. The process itself is owned by a
//! supervisor task which waits for either natural exit or a kill request and
//! then publishes "exited" to every handle, so a kill from one task unblocks
//! a `wait` in another.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

/// Starts video player processes
pub trait VideoLauncher: Send + Sync {
    /// Spawn the player for `source`. Does not wait for it.
    fn launch(&self, player: &Path, args: &[String], source: &Path) -> Result<VideoProcess>;
}

/// Handle to a spawned player process
#[derive(Debug, Clone)]
pub struct VideoProcess {
    id: u64,
    pid: Option<u32>,
    source: PathBuf,
    exited: watch::Receiver<bool>,
    kill: Arc<Notify>,
}

/// Owning side of a [`VideoProcess`]; dropping it marks the process exited
#[derive(Debug)]
pub struct ProcessControl {
    exited: watch::Sender<bool>,
    kill: Arc<Notify>,
}

impl VideoProcess {
    /// Create a handle and its control side
    pub fn channel(pid: Option<u32>, source: &Path) -> (VideoProcess, ProcessControl) {
        let (exited_tx, exited_rx) = watch::channel(false);
        let kill = Arc::new(Notify::new());

        let process = VideoProcess {
            id: NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed),
            pid,
            source: source.to_path_buf(),
            exited: exited_rx,
            kill: Arc::clone(&kill),
        };

        (process, ProcessControl { exited: exited_tx, kill })
    }

    /// OS process id, if known
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Non-blocking poll
    pub fn is_alive(&self) -> bool {
        !*self.exited.borrow()
    }

    /// Request forcible termination. Idempotent; returns immediately.
    pub fn kill(&self) {
        if self.is_alive() {
            debug!("Kill requested for video process {:?}", self.pid);
            self.kill.notify_one();
        }
    }

    /// Wait until the process has exited (naturally or killed)
    pub async fn wait(&self) {
        let mut exited = self.exited.clone();
        // The control side publishes `true` before it is dropped
        let _ = exited.wait_for(|e| *e).await;
    }

    /// True when both handles refer to the same spawn
    pub fn same_process(&self, other: &VideoProcess) -> bool {
        self.id == other.id
    }
}

impl ProcessControl {
    /// Resolves when a handle requested termination
    pub async fn kill_requested(&self) {
        self.kill.notified().await
    }

    /// Publish exit to every handle
    pub fn mark_exited(self) {
        drop(self);
    }
}

impl Drop for ProcessControl {
    fn drop(&mut self) {
        self.exited.send_replace(true);
    }
}

/// Launches real OS processes with tokio
#[derive(Debug, Default, Clone)]
pub struct ProcessLauncher;

impl VideoLauncher for ProcessLauncher {
    fn launch(&self, player: &Path, args: &[String], source: &Path) -> Result<VideoProcess> {
        let child = Command::new(player)
            .args(args)
            .arg(source)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let (process, control) = VideoProcess::channel(child.id(), source);
        info!(
            "Started video player {} (pid {:?}) for {}",
            player.display(),
            process.pid(),
            source.display()
        );

        tokio::spawn(supervise(child, control));
        Ok(process)
    }
}

async fn supervise(mut child: Child, control: ProcessControl) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => info!("Video player exited: {}", status),
            Err(e) => warn!("Failed to wait for video player: {}", e),
        },
        _ = control.kill_requested() => {
            match child.kill().await {
                Ok(()) => info!("Video player killed"),
                Err(e) => warn!("Failed to kill video player: {}", e),
            }
        }
    }
    control.mark_exited();
}

/// Resolve the configured player to an executable path.
///
/// Paths with a directory component must exist; bare names are looked up on
/// `PATH`.
pub fn resolve_player(player: &Path) -> Result<PathBuf> {
    let is_bare_name = player.components().count() == 1 && !player.is_absolute();

    if is_bare_name {
        return which::which(player).map_err(|_| Error::PlayerNotFound {
            path: player.to_path_buf(),
        });
    }

    if player.is_file() {
        Ok(player.to_path_buf())
    } else {
        Err(Error::PlayerNotFound {
            path: player.to_path_buf(),
        })
    }
}

//! Test doubles for the arbiter's collaborators
//!
//! - `RecordingReporter`: keeps every status line for assertions
//! - `ScriptedLauncher`: fake video player whose processes run until the test
//!   finishes them or the arbiter kills them

use mediarb::error::{Error, Result};
use mediarb::status::StatusReporter;
use mediarb::video::{VideoLauncher, VideoProcess};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// How long the `wait_*` helpers poll before giving up
pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Poll `condition` until it holds or `WAIT_LIMIT` passes
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// One reported status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Success(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<StatusLine>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<StatusLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, line: &StatusLine) -> bool {
        self.lines.lock().unwrap().contains(line)
    }

    pub async fn wait_for(&self, line: StatusLine) -> bool {
        wait_until(|| self.contains(&line)).await
    }
}

impl StatusReporter for RecordingReporter {
    fn report_success(&self, text: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(StatusLine::Success(text.to_string()));
    }

    fn report_error(&self, text: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(StatusLine::Error(text.to_string()));
    }
}

/// A recorded `launch` call
#[derive(Debug, Clone)]
pub struct Launch {
    pub player: PathBuf,
    pub args: Vec<String>,
    pub source: PathBuf,
    pub process: VideoProcess,
}

#[derive(Default)]
pub struct ScriptedLauncher {
    launches: Mutex<Vec<Launch>>,
    finishers: Mutex<Vec<Arc<Notify>>>,
    fail_next: AtomicBool,
}

impl ScriptedLauncher {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }

    /// Make the next `launch` fail as if the player could not be spawned
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Let the most recent video end naturally
    pub fn finish_current(&self) {
        if let Some(finish) = self.finishers.lock().unwrap().last() {
            finish.notify_one();
        }
    }

    /// Most recent process, if any was launched
    pub fn current(&self) -> Option<VideoProcess> {
        self.launches.lock().unwrap().last().map(|l| l.process.clone())
    }

    pub async fn wait_for_launches(&self, count: usize) -> bool {
        wait_until(|| self.launch_count() >= count).await
    }
}

impl VideoLauncher for ScriptedLauncher {
    fn launch(&self, player: &Path, args: &[String], source: &Path) -> Result<VideoProcess> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "scripted spawn failure",
            )));
        }

        let (process, control) = VideoProcess::channel(Some(4242), source);
        let finish = Arc::new(Notify::new());

        let finished = Arc::clone(&finish);
        tokio::spawn(async move {
            tokio::select! {
                _ = control.kill_requested() => {}
                _ = finished.notified() => {}
            }
            control.mark_exited();
        });

        self.finishers.lock().unwrap().push(finish);
        self.launches.lock().unwrap().push(Launch {
            player: player.to_path_buf(),
            args: args.to_vec(),
            source: source.to_path_buf(),
            process: process.clone(),
        });

        Ok(process)
    }
}

//! Status Reporter
//!
//! One human-readable line per accepted or rejected command. Reporting never
//! fails from the caller's point of view.

use std::io::Write;
use tracing::{info, warn};

/// Sink for command outcomes
pub trait StatusReporter: Send + Sync {
    fn report_success(&self, text: &str);
    fn report_error(&self, text: &str);
}

/// Writes status lines to stdout and mirrors them as tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutReporter;

impl StatusReporter for StdoutReporter {
    fn report_success(&self, text: &str) {
        info!(status = "ok", "{}", text);
        let _ = writeln!(std::io::stdout().lock(), "{}", text);
    }

    fn report_error(&self, text: &str) {
        warn!(status = "error", "{}", text);
        let _ = writeln!(std::io::stdout().lock(), "Error: {}", text);
    }
}

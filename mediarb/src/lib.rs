//! # Media Arbiter Library (mediarb)
//!
//! Network-controlled media arbiter: background tracks, one-shot effects and
//! an external video player, never more than one of them audible at a time.
//!
//! **Purpose:** Accept OSC commands over UDP, arbitrate the exclusive
//! playback resources, resume background audio after every video or effect.
//!
//! **Architecture:** symphonia + rubato decode and convert clips at load time;
//! a lock-guarded mixer feeds a cpal stream; the video player runs under a
//! tokio process supervisor; a single command worker serializes handlers.

pub mod arbiter;
pub mod audio;
pub mod error;
pub mod library;
pub mod resources;
pub mod server;
pub mod status;
pub mod video;

pub use arbiter::{Arbiter, CommandQueue};
pub use error::{CommandError, Error, Result};
pub use status::{StatusReporter, StdoutReporter};

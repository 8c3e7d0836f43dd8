//! # Media Arbiter Common Library
//!
//! Shared code for the media arbiter daemon and its controller tools:
//! - Configuration model and config file resolution
//! - Command vocabulary (`Command` enum)
//! - Command Router (control address → command)
//! - Common error types

pub mod command;
pub mod config;
pub mod error;

pub use command::{Command, RouteError, Router};
pub use config::ArbiterConfig;
pub use error::{Error, Result};

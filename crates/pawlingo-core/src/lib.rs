//! Core types and configuration for pawlingo.
//!
//! This crate provides platform-agnostic types that can be used across
//! all pawlingo sub-crates.

mod config;
mod event;
mod state;

pub use config::{Config, ConfigManager, Pet};
pub use event::{DetectorEvent, DetectorListener};
pub use state::{ActivityState, DetectorState, Edge, PermissionState, Threshold};

/// Application name
pub const APP_NAME: &str = "pawlingo";

/// Pretty application name for display
pub const APP_NAME_PRETTY: &str = "Pawlingo";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PAWLINGO_LOG";

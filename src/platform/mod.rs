//! Platform-specific module for Windows utilities.
//!
//! This module contains preferences persistence and startup-entry
//! registration.

pub mod autostart;
pub mod config;

pub use autostart::AutostartError;
pub use config::{Preferences, PreferencesError, PreferencesStore, APP_NAME};

//! MuteLink - Library
//!
//! Links a headset's hardware mute button to a chosen Windows audio
//! capture endpoint.
//!
//! ## Features
//!
//! - Listens for raw mute-button reports across all of the vendor's HID
//!   interfaces
//! - Drives the mute flag of an endpoint selected by name fragment
//! - User-togglable listener with last-known-state restoration
//! - System tray menu, JSON preferences, start-at-login registration

pub mod app;
pub mod audio;
pub mod gate;
pub mod hid;
pub mod platform;
pub mod ui;

pub use app::App;
pub use audio::{AudioError, EndpointDirectory, EndpointInfo};
pub use gate::MuteSyncGate;
pub use hid::{ButtonListener, ReportMapping};
pub use platform::{Preferences, PreferencesStore};
pub use ui::{TrayEvent, TrayManager, TrayState};

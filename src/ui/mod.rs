//! UI module for the system tray.

pub mod icons;
pub mod tray;

pub use tray::{TrayError, TrayEvent, TrayManager, TrayState};

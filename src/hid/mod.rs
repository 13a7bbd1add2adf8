//! Raw HID access for the hardware mute button.
//!
//! This module provides interface enumeration, shared-mode opening, and
//! input report decoding for the target vendor's devices.

pub mod listener;
pub mod report;

pub use listener::ButtonListener;
pub use report::{ReportMapping, RAZER_VID};

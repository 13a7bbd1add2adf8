//! Audio module for Windows Core Audio API interactions.
//!
//! This module provides endpoint enumeration, name-fragment resolution,
//! and per-endpoint mute control.

pub mod device;
pub mod directory;
pub mod mute;

pub use device::{AudioError, EndpointInfo, EndpointResolver, MuteEndpoint};
pub use directory::{ComGuard, EndpointDirectory};
pub use mute::{MuteControl, ResolvedEndpoint};

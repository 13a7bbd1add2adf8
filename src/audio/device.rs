//! Audio endpoint data models.
//!
//! Defines the data structures for representing capture endpoints and the
//! trait seams through which the synchronization gate reaches the audio
//! subsystem.

use thiserror::Error;

/// A capture-capable audio endpoint as seen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Unique Windows endpoint ID (opaque string from IMMDevice::GetId)
    pub id: String,

    /// Human-readable device name (from device properties)
    pub name: String,
}

impl EndpointInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A resolved endpoint whose mute flag can be read and written.
///
/// Handles are only valid for as long as the hardware topology stays put;
/// a stale handle surfaces as [`AudioError::EndpointStale`] and callers are
/// expected to re-resolve.
pub trait MuteEndpoint: Send {
    /// Friendly name of the endpoint this handle was resolved from.
    fn name(&self) -> &str;

    /// Read the endpoint's current mute flag.
    fn is_muted(&self) -> Result<bool, AudioError>;

    /// Write the endpoint's mute flag.
    fn set_mute(&self, muted: bool) -> Result<(), AudioError>;
}

/// Resolves an endpoint handle from a user-provided name fragment.
pub trait EndpointResolver: Send + Sync {
    /// Case-insensitive substring match against friendly names, first match
    /// in enumeration order. Empty substrings and unmatched fragments
    /// resolve to `None`.
    fn resolve(&self, substring: &str) -> Option<Box<dyn MuteEndpoint>>;
}

/// Audio subsystem error types.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("COM initialization failed: {0}")]
    ComInitFailed(#[source] windows::core::Error),

    #[error("failed to enumerate endpoints: {0}")]
    EnumerationFailed(#[source] windows::core::Error),

    #[error("mute control not available for endpoint")]
    MuteControlUnavailable,

    #[error("endpoint handle is no longer valid: {0}")]
    EndpointStale(#[source] windows::core::Error),

    #[error("string conversion error: {0}")]
    StringConversion(String),
}

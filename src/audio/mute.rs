//! Mute control using IAudioEndpointVolume.
//!
//! Pure pass-through to the per-endpoint mute flag. No caching, no
//! batching; a stale handle surfaces as an error so the gate can
//! re-resolve.

use super::device::{AudioError, EndpointInfo, MuteEndpoint};
use windows::Win32::Media::Audio::{Endpoints::IAudioEndpointVolume, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Mute controller for a specific endpoint.
pub struct MuteControl {
    endpoint_volume: IAudioEndpointVolume,
}

impl MuteControl {
    /// Create a new MuteControl for the given device.
    pub fn new(device: &IMMDevice) -> Result<Self, AudioError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|_| AudioError::MuteControlUnavailable)?;

            Ok(Self { endpoint_volume })
        }
    }

    /// Get the current mute state.
    pub fn is_muted(&self) -> Result<bool, AudioError> {
        unsafe {
            let muted = self
                .endpoint_volume
                .GetMute()
                .map_err(AudioError::EndpointStale)?;
            Ok(muted.as_bool())
        }
    }

    /// Set the mute state.
    pub fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        unsafe {
            self.endpoint_volume
                .SetMute(muted, std::ptr::null())
                .map_err(AudioError::EndpointStale)?;
            Ok(())
        }
    }
}

/// An endpoint resolved by the directory, coupled with its mute control.
pub struct ResolvedEndpoint {
    info: EndpointInfo,
    control: MuteControl,
}

impl ResolvedEndpoint {
    pub fn new(info: EndpointInfo, control: MuteControl) -> Self {
        Self { info, control }
    }

    pub fn info(&self) -> &EndpointInfo {
        &self.info
    }
}

impl MuteEndpoint for ResolvedEndpoint {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn is_muted(&self) -> Result<bool, AudioError> {
        self.control.is_muted()
    }

    fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
        self.control.set_mute(muted)
    }
}

//! Endpoint enumeration using the Windows MMDevice API.
//!
//! Enumerates active audio endpoints, classifies the capture-capable ones
//! by a friendly-name heuristic, and resolves an endpoint handle from a
//! user-provided name fragment.

use super::device::{AudioError, EndpointInfo, EndpointResolver, MuteEndpoint};
use super::mute::{MuteControl, ResolvedEndpoint};
use tracing::debug;
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eAll, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator, DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_ALL, COINIT_APARTMENTTHREADED, STGM,
};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Name tokens marking an endpoint as capture-capable. There is no reliable
/// hardware flag for "this is a microphone", so classification is by name.
const CAPTURE_NAME_TOKENS: &[&str] = &["microphone", "mic", "line in"];

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    initialized: bool,
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, AudioError> {
        unsafe {
            // Use apartment-threaded for UI compatibility
            CoInitializeEx(None, COINIT_APARTMENTTHREADED)
                .ok()
                .map_err(AudioError::ComInitFailed)?;
        }
        Ok(Self { initialized: true })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.initialized {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Endpoint directory backed by the MMDevice API.
///
/// Each query enumerates fresh; handle validity is tied to the enumeration
/// that produced it, so callers re-resolve after topology changes rather
/// than caching indefinitely. Enumeration costs tens of milliseconds and
/// must stay off hot paths.
pub struct EndpointDirectory;

impl EndpointDirectory {
    /// Create a new EndpointDirectory.
    ///
    /// Note: COM must be initialized on every thread that queries it.
    pub fn new() -> Self {
        Self
    }

    /// List endpoints for display, filtered by the capture-name heuristic.
    ///
    /// Fail-open: if the heuristic matches nothing, the full unfiltered
    /// set is returned so the UI never shows an empty device list.
    pub fn list_capture_endpoints(&self) -> Result<Vec<EndpointInfo>, AudioError> {
        let infos = self
            .enumerate()?
            .into_iter()
            .map(|(info, _)| info)
            .collect();
        Ok(apply_capture_filter(infos))
    }

    /// Resolve an endpoint handle by case-insensitive name fragment.
    ///
    /// Matching runs over the unfiltered endpoint set, first match in
    /// enumeration order. Any failure along the way resolves to `None`.
    pub fn resolve_by_substring(&self, substring: &str) -> Option<ResolvedEndpoint> {
        let mut endpoints = match self.enumerate() {
            Ok(endpoints) => endpoints,
            Err(err) => {
                debug!("endpoint enumeration failed during resolve: {err}");
                return None;
            }
        };

        let infos: Vec<EndpointInfo> = endpoints.iter().map(|(info, _)| info.clone()).collect();
        let index = position_by_substring(&infos, substring)?;
        let (info, device) = endpoints.swap_remove(index);

        match MuteControl::new(&device) {
            Ok(control) => Some(ResolvedEndpoint::new(info, control)),
            Err(err) => {
                debug!(endpoint = %info.name, "endpoint has no mute control: {err}");
                None
            }
        }
    }

    /// Enumerate all active endpoints with their friendly names.
    fn enumerate(&self) -> Result<Vec<(EndpointInfo, IMMDevice)>, AudioError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(AudioError::EnumerationFailed)?;

            let collection = enumerator
                .EnumAudioEndpoints(eAll, DEVICE_STATE_ACTIVE)
                .map_err(AudioError::EnumerationFailed)?;

            let count = collection
                .GetCount()
                .map_err(AudioError::EnumerationFailed)?;

            let mut endpoints = Vec::with_capacity(count as usize);

            for i in 0..count {
                let device = collection.Item(i).map_err(AudioError::EnumerationFailed)?;

                if let Ok(info) = self.describe(&device) {
                    endpoints.push((info, device));
                }
            }

            Ok(endpoints)
        }
    }

    /// Convert an IMMDevice into its id/name description.
    fn describe(&self, device: &IMMDevice) -> Result<EndpointInfo, AudioError> {
        unsafe {
            let id = device.GetId().map_err(AudioError::EnumerationFailed)?;
            let id_string = id
                .to_string()
                .map_err(|e| AudioError::StringConversion(e.to_string()))?;

            let props: IPropertyStore = device
                .OpenPropertyStore(STGM(0))
                .map_err(AudioError::EnumerationFailed)?;

            let name = friendly_name(&props).unwrap_or_else(|| "Unknown".to_string());

            Ok(EndpointInfo::new(id_string, name))
        }
    }
}

impl Default for EndpointDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointResolver for EndpointDirectory {
    fn resolve(&self, substring: &str) -> Option<Box<dyn MuteEndpoint>> {
        self.resolve_by_substring(substring)
            .map(|endpoint| Box::new(endpoint) as Box<dyn MuteEndpoint>)
    }
}

/// Get the friendly name of a device from its property store.
fn friendly_name(props: &IPropertyStore) -> Option<String> {
    unsafe {
        // Convert DEVPROPKEY to PROPERTYKEY
        let key = PROPERTYKEY {
            fmtid: DEVPKEY_Device_FriendlyName.fmtid,
            pid: DEVPKEY_Device_FriendlyName.pid,
        };

        let prop = match props.GetValue(&key) {
            Ok(p) => p,
            Err(_) => return None,
        };

        let s = prop.to_string();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

/// True if the friendly name marks this endpoint as capture-capable.
fn looks_like_capture(name: &str) -> bool {
    let lowered = name.to_lowercase();
    CAPTURE_NAME_TOKENS
        .iter()
        .any(|token| lowered.contains(token))
}

/// Keep heuristic matches, falling back to the full set when none match.
fn apply_capture_filter(all: Vec<EndpointInfo>) -> Vec<EndpointInfo> {
    let filtered: Vec<EndpointInfo> = all
        .iter()
        .filter(|info| looks_like_capture(&info.name))
        .cloned()
        .collect();

    if filtered.is_empty() {
        all
    } else {
        filtered
    }
}

/// First endpoint whose name contains the fragment, case-insensitively.
fn position_by_substring(endpoints: &[EndpointInfo], substring: &str) -> Option<usize> {
    if substring.is_empty() {
        return None;
    }
    let fragment = substring.to_lowercase();
    endpoints
        .iter()
        .position(|info| info.name.to_lowercase().contains(&fragment))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(names: &[&str]) -> Vec<EndpointInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| EndpointInfo::new(format!("{{id-{i}}}"), *name))
            .collect()
    }

    #[test]
    fn capture_heuristic_matches_known_tokens() {
        assert!(looks_like_capture("Razer Seiren Mic"));
        assert!(looks_like_capture("Microphone (USB Audio)"));
        assert!(looks_like_capture("Line In (Realtek Audio)"));
        assert!(!looks_like_capture("Speakers (Realtek Audio)"));
    }

    #[test]
    fn filter_keeps_only_capture_like_names() {
        let filtered = apply_capture_filter(endpoints(&[
            "Speakers (Realtek Audio)",
            "Razer Seiren Mic",
            "Line In (Realtek)",
        ]));

        let names: Vec<&str> = filtered.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Razer Seiren Mic", "Line In (Realtek)"]);
    }

    #[test]
    fn filter_falls_back_to_full_set_when_nothing_matches() {
        let all = endpoints(&["Speakers (Realtek Audio)", "Digital Output"]);
        let filtered = apply_capture_filter(all.clone());
        assert_eq!(filtered, all);
    }

    #[test]
    fn substring_match_is_case_insensitive_and_order_stable() {
        let all = endpoints(&["Razer Seiren Mic", "Line In (Realtek)"]);
        assert_eq!(position_by_substring(&all, "mic"), Some(0));
        assert_eq!(position_by_substring(&all, "REALTEK"), Some(1));
    }

    #[test]
    fn empty_or_unmatched_substring_resolves_to_none() {
        let all = endpoints(&["Razer Seiren Mic"]);
        assert_eq!(position_by_substring(&all, ""), None);
        assert_eq!(position_by_substring(&all, "webcam"), None);
    }
}

//! Mute synchronization gate.
//!
//! The stateful core tying hardware button events to the target endpoint's
//! mute flag. All mutable state lives in one struct behind a single lock;
//! the hardware event pump and the UI both go through the operations here
//! and never touch the fields directly.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::audio::{ComGuard, EndpointResolver, MuteEndpoint};

/// Bound on undrained hardware events. The report path uses `try_send`, so
/// a stalled consumer sheds events instead of blocking the OS dispatch
/// thread.
const EVENT_QUEUE_DEPTH: usize = 16;

/// Create the bounded channel carrying decoded mute events from the
/// listener to the gate's event pump.
pub fn event_channel() -> (SyncSender<bool>, Receiver<bool>) {
    sync_channel(EVENT_QUEUE_DEPTH)
}

struct GateState {
    enabled: bool,
    target_substring: String,
    cached: Option<Box<dyn MuteEndpoint>>,
    last_mute_before_disable: bool,
}

/// Decides whether and how hardware events reach the endpoint mute flag.
///
/// Invariant: while disabled the target endpoint is left unmuted and
/// `last_mute_before_disable` holds the value to restore on re-enable;
/// while enabled the endpoint mute flag is driven solely by hardware
/// events.
pub struct MuteSyncGate {
    resolver: Box<dyn EndpointResolver>,
    state: Mutex<GateState>,
}

impl MuteSyncGate {
    /// Create a gate with its initial state restored from preferences.
    pub fn new(
        resolver: Box<dyn EndpointResolver>,
        enabled: bool,
        target_substring: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            state: Mutex::new(GateState {
                enabled,
                target_substring: target_substring.into(),
                cached: None,
                last_mute_before_disable: false,
            }),
        }
    }

    /// Apply a decoded hardware mute event.
    ///
    /// Disabled gates ignore events entirely. Resolution failures drop the
    /// event; there is no retry queue, the next event resolves again.
    pub fn on_hardware_event(&self, muted: bool) {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        if !st.enabled {
            return;
        }

        Self::ensure_cached(self.resolver.as_ref(), st);
        let Some(endpoint) = st.cached.as_ref() else {
            trace!("no endpoint resolved; dropping hardware event");
            return;
        };

        if let Err(err) = endpoint.set_mute(muted) {
            warn!("mute write failed ({err}); invalidating cached endpoint");
            st.cached = None;
        }
    }

    /// Flip the listener-enabled switch.
    ///
    /// Disabling snapshots the endpoint's mute flag and forces it unmuted
    /// so the microphone can never end up stuck muted with the button
    /// inert; enabling restores the snapshot. Without a resolvable
    /// endpoint the flag still flips and the mute operations are skipped.
    pub fn set_enabled(&self, enabled: bool) {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        if st.enabled == enabled {
            return;
        }
        st.enabled = enabled;

        Self::ensure_cached(self.resolver.as_ref(), st);
        let Some(endpoint) = st.cached.as_ref() else {
            debug!("no endpoint resolved at transition; mute flag left as-is");
            return;
        };

        if enabled {
            if let Err(err) = endpoint.set_mute(st.last_mute_before_disable) {
                warn!("mute restore failed ({err}); invalidating cached endpoint");
                st.cached = None;
            }
        } else {
            match endpoint.is_muted() {
                Ok(current) => {
                    st.last_mute_before_disable = current;
                    if let Err(err) = endpoint.set_mute(false) {
                        warn!("forced unmute failed ({err}); invalidating cached endpoint");
                        st.cached = None;
                    }
                }
                Err(err) => {
                    warn!("mute snapshot failed ({err}); invalidating cached endpoint");
                    st.cached = None;
                }
            }
        }
    }

    /// Whether hardware events currently reach the endpoint.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Store a new target name fragment, dropping any cached endpoint so
    /// the next event resolves afresh.
    pub fn set_target_substring(&self, substring: &str) {
        let mut guard = self.state.lock();
        guard.cached = None;
        guard.target_substring = substring.to_string();
    }

    /// The current target name fragment.
    pub fn target_substring(&self) -> String {
        self.state.lock().target_substring.clone()
    }

    fn ensure_cached(resolver: &dyn EndpointResolver, st: &mut GateState) {
        if st.cached.is_none() {
            st.cached = resolver.resolve(&st.target_substring);
            if let Some(endpoint) = st.cached.as_ref() {
                debug!(endpoint = endpoint.name(), "resolved target endpoint");
            }
        }
    }
}

/// Spawn the single consumer draining hardware events into the gate.
///
/// The channel closing (every sender dropped) is the pump's cancellation
/// point, independent of how the HID layer shuts down.
pub fn spawn_event_pump(gate: Arc<MuteSyncGate>, events: Receiver<bool>) -> JoinHandle<()> {
    thread::spawn(move || {
        // Endpoint resolution and mute writes happen on this thread.
        let _com = match ComGuard::new() {
            Ok(guard) => Some(guard),
            Err(err) => {
                warn!("COM init failed on event pump thread: {err}");
                None
            }
        };

        for muted in events {
            gate.on_hardware_event(muted);
        }
        trace!("hardware event channel closed; pump exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MicState {
        muted: bool,
        set_calls: usize,
        stale: bool,
    }

    #[derive(Clone, Default)]
    struct FakeMic(Arc<Mutex<MicState>>);

    impl FakeMic {
        fn muted(&self) -> bool {
            self.0.lock().muted
        }

        fn set_calls(&self) -> usize {
            self.0.lock().set_calls
        }

        fn mark_stale(&self, stale: bool) {
            self.0.lock().stale = stale;
        }
    }

    struct FakeEndpoint {
        name: String,
        mic: FakeMic,
    }

    impl MuteEndpoint for FakeEndpoint {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_muted(&self) -> Result<bool, AudioError> {
            let st = self.mic.0.lock();
            if st.stale {
                return Err(AudioError::MuteControlUnavailable);
            }
            Ok(st.muted)
        }

        fn set_mute(&self, muted: bool) -> Result<(), AudioError> {
            let mut st = self.mic.0.lock();
            if st.stale {
                return Err(AudioError::MuteControlUnavailable);
            }
            st.set_calls += 1;
            st.muted = muted;
            Ok(())
        }
    }

    struct FakeResolver {
        name: &'static str,
        mic: FakeMic,
        resolutions: AtomicUsize,
    }

    impl FakeResolver {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                mic: FakeMic::default(),
                resolutions: AtomicUsize::new(0),
            })
        }

        fn resolutions(&self) -> usize {
            self.resolutions.load(Ordering::SeqCst)
        }
    }

    struct ResolverHandle(Arc<FakeResolver>);

    impl EndpointResolver for ResolverHandle {
        fn resolve(&self, substring: &str) -> Option<Box<dyn MuteEndpoint>> {
            self.0.resolutions.fetch_add(1, Ordering::SeqCst);
            if substring.is_empty()
                || !self
                    .0
                    .name
                    .to_lowercase()
                    .contains(&substring.to_lowercase())
            {
                return None;
            }
            Some(Box::new(FakeEndpoint {
                name: self.0.name.to_string(),
                mic: self.0.mic.clone(),
            }))
        }
    }

    fn gate_with(resolver: &Arc<FakeResolver>, enabled: bool, target: &str) -> MuteSyncGate {
        MuteSyncGate::new(Box::new(ResolverHandle(Arc::clone(resolver))), enabled, target)
    }

    #[test]
    fn disabled_gate_ignores_hardware_events() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, false, "mic");

        gate.on_hardware_event(true);
        gate.on_hardware_event(false);

        assert_eq!(resolver.mic.set_calls(), 0);
        assert_eq!(resolver.resolutions(), 0);
        assert!(!resolver.mic.muted());
    }

    #[test]
    fn enabled_gate_forwards_events_and_reuses_the_cached_endpoint() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.on_hardware_event(true);
        assert!(resolver.mic.muted());

        gate.on_hardware_event(false);
        assert!(!resolver.mic.muted());

        assert_eq!(resolver.resolutions(), 1);
    }

    #[test]
    fn disable_snapshots_then_forces_unmute_and_enable_restores() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.on_hardware_event(true);
        assert!(resolver.mic.muted());

        gate.set_enabled(false);
        assert!(!gate.is_enabled());
        assert!(!resolver.mic.muted());

        gate.set_enabled(true);
        assert!(gate.is_enabled());
        assert!(resolver.mic.muted());
    }

    #[test]
    fn restore_keeps_an_unmuted_snapshot_unmuted() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.on_hardware_event(false);
        gate.set_enabled(false);
        gate.set_enabled(true);

        assert!(!resolver.mic.muted());
    }

    #[test]
    fn events_with_no_target_configured_are_dropped_silently() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "");

        gate.on_hardware_event(true);

        assert_eq!(resolver.mic.set_calls(), 0);
        assert_eq!(resolver.resolutions(), 1);
        assert!(gate.is_enabled());
    }

    #[test]
    fn changing_the_target_substring_invalidates_the_cache() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.on_hardware_event(true);
        gate.on_hardware_event(false);
        assert_eq!(resolver.resolutions(), 1);

        gate.set_target_substring("razer");
        assert_eq!(gate.target_substring(), "razer");

        gate.on_hardware_event(true);
        assert_eq!(resolver.resolutions(), 2);
    }

    #[test]
    fn stale_endpoint_invalidates_cache_and_next_event_re_resolves() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.on_hardware_event(true);
        assert_eq!(resolver.resolutions(), 1);

        resolver.mic.mark_stale(true);
        gate.on_hardware_event(false);
        assert_eq!(resolver.resolutions(), 1);
        assert!(resolver.mic.muted());

        resolver.mic.mark_stale(false);
        gate.on_hardware_event(false);
        assert_eq!(resolver.resolutions(), 2);
        assert!(!resolver.mic.muted());
    }

    #[test]
    fn toggling_without_a_resolvable_endpoint_still_flips_the_flag() {
        let resolver = FakeResolver::new("Some Other Device");
        let gate = gate_with(&resolver, true, "mic");

        gate.set_enabled(false);
        assert!(!gate.is_enabled());

        gate.set_enabled(true);
        assert!(gate.is_enabled());

        assert_eq!(resolver.mic.set_calls(), 0);
    }

    #[test]
    fn same_value_transition_is_a_noop() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = gate_with(&resolver, true, "mic");

        gate.set_enabled(true);

        assert_eq!(resolver.resolutions(), 0);
        assert_eq!(resolver.mic.set_calls(), 0);
    }

    #[test]
    fn pump_drains_the_channel_and_exits_when_it_closes() {
        let resolver = FakeResolver::new("Razer Seiren Mic");
        let gate = Arc::new(gate_with(&resolver, true, "mic"));

        let (tx, rx) = event_channel();
        let pump = spawn_event_pump(Arc::clone(&gate), rx);

        tx.send(true).unwrap();
        drop(tx);
        pump.join().unwrap();

        assert!(resolver.mic.muted());
    }
}

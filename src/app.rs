//! Application state and lifecycle management.
//!
//! Ties the tray menu to the synchronization gate, the preferences store,
//! and the startup registration.

use std::sync::Arc;

use tracing::warn;

use crate::gate::MuteSyncGate;
use crate::hid::ButtonListener;
use crate::platform::{autostart, Preferences, PreferencesStore, APP_NAME};
use crate::ui::{TrayEvent, TrayManager};

/// Main application state.
pub struct App {
    /// Current user preferences, persisted after each mutation
    pub preferences: Preferences,

    /// Preferences persistence
    store: PreferencesStore,

    /// The synchronization gate shared with the hardware event pump
    gate: Arc<MuteSyncGate>,

    /// Hardware button listener
    pub listener: ButtonListener,

    /// System tray
    pub tray: TrayManager,

    /// Whether the application should exit
    pub should_exit: bool,
}

impl App {
    /// Create a new App from its wired-up parts.
    pub fn new(
        store: PreferencesStore,
        preferences: Preferences,
        gate: Arc<MuteSyncGate>,
        listener: ButtonListener,
        tray: TrayManager,
    ) -> Self {
        Self {
            preferences,
            store,
            gate,
            listener,
            tray,
            should_exit: false,
        }
    }

    /// Tooltip text for the tray icon.
    pub fn tooltip(preferences: &Preferences) -> String {
        if preferences.target_mic_substring.is_empty() {
            APP_NAME.to_string()
        } else {
            format!("{} - {}", APP_NAME, preferences.target_mic_substring)
        }
    }

    /// Handle a tray event.
    pub fn handle_tray_event(&mut self, event: TrayEvent) {
        match event {
            TrayEvent::ToggleListener => {
                let enabled = !self.gate.is_enabled();
                self.gate.set_enabled(enabled);
                self.preferences.listener_enabled = enabled;
                self.persist();

                if let Err(err) = self.tray.set_icon(enabled) {
                    warn!("tray icon update failed: {err}");
                }
                self.tray.set_listener_checked(enabled);
            }
            TrayEvent::ToggleAutostart => {
                let target = !autostart::is_enabled();
                if let Err(err) = autostart::set_enabled(target) {
                    warn!("autostart update failed: {err}");
                }

                // Re-query so the menu reflects what the registry actually holds.
                self.preferences.autostart_enabled = autostart::is_enabled();
                self.persist();
                self.tray
                    .set_autostart_checked(self.preferences.autostart_enabled);
            }
            TrayEvent::SelectDevice(name) => {
                self.gate.set_target_substring(&name);
                self.preferences.target_mic_substring = name;
                self.persist();

                self.tray
                    .set_device_checks(&self.preferences.target_mic_substring);
                let tooltip = Self::tooltip(&self.preferences);
                if let Err(err) = self.tray.set_tooltip(&tooltip) {
                    warn!("tray tooltip update failed: {err}");
                }
            }
            TrayEvent::Exit => {
                self.should_exit = true;
            }
        }
    }

    /// Stop the listener and remove the tray icon.
    pub fn shutdown(&mut self) {
        self.listener.stop();
        self.tray.destroy();
    }

    fn persist(&self) {
        if let Err(err) = self.store.save(&self.preferences) {
            warn!("failed to persist preferences: {err}");
        }
    }
}

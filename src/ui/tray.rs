//! System tray icon management.
//!
//! Manages the system tray icon, tooltip, and context menu.

use std::sync::mpsc::{channel, Receiver, Sender};
use thiserror::Error;
use tray_icon::{
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
    TrayIcon, TrayIconBuilder, TrayIconEvent,
};

use super::icons;

/// Initial state for the tray icon.
#[derive(Debug, Clone)]
pub struct TrayState {
    /// Whether hardware events currently drive the endpoint
    pub listener_enabled: bool,

    /// Whether the startup entry is registered
    pub autostart_enabled: bool,

    /// Friendly names for the device selection submenu
    pub devices: Vec<String>,

    /// Stored target name fragment, used for submenu checkmarks
    pub selected: String,

    /// Tooltip text
    pub tooltip: String,
}

/// Events from the system tray.
#[derive(Debug, Clone)]
pub enum TrayEvent {
    /// "Listener enabled" menu item toggled
    ToggleListener,

    /// "Start with Windows" menu item toggled
    ToggleAutostart,

    /// A device was picked from the selection submenu
    SelectDevice(String),

    /// "Exit" selected
    Exit,
}

/// Tray service error types.
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("Failed to create tray icon: {0}")]
    CreateFailed(String),

    #[error("Failed to load icon resource")]
    IconLoadFailed,

    #[error("Tray icon not initialized")]
    NotInitialized,

    #[error("Failed to create menu: {0}")]
    MenuFailed(String),
}

/// System tray manager.
pub struct TrayManager {
    tray_icon: Option<TrayIcon>,
    event_sender: Sender<TrayEvent>,
    event_receiver: Receiver<TrayEvent>,
    listener_item: Option<CheckMenuItem>,
    autostart_item: Option<CheckMenuItem>,
    listener_id: Option<MenuId>,
    autostart_id: Option<MenuId>,
    exit_id: Option<MenuId>,
    device_items: Vec<(MenuId, String, CheckMenuItem)>,
}

impl TrayManager {
    /// Create a new TrayManager.
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            tray_icon: None,
            event_sender: sender,
            event_receiver: receiver,
            listener_item: None,
            autostart_item: None,
            listener_id: None,
            autostart_id: None,
            exit_id: None,
            device_items: Vec::new(),
        }
    }

    /// Create and show the tray icon.
    pub fn create(&mut self, initial: TrayState) -> Result<(), TrayError> {
        let icon = icons::create_status_icon(initial.listener_enabled)
            .map_err(|_| TrayError::IconLoadFailed)?;

        let menu = Menu::new();

        let listener_item =
            CheckMenuItem::new("Listener enabled", true, initial.listener_enabled, None);
        self.listener_id = Some(listener_item.id().clone());
        self.listener_item = Some(listener_item.clone());
        menu.append(&listener_item)
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        let autostart_item =
            CheckMenuItem::new("Start with Windows", true, initial.autostart_enabled, None);
        self.autostart_id = Some(autostart_item.id().clone());
        self.autostart_item = Some(autostart_item.clone());
        menu.append(&autostart_item)
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        let device_menu = Submenu::new("Select microphone", true);
        if initial.devices.is_empty() {
            device_menu
                .append(&MenuItem::new("(No devices)", false, None))
                .map_err(|e| TrayError::MenuFailed(e.to_string()))?;
        } else {
            for name in &initial.devices {
                let checked = device_matches(name, &initial.selected);
                let item = CheckMenuItem::new(name, true, checked, None);
                device_menu
                    .append(&item)
                    .map_err(|e| TrayError::MenuFailed(e.to_string()))?;
                self.device_items.push((item.id().clone(), name.clone(), item));
            }
        }
        menu.append(&device_menu)
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        menu.append(&PredefinedMenuItem::separator())
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        let exit_item = MenuItem::new("Exit", true, None);
        self.exit_id = Some(exit_item.id().clone());
        menu.append(&exit_item)
            .map_err(|e| TrayError::MenuFailed(e.to_string()))?;

        let tray_icon = TrayIconBuilder::new()
            .with_icon(icon)
            .with_tooltip(&initial.tooltip)
            .with_menu(Box::new(menu))
            .build()
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;

        self.tray_icon = Some(tray_icon);

        Ok(())
    }

    /// Process tray events. Call this from the event loop.
    pub fn process_events(&self) {
        // Icon clicks carry no action here; drain them so the channel
        // doesn't grow.
        while TrayIconEvent::receiver().try_recv().is_ok() {}

        while let Ok(event) = MenuEvent::receiver().try_recv() {
            if Some(&event.id) == self.exit_id.as_ref() {
                let _ = self.event_sender.send(TrayEvent::Exit);
            } else if Some(&event.id) == self.listener_id.as_ref() {
                let _ = self.event_sender.send(TrayEvent::ToggleListener);
            } else if Some(&event.id) == self.autostart_id.as_ref() {
                let _ = self.event_sender.send(TrayEvent::ToggleAutostart);
            } else if let Some((_, name, _)) = self
                .device_items
                .iter()
                .find(|(id, _, _)| id == &event.id)
            {
                let _ = self.event_sender.send(TrayEvent::SelectDevice(name.clone()));
            }
        }
    }

    /// Take all pending tray events.
    pub fn drain_events(&self) -> Vec<TrayEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Update the tray icon for the listener state.
    pub fn set_icon(&mut self, listener_enabled: bool) -> Result<(), TrayError> {
        let icon =
            icons::create_status_icon(listener_enabled).map_err(|_| TrayError::IconLoadFailed)?;
        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_icon(Some(icon))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        Ok(())
    }

    /// Update the tooltip text.
    pub fn set_tooltip(&mut self, text: &str) -> Result<(), TrayError> {
        let tray = self.tray_icon.as_mut().ok_or(TrayError::NotInitialized)?;
        tray.set_tooltip(Some(text))
            .map_err(|e| TrayError::CreateFailed(e.to_string()))?;
        Ok(())
    }

    /// Update the "Listener enabled" checkmark.
    pub fn set_listener_checked(&mut self, checked: bool) {
        if let Some(ref item) = self.listener_item {
            item.set_checked(checked);
        }
    }

    /// Update the "Start with Windows" checkmark.
    pub fn set_autostart_checked(&mut self, checked: bool) {
        if let Some(ref item) = self.autostart_item {
            item.set_checked(checked);
        }
    }

    /// Re-derive the device submenu checkmarks from the stored fragment.
    pub fn set_device_checks(&mut self, selected: &str) {
        for (_, name, item) in &self.device_items {
            item.set_checked(device_matches(name, selected));
        }
    }

    /// Destroy the tray icon.
    pub fn destroy(&mut self) {
        self.tray_icon = None;
    }
}

impl Default for TrayManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Checkmark rule for the device submenu: the stored fragment selects a
/// device if the name contains it, case-insensitively.
fn device_matches(name: &str, selected: &str) -> bool {
    !selected.is_empty() && name.to_lowercase().contains(&selected.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_checkmark_matching_is_case_insensitive() {
        assert!(device_matches("Razer Seiren Mic", "seiren"));
        assert!(device_matches("Razer Seiren Mic", "MIC"));
        assert!(!device_matches("Razer Seiren Mic", "line in"));
    }

    #[test]
    fn empty_selection_checks_nothing() {
        assert!(!device_matches("Razer Seiren Mic", ""));
    }
}

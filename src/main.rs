#![windows_subsystem = "windows"]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use windows::Win32::UI::WindowsAndMessaging::{
    DispatchMessageW, PeekMessageW, TranslateMessage, MSG, PM_REMOVE,
};

use mutelink::app::App;
use mutelink::audio::{ComGuard, EndpointDirectory};
use mutelink::gate::{self, MuteSyncGate};
use mutelink::hid::ButtonListener;
use mutelink::platform::{autostart, PreferencesStore};
use mutelink::ui::{TrayManager, TrayState};

/// Event-loop cadence for tray events and Windows messages.
const TICK: Duration = Duration::from_millis(50);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let _com = ComGuard::new().context("COM initialization failed")?;

    let store = PreferencesStore::new().context("no usable preferences location")?;
    let preferences = store.load();

    let gate = Arc::new(MuteSyncGate::new(
        Box::new(EndpointDirectory::new()),
        preferences.listener_enabled,
        preferences.target_mic_substring.clone(),
    ));

    let (events, receiver) = gate::event_channel();
    let pump = gate::spawn_event_pump(Arc::clone(&gate), receiver);

    let listener = ButtonListener::new(events);
    listener.start();

    let directory = EndpointDirectory::new();
    let devices: Vec<String> = directory
        .list_capture_endpoints()
        .map(|endpoints| endpoints.into_iter().map(|e| e.name).collect())
        .unwrap_or_default();

    let mut tray = TrayManager::new();
    tray.create(TrayState {
        listener_enabled: preferences.listener_enabled,
        autostart_enabled: autostart::is_enabled(),
        devices,
        selected: preferences.target_mic_substring.clone(),
        tooltip: App::tooltip(&preferences),
    })
    .context("failed to create tray icon")?;

    info!(target_mic = %preferences.target_mic_substring, "mutelink started");

    let mut app = App::new(store, preferences, gate, listener, tray);

    while !app.should_exit {
        pump_messages();
        app.tray.process_events();
        for event in app.tray.drain_events() {
            app.handle_tray_event(event);
        }
        thread::sleep(TICK);
    }

    app.shutdown();
    // Dropping the app drops the listener and with it the last event
    // sender, which ends the pump.
    drop(app);
    let _ = pump.join();

    Ok(())
}

fn pump_messages() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

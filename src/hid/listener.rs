//! Hardware button listener over raw HID interfaces.
//!
//! Opens every HID interface of the target vendor in shared mode and runs
//! one blocking reader per interface. A physical device exposes several
//! interfaces and the one carrying button reports is not known in advance,
//! so all of them are opened and interfaces that refuse to open are
//! skipped. Decoded events go out through a bounded channel; the reader
//! never blocks on the consumer side.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};
use windows::core::{GUID, PCWSTR};
use windows::Win32::Devices::DeviceAndDriverInstallation::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInterfaces, SetupDiGetClassDevsW,
    SetupDiGetDeviceInterfaceDetailW, DIGCF_DEVICEINTERFACE, DIGCF_PRESENT, HDEVINFO,
    SP_DEVICE_INTERFACE_DATA, SP_DEVICE_INTERFACE_DETAIL_DATA_W,
};
use windows::Win32::Devices::HumanInterfaceDevice::{
    HidD_GetAttributes, HidD_GetHidGuid, HIDD_ATTRIBUTES,
};
use windows::Win32::Foundation::{CloseHandle, GENERIC_READ, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, ReadFile, FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::CancelIoEx;

use super::report::{ReportMapping, RAZER_VID};

/// How often the supervisor thread checks for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Largest input report we expect from any interface.
const REPORT_BUFFER_LEN: usize = 256;

/// An opened HID interface handle, shared between the supervisor, its
/// reader thread, and `stop()`.
#[derive(Clone, Copy)]
struct InterfaceHandle(HANDLE);

// HANDLE values are process-global tokens; closing from another thread is
// how readers blocked in ReadFile get released.
unsafe impl Send for InterfaceHandle {}
unsafe impl Sync for InterfaceHandle {}

/// Listens for hardware mute-button reports from the target vendor.
///
/// `start` and `stop` are idempotent. Absence of the device is not an
/// error: the listener runs with zero interfaces and simply never delivers
/// events; hot-plug is handled by tearing down and constructing a fresh
/// listener.
pub struct ButtonListener {
    vendor_id: u16,
    mapping: ReportMapping,
    events: SyncSender<bool>,
    running: Arc<AtomicBool>,
    handles: Arc<Mutex<Vec<InterfaceHandle>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ButtonListener {
    /// Create a listener for the default vendor and report mapping.
    pub fn new(events: SyncSender<bool>) -> Self {
        Self::with_mapping(events, RAZER_VID, ReportMapping::default())
    }

    /// Create a listener with an explicit vendor filter and report mapping.
    pub fn with_mapping(events: SyncSender<bool>, vendor_id: u16, mapping: ReportMapping) -> Self {
        Self {
            vendor_id,
            mapping,
            events,
            running: Arc::new(AtomicBool::new(false)),
            handles: Arc::new(Mutex::new(Vec::new())),
            supervisor: Mutex::new(None),
        }
    }

    /// Whether the background supervisor is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the background listener. No-op when already running.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let vendor_id = self.vendor_id;
        let mapping = self.mapping;
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        let handles = Arc::clone(&self.handles);

        let supervisor =
            thread::spawn(move || run_supervisor(vendor_id, mapping, events, running, handles));
        *self.supervisor.lock() = Some(supervisor);
    }

    /// Stop the listener and close every opened interface. No-op when not
    /// running.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        close_all(&self.handles);

        if let Some(supervisor) = self.supervisor.lock().take() {
            let _ = supervisor.join();
        }
    }
}

impl Drop for ButtonListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_supervisor(
    vendor_id: u16,
    mapping: ReportMapping,
    events: SyncSender<bool>,
    running: Arc<AtomicBool>,
    handles: Arc<Mutex<Vec<InterfaceHandle>>>,
) {
    let opened = match open_vendor_interfaces(vendor_id) {
        Ok(opened) => opened,
        Err(err) => {
            warn!("HID interface enumeration failed: {err}; listening with no interfaces");
            Vec::new()
        }
    };

    // Register under the lock so a racing stop() either sees these handles
    // or we see its stop flag and close them ourselves.
    let active = {
        let mut guard = handles.lock();
        if running.load(Ordering::SeqCst) {
            guard.extend(opened.iter().copied());
            opened
        } else {
            drop(guard);
            close_handles(opened);
            return;
        }
    };

    if active.is_empty() {
        debug!("no hardware interfaces opened; idling until stop");
    } else {
        info!(interfaces = active.len(), "hardware mute listener started");
    }

    for handle in &active {
        let handle = *handle;
        let events = events.clone();
        let running = Arc::clone(&running);
        thread::spawn(move || run_reader(handle, mapping, events, running));
    }

    // Nothing happens here; all work runs in the readers. The loop only
    // keeps the subsystem alive and responsive to a stop request.
    while running.load(Ordering::SeqCst) {
        thread::sleep(POLL_INTERVAL);
    }

    close_all(&handles);
}

fn run_reader(
    handle: InterfaceHandle,
    mapping: ReportMapping,
    events: SyncSender<bool>,
    running: Arc<AtomicBool>,
) {
    let mut report = [0u8; REPORT_BUFFER_LEN];

    while running.load(Ordering::SeqCst) {
        let mut read = 0u32;
        let result = unsafe { ReadFile(handle.0, Some(&mut report[..]), Some(&mut read), None) };
        if result.is_err() {
            // Handle closed by stop(), or the device went away.
            break;
        }

        if let Some(muted) = mapping.decode(&report[..read as usize]) {
            if events.try_send(muted).is_err() {
                trace!("mute event dropped; channel full or consumer gone");
            }
        }
    }
}

/// Enumerate all HID device interfaces and open the ones belonging to the
/// target vendor. Interfaces that fail to open are skipped individually.
fn open_vendor_interfaces(vendor_id: u16) -> windows::core::Result<Vec<InterfaceHandle>> {
    unsafe {
        let mut hid_guid = GUID::zeroed();
        HidD_GetHidGuid(&mut hid_guid);

        let devinfo = SetupDiGetClassDevsW(
            Some(&hid_guid),
            PCWSTR::null(),
            None,
            DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
        )?;

        let mut opened = Vec::new();
        let mut index = 0u32;

        loop {
            let mut iface = SP_DEVICE_INTERFACE_DATA {
                cbSize: std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
                ..Default::default()
            };

            if SetupDiEnumDeviceInterfaces(devinfo, None, &hid_guid, index, &mut iface).is_err() {
                break;
            }
            index += 1;

            match open_interface(devinfo, &iface, vendor_id) {
                Ok(Some(handle)) => opened.push(handle),
                Ok(None) => {}
                Err(err) => debug!("skipping HID interface: {err}"),
            }
        }

        let _ = SetupDiDestroyDeviceInfoList(devinfo);

        Ok(opened)
    }
}

/// Open a single interface in shared mode and keep it only when its vendor
/// matches.
unsafe fn open_interface(
    devinfo: HDEVINFO,
    iface: &SP_DEVICE_INTERFACE_DATA,
    vendor_id: u16,
) -> windows::core::Result<Option<InterfaceHandle>> {
    // First call reports the required detail size.
    let mut required = 0u32;
    let _ = SetupDiGetDeviceInterfaceDetailW(devinfo, iface, None, 0, Some(&mut required), None);
    if required == 0 {
        return Ok(None);
    }

    // u32 backing keeps the detail struct aligned.
    let mut buf = vec![0u32; (required as usize + 3) / 4];
    let detail = buf.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
    (*detail).cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;

    SetupDiGetDeviceInterfaceDetailW(devinfo, iface, Some(detail), required, None, None)?;

    let path = PCWSTR((*detail).DevicePath.as_ptr());
    let handle = CreateFileW(
        path,
        GENERIC_READ.0,
        FILE_SHARE_READ | FILE_SHARE_WRITE,
        None,
        OPEN_EXISTING,
        FILE_ATTRIBUTE_NORMAL,
        None,
    )?;

    let mut attrs = HIDD_ATTRIBUTES {
        Size: std::mem::size_of::<HIDD_ATTRIBUTES>() as u32,
        ..Default::default()
    };

    if !HidD_GetAttributes(handle, &mut attrs).as_bool() || attrs.VendorID != vendor_id {
        let _ = CloseHandle(handle);
        return Ok(None);
    }

    Ok(Some(InterfaceHandle(handle)))
}

/// Drain and close every registered interface handle, exactly once.
fn close_all(shared: &Mutex<Vec<InterfaceHandle>>) {
    let drained: Vec<InterfaceHandle> = shared.lock().drain(..).collect();
    close_handles(drained);
}

/// Best-effort close; failures are logged and swallowed since the
/// subsystem is shutting down regardless.
fn close_handles(handles: Vec<InterfaceHandle>) {
    for handle in handles {
        unsafe {
            if let Err(err) = CancelIoEx(handle.0, None) {
                trace!("cancel of in-flight read failed: {err}");
            }
            if let Err(err) = CloseHandle(handle.0) {
                debug!("interface close failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn stop_before_start_is_a_noop() {
        let (tx, _rx) = mpsc::sync_channel(4);
        let listener = ButtonListener::new(tx);
        listener.stop();
        assert!(!listener.is_running());
    }

    #[test]
    fn start_twice_keeps_a_single_supervisor() {
        let (tx, _rx) = mpsc::sync_channel(4);
        let listener = ButtonListener::new(tx);

        listener.start();
        listener.start();
        assert!(listener.is_running());

        listener.stop();
        assert!(!listener.is_running());
        assert!(listener.supervisor.lock().is_none());
    }

    #[test]
    fn restart_after_stop_spawns_a_fresh_supervisor() {
        let (tx, _rx) = mpsc::sync_channel(4);
        let listener = ButtonListener::new(tx);

        listener.start();
        listener.stop();
        listener.start();
        assert!(listener.is_running());
        listener.stop();
    }
}

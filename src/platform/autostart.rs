//! Start-at-login registration.
//!
//! Manages a single entry in the per-user Run key whose value is the
//! command line relaunching the application. Presence of the entry is the
//! only state queried.

use thiserror::Error;
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{
    RegCloseKey, RegDeleteValueW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, KEY_READ, KEY_WRITE, REG_SZ,
};

use super::config::APP_NAME;

const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

/// Autostart registration error types.
#[derive(Debug, Error)]
pub enum AutostartError {
    #[error("failed to open the Run registry key")]
    RunKeyUnavailable,

    #[error("failed to update the startup entry")]
    WriteFailed,

    #[error("failed to determine the executable path: {0}")]
    ExePath(#[source] std::io::Error),
}

fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Check whether the startup entry is present.
pub fn is_enabled() -> bool {
    unsafe {
        let key_path = to_wide(RUN_KEY);
        let value_name = to_wide(APP_NAME);

        let mut hkey = HKEY::default();
        let result = RegOpenKeyExW(
            HKEY_CURRENT_USER,
            PCWSTR::from_raw(key_path.as_ptr()),
            0,
            KEY_READ,
            &mut hkey,
        );

        if result.is_err() {
            return false;
        }

        let mut data_size = 0u32;
        let result = RegQueryValueExW(
            hkey,
            PCWSTR::from_raw(value_name.as_ptr()),
            None,
            None,
            None,
            Some(&mut data_size),
        );

        let _ = RegCloseKey(hkey);

        result.is_ok() && data_size > 0
    }
}

/// Add or remove the startup entry.
pub fn set_enabled(enabled: bool) -> Result<(), AutostartError> {
    unsafe {
        let key_path = to_wide(RUN_KEY);
        let value_name = to_wide(APP_NAME);

        let mut hkey = HKEY::default();
        let result = RegOpenKeyExW(
            HKEY_CURRENT_USER,
            PCWSTR::from_raw(key_path.as_ptr()),
            0,
            KEY_WRITE,
            &mut hkey,
        );

        if result.is_err() {
            return Err(AutostartError::RunKeyUnavailable);
        }

        let result = if enabled {
            let exe_path = std::env::current_exe().map_err(AutostartError::ExePath)?;
            let exe_path_wide = to_wide(&exe_path.to_string_lossy());

            RegSetValueExW(
                hkey,
                PCWSTR::from_raw(value_name.as_ptr()),
                0,
                REG_SZ,
                Some(std::slice::from_raw_parts(
                    exe_path_wide.as_ptr() as *const u8,
                    exe_path_wide.len() * 2,
                )),
            )
        } else {
            // Deleting an absent value is fine; the entry is gone either way.
            RegDeleteValueW(hkey, PCWSTR::from_raw(value_name.as_ptr()))
        };

        let _ = RegCloseKey(hkey);

        if result.is_err() && enabled {
            Err(AutostartError::WriteFailed)
        } else {
            Ok(())
        }
    }
}

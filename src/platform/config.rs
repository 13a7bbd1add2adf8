//! JSON preferences persistence.
//!
//! A small key-value record under the user's config directory. Missing
//! keys fall back to defaults, unknown keys are ignored, and the record is
//! rewritten in full on every mutation.

use std::fs;
use std::path::{Path, PathBuf};

use dirs::config_dir;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Display name, also used for the registry startup entry.
pub const APP_NAME: &str = "MuteLink";

const CONFIG_DIR: &str = "mutelink";
const CONFIG_FILE: &str = "config.json";

/// User preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Name fragment selecting the target capture endpoint
    #[serde(default)]
    pub target_mic_substring: String,

    /// Start application at login
    #[serde(default)]
    pub autostart_enabled: bool,

    /// Whether hardware events drive the endpoint mute flag
    #[serde(default = "default_listener_enabled")]
    pub listener_enabled: bool,
}

fn default_listener_enabled() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            target_mic_substring: String::new(),
            autostart_enabled: false,
            listener_enabled: true,
        }
    }
}

/// Preferences persistence error types.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("no user configuration directory available")]
    NoConfigDir,

    #[error("failed to write preferences at {path:?}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize preferences: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Manages loading and saving the preferences file.
pub struct PreferencesStore {
    config_path: PathBuf,
}

impl PreferencesStore {
    /// Create a store at the default configuration path.
    pub fn new() -> Result<Self, PreferencesError> {
        let base = config_dir().ok_or(PreferencesError::NoConfigDir)?;
        Ok(Self {
            config_path: base.join(CONFIG_DIR).join(CONFIG_FILE),
        })
    }

    /// Create a store rooted at a specific directory.
    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            config_path: dir.as_ref().join(CONFIG_FILE),
        }
    }

    /// Returns the path to the preferences file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load preferences, falling back to defaults on a missing, unreadable,
    /// or malformed file.
    pub fn load(&self) -> Preferences {
        match fs::read_to_string(&self.config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(preferences) => preferences,
                Err(err) => {
                    warn!("preferences file is malformed ({err}); using defaults");
                    Preferences::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(err) => {
                warn!("failed to read preferences ({err}); using defaults");
                Preferences::default()
            }
        }
    }

    /// Save preferences, rewriting the file in full.
    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        if let Some(dir) = self.config_path.parent() {
            fs::create_dir_all(dir).map_err(|source| PreferencesError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let serialized = serde_json::to_string_pretty(preferences)?;

        fs::write(&self.config_path, serialized).map_err(|source| PreferencesError::Write {
            path: self.config_path.clone(),
            source,
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_first_run_record() {
        let preferences = Preferences::default();
        assert_eq!(preferences.target_mic_substring, "");
        assert!(!preferences.autostart_enabled);
        assert!(preferences.listener_enabled);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::with_config_dir(dir.path());
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let preferences: Preferences =
            serde_json::from_str(r#"{ "target_mic_substring": "seiren" }"#).unwrap();
        assert_eq!(preferences.target_mic_substring, "seiren");
        assert!(!preferences.autostart_enabled);
        assert!(preferences.listener_enabled);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let preferences: Preferences = serde_json::from_str(
            r#"{ "listener_enabled": false, "legacy_led_color": "green" }"#,
        )
        .unwrap();
        assert!(!preferences.listener_enabled);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::with_config_dir(dir.path());

        let preferences = Preferences {
            target_mic_substring: "seiren".to_string(),
            autostart_enabled: true,
            listener_enabled: false,
        };

        store.save(&preferences).unwrap();
        assert_eq!(store.load(), preferences);
    }

    #[test]
    fn malformed_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = PreferencesStore::with_config_dir(dir.path());
        std::fs::write(store.config_path(), "{ not json").unwrap();
        assert_eq!(store.load(), Preferences::default());
    }
}

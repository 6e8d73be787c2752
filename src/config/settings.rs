//! Settings store backed by a pretty-printed JSON file
//!
//! Known keys are typed fields on [`Preferences`]; anything else found in the
//! file is carried along in `extra` so newer or older versions never lose data.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::constants::config::{APP_DIR, FILENAME};

/// Key of the "minimize to tray on close" option
pub const MINIMIZE_TO_TRAY: &str = "minimize_to_tray";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    /// Closing the control panel hides it to the tray instead of quitting
    #[serde(default = "default_minimize_to_tray")]
    pub minimize_to_tray: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_minimize_to_tray() -> bool {
    true
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            minimize_to_tray: default_minimize_to_tray(),
            extra: Map::new(),
        }
    }
}

/// Build preferences from a stored map. A known key holding a value of the
/// wrong type falls back to its default alone; every other key is kept.
fn merge_with_defaults(mut map: Map<String, Value>) -> Preferences {
    let known: Vec<String> = match serde_json::to_value(Preferences::default()) {
        Ok(Value::Object(defaults)) => defaults.into_iter().map(|(key, _)| key).collect(),
        _ => Vec::new(),
    };
    for key in known {
        let Some(value) = map.get(&key) else {
            continue;
        };
        let single = Map::from_iter([(key.clone(), value.clone())]);
        if let Err(e) = serde_json::from_value::<Preferences>(Value::Object(single)) {
            warn!(key = %key, value = %value, error = %e, "Invalid stored setting, using its default");
            map.remove(&key);
        }
    }

    serde_json::from_value(Value::Object(map)).unwrap_or_else(|e| {
        error!(error = %e, "Failed to merge settings with defaults");
        Preferences::default()
    })
}

#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    prefs: Preferences,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(APP_DIR);
        path.push(FILENAME);
        path
    }

    /// Load from the per-user config directory
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load from `path`, falling back to defaults when the file is missing or
    /// unreadable. Never fails: a broken file is logged and left untouched
    /// until the next write.
    pub fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(map) => {
                    info!(path = %path.display(), "Loaded settings");
                    merge_with_defaults(map)
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to parse settings file, using defaults");
                    Preferences::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file yet, using defaults");
                Preferences::default()
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read settings file, using defaults");
                Preferences::default()
            }
        };
        Self { path, prefs }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn minimize_to_tray(&self) -> bool {
        self.prefs.minimize_to_tray
    }

    /// Look up any key, known or not
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.as_map() {
            Ok(mut map) => map.remove(key),
            Err(e) => {
                error!(error = ?e, "Failed to read settings as a map");
                None
            }
        }
    }

    /// Change a key and write the file immediately.
    /// A value of the wrong type for a known key is rejected and logged.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let updated = self.as_map().and_then(|mut map| {
            map.insert(key.to_string(), value.clone());
            serde_json::from_value::<Preferences>(Value::Object(map))
                .with_context(|| format!("Invalid value {value} for setting '{key}'"))
        });

        match updated {
            Ok(prefs) => {
                let previous = self.get(key);
                self.prefs = prefs;
                debug!(key = %key, ?previous, value = %value, "Setting changed");
                if let Err(e) = self.save() {
                    error!(error = ?e, "Failed to save settings");
                }
            }
            Err(e) => warn!(error = ?e, "Ignoring settings change"),
        }
    }

    pub fn set_minimize_to_tray(&mut self, enabled: bool) {
        self.set(MINIMIZE_TO_TRAY, enabled);
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(&self.prefs)
            .context("Failed to serialize settings to JSON")?;
        fs::write(&self.path, contents)
            .context(format!("Failed to write settings file to {}", self.path.display()))?;
        Ok(())
    }

    fn as_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(&self.prefs).context("Failed to serialize settings")? {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("Settings serialized to a non-object value: {other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("nested").join(FILENAME)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(settings_path(&dir));
        assert!(settings.minimize_to_tray());
        assert_eq!(settings.get(MINIMIZE_TO_TRAY), Some(json!(true)));
        // Loading alone never creates the file
        assert!(!settings_path(&dir).exists());
    }

    #[test]
    fn test_set_then_fresh_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = settings_path(&dir);

        let mut settings = Settings::load_from(&path);
        settings.set(MINIMIZE_TO_TRAY, false);

        let reloaded = Settings::load_from(&path);
        assert!(!reloaded.minimize_to_tray());
    }

    #[test]
    fn test_unknown_keys_survive_set_on_other_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, r#"{"minimize_to_tray": true, "future_option": {"level": 3}}"#).unwrap();

        let mut settings = Settings::load_from(&path);
        settings.set_minimize_to_tray(false);

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["future_option"], json!({"level": 3}));
        assert_eq!(written[MINIMIZE_TO_TRAY], json!(false));
    }

    #[test]
    fn test_bad_known_value_keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, r#"{"minimize_to_tray": "yes", "future_option": 7}"#).unwrap();

        let mut settings = Settings::load_from(&path);
        assert!(settings.minimize_to_tray());
        settings.set("theme", "dark");

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["future_option"], json!(7));
        assert_eq!(written["theme"], json!("dark"));
        assert_eq!(written[MINIMIZE_TO_TRAY], json!(true));
    }

    #[test]
    fn test_non_object_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, "[1, 2]").unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.minimize_to_tray());
        assert_eq!(settings.get("0"), None);
    }

    #[test]
    fn test_missing_keys_merge_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, r#"{"other": 1}"#).unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.minimize_to_tray());
        assert_eq!(settings.get("other"), Some(json!(1)));
    }

    #[test]
    fn test_corrupt_file_falls_back_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);
        fs::write(&path, "{ not json").unwrap();

        let settings = Settings::load_from(&path);
        assert!(settings.minimize_to_tray());
        assert_eq!(settings.get("other"), None);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_wrong_type_for_known_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);

        let mut settings = Settings::load_from(&path);
        settings.set(MINIMIZE_TO_TRAY, "sometimes");

        assert!(settings.minimize_to_tray());
        assert!(!path.exists());
    }

    #[test]
    fn test_file_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILENAME);

        let mut settings = Settings::load_from(&path);
        settings.set("theme", "dark");

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains('\n'));
        assert!(contents.contains("\"theme\": \"dark\""));
    }
}

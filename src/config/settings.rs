//! Persisted input settings
//!
//! JSON file holding the registry size and every device's binds that differ
//! from the driver defaults. Applying it runs a [`ConfigBinder`] session, so
//! keys the file doesn't list keep their defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::binder::ConfigBinder;
use crate::constants;
use crate::registry::DeviceRegistry;

/// Binds of one device, keyed by key token (driver key name or `\xNN`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBindings {
    pub device: String,
    #[serde(default)]
    pub keys: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_max_devices")]
    pub max_devices: usize,
    #[serde(default)]
    pub bindings: Vec<DeviceBindings>,
}

fn default_max_devices() -> usize {
    constants::registry::MAX_DEVICES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_devices: default_max_devices(),
            bindings: Vec::new(),
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(constants::config::APP_DIR);
        path.push(constants::config::FILENAME);
        path
    }

    /// Load settings, falling back to defaults when the file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {:?}", path))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse settings in {:?}", path))?;

        info!(path = %path.display(), devices = settings.bindings.len(), "Loaded settings");
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json).with_context(|| format!("Failed to write settings to {:?}", path))?;

        info!(path = %path.display(), "Saved settings");
        Ok(())
    }

    /// Apply the stored binds to the registry.
    ///
    /// Bad device names and key tokens are skipped; the rest still applies.
    /// Returns the number of binds applied.
    pub fn apply(&self, registry: &mut DeviceRegistry) -> usize {
        let mut session = ConfigBinder::start(registry);
        let mut applied = 0;

        for entry in &self.bindings {
            let id = match session.resolve_device(&entry.device) {
                Ok(id) => id,
                Err(e) => {
                    warn!(device = %entry.device, error = %e, "Skipping device");
                    continue;
                }
            };

            for (token, &mask) in &entry.keys {
                match session.bind_key(id, token, mask) {
                    Ok(()) => applied += 1,
                    Err(e) => warn!(device = %entry.device, key = %token, error = %e, "Skipping bind"),
                }
            }
        }

        session.end();
        applied
    }

    /// Snapshot the registry's binds that differ from their defaults
    pub fn capture(&mut self, registry: &DeviceRegistry) {
        self.bindings = registry
            .devices()
            .filter_map(|(id, device)| {
                let binds = device.binds()?;
                let keys: BTreeMap<String, u32> = binds
                    .current()
                    .iter()
                    .zip(binds.defaults())
                    .enumerate()
                    .filter(|(_, (cur, def))| cur != def)
                    .map(|(code, (&cur, _))| (registry.key_name(id, code as u32), cur))
                    .collect();

                (!keys.is_empty()).then(|| DeviceBindings {
                    device: device.name().to_string(),
                    keys,
                })
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::driver::{DriverHandle, DriverId};
    use crate::input::driver_table::DriverTable;
    use crate::input::mock::{MockControl, MockDriver};

    fn registry() -> (DeviceRegistry, MockControl) {
        let (driver, state) = MockDriver::new();
        state.borrow_mut().key_names.insert("KEY_UP".to_string(), 3);
        let mut drivers = DriverTable::new();
        drivers.install(DriverId::EVDEV, Box::new(driver)).unwrap();
        (DeviceRegistry::new(drivers, 4), state)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("input.json");

        let mut settings = Settings::default();
        settings.bindings.push(DeviceBindings {
            device: "mock:Pad".to_string(),
            keys: BTreeMap::from([("KEY_UP".to_string(), 4), ("\\x01".to_string(), 0)]),
        });
        settings.save_to(&path).unwrap();

        assert_eq!(Settings::load_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"bindings":[{"device":"mock:A"}]}"#).unwrap();
        assert_eq!(settings.max_devices, 8);
        assert!(settings.bindings[0].keys.is_empty());
    }

    #[test]
    fn test_capture_then_apply_restores_binds() {
        let (mut registry, _) = registry();
        let id = registry.register("mock:Pad", DriverId::EVDEV, DriverHandle(1)).unwrap();
        registry.bind_key(id, 3, 0b100, false).unwrap();
        registry.bind_key(id, 1, 0b01, true).unwrap();
        registry.bind_key(id, 6, 0b1, false).unwrap();

        let mut settings = Settings::default();
        settings.capture(&registry);
        assert_eq!(
            settings.bindings[0].keys,
            BTreeMap::from([
                ("KEY_UP".to_string(), 0b100),
                ("\\x01".to_string(), 0),
                ("\\x06".to_string(), 0b1),
            ])
        );
        let expected = registry.binds(id).unwrap().to_vec();

        // a fresh registry gets the same binds back from the file contents
        let (mut fresh, _) = self::registry();
        let id = fresh.register("mock:Pad", DriverId::EVDEV, DriverHandle(2)).unwrap();
        assert_eq!(settings.apply(&mut fresh), 3);
        assert_eq!(fresh.binds(id).unwrap(), expected.as_slice());
    }

    #[test]
    fn test_apply_skips_bad_entries() {
        let (mut registry, _) = registry();
        let settings = Settings {
            max_devices: 4,
            bindings: vec![
                DeviceBindings {
                    device: "sdl:Pad".to_string(),
                    keys: BTreeMap::from([("\\x01".to_string(), 1)]),
                },
                DeviceBindings {
                    device: "mock:Pad".to_string(),
                    keys: BTreeMap::from([("KEY_NOPE".to_string(), 1), ("\\x02".to_string(), 8)]),
                },
            ],
        };

        assert_eq!(settings.apply(&mut registry), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.binds(0).unwrap()[2], 8);
    }
}

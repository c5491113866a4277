//! Input device detection for keyboards, mice and gamepads
//!
//! Scans /dev/input for event nodes the evdev backend can bind keys on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evdev::{Device, KeyCode};
use tracing::{debug, info};

use crate::constants::{input, paths, permissions};

/// Scans the system for devices reporting keys, returning them with their paths
pub fn find_key_devices() -> Result<Vec<(Device, PathBuf)>> {
    info!(path = %paths::DEV_INPUT, "Scanning for input devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        paths::DEV_INPUT,
        permissions::INPUT_GROUP
    ))? {
        let path = entry?.path();
        if !is_event_node(&path) {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                if let Some(device_type) = classify_input_device(&device) {
                    info!(
                        device_path = %path.display(),
                        name = ?device.name(),
                        device_type = device_type,
                        "Found input device"
                    );
                    devices.push((device, path));
                }
            }
            Err(e) => debug!(device_path = %path.display(), error = %e, "Can't open input node"),
        }
    }

    // readdir order isn't stable, keep probe order predictable
    devices.sort_by(|a, b| a.1.cmp(&b.1));

    Ok(devices)
}

/// `/dev/input/eventN` style paths
pub fn is_event_node(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(paths::EVENT_NODE_PREFIX))
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

/// Classify an input device as keyboard, mouse, or gamepad.
/// Returns None if it reports no keys we care about.
fn classify_input_device(device: &Device) -> Option<&'static str> {
    let keys = device.supported_keys()?;

    let is_keyboard = keys.contains(KeyCode(input::KEY_TAB));
    let is_gamepad = keys.contains(KeyCode(input::BTN_SOUTH));
    let is_mouse = keys.contains(KeyCode(input::BTN_LEFT));

    match (is_keyboard, is_gamepad, is_mouse) {
        (true, _, true) => Some("keyboard+mouse"),
        (true, _, false) => Some("keyboard"),
        (false, true, _) => Some("gamepad"),
        (false, false, true) => Some("mouse"),
        (false, false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_event_node() {
        assert!(is_event_node(Path::new("/dev/input/event0")));
        assert!(is_event_node(Path::new("/dev/input/event17")));
        assert!(!is_event_node(Path::new("/dev/input/event")));
        assert!(!is_event_node(Path::new("/dev/input/mouse0")));
        assert!(!is_event_node(Path::new("/dev/input/by-id")));
        assert!(!is_event_node(Path::new("/dev/input/eventX")));
    }
}

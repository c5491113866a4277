//! Input driver abstraction layer
//!
//! Every hardware backend implements [`InputDriver`]. The registry only ever
//! talks to a backend through this trait, selected by [`DriverId`].

use std::fmt;

use anyhow::Result;

use crate::constants::drivers;
use crate::reader::MenuKeys;

/// Selects which driver handles a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DriverId(pub usize);

impl DriverId {
    /// Default no-op driver, never matches real hardware
    pub const NONE: DriverId = DriverId(0);

    /// Linux evdev backend
    pub const EVDEV: DriverId = DriverId(1);

    /// Collapse out-of-range ids onto the default slot
    pub fn clamped(self) -> DriverId {
        if self.0 < drivers::DRIVER_COUNT {
            self
        } else {
            DriverId::NONE
        }
    }

    /// All backend ids in probe order, default slot excluded
    pub fn backends() -> impl Iterator<Item = DriverId> {
        (1..drivers::DRIVER_COUNT).map(DriverId)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token a driver hands out for one opened device.
/// The driver owns whatever sits behind it; the registry only stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverHandle(pub u64);

/// A device found during a probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedDevice {
    pub name: String,
    pub handle: DriverHandle,
}

impl ProbedDevice {
    pub fn new(name: impl Into<String>, handle: DriverHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

/// Key event as reported by a driver's blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawKeyEvent {
    /// Position of the originating handle in the slice passed to `read_keycode`
    pub source: usize,
    pub code: u32,
    pub is_down: bool,
}

/// Capability set of one backend type
pub trait InputDriver {
    /// Config-name prefix used to route persisted device names to this driver
    fn prefix(&self) -> &str;

    /// Scan hardware and report every device found
    fn probe(&mut self) -> Vec<ProbedDevice>;

    /// Release backend-owned resources for a handle
    fn free(&mut self, handle: DriverHandle);

    /// Number of bindable actions, `<= 0` on failure
    fn bind_count(&self) -> i32;

    /// Fill the factory-default bind mask per action
    fn default_binds(&self, binds: &mut [u32]);

    /// Validate/normalize binds for a device.
    /// Returns whether any bind remains set.
    fn clean_binds(&self, handle: Option<DriverHandle>, binds: &mut [u32]) -> bool;

    /// Switch the backend's read mode for one device
    fn set_blocking(&mut self, handle: DriverHandle, is_blocking: bool);

    /// Map a raw code to canonical menu actions
    fn menu_translate(&self, code: u32) -> MenuKeys;

    /// Symbolic key name to numeric code
    fn key_code(&self, name: &str) -> Option<u32>;

    /// Numeric code to display name
    fn key_name(&self, code: u32) -> Option<String>;

    /// Whether this backend implements `read_keycode`
    fn delivers_events(&self) -> bool {
        false
    }

    /// Block until one of `handles` reports a key event or the timeout elapses.
    /// A timeout of 0 waits indefinitely.
    ///
    /// `Ok(None)` is a timeout. An error means none of `handles` can deliver
    /// events any more, so waiting again would return straight away.
    fn read_keycode(
        &mut self,
        _handles: &[DriverHandle],
        _timeout_ms: u32,
    ) -> Result<Option<RawKeyEvent>> {
        Ok(None)
    }

    /// Current action mask of a device, from its live key state
    fn update(&mut self, _handle: DriverHandle, _binds: &[u32]) -> u32 {
        0
    }
}

/// Answers for every driver slot without a real backend
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDriver;

impl InputDriver for NullDriver {
    fn prefix(&self) -> &str {
        drivers::NONE_PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        Vec::new()
    }

    fn free(&mut self, _handle: DriverHandle) {}

    fn bind_count(&self) -> i32 {
        0
    }

    fn default_binds(&self, _binds: &mut [u32]) {}

    fn clean_binds(&self, _handle: Option<DriverHandle>, _binds: &mut [u32]) -> bool {
        false
    }

    fn set_blocking(&mut self, _handle: DriverHandle, _is_blocking: bool) {}

    fn menu_translate(&self, code: u32) -> MenuKeys {
        MenuKeys::from_bits_retain(code)
    }

    fn key_code(&self, _name: &str) -> Option<u32> {
        None
    }

    fn key_name(&self, _code: u32) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_id_clamped() {
        assert_eq!(DriverId(0).clamped(), DriverId::NONE);
        assert_eq!(DriverId(1).clamped(), DriverId::EVDEV);
        assert_eq!(DriverId(7).clamped(), DriverId::NONE);
        assert_eq!(DriverId(usize::MAX).clamped(), DriverId::NONE);
    }

    #[test]
    fn test_backends_skip_default() {
        let ids: Vec<_> = DriverId::backends().collect();
        assert_eq!(ids, vec![DriverId::EVDEV]);
    }

    #[test]
    fn test_null_driver_translate_is_identity() {
        let driver = NullDriver;
        assert_eq!(driver.menu_translate(0).bits(), 0);
        assert_eq!(driver.menu_translate(0x41).bits(), 0x41);
        assert!(driver.key_name(30).is_none());
        assert!(driver.key_code("KEY_A").is_none());
        assert_eq!(driver.bind_count(), 0);
    }
}

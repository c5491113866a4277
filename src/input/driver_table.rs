//! Fixed table of driver capability objects, indexed by [`DriverId`]

use anyhow::{Result, bail};
use tracing::info;

use crate::constants::drivers::DRIVER_COUNT;
use crate::input::driver::{DriverId, InputDriver, NullDriver};

/// One slot per backend type known at build time.
///
/// Empty slots and out-of-range ids are answered by the default driver, so
/// every lookup is always callable.
pub struct DriverTable {
    slots: Vec<Option<Box<dyn InputDriver>>>,
    fallback: NullDriver,
}

impl DriverTable {
    /// Table where every id resolves to the default driver
    pub fn new() -> Self {
        Self {
            slots: (0..DRIVER_COUNT).map(|_| None).collect(),
            fallback: NullDriver,
        }
    }

    /// Table with every backend this build supports installed
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut table = Self::new();
        #[cfg(unix)]
        {
            table.slots[DriverId::EVDEV.0] =
                Some(Box::new(crate::input::evdev_driver::EvdevDriver::new()));
        }
        table
    }

    /// Put a backend into its slot, replacing whatever was there
    pub fn install(&mut self, id: DriverId, driver: Box<dyn InputDriver>) -> Result<()> {
        if id == DriverId::NONE || id.0 >= DRIVER_COUNT {
            bail!("Driver id {} is not a backend slot", id);
        }
        info!(driver = %id, prefix = driver.prefix(), "Installed input driver");
        self.slots[id.0] = Some(driver);
        Ok(())
    }

    pub fn get(&self, id: DriverId) -> &dyn InputDriver {
        match self.slots.get(id.clamped().0) {
            Some(Some(driver)) => &**driver,
            _ => &self.fallback,
        }
    }

    pub fn get_mut(&mut self, id: DriverId) -> &mut dyn InputDriver {
        match self.slots.get_mut(id.clamped().0) {
            Some(Some(driver)) => &mut **driver,
            _ => &mut self.fallback,
        }
    }

    /// First driver, in id order, whose prefix starts `name`
    pub fn resolve_prefix(&self, name: &str) -> Option<DriverId> {
        (0..DRIVER_COUNT)
            .map(DriverId)
            .find(|&id| name.starts_with(self.get(id).prefix()))
    }
}

impl Default for DriverTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mock::MockDriver;

    #[test]
    fn test_empty_table_falls_back() {
        let table = DriverTable::new();
        assert_eq!(table.get(DriverId::EVDEV).prefix(), "none:");
        assert_eq!(table.get(DriverId(42)).bind_count(), 0);
    }

    #[test]
    fn test_install_rejects_default_and_out_of_range() {
        let mut table = DriverTable::new();
        assert!(table.install(DriverId::NONE, Box::new(MockDriver::new().0)).is_err());
        assert!(table.install(DriverId(9), Box::new(MockDriver::new().0)).is_err());
        assert!(table.install(DriverId::EVDEV, Box::new(MockDriver::new().0)).is_ok());
        assert_eq!(table.get(DriverId::EVDEV).prefix(), "mock:");
        // still clamped, not routed to the installed backend
        assert_eq!(table.get(DriverId(9)).prefix(), "none:");
    }

    #[test]
    fn test_resolve_prefix() {
        let mut table = DriverTable::new();
        table.install(DriverId::EVDEV, Box::new(MockDriver::new().0)).unwrap();

        assert_eq!(table.resolve_prefix("mock:Pad"), Some(DriverId::EVDEV));
        assert_eq!(table.resolve_prefix("none:Pad"), Some(DriverId::NONE));
        assert_eq!(table.resolve_prefix("sdl:Pad"), None);
    }
}

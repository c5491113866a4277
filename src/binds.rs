//! Per-device bind storage
//!
//! A device's binds are a current mask per action plus a snapshot of the
//! driver's factory defaults taken once at allocation.

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::input::driver::{DriverHandle, DriverId, InputDriver};

/// Current and default bind masks for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindArray {
    current: Vec<u32>,
    defaults: Vec<u32>,
}

impl BindArray {
    /// Allocate storage for a driver's actions, filled with its defaults
    pub fn allocate(driver: &dyn InputDriver, driver_id: DriverId) -> Result<Self> {
        let count = bind_count(driver, driver_id);
        if count == 0 {
            bail!("No bindable actions for driver {}", driver_id);
        }

        let mut defaults = vec![0; count];
        driver.default_binds(&mut defaults);

        Ok(Self {
            current: defaults.clone(),
            defaults,
        })
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn current(&self) -> &[u32] {
        &self.current
    }

    pub fn current_mut(&mut self) -> &mut [u32] {
        &mut self.current
    }

    pub fn defaults(&self) -> &[u32] {
        &self.defaults
    }
}

/// Action count reported by a driver, 0 when it fails to report one
pub fn bind_count(driver: &dyn InputDriver, driver_id: DriverId) -> usize {
    let count = driver.bind_count();
    if count <= 0 {
        warn!(driver = %driver_id, count = count, "Failed to get bind count");
        return 0;
    }
    count as usize
}

/// Let the driver normalize the current binds.
/// Returns whether any bind remains set.
pub fn clean(driver: &dyn InputDriver, handle: Option<DriverHandle>, binds: &mut BindArray) -> bool {
    driver.clean_binds(handle, &mut binds.current)
}

/// Run `clean` and drop the storage when nothing is left bound
pub fn clean_or_release(
    driver: &dyn InputDriver,
    handle: Option<DriverHandle>,
    binds: &mut Option<BindArray>,
) {
    if let Some(array) = binds.as_mut()
        && !clean(driver, handle, array)
    {
        debug!("No usable binds left, releasing bind storage");
        *binds = None;
    }
}

/// Toggle (or force-clear) `mask` on one action of a device.
///
/// Storage is allocated on the first bind and released again as soon as the
/// driver reports nothing left bound.
pub fn bind_key(
    binds: &mut Option<BindArray>,
    driver: &dyn InputDriver,
    driver_id: DriverId,
    handle: Option<DriverHandle>,
    keycode: usize,
    mask: u32,
    force_unbind: bool,
) -> Result<()> {
    let freshly_allocated = binds.is_none();
    if freshly_allocated {
        if force_unbind {
            return Ok(());
        }
        *binds = Some(BindArray::allocate(driver, driver_id)?);
    }

    let Some(array) = binds.as_mut() else {
        bail!("Bind storage missing after allocation");
    };

    let len = array.len();
    if keycode >= len {
        if freshly_allocated {
            *binds = None;
        }
        bail!("Key code {} out of range (0..{})", keycode, len);
    }

    if force_unbind {
        array.current[keycode] &= !mask;
    } else {
        array.current[keycode] ^= mask;
    }

    clean_or_release(driver, handle, binds);
    Ok(())
}

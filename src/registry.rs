//! Device registry
//!
//! Bounded set of device records addressed by slot index. Backends register
//! devices during a probe cycle; records with bindings outlive disconnects so
//! a reconnecting device gets its binds back.

use std::fmt::Write as _;

use anyhow::{Result, bail};
use tracing::{debug, error, info};

use crate::binds::{self, BindArray};
use crate::constants::registry::{
    DEDUP_SUFFIX_RESERVE, MAX_DEVICES, MAX_NAME_LEN, UNKNOWN_KEY_NAME,
};
use crate::input::driver::{DriverHandle, DriverId, InputDriver};
use crate::input::driver_table::DriverTable;
use crate::input::keys;

/// Slot index of a device, stable until the next probe cycle compacts the table
pub type DeviceId = usize;

/// One device record
#[derive(Debug)]
pub struct Device {
    pub(crate) driver_id: DriverId,
    /// Only meaningful while `probed` is set
    pub(crate) handle: Option<DriverHandle>,
    pub(crate) name: String,
    pub(crate) binds: Option<BindArray>,
    pub(crate) probed: bool,
}

impl Device {
    fn new(name: String, driver_id: DriverId) -> Self {
        Self {
            driver_id,
            handle: None,
            name,
            binds: None,
            probed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn driver_id(&self) -> DriverId {
        self.driver_id
    }

    pub fn handle(&self) -> Option<DriverHandle> {
        self.handle
    }

    pub fn is_probed(&self) -> bool {
        self.probed
    }

    pub fn binds(&self) -> Option<&BindArray> {
        self.binds.as_ref()
    }
}

pub struct DeviceRegistry {
    drivers: DriverTable,
    devices: Vec<Device>,
    capacity: usize,
}

impl DeviceRegistry {
    pub fn new(drivers: DriverTable, capacity: usize) -> Self {
        Self {
            drivers,
            devices: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn with_drivers(drivers: DriverTable) -> Self {
        Self::new(drivers, MAX_DEVICES)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn drivers(&self) -> &DriverTable {
        &self.drivers
    }

    pub fn devices(&self) -> impl Iterator<Item = (DeviceId, &Device)> {
        self.devices.iter().enumerate()
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Called for every device a backend finds.
    ///
    /// A not-yet-probed record of the same name is taken over (keeping its
    /// binds); same-named devices already probed this cycle push the new one
    /// to a `"name [n]"` variant. The registry takes responsibility for
    /// `handle`: it is released again if the registration is dropped.
    pub fn register(
        &mut self,
        name: &str,
        driver_id: DriverId,
        handle: DriverHandle,
    ) -> Result<DeviceId> {
        let base = sanitize_name(name);
        let mut name = base.clone();
        let mut dupe_count = 0;
        let mut matched = None;

        // a new candidate may collide with a slot already passed, so rescan
        'scan: loop {
            for (i, device) in self.devices.iter().enumerate() {
                if device.name != name {
                    continue;
                }
                if device.probed {
                    dupe_count += 1;
                    name = format!("{} [{}]", base, dupe_count);
                    continue 'scan;
                }
                matched = Some(i);
                break 'scan;
            }
            break;
        }

        let id = match matched {
            Some(i) => {
                let device = &mut self.devices[i];
                if let Some(old) = device.handle.take()
                    && old != handle
                {
                    self.drivers.get_mut(device.driver_id).free(old);
                }
                debug!(device = i, name = %name, "Device reconnected");
                i
            }
            None => self.insert_new(name, driver_id, handle)?,
        };

        let device = &mut self.devices[id];
        device.probed = true;
        device.driver_id = driver_id;
        device.handle = Some(handle);

        binds::clean_or_release(self.drivers.get(driver_id), Some(handle), &mut device.binds);

        Ok(id)
    }

    /// Place a brand-new record, evicting the first unprobed one if full
    fn insert_new(
        &mut self,
        name: String,
        driver_id: DriverId,
        handle: DriverHandle,
    ) -> Result<DeviceId> {
        let evict = if self.devices.len() < self.capacity {
            None
        } else {
            match self.devices.iter().position(|d| !d.probed) {
                Some(i) => Some(i),
                None => {
                    error!(name = %name, capacity = self.capacity, "Too many devices, can't add");
                    self.drivers.get_mut(driver_id).free(handle);
                    bail!("Device registry full, dropped {}", name);
                }
            }
        };

        let binds = match BindArray::allocate(self.drivers.get(driver_id), driver_id) {
            Ok(binds) => binds,
            Err(e) => {
                self.drivers.get_mut(driver_id).free(handle);
                return Err(e.context(format!("Failed to register {}", name)));
            }
        };

        let mut device = Device::new(name, driver_id);
        device.binds = Some(binds);

        let id = match evict {
            Some(i) => {
                let old = std::mem::replace(&mut self.devices[i], device);
                info!(device = i, evicted = %old.name, "Evicted unprobed device");
                if let Some(old_handle) = old.handle {
                    self.drivers.get_mut(old.driver_id).free(old_handle);
                }
                i
            }
            None => {
                self.devices.push(device);
                self.devices.len() - 1
            }
        };

        info!(device = id, name = %self.devices[id].name, "New device");
        Ok(id)
    }

    /// Re-discover devices through every backend.
    ///
    /// Devices not found again lose their handle; those that also have no
    /// binds are removed and the remaining slots close up in order.
    pub fn probe_cycle(&mut self) {
        for device in &mut self.devices {
            device.probed = false;
        }

        for driver_id in DriverId::backends() {
            let found = self.drivers.get_mut(driver_id).probe();
            debug!(driver = %driver_id, count = found.len(), "Probe finished");
            for probed in found {
                if let Err(e) = self.register(&probed.name, driver_id, probed.handle) {
                    debug!(error = %e, "Registration dropped");
                }
            }
        }

        for device in &mut self.devices {
            if !device.probed
                && let Some(handle) = device.handle.take()
            {
                self.drivers.get_mut(device.driver_id).free(handle);
            }
        }

        self.devices.retain(|device| {
            let keep = device.probed || device.binds.is_some();
            if !keep {
                debug!(name = %device.name, "Removing device without binds");
            }
            keep
        });
    }

    /// OR of the action masks every probed device currently reports
    pub fn update(&mut self) -> u32 {
        let mut result = 0;
        for device in &self.devices {
            if !device.probed {
                continue;
            }
            if let (Some(handle), Some(binds)) = (device.handle, device.binds.as_ref()) {
                result |= self
                    .drivers
                    .get_mut(device.driver_id)
                    .update(handle, binds.current());
            }
        }
        result
    }

    pub fn name(&self, id: DeviceId) -> Option<&str> {
        self.devices.get(id).map(|d| d.name.as_str())
    }

    /// Current bind masks, `None` when the device holds no bind storage
    pub fn binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.devices.get(id)?.binds.as_ref().map(BindArray::current)
    }

    /// Default bind snapshot taken when the storage was allocated
    pub fn default_binds(&self, id: DeviceId) -> Option<&[u32]> {
        self.devices.get(id)?.binds.as_ref().map(BindArray::defaults)
    }

    pub fn bind_count(&self, id: DeviceId) -> usize {
        match self.devices.get(id) {
            Some(device) => binds::bind_count(self.drivers.get(device.driver_id), device.driver_id),
            None => 0,
        }
    }

    pub fn driver_id(&self, id: DeviceId) -> Option<DriverId> {
        self.devices.get(id).map(|d| d.driver_id)
    }

    pub fn is_probed(&self, id: DeviceId) -> bool {
        self.devices.get(id).is_some_and(|d| d.probed)
    }

    /// Display name of a key on a device, never empty
    pub fn key_name(&self, id: DeviceId, keycode: u32) -> String {
        let Some(device) = self.devices.get(id) else {
            return UNKNOWN_KEY_NAME.to_string();
        };

        self.drivers
            .get(device.driver_id)
            .key_name(keycode)
            .unwrap_or_else(|| keys::fallback_key_name(keycode))
    }

    /// Toggle `mask` on a device's action, or clear it with `force_unbind`
    pub fn bind_key(
        &mut self,
        id: DeviceId,
        keycode: usize,
        mask: u32,
        force_unbind: bool,
    ) -> Result<()> {
        let Some(device) = self.devices.get_mut(id) else {
            bail!("No device #{}", id);
        };

        binds::bind_key(
            &mut device.binds,
            self.drivers.get(device.driver_id),
            device.driver_id,
            device.handle,
            keycode,
            mask,
            force_unbind,
        )
    }

    /// Listing of every slot, for debugging
    pub fn dump(&self) -> String {
        let mut out = String::from("# drv probed binds name\n");
        for (i, d) in self.devices.iter().enumerate() {
            let _ = writeln!(
                out,
                "{} {:3} {:>6} {:>5} {}",
                i,
                d.driver_id.0,
                if d.probed { 'y' } else { 'n' },
                if d.binds.is_some() { 'y' } else { 'n' },
                d.name
            );
        }
        out
    }

    pub fn log_dump(&self) {
        for line in self.dump().lines() {
            debug!("{}", line);
        }
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<DeviceId> {
        self.devices.iter().position(|d| d.name == name)
    }

    /// Record a device known only by name (from a config file).
    /// It stays inactive until a backend registers the same name.
    pub(crate) fn insert_inactive(&mut self, name: &str, driver_id: DriverId) -> Result<DeviceId> {
        let name = sanitize_name(name);
        if let Some(id) = self.find_by_name(&name) {
            return Ok(id);
        }
        if self.devices.len() >= self.capacity {
            error!(name = %name, capacity = self.capacity, "Too many devices, can't add");
            bail!("Device registry full, dropped {}", name);
        }
        self.devices.push(Device::new(name, driver_id));
        Ok(self.devices.len() - 1)
    }

    pub(crate) fn device_and_driver(
        &mut self,
        id: DeviceId,
    ) -> Option<(&mut Device, &dyn InputDriver)> {
        let device = self.devices.get_mut(id)?;
        let driver = self.drivers.get(device.driver_id);
        Some((device, driver))
    }

    pub(crate) fn drivers_mut(&mut self) -> &mut DriverTable {
        &mut self.drivers
    }
}

/// Strip control characters and cap the length, leaving room for a dedup suffix
fn sanitize_name(name: &str) -> String {
    let limit = MAX_NAME_LEN - DEDUP_SUFFIX_RESERVE - 1;
    let mut out = String::with_capacity(name.len().min(limit));
    for c in name.chars().filter(|c| !c.is_control()) {
        if out.len() + c.len_utf8() > limit {
            break;
        }
        out.push(c);
    }
    out
}

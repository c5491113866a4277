//! Session for applying persisted bindings onto the registry
//!
//! Slots that still hold their default value when the session opens are
//! treated as "not mentioned yet". The first bind to such a slot replaces its
//! value; slots nobody mentions fall back to their default when the session
//! ends. A saved config therefore only needs to list binds that differ from
//! the defaults.

use std::collections::HashMap;

use anyhow::{Result, bail};
use tracing::{debug, warn};

use crate::binds::{self, BindArray};
use crate::input::keys;
use crate::registry::{DeviceId, DeviceRegistry};

/// Per-slot state while a session is open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionBind {
    /// Held its default on entry and hasn't been bound since
    Unmentioned,
    Explicit(u32),
}

fn mark_session(binds: &BindArray) -> Vec<SessionBind> {
    binds
        .current()
        .iter()
        .zip(binds.defaults())
        .map(|(&cur, &def)| {
            if cur == def {
                SessionBind::Unmentioned
            } else {
                SessionBind::Explicit(cur)
            }
        })
        .collect()
}

pub struct ConfigBinder<'r> {
    registry: &'r mut DeviceRegistry,
    pending: HashMap<DeviceId, Vec<SessionBind>>,
    finished: bool,
}

impl<'r> ConfigBinder<'r> {
    /// Open a session over every device that currently holds binds
    pub fn start(registry: &'r mut DeviceRegistry) -> Self {
        let pending = registry
            .devices()
            .filter_map(|(id, d)| d.binds().map(|b| (id, mark_session(b))))
            .collect();

        Self {
            registry,
            pending,
            finished: false,
        }
    }

    /// Find or create the device a persisted name refers to.
    ///
    /// The name must start with a driver prefix. Unknown names get an
    /// inactive record that a later registration of the same name takes over.
    pub fn resolve_device(&mut self, name: &str) -> Result<DeviceId> {
        let Some(driver_id) = self.registry.drivers().resolve_prefix(name) else {
            warn!(name = %name, "Missing driver for device");
            bail!("No driver for device {}", name);
        };

        if let Some(id) = self.registry.find_by_name(name) {
            return Ok(id);
        }

        let id = self.registry.insert_inactive(name, driver_id)?;
        debug!(device = id, name = %name, driver = %driver_id, "Created inactive device");
        Ok(id)
    }

    /// Bind `mask` to the key named by `token` on a device.
    ///
    /// `token` is an escaped code (`\x1B`), a driver key name, or a single
    /// printable character.
    pub fn bind_key(&mut self, id: DeviceId, token: &str, mask: u32) -> Result<()> {
        let Some((device, driver)) = self.registry.device_and_driver(id) else {
            bail!("No device #{}", id);
        };

        let count = binds::bind_count(driver, device.driver_id);
        let code = keys::resolve_key_token(token, |name| driver.key_code(name))
            .map(|c| c as usize)
            .filter(|&c| c < count);
        let Some(code) = code else {
            warn!(device = id, key = %token, "Bad key");
            bail!("Bad key {} for device #{}", token, id);
        };

        if device.binds.is_none() {
            let array = BindArray::allocate(driver, device.driver_id)?;
            self.pending.insert(id, mark_session(&array));
            device.binds = Some(array);
        }

        let slots = self
            .pending
            .entry(id)
            .or_insert_with(|| device.binds.as_ref().map(mark_session).unwrap_or_default());
        let Some(slot) = slots.get_mut(code) else {
            bail!("Key code {} out of range for device #{}", code, id);
        };

        *slot = match *slot {
            SessionBind::Unmentioned => SessionBind::Explicit(mask),
            SessionBind::Explicit(value) => SessionBind::Explicit(value | mask),
        };
        Ok(())
    }

    /// Close the session: unmentioned slots go back to their defaults, and
    /// devices with a live handle are cleaned.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        for (id, slots) in std::mem::take(&mut self.pending) {
            let Some((device, driver)) = self.registry.device_and_driver(id) else {
                continue;
            };
            let Some(array) = device.binds.as_mut() else {
                continue;
            };

            let defaults = array.defaults().to_vec();
            for ((bind, slot), def) in array.current_mut().iter_mut().zip(slots).zip(defaults) {
                *bind = match slot {
                    SessionBind::Unmentioned => def,
                    SessionBind::Explicit(value) => value,
                };
            }

            // cleaning needs a live handle, inactive devices keep what they have
            if device.handle.is_some() {
                binds::clean_or_release(driver, device.handle, &mut device.binds);
            }
        }
    }
}

impl Drop for ConfigBinder<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

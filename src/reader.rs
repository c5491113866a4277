//! Blocking key reader and menu key state
//!
//! Reads go through the first backend able to deliver events. Every resolved
//! event also updates a persistent menu key bitfield, so callers can mix raw
//! key reads with menu reads and still see consistent transitions.

use anyhow::{Context, Result, bail};
use bitflags::bitflags;
use tracing::{debug, error, warn};

use crate::constants::reader::FLUSH_TIMEOUT_MS;
use crate::input::driver::{DriverHandle, DriverId};
use crate::registry::{DeviceId, DeviceRegistry};

bitflags! {
    /// Canonical menu navigation actions, shared by every backend
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MenuKeys: u32 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const OK = 1 << 4;
        const BACK = 1 << 5;
        const ALT = 1 << 6;
        const MENU = 1 << 7;
    }
}

/// A key event resolved to its logical device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub device: DeviceId,
    pub code: u32,
    pub is_down: bool,
}

#[derive(Debug, Default)]
pub struct KeyReader {
    menu_key_state: MenuKeys,
}

impl KeyReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn menu_state(&self) -> MenuKeys {
        self.menu_key_state
    }

    /// Translate a raw code through the driver of `driver_id`
    pub fn menu_translate(registry: &DeviceRegistry, driver_id: DriverId, code: u32) -> MenuKeys {
        registry.drivers().get(driver_id).menu_translate(code)
    }

    /// Wait for a key event.
    ///
    /// A timeout of 0 waits indefinitely; `Ok(None)` means the timeout ran
    /// out. Fails when no probed device can deliver events at all, including
    /// when the driver finds every watched device gone.
    pub fn try_read_keycode(
        &mut self,
        registry: &mut DeviceRegistry,
        timeout_ms: u32,
    ) -> Result<Option<KeyEvent>> {
        let Some((driver_id, sources)) = event_sources(registry) else {
            bail!("No input devices to read from");
        };

        let handles: Vec<DriverHandle> = sources.iter().map(|&(_, h)| h).collect();
        let raw = registry
            .drivers_mut()
            .get_mut(driver_id)
            .read_keycode(&handles, timeout_ms)
            .context("Input devices stopped delivering events")?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let Some(&(device, _)) = sources.get(raw.source) else {
            warn!(source = raw.source, "Driver reported an event from an unknown source");
            return Ok(None);
        };

        let menu = Self::menu_translate(registry, driver_id, raw.code);
        if !menu.is_empty() {
            if raw.is_down {
                self.menu_key_state |= menu;
            } else {
                self.menu_key_state &= !menu;
            }
        }

        debug!(
            device = device,
            code = raw.code,
            is_down = raw.is_down,
            menu = menu.bits(),
            "Key event"
        );

        Ok(Some(KeyEvent {
            device,
            code: raw.code,
            is_down: raw.is_down,
        }))
    }

    /// Same as [`try_read_keycode`](Self::try_read_keycode), but having no
    /// device to read from terminates the process instead of hanging.
    pub fn read_keycode(&mut self, registry: &mut DeviceRegistry, timeout_ms: u32) -> Option<KeyEvent> {
        match self.try_read_keycode(registry, timeout_ms) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "No input devices left to read");
                std::process::exit(1);
            }
        }
    }

    /// Wait for menu keys and return the menu key bitfield.
    ///
    /// A non-zero timeout does a single read. A timeout of 0 keeps reading
    /// until the bitfield differs from what it was on entry.
    pub fn read_menu(&mut self, registry: &mut DeviceRegistry, timeout_ms: u32) -> MenuKeys {
        let keys_old = self.menu_key_state;

        loop {
            let event = self.read_keycode(registry, timeout_ms);
            let translated = match event {
                Some(e) => registry
                    .driver_id(e.device)
                    .map(|driver_id| Self::menu_translate(registry, driver_id, e.code))
                    .unwrap_or_default(),
                None => MenuKeys::empty(),
            };

            if timeout_ms != 0 {
                break;
            }
            if translated.is_empty() {
                continue;
            }
            if keys_old != self.menu_key_state {
                break;
            }
        }

        self.menu_key_state
    }

    /// Switch every probed device between blocking and polling reads.
    ///
    /// Drains one pending event and clears the menu key state, so nothing
    /// captured under the old mode shows up as a key press in the new one.
    pub fn set_blocking(&mut self, registry: &mut DeviceRegistry, is_blocking: bool) {
        let targets: Vec<(DriverId, DriverHandle)> = registry
            .devices()
            .filter(|(_, d)| d.is_probed())
            .filter_map(|(_, d)| d.handle().map(|h| (d.driver_id(), h)))
            .collect();

        for (driver_id, handle) in targets {
            registry
                .drivers_mut()
                .get_mut(driver_id)
                .set_blocking(handle, is_blocking);
        }

        if let Err(e) = self.try_read_keycode(registry, FLUSH_TIMEOUT_MS) {
            warn!(error = %e, "Skipping event flush");
        }

        self.menu_key_state = MenuKeys::empty();
    }
}

/// Probed devices of the first backend that delivers events, in slot order
fn event_sources(registry: &DeviceRegistry) -> Option<(DriverId, Vec<(DeviceId, DriverHandle)>)> {
    DriverId::backends()
        .filter(|&id| registry.drivers().get(id).delivers_events())
        .map(|driver_id| {
            let sources: Vec<_> = registry
                .devices()
                .filter(|(_, d)| d.is_probed() && d.driver_id() == driver_id)
                .filter_map(|(id, d)| d.handle().map(|h| (id, h)))
                .collect();
            (driver_id, sources)
        })
        .find(|(_, sources)| !sources.is_empty())
}

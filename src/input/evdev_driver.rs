//! evdev input driver
//!
//! Opens every key-capable node under /dev/input and exposes it to the
//! registry. Binds are indexed by evdev key code, so a device has one bind
//! slot per possible key (KEY_CNT).
//!
//! Requires 'input' group membership to access raw input devices.

use std::collections::{HashMap, VecDeque};
use std::os::fd::AsFd;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use evdev::{Device, EventType, KeyCode};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, info, warn};

use crate::constants::{actions, drivers, input, paths, permissions};
use crate::input::device_detection;
use crate::input::driver::{DriverHandle, InputDriver, ProbedDevice, RawKeyEvent};
use crate::reader::MenuKeys;

/// Factory binds: arrows, a/s/d as B/C/A, Enter as start. Gamepads get the
/// d-pad and face buttons.
const DEFAULT_BINDS: &[(u16, u32)] = &[
    (input::KEY_UP, actions::UP),
    (input::KEY_DOWN, actions::DOWN),
    (input::KEY_LEFT, actions::LEFT),
    (input::KEY_RIGHT, actions::RIGHT),
    (input::KEY_A, actions::B),
    (input::KEY_S, actions::C),
    (input::KEY_D, actions::A),
    (input::KEY_ENTER, actions::START),
    (input::KEY_ESC, actions::MENU),
    (input::BTN_DPAD_UP, actions::UP),
    (input::BTN_DPAD_DOWN, actions::DOWN),
    (input::BTN_DPAD_LEFT, actions::LEFT),
    (input::BTN_DPAD_RIGHT, actions::RIGHT),
    (input::BTN_WEST, actions::B),
    (input::BTN_SOUTH, actions::C),
    (input::BTN_EAST, actions::A),
    (input::BTN_START, actions::START),
    (input::BTN_MODE, actions::MENU),
];

struct OpenDevice {
    device: Device,
    path: PathBuf,
    /// Node reported an error or hangup; don't poll it again
    gone: bool,
}

#[derive(Default)]
pub struct EvdevDriver {
    devices: HashMap<DriverHandle, OpenDevice>,
    /// Key events fetched in a batch but not yet handed out
    pending: VecDeque<(DriverHandle, u32, bool)>,
    next_handle: u64,
}

impl EvdevDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn open(&mut self, device: Device, path: PathBuf) -> ProbedDevice {
        self.next_handle += 1;
        let handle = DriverHandle(self.next_handle);
        let name = format!(
            "{}{}",
            drivers::EVDEV_PREFIX,
            device.name().unwrap_or("Unknown device")
        );

        self.devices.insert(
            handle,
            OpenDevice {
                device,
                path,
                gone: false,
            },
        );
        ProbedDevice::new(name, handle)
    }

    /// Indices into `handles` that are readable. Fails when there is nothing
    /// left to wait on or poll itself fails.
    fn poll_ready(&mut self, handles: &[DriverHandle], timeout: PollTimeout) -> Result<Vec<usize>> {
        let (ready, hung) = {
            let watched: Vec<(usize, &OpenDevice)> = handles
                .iter()
                .enumerate()
                .filter_map(|(i, h)| self.devices.get(h).map(|d| (i, d)))
                .filter(|(_, d)| !d.gone)
                .collect();
            if watched.is_empty() {
                bail!("No open input devices left to wait on");
            }

            let mut fds: Vec<PollFd> = watched
                .iter()
                .map(|(_, d)| PollFd::new(d.device.as_fd(), PollFlags::POLLIN))
                .collect();

            match poll(&mut fds, timeout) {
                Ok(0) | Err(Errno::EINTR) => return Ok(Vec::new()),
                Ok(_) => {}
                Err(e) => return Err(e).context("poll on input devices failed"),
            }

            let mut ready = Vec::new();
            let mut hung = Vec::new();
            for (fd, &(i, _)) in fds.iter().zip(&watched) {
                let revents = fd.revents().unwrap_or(PollFlags::empty());
                if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                    hung.push(handles[i]);
                } else if revents.contains(PollFlags::POLLIN) {
                    ready.push(i);
                }
            }
            (ready, hung)
        };

        for handle in hung {
            if let Some(open) = self.devices.get_mut(&handle) {
                warn!(device_path = %open.path.display(), "Input device went away");
                open.gone = true;
            }
        }

        Ok(ready)
    }

    /// Move key press/release events of one device into `pending`
    fn fetch_into_pending(&mut self, handle: DriverHandle) {
        let Some(open) = self.devices.get_mut(&handle) else {
            return;
        };

        match open.device.fetch_events() {
            Ok(events) => {
                for event in events {
                    if event.event_type() != EventType::KEY {
                        continue;
                    }
                    let value = event.value();
                    if value != input::KEY_PRESS && value != input::KEY_RELEASE {
                        continue;
                    }
                    self.pending
                        .push_back((handle, u32::from(event.code()), value == input::KEY_PRESS));
                }
            }
            Err(e) => {
                warn!(device_path = %open.path.display(), error = %e, "Failed to fetch events");
                open.gone = true;
            }
        }
    }

    fn take_pending(&mut self, handles: &[DriverHandle]) -> Option<RawKeyEvent> {
        while let Some((handle, code, is_down)) = self.pending.pop_front() {
            if let Some(source) = handles.iter().position(|&h| h == handle) {
                return Some(RawKeyEvent {
                    source,
                    code,
                    is_down,
                });
            }
        }
        None
    }

    /// Throw away whatever a device has queued
    fn drain(&mut self, handle: DriverHandle) {
        if self.poll_ready(&[handle], PollTimeout::ZERO).is_ok_and(|r| !r.is_empty()) {
            self.fetch_into_pending(handle);
        }
        self.pending.retain(|&(h, _, _)| h != handle);
    }
}

impl InputDriver for EvdevDriver {
    fn prefix(&self) -> &str {
        drivers::EVDEV_PREFIX
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        let found = match device_detection::find_key_devices() {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, path = %paths::DEV_INPUT, "Cannot access input devices");
                warn!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
                return Vec::new();
            }
        };

        let probed: Vec<ProbedDevice> = found
            .into_iter()
            .map(|(device, path)| self.open(device, path))
            .collect();

        info!(count = probed.len(), "evdev probe finished");
        probed
    }

    fn free(&mut self, handle: DriverHandle) {
        if let Some(open) = self.devices.remove(&handle) {
            debug!(device_path = %open.path.display(), "Closed input device");
        }
        self.pending.retain(|&(h, _, _)| h != handle);
    }

    fn bind_count(&self) -> i32 {
        input::KEY_CNT as i32
    }

    fn default_binds(&self, binds: &mut [u32]) {
        binds.fill(0);
        for &(code, action) in DEFAULT_BINDS {
            if let Some(bind) = binds.get_mut(usize::from(code)) {
                *bind |= action;
            }
        }
    }

    fn clean_binds(&self, handle: Option<DriverHandle>, binds: &mut [u32]) -> bool {
        let supported = handle
            .and_then(|h| self.devices.get(&h))
            .and_then(|open| open.device.supported_keys());

        if let Some(keys) = supported {
            for (code, bind) in binds.iter_mut().enumerate() {
                let Ok(code) = u16::try_from(code) else {
                    *bind = 0;
                    continue;
                };
                if *bind != 0 && !keys.contains(KeyCode(code)) {
                    *bind = 0;
                }
            }
        }

        binds.iter().any(|&b| b != 0)
    }

    /// Reads always go through `poll` with the caller's timeout, so there is
    /// no fd mode to flip. Switching only drops what the device had queued.
    fn set_blocking(&mut self, handle: DriverHandle, is_blocking: bool) {
        let Some(open) = self.devices.get(&handle) else {
            return;
        };
        debug!(device_path = %open.path.display(), blocking = is_blocking, "Switched read mode");
        self.drain(handle);
    }

    fn menu_translate(&self, code: u32) -> MenuKeys {
        let Ok(code) = u16::try_from(code) else {
            return MenuKeys::empty();
        };

        match code {
            input::KEY_UP | input::BTN_DPAD_UP => MenuKeys::UP,
            input::KEY_DOWN | input::BTN_DPAD_DOWN => MenuKeys::DOWN,
            input::KEY_LEFT | input::BTN_DPAD_LEFT => MenuKeys::LEFT,
            input::KEY_RIGHT | input::BTN_DPAD_RIGHT => MenuKeys::RIGHT,
            input::KEY_ENTER | input::BTN_SOUTH => MenuKeys::OK,
            input::KEY_ESC | input::BTN_EAST => MenuKeys::BACK,
            input::KEY_BACKSPACE | input::BTN_NORTH => MenuKeys::ALT,
            input::BTN_MODE | input::BTN_SELECT => MenuKeys::MENU,
            _ => MenuKeys::empty(),
        }
    }

    fn key_code(&self, name: &str) -> Option<u32> {
        KeyCode::from_str(name).ok().map(|k| u32::from(k.code()))
    }

    fn key_name(&self, code: u32) -> Option<String> {
        let code = u16::try_from(code).ok()?;
        let name = format!("{:?}", KeyCode(code));
        (name.starts_with("KEY_") || name.starts_with("BTN_")).then_some(name)
    }

    fn delivers_events(&self) -> bool {
        true
    }

    fn read_keycode(
        &mut self,
        handles: &[DriverHandle],
        timeout_ms: u32,
    ) -> Result<Option<RawKeyEvent>> {
        let deadline =
            (timeout_ms != 0).then(|| Instant::now() + Duration::from_millis(u64::from(timeout_ms)));

        loop {
            if let Some(event) = self.take_pending(handles) {
                return Ok(Some(event));
            }

            let timeout = match deadline {
                None => PollTimeout::NONE,
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return Ok(None);
                    }
                    PollTimeout::from(u16::try_from(left.as_millis()).unwrap_or(u16::MAX))
                }
            };

            for source in self.poll_ready(handles, timeout)? {
                self.fetch_into_pending(handles[source]);
            }
        }
    }

    fn update(&mut self, handle: DriverHandle, binds: &[u32]) -> u32 {
        let Some(open) = self.devices.get(&handle) else {
            return 0;
        };

        match open.device.get_key_state() {
            Ok(state) => state
                .iter()
                .filter_map(|key| binds.get(usize::from(key.code())))
                .fold(0, |acc, &b| acc | b),
            Err(e) => {
                debug!(device_path = %open.path.display(), error = %e, "Failed to read key state");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_binds_cover_arrows() {
        let driver = EvdevDriver::new();
        let mut binds = vec![0xdead; input::KEY_CNT];
        driver.default_binds(&mut binds);

        assert_eq!(binds[usize::from(input::KEY_UP)], actions::UP);
        assert_eq!(binds[usize::from(input::BTN_START)], actions::START);
        assert_eq!(binds[usize::from(input::KEY_TAB)], 0);
    }

    #[test]
    fn test_clean_without_handle_only_checks() {
        let driver = EvdevDriver::new();
        let mut binds = vec![0; input::KEY_CNT];
        assert!(!driver.clean_binds(None, &mut binds));

        binds[5] = 1;
        assert!(driver.clean_binds(None, &mut binds));
        assert_eq!(binds[5], 1);
    }

    #[test]
    fn test_key_names_round_trip() {
        let driver = EvdevDriver::new();
        assert_eq!(driver.key_name(u32::from(input::KEY_TAB)).as_deref(), Some("KEY_TAB"));
        assert_eq!(driver.key_code("KEY_TAB"), Some(u32::from(input::KEY_TAB)));
        assert_eq!(driver.key_code("KEY_LEFTSHIFT"), Some(42));
        assert_eq!(driver.key_code("NOT_A_KEY"), None);
        assert_eq!(driver.key_name(0x1_0000), None);
    }

    #[test]
    fn test_menu_translate() {
        let driver = EvdevDriver::new();
        assert_eq!(driver.menu_translate(u32::from(input::KEY_UP)), MenuKeys::UP);
        assert_eq!(driver.menu_translate(u32::from(input::BTN_SOUTH)), MenuKeys::OK);
        assert_eq!(driver.menu_translate(u32::from(input::KEY_ESC)), MenuKeys::BACK);
        assert!(driver.menu_translate(u32::from(input::KEY_TAB)).is_empty());
        assert!(driver.menu_translate(u32::MAX).is_empty());
    }

    #[test]
    fn test_read_without_open_devices_fails() {
        let mut driver = EvdevDriver::new();
        assert!(driver.read_keycode(&[DriverHandle(1)], 0).is_err());
        assert!(driver.read_keycode(&[], 20).is_err());
        assert_eq!(driver.update(DriverHandle(1), &[1, 2, 3]), 0);
    }
}

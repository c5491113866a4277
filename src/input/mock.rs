//! Scripted driver for unit tests

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use anyhow::{Result, bail};

use crate::input::driver::{DriverHandle, InputDriver, ProbedDevice, RawKeyEvent};
use crate::reader::MenuKeys;

/// Shared state a test keeps to script the driver and inspect what it saw
#[derive(Debug, Default)]
pub struct MockState {
    pub bind_count: i32,
    pub defaults: Vec<u32>,
    /// Devices reported by the next probe call, consumed one batch per probe
    pub probes: VecDeque<Vec<ProbedDevice>>,
    pub freed: Vec<DriverHandle>,
    /// Bind slots this hardware doesn't have; `clean_binds` zeroes them
    pub unsupported: Vec<usize>,
    /// Queued reads: `Some((handle, code, is_down))` or `None` for a timeout
    pub events: VecDeque<Option<(DriverHandle, u32, bool)>>,
    /// Every handle went away; reads fail instead of waiting
    pub sources_gone: bool,
    pub read_timeouts: Vec<u32>,
    pub blocking: Vec<(DriverHandle, bool)>,
    pub menu_map: HashMap<u32, MenuKeys>,
    pub key_names: HashMap<String, u32>,
    pub pressed: HashMap<DriverHandle, Vec<u32>>,
}

pub type MockControl = Rc<RefCell<MockState>>;

pub struct MockDriver {
    state: MockControl,
}

impl MockDriver {
    /// Driver with 8 actions whose defaults bind slot 1 and 2
    pub fn new() -> (Self, MockControl) {
        let mut defaults = vec![0; 8];
        defaults[1] = 0b01;
        defaults[2] = 0b10;
        Self::with_defaults(defaults)
    }

    pub fn with_defaults(defaults: Vec<u32>) -> (Self, MockControl) {
        let state = Rc::new(RefCell::new(MockState {
            bind_count: defaults.len() as i32,
            defaults,
            ..MockState::default()
        }));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }
}

impl InputDriver for MockDriver {
    fn prefix(&self) -> &str {
        "mock:"
    }

    fn probe(&mut self) -> Vec<ProbedDevice> {
        self.state.borrow_mut().probes.pop_front().unwrap_or_default()
    }

    fn free(&mut self, handle: DriverHandle) {
        self.state.borrow_mut().freed.push(handle);
    }

    fn bind_count(&self) -> i32 {
        self.state.borrow().bind_count
    }

    fn default_binds(&self, binds: &mut [u32]) {
        let state = self.state.borrow();
        for (slot, def) in binds.iter_mut().zip(state.defaults.iter()) {
            *slot = *def;
        }
    }

    fn clean_binds(&self, _handle: Option<DriverHandle>, binds: &mut [u32]) -> bool {
        let state = self.state.borrow();
        for &slot in &state.unsupported {
            if let Some(bind) = binds.get_mut(slot) {
                *bind = 0;
            }
        }
        binds.iter().any(|&b| b != 0)
    }

    fn set_blocking(&mut self, handle: DriverHandle, is_blocking: bool) {
        self.state.borrow_mut().blocking.push((handle, is_blocking));
    }

    fn menu_translate(&self, code: u32) -> MenuKeys {
        self.state
            .borrow()
            .menu_map
            .get(&code)
            .copied()
            .unwrap_or(MenuKeys::empty())
    }

    fn key_code(&self, name: &str) -> Option<u32> {
        self.state.borrow().key_names.get(name).copied()
    }

    fn key_name(&self, code: u32) -> Option<String> {
        self.state
            .borrow()
            .key_names
            .iter()
            .find(|&(_, &c)| c == code)
            .map(|(name, _)| name.clone())
    }

    fn delivers_events(&self) -> bool {
        true
    }

    fn read_keycode(
        &mut self,
        handles: &[DriverHandle],
        timeout_ms: u32,
    ) -> Result<Option<RawKeyEvent>> {
        let mut state = self.state.borrow_mut();
        state.read_timeouts.push(timeout_ms);
        if state.sources_gone {
            bail!("No mock devices left to wait on");
        }
        let Some((handle, code, is_down)) = state.events.pop_front().flatten() else {
            return Ok(None);
        };
        Ok(handles.iter().position(|&h| h == handle).map(|source| RawKeyEvent {
            source,
            code,
            is_down,
        }))
    }

    fn update(&mut self, handle: DriverHandle, binds: &[u32]) -> u32 {
        let state = self.state.borrow();
        state
            .pressed
            .get(&handle)
            .map(|codes| {
                codes
                    .iter()
                    .filter_map(|&c| binds.get(c as usize))
                    .fold(0, |acc, b| acc | b)
            })
            .unwrap_or(0)
    }
}

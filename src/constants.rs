//! Application-wide constants
//!
//! Capacities, name limits, driver prefixes and the evdev codes the
//! bundled backend cares about.

/// Device registry limits
pub mod registry {
    /// Number of device slots a registry holds by default
    pub const MAX_DEVICES: usize = 8;

    /// Size of a device name record in bytes, suffix included
    pub const MAX_NAME_LEN: usize = 256;

    /// Bytes kept free at the end of a name for a " [n]" suffix
    pub const DEDUP_SUFFIX_RESERVE: usize = 12;

    /// Name reported by key queries against a device id that doesn't exist
    pub const UNKNOWN_KEY_NAME: &str = "Unkn0";
}

/// Driver ids and config-name prefixes
pub mod drivers {
    /// Number of backend types known at build time, default slot included
    pub const DRIVER_COUNT: usize = 2;

    /// Prefix answered by the default driver (never matches real hardware)
    pub const NONE_PREFIX: &str = "none:";

    /// Prefix of every device name registered by the evdev backend
    pub const EVDEV_PREFIX: &str = "evdev:";
}

/// Reader timing
pub mod reader {
    /// Timeout used to drain a stale event after a blocking-mode switch.
    /// Zero means "wait forever" for the read calls, so the flush uses 1ms.
    pub const FLUSH_TIMEOUT_MS: u32 = 1;
}

/// Filesystem paths
pub mod paths {
    /// Input device directory
    pub const DEV_INPUT: &str = "/dev/input";

    /// Prefix of character device nodes that deliver input events
    pub const EVENT_NODE_PREFIX: &str = "event";
}

/// Permission hints shown when /dev/input can't be read
pub mod permissions {
    pub const INPUT_GROUP: &str = "input";
    pub const ADD_TO_INPUT_GROUP: &str = "sudo usermod -aG input $USER";
}

/// Settings file location
pub mod config {
    pub const APP_DIR: &str = "padbind";
    pub const FILENAME: &str = "input.json";
}

/// Input event constants (from linux/input-event-codes.h)
pub mod input {
    /// Key release event value
    pub const KEY_RELEASE: i32 = 0;

    /// Key press event value
    pub const KEY_PRESS: i32 = 1;

    /// Number of key codes an evdev device can report (KEY_CNT)
    pub const KEY_CNT: usize = 0x300;

    pub const KEY_ESC: u16 = 1;
    pub const KEY_BACKSPACE: u16 = 14;

    /// Key code for Tab key - used to identify keyboard devices
    pub const KEY_TAB: u16 = 15;
    pub const KEY_ENTER: u16 = 28;
    pub const KEY_A: u16 = 30;
    pub const KEY_S: u16 = 31;
    pub const KEY_D: u16 = 32;
    pub const KEY_UP: u16 = 103;
    pub const KEY_LEFT: u16 = 105;
    pub const KEY_RIGHT: u16 = 106;
    pub const KEY_DOWN: u16 = 108;

    /// Button code for left mouse button - used to identify mouse devices (BTN_LEFT = 0x110)
    pub const BTN_LEFT: u16 = 0x110;

    /// First gamepad button (BTN_SOUTH / BTN_A) - used to identify gamepads
    pub const BTN_SOUTH: u16 = 0x130;
    pub const BTN_EAST: u16 = 0x131;
    pub const BTN_NORTH: u16 = 0x133;
    pub const BTN_WEST: u16 = 0x134;
    pub const BTN_SELECT: u16 = 0x13a;
    pub const BTN_START: u16 = 0x13b;
    pub const BTN_MODE: u16 = 0x13c;
    pub const BTN_DPAD_UP: u16 = 0x220;
    pub const BTN_DPAD_DOWN: u16 = 0x221;
    pub const BTN_DPAD_LEFT: u16 = 0x222;
    pub const BTN_DPAD_RIGHT: u16 = 0x223;
}

/// Emulated-pad action bits used by the evdev backend's factory binds
pub mod actions {
    pub const UP: u32 = 1 << 0;
    pub const DOWN: u32 = 1 << 1;
    pub const LEFT: u32 = 1 << 2;
    pub const RIGHT: u32 = 1 << 3;
    pub const B: u32 = 1 << 4;
    pub const C: u32 = 1 << 5;
    pub const A: u32 = 1 << 6;
    pub const START: u32 = 1 << 7;
    pub const MENU: u32 = 1 << 31;
}

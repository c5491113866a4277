//! Input device registry, bind storage and key reading for emulator frontends
//!
//! Backends implement [`InputDriver`] and report devices to a
//! [`DeviceRegistry`]. Persisted binds are applied through a
//! [`ConfigBinder`] session, and [`KeyReader`] blocks for key and menu input.

#![deny(unsafe_code)]

pub mod binds;
pub mod config;
pub mod constants;
pub mod input;
pub mod reader;
pub mod registry;

pub use binds::BindArray;
pub use config::{ConfigBinder, Settings};
pub use input::driver::{DriverHandle, DriverId, InputDriver, NullDriver, ProbedDevice, RawKeyEvent};
pub use input::driver_table::DriverTable;
pub use reader::{KeyEvent, KeyReader, MenuKeys};
pub use registry::{Device, DeviceId, DeviceRegistry};

//! Binding configuration
//!
//! A [`ConfigBinder`] session applies persisted binds onto the registry;
//! [`Settings`] is the JSON file the binary keeps them in.

pub mod binder;
pub mod settings;

pub use binder::ConfigBinder;
pub use settings::{DeviceBindings, Settings};

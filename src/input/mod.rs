//! Input drivers and key naming

pub mod device_detection;
pub mod driver;
pub mod driver_table;
#[cfg(unix)]
pub mod evdev_driver;
pub mod keys;

#[cfg(test)]
pub(crate) mod mock;

//! BLE device discovery and GATT characteristic access through BlueZ.
//!
//! [`BluezBackend`] enumerates the `org.bluez.Device1` objects the daemon
//! manages and turns each into a [`BluezDevice`], which reads and writes
//! characteristics by UUID once their object paths have been bound.

pub mod backend;
pub mod bluez_device;
pub mod bus;
pub mod bus_zbus;
pub mod config;
pub mod device;
pub mod error;

pub use backend::{BluezBackend, DeviceListener};
pub use bluez_device::{BluezDevice, InstanceId, InstanceIdMatch, Modalias};
pub use bus_zbus::SystemBus;
pub use config::{BackendConfig, Reconcile};
pub use device::{BleDevice, BleDeviceInfo};
pub use error::{Error, Result};

//! The remote-procedure channel to the Bluetooth management service.
//!
//! The core only talks to BlueZ through these traits; `bus_zbus` implements
//! them on the system bus and the test stub implements them in memory.

use std::collections::HashMap;

use crate::error::TransportError;

pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// A decoded property value; only the shapes the core consumes are kept
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Str(String),
    ObjectPath(String),
    Bool(bool),
    Other,
}

impl PropertyValue {
    /// Strings and object paths both read as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(s) | PropertyValue::ObjectPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_owned())
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

/// property name -> value
pub type Properties = HashMap<String, PropertyValue>;
/// interface name -> properties
pub type Interfaces = HashMap<String, Properties>;
/// object path -> interfaces
pub type ManagedObjects = HashMap<String, Interfaces>;

/// Options dictionary of ReadValue / WriteValue
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct GattOptions {
    pub offset: u16,
}

/// Connection to the management service
pub trait BluezBus: Clone {
    type ObjectManager: ObjectManager;
    type Characteristic: GattCharacteristic;

    /// Proxy for the object manager at the service root
    async fn object_manager(&self) -> Result<Self::ObjectManager, TransportError>;
    /// Proxy for the characteristic at `path`, released when dropped
    async fn characteristic(&self, path: &str) -> Result<Self::Characteristic, TransportError>;
}

pub trait ObjectManager {
    async fn get_managed_objects(&self) -> Result<ManagedObjects, TransportError>;
}

pub trait GattCharacteristic {
    async fn read_value(&self, options: GattOptions) -> Result<Vec<u8>, TransportError>;
    async fn write_value(&self, value: &[u8], options: GattOptions) -> Result<(), TransportError>;
}

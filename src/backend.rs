use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::timeout;

use crate::bluez_device::BluezDevice;
use crate::bus::{BluezBus, DEVICE_INTERFACE, ObjectManager, Properties, PropertyValue};
use crate::bus_zbus::SystemBus;
use crate::config::{BackendConfig, Reconcile};
use crate::device::BleDevice;
use crate::error::{DiscoveryPhase, Error, RemoteDetail, Result, TransportError};

/// Receives the devices a backend registers and forgets
pub trait DeviceListener<B: BluezBus> {
    fn device_added(&mut self, device: &BluezDevice<B>);

    fn device_removed(&mut self, _address: &str) {}
}

/// Enumerates the BLE devices known to BlueZ
///
/// Devices are owned by the backend and keyed by address; callers borrow
/// them through [`BluezBackend::device`] and [`BluezBackend::device_mut`].
pub struct BluezBackend<B: BluezBus> {
    config: BackendConfig,
    bus: Option<B>,
    devices: BTreeMap<String, BluezDevice<B>>,
    listeners: Vec<Box<dyn DeviceListener<B>>>,
}

impl BluezBackend<SystemBus> {
    /// Connect to the system bus
    pub async fn setup(&mut self) -> Result<()> {
        self.setup_with(SystemBus::connect()).await
    }
}

impl<B: BluezBus> BluezBackend<B> {
    pub fn new(config: BackendConfig) -> Self {
        BluezBackend {
            config,
            bus: None,
            devices: BTreeMap::new(),
            listeners: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        "bluez"
    }

    pub fn add_listener(&mut self, listener: impl DeviceListener<B> + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Establish the connection used by every later call, replacing any previous one
    pub async fn setup_with(&mut self, connect: impl Future<Output = std::result::Result<B, TransportError>>) -> Result<()> {
        self.teardown();
        let bus = connect.await.map_err(|e| Error::ConnectionFailed(e.0))?;
        self.bus = Some(bus);
        Ok(())
    }

    /// Drop the device table and release the connection
    pub fn teardown(&mut self) {
        self.devices.clear();
        self.bus = None;
    }

    pub fn is_set_up(&self) -> bool {
        self.bus.is_some()
    }

    pub fn device(&self, address: &str) -> Option<&BluezDevice<B>> {
        self.devices.get(address)
    }

    pub fn device_mut(&mut self, address: &str) -> Option<&mut BluezDevice<B>> {
        self.devices.get_mut(address)
    }

    /// Registered devices, ordered by address
    pub fn devices(&self) -> impl Iterator<Item = &BluezDevice<B>> {
        self.devices.values()
    }

    async fn enumerate_call<T>(
        limit: Duration,
        phase: DiscoveryPhase,
        fut: impl Future<Output = std::result::Result<T, TransportError>>,
    ) -> Result<T> {
        match timeout(limit, fut).await {
            Ok(res) => res.map_err(|e| Error::discovery(phase, e)),
            Err(_) => Err(Error::discovery(phase, RemoteDetail::Timeout(limit))),
        }
    }

    /// Register every `org.bluez.Device1` object BlueZ currently manages
    pub async fn coldplug(&mut self) -> Result<()> {
        let bus = self.bus.clone().ok_or_else(|| {
            Error::discovery(DiscoveryPhase::NotSetUp, TransportError::new("no system bus connection"))
        })?;
        let limit = self.config.enumerate_timeout;
        let manager = Self::enumerate_call(limit, DiscoveryPhase::Connect, bus.object_manager()).await?;
        let objects =
            Self::enumerate_call(limit, DiscoveryPhase::GetManagedObjects, manager.get_managed_objects()).await?;

        let objects: BTreeMap<_, _> = objects.into_iter().collect();
        let mut seen = BTreeSet::new();
        for (path, interfaces) in objects {
            let Some(properties) = interfaces.get(DEVICE_INTERFACE) else {
                continue;
            };
            if self.config.verbose {
                info!("{path}:");
            }
            let dev = load_device_properties(bus.clone(), &self.config, properties);
            let Some(address) = dev.address().map(str::to_owned) else {
                warn!("ignoring {path}: no Address property");
                continue;
            };
            if self.config.verbose {
                let mut dump = String::new();
                dev.describe(1, &mut dump);
                info!("adding device {address}:\n{dump}");
            }
            self.devices.insert(address.clone(), dev);
            seen.insert(address.clone());
            let dev = &self.devices[&address];
            for listener in &mut self.listeners {
                listener.device_added(dev);
            }
        }

        if self.config.reconcile == Reconcile::Replace {
            let stale: Vec<String> = self.devices.keys().filter(|a| !seen.contains(*a)).cloned().collect();
            for address in stale {
                debug!("removing device {address}");
                self.devices.remove(&address);
                for listener in &mut self.listeners {
                    listener.device_removed(&address);
                }
            }
        }
        Ok(())
    }

    /// Run a complete coldplug pass again
    pub async fn recoldplug(&mut self) -> Result<()> {
        self.coldplug().await
    }
}

/// Apply one `org.bluez.Device1` property; false when unknown or mistyped
fn apply_property<B: BluezBus>(dev: &mut BluezDevice<B>, key: &str, value: &PropertyValue) -> bool {
    match key {
        "Address" => value.as_str().map(|v| dev.set_address(v)).is_some(),
        "Adapter" => value.as_str().map(|v| dev.set_adapter(v)).is_some(),
        "Name" => value.as_str().map(|v| dev.set_name(v)).is_some(),
        "Icon" => value.as_str().map(|v| dev.add_icon(v)).is_some(),
        "Modalias" => value.as_str().map(|v| dev.set_modalias(v)).is_some(),
        "Connected" => value
            .as_bool()
            .map(|connected| {
                if connected {
                    dev.set_connected(true)
                }
            })
            .is_some(),
        _ => false,
    }
}

/// Build a device from the `a{sv}` properties of an `org.bluez.Device1` object
fn load_device_properties<B: BluezBus>(bus: B, config: &BackendConfig, properties: &Properties) -> BluezDevice<B> {
    let mut dev = BluezDevice::new(bus).with_timeout(config.gatt_timeout);
    let properties: BTreeMap<_, _> = properties.iter().collect();
    for (key, value) in properties {
        let applied = apply_property(&mut dev, key, value);
        if config.verbose {
            info!("  {key}: {value:?}{}", if applied { "" } else { " (ignored)" });
        }
    }
    dev
}

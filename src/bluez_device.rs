use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::timeout;
use uuid::Uuid;

use crate::bus::{BluezBus, GattCharacteristic, GattOptions};
use crate::config::DEFAULT_GATT_TIMEOUT;
use crate::device::{BleDevice, BleDeviceInfo, append_kv};
use crate::error::{Error, GattPhase, RemoteDetail, Result, TransportError};

/// How an instance ID may be used when matching
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InstanceIdMatch {
    /// Identifies the device and selects quirks
    Device,
    /// Only selects quirks, never used to identify the device
    QuirksOnly,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InstanceId {
    pub id: String,
    pub kind: InstanceIdMatch,
}

/// Bus and numeric identifiers decoded from a modalias
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Modalias {
    pub subsystem: &'static str,
    pub vid: u16,
    pub pid: u16,
    pub rev: u16,
}

/// Parse 4 hex digits at `offset`, zero when absent or malformed
fn parse_u16_at(s: &str, offset: usize) -> u16 {
    s.get(offset..offset + 4)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_hexdigit()))
        .and_then(|digits| u16::from_str_radix(digits, 16).ok())
        .unwrap_or(0)
}

impl Modalias {
    /// `usb:v0461p4EEFd0001` or `bluetooth:v000ApFFFFdFFFF`; other buses yield `None`
    pub fn parse(modalias: &str) -> Option<Self> {
        let (subsystem, offsets) = if modalias.starts_with("usb:") {
            ("USB", [5, 10, 15])
        } else if modalias.starts_with("bluetooth:") {
            ("BLE", [11, 16, 21])
        } else {
            return None;
        };
        let [vid, pid, rev] = offsets.map(|o| parse_u16_at(modalias, o));
        Some(Modalias { subsystem, vid, pid, rev })
    }

    /// Most specific first; identifiers needing a zero field are left out
    pub fn instance_ids(&self) -> Vec<InstanceId> {
        let Modalias { subsystem, vid, pid, rev } = *self;
        let mut ids = Vec::new();
        if vid != 0 && pid != 0 && rev != 0 {
            ids.push(InstanceId {
                id: format!("{subsystem}\\VID_{vid:04X}&PID_{pid:04X}&REV_{rev:04X}"),
                kind: InstanceIdMatch::Device,
            });
        }
        if vid != 0 && pid != 0 {
            ids.push(InstanceId {
                id: format!("{subsystem}\\VID_{vid:04X}&PID_{pid:04X}"),
                kind: InstanceIdMatch::Device,
            });
        }
        if vid != 0 {
            ids.push(InstanceId {
                id: format!("{subsystem}\\VID_{vid:04X}"),
                kind: InstanceIdMatch::QuirksOnly,
            });
        }
        ids
    }

    pub fn vendor_id(&self) -> Option<String> {
        (self.vid != 0).then(|| format!("{}:{:04X}", self.subsystem, self.vid))
    }
}

/// A BLE device reached through BlueZ, with characteristics addressed by UUID
pub struct BluezDevice<B: BluezBus> {
    bus: B,
    info: BleDeviceInfo,
    timeout: Duration,
    uuid_paths: BTreeMap<Uuid, String>,
    connected: bool,
    instance_ids: Vec<InstanceId>,
    vendor_ids: Vec<String>,
    icons: Vec<String>,
}

impl<B: BluezBus> BluezDevice<B> {
    pub fn new(bus: B) -> Self {
        BluezDevice {
            bus,
            info: BleDeviceInfo::default(),
            timeout: DEFAULT_GATT_TIMEOUT,
            uuid_paths: BTreeMap::new(),
            connected: false,
            instance_ids: Vec::new(),
            vendor_ids: Vec::new(),
            icons: Vec::new(),
        }
    }

    /// Bound on each GATT proxy construction and call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind the characteristic `uuid` to the object at `path`, e.g.
    /// `/org/bluez/hci0/dev_F2_EC_98_FF_03_C6/service0010/char0011`
    pub fn add_uuid_path(&mut self, uuid: Uuid, path: &str) {
        assert!(!path.is_empty(), "characteristic path must not be empty");
        self.uuid_paths.insert(uuid, path.to_owned());
    }

    pub fn uuid_paths(&self) -> impl Iterator<Item = (&Uuid, &str)> {
        self.uuid_paths.iter().map(|(uuid, path)| (uuid, path.as_str()))
    }

    pub fn name(&self) -> Option<&str> {
        self.info.name()
    }

    pub fn set_name(&mut self, name: &str) {
        self.info.set_name(name)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn icons(&self) -> &[String] {
        &self.icons
    }

    pub fn add_icon(&mut self, icon: &str) {
        if !self.icons.iter().any(|i| i == icon) {
            self.icons.push(icon.to_owned());
        }
    }

    pub fn instance_ids(&self) -> &[InstanceId] {
        &self.instance_ids
    }

    pub fn vendor_ids(&self) -> &[String] {
        &self.vendor_ids
    }

    /// Derive instance IDs and the vendor ID from the modalias
    pub fn set_modalias(&mut self, modalias: &str) {
        let Some(parsed) = Modalias::parse(modalias) else {
            debug!("ignoring modalias {modalias}");
            return;
        };
        for id in parsed.instance_ids() {
            if !self.instance_ids.contains(&id) {
                self.instance_ids.push(id);
            }
        }
        if let Some(vendor_id) = parsed.vendor_id() {
            if !self.vendor_ids.contains(&vendor_id) {
                self.vendor_ids.push(vendor_id);
            }
        }
    }

    fn path(&self, uuid: Uuid) -> Result<&str> {
        self.uuid_paths.get(&uuid).map(String::as_str).ok_or(Error::NotSupported(uuid))
    }

    async fn call<T>(&self, phase: GattPhase, fut: impl Future<Output = std::result::Result<T, TransportError>>) -> Result<T> {
        match timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| Error::remote(phase, e)),
            Err(_) => Err(Error::remote(phase, RemoteDetail::Timeout(self.timeout))),
        }
    }
}

impl<B: BluezBus> BleDevice for BluezDevice<B> {
    fn info(&self) -> &BleDeviceInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut BleDeviceInfo {
        &mut self.info
    }

    async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let path = self.path(uuid)?;
        debug!("ReadValue {uuid} at {path}");
        let proxy = self.call(GattPhase::Connect, self.bus.characteristic(path)).await?;
        let buf = self.call(GattPhase::Read, proxy.read_value(GattOptions { offset: 0 })).await?;
        debug!("ReadValue {uuid}: {buf:x?}");
        Ok(buf)
    }

    async fn write(&self, uuid: Uuid, data: &[u8]) -> Result<()> {
        let path = self.path(uuid)?;
        debug!("WriteValue {uuid} at {path}: {data:x?}");
        let proxy = self.call(GattPhase::Connect, self.bus.characteristic(path)).await?;
        self.call(GattPhase::Write, proxy.write_value(data, GattOptions { offset: 0 })).await
    }

    fn describe(&self, idt: usize, out: &mut String) {
        self.info.describe(idt, out);
        if self.connected {
            append_kv(out, idt, "Connected", "true");
        }
        for icon in &self.icons {
            append_kv(out, idt, "Icon", icon);
        }
        for vendor_id in &self.vendor_ids {
            append_kv(out, idt, "VendorId", vendor_id);
        }
        for instance_id in &self.instance_ids {
            let key = match instance_id.kind {
                InstanceIdMatch::Device => "InstanceId",
                InstanceIdMatch::QuirksOnly => "InstanceIdQuirks",
            };
            append_kv(out, idt, key, &instance_id.id);
        }
        for (uuid, path) in self.uuid_paths() {
            append_kv(out, idt + 1, &uuid.to_string(), path);
        }
    }
}

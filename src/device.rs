use std::fmt::Write as _;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Column the values of [`append_kv`] are aligned to
const KV_ALIGN: usize = 24;

/// Appends an aligned `key: value` line, indented two spaces per level
pub fn append_kv(out: &mut String, idt: usize, key: &str, value: &str) {
    let indent = idt * 2;
    let _ = write!(out, "{:indent$}{}:", "", key);
    let used = indent + key.len() + 1;
    let _ = writeln!(out, "{:pad$}{}", "", value, pad = KV_ALIGN.saturating_sub(used).max(1));
}

/// Identity shared by every BLE device, whatever transport reaches it
#[derive(Debug, Clone, Default)]
pub struct BleDeviceInfo {
    name: Option<String>,
    address: Option<String>,
    adapter: Option<String>,
    changes: u64,
}

impl BleDeviceInfo {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: &str) {
        Self::update(&mut self.name, &mut self.changes, name);
    }

    /// e.g. `F2:EC:98:FF:03:C6`
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn set_address(&mut self, address: &str) {
        Self::update(&mut self.address, &mut self.changes, address);
    }

    /// e.g. `/org/bluez/hci0`
    pub fn adapter(&self) -> Option<&str> {
        self.adapter.as_deref()
    }

    pub fn set_adapter(&mut self, adapter: &str) {
        Self::update(&mut self.adapter, &mut self.changes, adapter);
    }

    /// Number of setter calls that actually changed a field
    pub fn changes(&self) -> u64 {
        self.changes
    }

    fn update(field: &mut Option<String>, changes: &mut u64, value: &str) {
        // not changed
        if field.as_deref() == Some(value) {
            return;
        }
        *field = Some(value.to_owned());
        *changes += 1;
    }

    pub fn describe(&self, idt: usize, out: &mut String) {
        if let Some(name) = &self.name {
            append_kv(out, idt, "Name", name);
        }
        if let Some(address) = &self.address {
            append_kv(out, idt, "Address", address);
        }
        if let Some(adapter) = &self.adapter {
            append_kv(out, idt, "Adapter", adapter);
        }
    }
}

/// BLE device transport interface
///
/// Implementors provide the characteristic accessors they support; the
/// defaults report the operation as unsupported.
pub trait BleDevice {
    fn info(&self) -> &BleDeviceInfo;
    fn info_mut(&mut self) -> &mut BleDeviceInfo;

    fn address(&self) -> Option<&str> {
        self.info().address()
    }

    fn set_address(&mut self, address: &str) {
        self.info_mut().set_address(address)
    }

    fn adapter(&self) -> Option<&str> {
        self.info().adapter()
    }

    fn set_adapter(&mut self, adapter: &str) {
        self.info_mut().set_adapter(adapter)
    }

    /// Read the value of the characteristic
    async fn read(&self, _uuid: Uuid) -> Result<Vec<u8>> {
        Err(Error::UnsupportedOperation("read"))
    }

    /// Read the value of the characteristic as raw characters, one per byte
    async fn read_string(&self, uuid: Uuid) -> Result<String> {
        let buf = self.read(uuid).await?;
        Ok(buf.into_iter().map(char::from).collect())
    }

    /// Write the value of the characteristic
    async fn write(&self, _uuid: Uuid, _data: &[u8]) -> Result<()> {
        Err(Error::UnsupportedOperation("write"))
    }

    /// Append the human-readable dump of the device to `out`
    fn describe(&self, idt: usize, out: &mut String) {
        self.info().describe(idt, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Bare {
        info: BleDeviceInfo,
    }

    impl BleDevice for Bare {
        fn info(&self) -> &BleDeviceInfo {
            &self.info
        }

        fn info_mut(&mut self) -> &mut BleDeviceInfo {
            &mut self.info
        }
    }

    /// Answers every read with a fixed value
    struct Fixed {
        info: BleDeviceInfo,
        value: Vec<u8>,
    }

    impl BleDevice for Fixed {
        fn info(&self) -> &BleDeviceInfo {
            &self.info
        }

        fn info_mut(&mut self) -> &mut BleDeviceInfo {
            &mut self.info
        }

        async fn read(&self, _uuid: Uuid) -> Result<Vec<u8>> {
            Ok(self.value.clone())
        }
    }

    const UUID: Uuid = Uuid::from_u128(0x00cde35c_7062_11eb_9439_0242ac130002);

    #[test]
    fn setters_only_count_real_changes() {
        let mut dev = Bare::default();
        dev.set_address("F2:EC:98:FF:03:C6");
        dev.set_address("F2:EC:98:FF:03:C6");
        assert_eq!(dev.address(), Some("F2:EC:98:FF:03:C6"));
        assert_eq!(dev.info().changes(), 1);

        dev.set_adapter("/org/bluez/hci0");
        dev.set_adapter("/org/bluez/hci0");
        dev.set_adapter("/org/bluez/hci1");
        assert_eq!(dev.adapter(), Some("/org/bluez/hci1"));
        assert_eq!(dev.info().changes(), 3);
    }

    #[test]
    fn address_roundtrip() {
        for addr in ["00:00:00:00:00:00", "AB:CD:EF:01:23:45", "FF:FF:FF:FF:FF:FF"] {
            let mut dev = Bare::default();
            dev.set_address(addr);
            assert_eq!(dev.address(), Some(addr));
        }
    }

    #[tokio::test]
    async fn unimplemented_operations_are_unsupported() {
        let dev = Bare::default();
        assert_eq!(dev.read(UUID).await, Err(Error::UnsupportedOperation("read")));
        assert_eq!(dev.read_string(UUID).await, Err(Error::UnsupportedOperation("read")));
        assert_eq!(dev.write(UUID, &[0x01]).await, Err(Error::UnsupportedOperation("write")));
    }

    #[tokio::test]
    async fn read_string_keeps_raw_bytes() {
        let mut dev = Fixed { info: BleDeviceInfo::default(), value: b"fw 1.2".to_vec() };
        assert_eq!(dev.read_string(UUID).await.unwrap(), "fw 1.2");

        dev.value = vec![];
        assert_eq!(dev.read_string(UUID).await.unwrap(), "");

        dev.value = vec![0x41, 0xe9];
        assert_eq!(dev.read_string(UUID).await.unwrap(), "A\u{e9}");
    }

    #[test]
    fn describe_lists_known_fields() {
        let mut dev = Bare::default();
        dev.info_mut().set_name("Pixart Dongle");
        dev.set_address("F2:EC:98:FF:03:C6");
        let mut out = String::new();
        dev.describe(1, &mut out);
        assert_eq!(
            out,
            "  Name:                 Pixart Dongle\n  Address:              F2:EC:98:FF:03:C6\n"
        );
    }
}

//! BlueZ over the system D-Bus, using zbus proxies.

use std::collections::HashMap;

use zbus::proxy;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::bus::{
    BLUEZ_SERVICE, BluezBus, GattCharacteristic, GattOptions, Interfaces, ManagedObjects, ObjectManager, Properties,
    PropertyValue,
};
use crate::error::TransportError;

#[proxy(
    interface = "org.freedesktop.DBus.ObjectManager",
    default_service = "org.bluez",
    default_path = "/",
    gen_blocking = false
)]
trait BluezObjectManager {
    /// `{ object_path: { interface_name: { property: value } } }`
    fn get_managed_objects(
        &self,
    ) -> zbus::Result<HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>>;
}

#[proxy(
    interface = "org.bluez.GattCharacteristic1",
    default_service = "org.bluez",
    gen_blocking = false
)]
trait GattCharacteristic1 {
    fn read_value(&self, options: HashMap<&str, Value<'_>>) -> zbus::Result<Vec<u8>>;

    fn write_value(&self, value: &[u8], options: HashMap<&str, Value<'_>>) -> zbus::Result<()>;
}

/// Shared system bus connection; clones refer to the same connection
#[derive(Clone)]
pub struct SystemBus {
    conn: zbus::Connection,
}

impl SystemBus {
    pub async fn connect() -> Result<Self, TransportError> {
        let conn = zbus::Connection::system().await?;
        Ok(SystemBus { conn })
    }
}

fn options_dict(options: GattOptions) -> HashMap<&'static str, Value<'static>> {
    HashMap::from([("offset", Value::U16(options.offset))])
}

fn decode_value(value: &Value<'_>) -> PropertyValue {
    match value {
        Value::Str(s) => PropertyValue::Str(s.to_string()),
        Value::ObjectPath(p) => PropertyValue::ObjectPath(p.to_string()),
        Value::Bool(b) => PropertyValue::Bool(*b),
        Value::Value(inner) => decode_value(inner),
        _ => PropertyValue::Other,
    }
}

pub struct SystemObjectManager {
    proxy: BluezObjectManagerProxy<'static>,
}

pub struct SystemCharacteristic {
    proxy: GattCharacteristic1Proxy<'static>,
}

impl BluezBus for SystemBus {
    type ObjectManager = SystemObjectManager;
    type Characteristic = SystemCharacteristic;

    async fn object_manager(&self) -> Result<SystemObjectManager, TransportError> {
        let proxy = BluezObjectManagerProxy::new(&self.conn).await?;
        Ok(SystemObjectManager { proxy })
    }

    async fn characteristic(&self, path: &str) -> Result<SystemCharacteristic, TransportError> {
        let proxy = GattCharacteristic1Proxy::builder(&self.conn)
            .destination(BLUEZ_SERVICE)?
            .path(path.to_owned())?
            .build()
            .await?;
        Ok(SystemCharacteristic { proxy })
    }
}

impl ObjectManager for SystemObjectManager {
    async fn get_managed_objects(&self) -> Result<ManagedObjects, TransportError> {
        let tree = self.proxy.get_managed_objects().await?;
        Ok(tree
            .into_iter()
            .map(|(path, interfaces)| {
                let interfaces: Interfaces = interfaces
                    .into_iter()
                    .map(|(name, props)| {
                        let props: Properties = props.iter().map(|(k, v)| (k.clone(), decode_value(v))).collect();
                        (name, props)
                    })
                    .collect();
                (path.to_string(), interfaces)
            })
            .collect())
    }
}

impl GattCharacteristic for SystemCharacteristic {
    async fn read_value(&self, options: GattOptions) -> Result<Vec<u8>, TransportError> {
        Ok(self.proxy.read_value(options_dict(options)).await?)
    }

    async fn write_value(&self, value: &[u8], options: GattOptions) -> Result<(), TransportError> {
        Ok(self.proxy.write_value(value, options_dict(options)).await?)
    }
}

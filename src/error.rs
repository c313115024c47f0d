use std::fmt;
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

/// Step of a GATT characteristic call that failed
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GattPhase {
    Connect,
    Read,
    Write,
}

impl fmt::Display for GattPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GattPhase::Connect => "failed to connect",
            GattPhase::Read => "failed to read",
            GattPhase::Write => "failed to write",
        };
        f.write_str(s)
    }
}

/// Step of a coldplug enumeration that failed
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DiscoveryPhase {
    NotSetUp,
    Connect,
    GetManagedObjects,
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscoveryPhase::NotSetUp => "backend is not set up",
            DiscoveryPhase::Connect => "failed to connect to bluez dbus",
            DiscoveryPhase::GetManagedObjects => "failed to call GetManagedObjects",
        };
        f.write_str(s)
    }
}

/// What went wrong on the remote side of a call
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RemoteDetail {
    Transport(String),
    Timeout(Duration),
}

impl fmt::Display for RemoteDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteDetail::Transport(msg) => f.write_str(msg),
            RemoteDetail::Timeout(d) => write!(f, "timed out after {} ms", d.as_millis()),
        }
    }
}

/// Error message carried up from the bus implementation
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        TransportError(msg.into())
    }
}

impl From<zbus::Error> for TransportError {
    fn from(e: zbus::Error) -> Self {
        TransportError(e.to_string())
    }
}

impl From<zbus::fdo::Error> for TransportError {
    fn from(e: zbus::fdo::Error) -> Self {
        TransportError(e.to_string())
    }
}

impl From<TransportError> for RemoteDetail {
    fn from(e: TransportError) -> Self {
        RemoteDetail::Transport(e.0)
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Error {
    #[error("{0} not supported")]
    UnsupportedOperation(&'static str),
    #[error("UUID {0} not supported")]
    NotSupported(Uuid),
    #[error("{phase} GattCharacteristic1: {detail}")]
    RemoteCallFailed { phase: GattPhase, detail: RemoteDetail },
    #[error("failed to connect to the system bus: {0}")]
    ConnectionFailed(String),
    #[error("{phase}: {detail}")]
    DiscoveryFailed { phase: DiscoveryPhase, detail: RemoteDetail },
}

impl Error {
    pub(crate) fn remote(phase: GattPhase, detail: impl Into<RemoteDetail>) -> Self {
        Error::RemoteCallFailed { phase, detail: detail.into() }
    }

    pub(crate) fn discovery(phase: DiscoveryPhase, detail: impl Into<RemoteDetail>) -> Self {
        Error::DiscoveryFailed { phase, detail: detail.into() }
    }

    /// True when a remote call was abandoned because its timeout elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::RemoteCallFailed { detail: RemoteDetail::Timeout(_), .. }
                | Error::DiscoveryFailed { detail: RemoteDetail::Timeout(_), .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failed_step() {
        let err = Error::remote(GattPhase::Read, TransportError::new("org.bluez.Error.Failed: Not connected"));
        assert_eq!(
            err.to_string(),
            "failed to read GattCharacteristic1: org.bluez.Error.Failed: Not connected"
        );

        let err = Error::discovery(DiscoveryPhase::GetManagedObjects, RemoteDetail::Timeout(Duration::from_millis(25000)));
        assert_eq!(err.to_string(), "failed to call GetManagedObjects: timed out after 25000 ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn not_supported_mentions_uuid() {
        let uuid = Uuid::from_u128(0x00cde35c_7062_11eb_9439_0242ac130002);
        assert_eq!(
            Error::NotSupported(uuid).to_string(),
            "UUID 00cde35c-7062-11eb-9439-0242ac130002 not supported"
        );
        assert!(!Error::NotSupported(uuid).is_timeout());
    }
}

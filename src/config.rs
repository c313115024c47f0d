use std::time::Duration;

/// Environment variable enabling per-property and per-device dumps
pub const VERBOSE_ENV: &str = "FWUPD_BLUEZ_VERBOSE";

/// Bound on each GATT proxy construction and ReadValue/WriteValue call
pub const DEFAULT_GATT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Bound on the GetManagedObjects enumeration (the D-Bus default reply timeout)
pub const DEFAULT_ENUMERATE_TIMEOUT: Duration = Duration::from_millis(25000);

/// What a repeated coldplug does with devices it no longer sees
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Reconcile {
    /// Evict table entries whose address was not reported by the newest pass
    #[default]
    Replace,
    /// Keep every device ever seen, refreshing the ones reported again
    Merge,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub gatt_timeout: Duration,
    pub enumerate_timeout: Duration,
    pub reconcile: Reconcile,
    pub verbose: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            gatt_timeout: DEFAULT_GATT_TIMEOUT,
            enumerate_timeout: DEFAULT_ENUMERATE_TIMEOUT,
            reconcile: Reconcile::default(),
            verbose: false,
        }
    }
}

impl BackendConfig {
    /// Defaults, with `verbose` taken from [`VERBOSE_ENV`]
    pub fn from_env() -> Self {
        BackendConfig {
            verbose: std::env::var_os(VERBOSE_ENV).is_some(),
            ..Default::default()
        }
    }
}

use anyhow::{Context, Result, anyhow};
use bluez_ble::{BackendConfig, BleDevice, BluezBackend, BluezDevice, InstanceIdMatch, SystemBus};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use std::time::Duration;
use uuid::Uuid;

/// Enumerate BlueZ BLE devices and access their GATT characteristics
#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// GATT call timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Device enumeration timeout in milliseconds
    #[arg(long, default_value_t = 25000)]
    enumerate_timeout_ms: u64,

    /// Dump every decoded property and device
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the BLE devices known to BlueZ
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read a characteristic
    Read {
        /// Device address, e.g. F2:EC:98:FF:03:C6
        address: String,
        /// Characteristic UUID
        uuid: Uuid,
        /// Characteristic object path
        path: String,
        /// Print the value as a string instead of hex
        #[arg(long)]
        string: bool,
    },
    /// Write a characteristic
    Write {
        /// Device address, e.g. F2:EC:98:FF:03:C6
        address: String,
        /// Characteristic UUID
        uuid: Uuid,
        /// Characteristic object path
        path: String,
        /// Value as hex, e.g. 0102ff
        data: String,
    },
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    anyhow::ensure!(s.len() % 2 == 0 && s.is_ascii(), "invalid hex value `{}`", s);
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).with_context(|| format!("invalid hex value `{}`", s)))
        .collect()
}

/// Default log filter; verbose dumps are logged at info
fn log_filter(config: &BackendConfig) -> &'static str {
    if config.verbose { "debug" } else { "warn" }
}

fn device_json(dev: &BluezDevice<SystemBus>) -> serde_json::Value {
    let instance_ids: Vec<_> = dev
        .instance_ids()
        .iter()
        .map(|i| serde_json::json!({ "id": i.id, "quirks_only": i.kind == InstanceIdMatch::QuirksOnly }))
        .collect();
    let uuid_paths: serde_json::Map<String, serde_json::Value> = dev
        .uuid_paths()
        .map(|(uuid, path)| (uuid.to_string(), serde_json::Value::from(path)))
        .collect();
    serde_json::json!({
        "address": dev.address(),
        "name": dev.name(),
        "adapter": dev.adapter(),
        "connected": dev.is_connected(),
        "icons": dev.icons(),
        "vendor_ids": dev.vendor_ids(),
        "instance_ids": instance_ids,
        "uuid_paths": uuid_paths,
    })
}

async fn enumerate(config: BackendConfig) -> Result<BluezBackend<SystemBus>> {
    let mut backend = BluezBackend::new(config);
    backend.setup().await?;

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(64));
    pb.set_message("Enumerating BlueZ devices...");
    backend.coldplug().await.context("Enumeration failed")?;
    pb.finish_and_clear();
    Ok(backend)
}

fn bind<'a>(
    backend: &'a mut BluezBackend<SystemBus>,
    address: &str,
    uuid: Uuid,
    path: &str,
) -> Result<&'a mut BluezDevice<SystemBus>> {
    let dev = backend
        .device_mut(address)
        .ok_or_else(|| anyhow!("device `{}` not found", address))?;
    dev.add_uuid_path(uuid, path);
    Ok(dev)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = BackendConfig::from_env();
    config.gatt_timeout = Duration::from_millis(args.timeout_ms);
    config.enumerate_timeout = Duration::from_millis(args.enumerate_timeout_ms);
    config.verbose |= args.verbose;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_filter(&config))).init();

    let mut backend = enumerate(config).await?;
    match &args.command {
        Commands::List { json } => {
            if *json {
                let devices: Vec<_> = backend.devices().map(device_json).collect();
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else {
                for dev in backend.devices() {
                    let mut out = String::new();
                    dev.describe(1, &mut out);
                    println!("{}:\n{}", dev.address().unwrap_or_default(), out);
                }
            }
        }
        Commands::Read { address, uuid, path, string } => {
            let dev = bind(&mut backend, address, *uuid, path)?;
            if *string {
                println!("{}", dev.read_string(*uuid).await?);
            } else {
                let value = dev.read(*uuid).await?;
                println!("{}", value.iter().map(|b| format!("{:02x}", b)).collect::<String>());
            }
        }
        Commands::Write { address, uuid, path, data } => {
            let value = parse_hex(data)?;
            let dev = bind(&mut backend, address, *uuid, path)?;
            dev.write(*uuid, &value).await?;
        }
    }
    Ok(())
}

use anyhow::{Context, Result, bail};
use clap::Parser;
use fleetwatch::{Device, Monitor, MonitorConfig};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{error, info, warn};

mod api;
mod cli;
mod config;
mod emitter;
mod factory;
mod store;
#[cfg(test)]
mod test_support;
mod validation;

use cli::Cli;
use config::{Config, Mode};
use store::{CouchStore, DeviceStore};
use validation::validate_device_address;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_config(cli.config.as_ref()).context("failed to load config")?;
    config.apply(cli.overrides());

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    logger::init_with_directive(&config.log_level);
    config.validate()?;
    info!(mode = %config.mode, system = %config.system_id, "starting fleetwatch");

    let store = CouchStore::new(
        &config.store.address,
        &config.store.username,
        &config.store.password,
        Duration::from_secs(config.store.timeout_secs),
    )?;
    let devices = load_devices(&store, &config).await?;

    let emitter = emitter::from_config(&config)?;
    let monitor = Monitor::with_emitter(
        MonitorConfig::builder()
            .jitter(config.jitter())
            .queue_capacity(config.queue_capacity)
            .max_concurrent_checks(config.max_concurrent_checks)
            .build(),
        emitter,
    );

    for checker in config.effective_checkers() {
        let built = factory::build_checker(&checker, &config)
            .with_context(|| format!("failed to build checker {}", checker.name))?;
        monitor.register_checker(&checker.name, checker.interval(), built).await?;
    }

    let registered = register_devices(&monitor, devices).await;
    info!(devices = registered, "monitoring started");

    let listen: SocketAddr = config.api.listen.parse().context("invalid status API listen address")?;
    api::serve(monitor, listen).await.context("status API failed")?;

    Ok(())
}

async fn load_devices(store: &impl DeviceStore, config: &Config) -> Result<Vec<Device>> {
    let devices = match config.mode {
        Mode::Central => store.get_all_devices().await.context("failed to load central monitoring devices")?,
        Mode::Room => {
            let Some(room) = config.room_id() else {
                bail!("system id {:?} does not name a room", config.system_id);
            };
            store.get_room_devices(&room).await.with_context(|| format!("failed to load devices of {room}"))?
        }
    };

    if devices.is_empty() {
        warn!(mode = %config.mode, "device store returned no devices");
    }
    Ok(devices)
}

/// Register every usable device, skipping the ones that can't be probed
async fn register_devices(monitor: &Monitor, devices: Vec<Device>) -> usize {
    let mut registered = 0;
    for device in devices {
        if let Some(reason) = validate_device_address(&device.address).error {
            warn!(device = %device.name, address = %device.address, "skipping device: {}", reason);
            continue;
        }

        match monitor.register_device(device).await {
            Ok(_) => registered += 1,
            Err(e) => error!("skipping device: {}", e),
        }
    }
    registered
}

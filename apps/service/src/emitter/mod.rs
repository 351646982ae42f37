/// Event sinks handed to the monitor
///
/// - `LogEmitter` only logs every event
/// - `HubEmitter` logs and forwards every event to the central event hub
pub mod hub;

pub use hub::HubEmitter;

use fleetwatch::{Event, EventEmitter};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;

/// Generating system reported when no system id is configured
pub const DEFAULT_GENERATING_SYSTEM: &str = "fleetwatch";

pub(crate) fn log_event(event: &Event) {
    info!(
        key = %event.key,
        value = %event.value,
        device = %event.device.name,
        "event"
    );
}

/// Emitter used when no event hub is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEmitter;

#[async_trait::async_trait]
impl EventEmitter for LogEmitter {
    async fn send(&self, event: Event) {
        log_event(&event);
    }
}

/// Pick the emitter matching the configuration
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn EventEmitter>> {
    if config.event_hub.address.is_empty() {
        info!("no event hub configured, events are only logged");
        return Ok(Arc::new(LogEmitter));
    }

    let generating_system = if config.system_id.is_empty() {
        DEFAULT_GENERATING_SYSTEM.to_string()
    } else {
        config.system_id.clone()
    };

    let emitter = HubEmitter::new(
        &config.event_hub.address,
        generating_system,
        Duration::from_secs(config.event_hub.timeout_secs),
    )?;
    info!(hub = %config.event_hub.address, "forwarding events to the event hub");
    Ok(Arc::new(emitter))
}

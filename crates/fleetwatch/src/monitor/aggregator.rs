use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::executor::CheckOutcome;
use super::registry::DeviceRegistry;
use crate::events::EventEmitter;

/// Spawn the single consumer of check results.
///
/// It is the only writer of per-checker results in the registry. Every event
/// is handed to the emitter on its own task so a slow sink never holds the
/// loop up. The loop ends once every sender is gone.
pub(crate) fn spawn(
    mut results: mpsc::Receiver<CheckOutcome>,
    registry: Arc<DeviceRegistry>,
    emitter: Option<Arc<dyn EventEmitter>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(CheckOutcome { device, checker, result }) = results.recv().await {
            let event = result.event.clone();

            if !registry.record(&device, &checker, result).await {
                warn!(device = %device, checker = %checker, "dropping result for unregistered device");
                continue;
            }

            if let Some(emitter) = &emitter {
                let emitter = Arc::clone(emitter);
                tokio::spawn(async move { emitter.send(event).await });
            }
        }

        debug!("result queue closed, aggregation loop finished");
    })
}

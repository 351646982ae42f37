use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use super::executor::Executor;
use super::registry::DeviceRegistry;
use crate::checker::Checker;

/// Jitter actually applied to `interval`. A window that is not smaller than
/// the interval would allow zero delays, so it is halved.
pub fn effective_jitter(interval: Duration, jitter: Duration) -> Duration {
    if jitter >= interval { interval / 2 } else { jitter }
}

/// Delay before the next fire: `interval - uniform(0, jitter)`
pub fn next_delay<R: Rng + ?Sized>(interval: Duration, jitter: Duration, rng: &mut R) -> Duration {
    let jitter = effective_jitter(interval, jitter);
    if jitter.is_zero() {
        return interval;
    }

    interval - rng.gen_range(Duration::ZERO..=jitter)
}

/// Periodic driver of one registered checker
pub(crate) struct Driver {
    pub name: String,
    pub interval: Duration,
    pub jitter: Duration,
    pub checker: Arc<dyn Checker>,
    pub registry: Arc<DeviceRegistry>,
    pub executor: Executor,
}

impl Driver {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(
            checker = %self.name,
            interval = ?self.interval,
            jitter = ?effective_jitter(self.interval, self.jitter),
            "checker driver started"
        );

        loop {
            let delay = next_delay(self.interval, self.jitter, &mut rand::thread_rng());
            sleep(delay).await;
            self.fire().await;
        }
    }

    /// Launch one check per registered device without waiting for them
    async fn fire(&self) {
        let devices = self.registry.devices().await;
        debug!(checker = %self.name, devices = devices.len(), "firing checks");

        for device in devices {
            let executor = self.executor.clone();
            let checker = Arc::clone(&self.checker);
            let name = self.name.clone();

            tokio::spawn(async move {
                executor.execute(&name, &checker, device, false).await;
            });
        }
    }
}

/// Monitor - the interval scheduler and state owner
///
/// The monitor:
/// - Keeps the device registry and the set of registered checkers
/// - Runs one periodic driver per checker, fanning a check out to every device
/// - Serialises all results through a single aggregation loop
/// - Hands every recorded result's event to the configured emitter
mod aggregator;
mod config;
mod executor;
mod registry;
mod scheduler;

pub use config::{MonitorConfig, MonitorConfigBuilder};
pub use executor::PANIC_EVENT_VALUE;
pub use registry::DeviceRegistry;
pub use scheduler::{effective_jitter, next_delay};

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::checker::Checker;
use crate::device::{Device, DeviceStatus};
use crate::error::MonitorError;
use crate::events::EventEmitter;
use crate::types::CheckResult;
use executor::Executor;
use scheduler::Driver;

struct RegisteredChecker {
    checker: Arc<dyn Checker>,
    interval: Duration,
    driver: JoinHandle<()>,
}

struct Inner {
    config: MonitorConfig,
    registry: Arc<DeviceRegistry>,
    checkers: RwLock<HashMap<String, RegisteredChecker>>,
    executor: Executor,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for registered in self.checkers.get_mut().values() {
            registered.driver.abort();
        }
    }
}

/// Handle to a running monitor.
///
/// Clones share the same registry and drivers. Dropping the last handle stops
/// every checker driver; the aggregation loop finishes once in-flight checks
/// have reported. Must be created inside a tokio runtime.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<Inner>,
}

impl Monitor {
    /// Create a monitor without an event sink
    pub fn new(config: MonitorConfig) -> Self {
        Self::build(config, None)
    }

    /// Create a monitor announcing every recorded result to `emitter`
    pub fn with_emitter(config: MonitorConfig, emitter: Arc<dyn EventEmitter>) -> Self {
        Self::build(config, Some(emitter))
    }

    fn build(config: MonitorConfig, emitter: Option<Arc<dyn EventEmitter>>) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let (result_tx, result_rx) = mpsc::channel(config.queue_capacity.max(1));

        aggregator::spawn(result_rx, registry.clone(), emitter);

        let executor = Executor::new(config.max_concurrent_checks.max(1), result_tx);

        Self {
            inner: Arc::new(Inner { config, registry, checkers: RwLock::new(HashMap::new()), executor }),
        }
    }

    /// Register `checker` under `name` and start running it every `interval`
    /// (minus jitter) against every registered device.
    pub async fn register_checker(
        &self,
        name: impl Into<String>,
        interval: Duration,
        checker: Arc<dyn Checker>,
    ) -> Result<(), MonitorError> {
        let name = name.into();
        if interval.is_zero() {
            return Err(MonitorError::InvalidInterval(name));
        }

        let mut checkers = self.inner.checkers.write().await;
        if checkers.contains_key(&name) {
            return Err(MonitorError::CheckerAlreadyRegistered(name));
        }

        let driver = Driver {
            name: name.clone(),
            interval,
            jitter: self.inner.config.jitter,
            checker: checker.clone(),
            registry: self.inner.registry.clone(),
            executor: self.inner.executor.clone(),
        }
        .spawn();

        info!(checker = %name, ?interval, "registered checker");
        checkers.insert(name, RegisteredChecker { checker, interval, driver });
        Ok(())
    }

    /// Add a device. It takes part in checks from the next fire of every checker.
    pub async fn register_device(&self, device: Device) -> Result<Arc<Device>, MonitorError> {
        let device = self.inner.registry.register(device).await?;
        debug!(device = %device.name, address = %device.address, "registered device");
        Ok(device)
    }

    /// Run every checker against `name` right now, bypassing caches.
    ///
    /// Results go through the aggregation loop like scheduled ones; the call
    /// returns once all of them have been queued.
    pub async fn force_check(&self, name: &str) -> Result<HashMap<String, CheckResult>, MonitorError> {
        let device = self
            .inner
            .registry
            .device(name)
            .await
            .ok_or_else(|| MonitorError::DeviceNotFound(name.to_string()))?;

        let checkers: Vec<(String, Arc<dyn Checker>)> = self
            .inner
            .checkers
            .read()
            .await
            .iter()
            .map(|(name, registered)| (name.clone(), registered.checker.clone()))
            .collect();

        info!(device = %device.name, checkers = checkers.len(), "forcing checks");

        let runs = checkers.into_iter().map(|(checker_name, checker)| {
            let executor = self.inner.executor.clone();
            let device = device.clone();
            async move {
                let result = executor.execute(&checker_name, &checker, device, true).await;
                (checker_name, result)
            }
        });

        Ok(join_all(runs).await.into_iter().collect())
    }

    /// Current status of `name`
    pub async fn status(&self, name: &str) -> Result<DeviceStatus, MonitorError> {
        self.inner.registry.get(name).await
    }

    /// Status of every device, ordered by name
    pub async fn statuses(&self) -> Vec<DeviceStatus> {
        self.inner.registry.all().await
    }

    /// Registered checker names with their intervals, ordered by name
    pub async fn checkers(&self) -> Vec<(String, Duration)> {
        let mut checkers: Vec<_> = self
            .inner
            .checkers
            .read()
            .await
            .iter()
            .map(|(name, registered)| (name.clone(), registered.interval))
            .collect();
        checkers.sort();
        checkers
    }

    pub async fn checker_names(&self) -> Vec<String> {
        self.checkers().await.into_iter().map(|(name, _)| name).collect()
    }

    pub async fn device_count(&self) -> usize {
        self.inner.registry.len().await
    }
}

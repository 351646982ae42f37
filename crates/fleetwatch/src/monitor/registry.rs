use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::device::{Device, DeviceStatus};
use crate::error::MonitorError;
use crate::types::CheckResult;

/// In-memory table of every registered device and its latest results.
///
/// Registration and reads may come from anywhere; per-checker results are
/// only ever written by the monitor's aggregation loop through `record`.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, DeviceStatus>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with an empty check status. Names are unique.
    pub async fn register(&self, device: Device) -> Result<Arc<Device>, MonitorError> {
        let mut devices = self.devices.write().await;
        if devices.contains_key(&device.name) {
            return Err(MonitorError::DeviceAlreadyRegistered(device.name));
        }

        let device = Arc::new(device);
        devices.insert(device.name.clone(), DeviceStatus::new(device.clone()));
        Ok(device)
    }

    /// Snapshot of a device's status
    pub async fn get(&self, name: &str) -> Result<DeviceStatus, MonitorError> {
        self.devices
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| MonitorError::DeviceNotFound(name.to_string()))
    }

    pub async fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.read().await.get(name).map(|status| status.device.clone())
    }

    /// Devices registered right now, for a fan-out
    pub async fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.read().await.values().map(|status| status.device.clone()).collect()
    }

    /// Snapshots of every device, ordered by name
    pub async fn all(&self) -> Vec<DeviceStatus> {
        let mut statuses: Vec<_> = self.devices.read().await.values().cloned().collect();
        statuses.sort_by(|a, b| a.device.name.cmp(&b.device.name));
        statuses
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Store `result` as the latest outcome of `checker` on `device`.
    /// Returns false when the device is unknown.
    pub(crate) async fn record(&self, device: &str, checker: &str, result: CheckResult) -> bool {
        match self.devices.write().await.get_mut(device) {
            Some(status) => {
                status.check_status.insert(checker.to_string(), result);
                true
            }
            None => false,
        }
    }
}

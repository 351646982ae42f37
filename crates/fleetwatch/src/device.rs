use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::CheckResult;

/// A physical device to be monitored
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name (e.g. "ITB-1101-D1")
    pub name: String,

    /// Network address the device answers on
    pub address: String,

    /// Grouping key shared with other devices in the same room
    #[serde(default)]
    pub room: Option<String>,

    /// Opaque per-checker configuration, keyed by checker name
    #[serde(default, rename = "checkerConfig")]
    pub checker_config: HashMap<String, serde_json::Value>,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self { name: name.into(), address: address.into(), ..Default::default() }
    }

    /// Set the room this device belongs to
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Attach a configuration blob for the named checker
    pub fn with_checker_config(mut self, checker: impl Into<String>, config: serde_json::Value) -> Self {
        self.checker_config.insert(checker.into(), config);
        self
    }
}

/// Point-in-time view of a device's monitoring status
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device: Arc<Device>,

    /// Latest result of every checker that has run on this device.
    /// A missing key means "not checked yet", not "failed".
    pub check_status: HashMap<String, CheckResult>,
}

impl DeviceStatus {
    pub(crate) fn new(device: Arc<Device>) -> Self {
        Self { device, check_status: HashMap::new() }
    }

    /// A device is healthy once it has been checked and every latest result passed
    pub fn healthy(&self) -> bool {
        !self.check_status.is_empty() && self.check_status.values().all(|r| r.passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn result(device: &Arc<Device>, passed: bool) -> CheckResult {
        let r = CheckResult::new(Event::new(device.clone(), "online", "Online"));
        if passed { r } else { r.failure("down", "Offline") }
    }

    #[test]
    fn test_unchecked_device_is_not_healthy() {
        let status = DeviceStatus::new(Arc::new(Device::new("a", "10.0.0.1")));
        assert!(!status.healthy());
    }

    #[test]
    fn test_healthy_requires_every_result_to_pass() {
        let device = Arc::new(Device::new("a", "10.0.0.1"));
        let mut status = DeviceStatus::new(device.clone());

        status.check_status.insert("ping".into(), result(&device, true));
        assert!(status.healthy());

        status.check_status.insert("health".into(), result(&device, false));
        assert!(!status.healthy());

        status.check_status.insert("health".into(), result(&device, true));
        assert!(status.healthy());
    }

    #[test]
    fn test_device_deserializes_store_document() {
        let raw = r#"{
            "name": "ITB-1101-D1",
            "address": "10.0.0.5",
            "room": "ITB-1101",
            "checkerConfig": {"ping": {"count": 5}}
        }"#;

        let device: Device = serde_json::from_str(raw).unwrap();
        assert_eq!(device.room.as_deref(), Some("ITB-1101"));
        assert_eq!(device.checker_config["ping"]["count"], 5);
    }
}

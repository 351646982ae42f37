use chrono::{DateTime, Utc};
use fleetwatch::{CheckResult, Device, DeviceStatus};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// One checker's latest result, as served by the status API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckView {
    pub run_time: DateTime<Utc>,
    pub passed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub key: String,
    pub value: String,
}

impl From<&CheckResult> for CheckView {
    fn from(result: &CheckResult) -> Self {
        Self {
            run_time: result.run_time.into(),
            passed: result.passed,
            message: result.message.clone(),
            error: result.error.clone(),
            key: result.event.key.clone(),
            value: result.event.value.clone(),
        }
    }
}

fn checks_of(results: &HashMap<String, CheckResult>) -> BTreeMap<String, CheckView> {
    results.iter().map(|(name, result)| (name.clone(), CheckView::from(result))).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub device: Arc<Device>,
    pub healthy: bool,
    pub checks: BTreeMap<String, CheckView>,
}

impl From<&DeviceStatus> for StatusView {
    fn from(status: &DeviceStatus) -> Self {
        Self { device: status.device.clone(), healthy: status.healthy(), checks: checks_of(&status.check_status) }
    }
}

/// Outcome of a forced check
#[derive(Debug, Clone, Serialize)]
pub struct ForcedView {
    pub device: String,
    pub passed: bool,
    pub checks: BTreeMap<String, CheckView>,
}

impl ForcedView {
    pub fn new(device: &str, results: &HashMap<String, CheckResult>) -> Self {
        Self {
            device: device.to_string(),
            passed: results.values().all(|result| result.passed),
            checks: checks_of(results),
        }
    }
}

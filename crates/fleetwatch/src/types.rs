use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

use crate::device::Device;

/// Something a completed check wants announced on the event bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Device the event is about
    pub device: Arc<Device>,

    /// Event key (e.g. "online", "responsive")
    pub key: String,

    /// Event value (e.g. "Online", "No Response")
    pub value: String,
}

impl Event {
    pub fn new(device: Arc<Device>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { device, key: key.into(), value: value.into() }
    }
}

/// Result of running one checker against one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Timestamp when the check was performed
    pub run_time: SystemTime,

    /// Whether the check passed
    pub passed: bool,

    /// Free-form description of the outcome
    pub message: String,

    /// Error description, empty when the check passed
    pub error: String,

    /// Event to announce for this outcome
    pub event: Event,
}

impl CheckResult {
    /// Create a passing result carrying the given event
    pub fn new(event: Event) -> Self {
        Self {
            run_time: SystemTime::now(),
            passed: true,
            message: String::new(),
            error: String::new(),
            event,
        }
    }

    /// Set the human readable message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Mark the check as failed with an error and a degraded event value
    pub fn failure(mut self, error: impl Into<String>, event_value: impl Into<String>) -> Self {
        self.passed = false;
        self.error = error.into();
        self.event.value = event_value.into();
        self
    }
}

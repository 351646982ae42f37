//! Monitor configuration.

use std::time::Duration;

use crate::{DEFAULT_JITTER, DEFAULT_MAX_CONCURRENT_CHECKS, DEFAULT_QUEUE_CAPACITY};

/// Tuning knobs for a [`Monitor`](super::Monitor)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Upper bound of the random amount subtracted from every checker interval
    pub jitter: Duration,

    /// Capacity of the result queue feeding the aggregation loop
    pub queue_capacity: usize,

    /// Maximum number of checks running at the same time across all checkers
    pub max_concurrent_checks: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            jitter: DEFAULT_JITTER,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

impl MonitorConfig {
    /// Create a new configuration builder
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

/// Builder for MonitorConfig
#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    config: MonitorConfig,
}

impl MonitorConfigBuilder {
    /// Build the configuration, lifting zero sizes to one
    pub fn build(mut self) -> MonitorConfig {
        self.config.queue_capacity = self.config.queue_capacity.max(1);
        self.config.max_concurrent_checks = self.config.max_concurrent_checks.max(1);
        self.config
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    pub fn max_concurrent_checks(mut self, limit: usize) -> Self {
        self.config.max_concurrent_checks = limit;
        self
    }
}

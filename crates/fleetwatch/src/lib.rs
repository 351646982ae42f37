//! FleetWatch - interval-driven health monitoring for networked devices
//!
//! This library provides the monitoring engine: pluggable checkers, a
//! jittered per-checker scheduler that fans checks out across every
//! registered device, a single-writer aggregation loop that keeps the
//! latest result per (device, checker), and a coalescing TTL cache for
//! checkers that share an expensive backend.

pub mod cache;
pub mod checker;
pub mod device;
pub mod error;
pub mod events;
pub mod monitor;
pub mod types;

// Re-export main types
pub use cache::Coalescer;
pub use checker::Checker;
pub use checker::health::{DeviceHealth, FetchError, HealthChecker, HealthSource, HttpHealthSource, RoomHealth};
pub use checker::reachability::{
    IcmpSession, ProbeError, ProbeSession, ProbeSettings, ProbeStats, ReachabilityChecker,
};
pub use device::{Device, DeviceStatus};
pub use error::MonitorError;
pub use events::EventEmitter;
pub use monitor::{DeviceRegistry, Monitor, MonitorConfig, MonitorConfigBuilder};
pub use types::{CheckResult, Event};

use std::time::Duration;

/// Default jitter window subtracted from a checker's nominal interval
pub const DEFAULT_JITTER: Duration = Duration::from_secs(30);

/// Default capacity of the result aggregation queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Default upper bound on checks running at the same time
pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 64;

/// Default lifetime of a cached backend payload
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(45);

use thiserror::Error;

/// Registration and lookup faults reported synchronously by the monitor.
///
/// Probe failures never show up here; they are recorded in the
/// [`CheckResult`](crate::CheckResult) of the check that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("checker already registered with name {0}")]
    CheckerAlreadyRegistered(String),
    #[error("device already registered with name {0}")]
    DeviceAlreadyRegistered(String),
    #[error("no device found with name {0}")]
    DeviceNotFound(String),
    #[error("checker {0} needs a non-zero interval")]
    InvalidInterval(String),
}

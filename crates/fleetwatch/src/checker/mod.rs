/// Checker contract and concrete probes
///
/// This module provides:
/// - The `Checker` trait every probe implements
/// - A network reachability checker (ICMP echo bursts)
/// - A backend health checker that reads a shared room health endpoint
pub mod health;
pub mod reachability;

use std::sync::Arc;

use crate::device::Device;
use crate::types::CheckResult;

/// Checker trait for the different kinds of device probes
///
/// Ordinary probe failures (timeouts, packet loss, bad status codes) are
/// reported through [`CheckResult::passed`] and [`CheckResult::error`], never
/// as a panic or an `Err`.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe `device`. With `force_recheck` set, any cached backend data is
    /// bypassed and a fresh probe is performed.
    async fn check(&self, device: &Arc<Device>, force_recheck: bool) -> CheckResult;

    /// Key of the events this checker emits (e.g. "online")
    fn event_key(&self) -> &str;
}

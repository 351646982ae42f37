use anyhow::{Context, Result};
use fleetwatch::{
    Checker, DEFAULT_CACHE_TTL, HealthChecker, HttpHealthSource, ProbeSettings, ReachabilityChecker,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::{CheckerConfig, CheckerKind, Config};

/// Instantiate the checker described by a `[[checkers]]` entry
pub fn build_checker(checker: &CheckerConfig, config: &Config) -> Result<Arc<dyn Checker>> {
    match checker.kind {
        CheckerKind::Reachability => {
            let defaults = ProbeSettings::default();
            let settings = ProbeSettings {
                count: checker.count.unwrap_or(defaults.count).max(1),
                interval: checker.probe_interval_ms.map(Duration::from_millis).unwrap_or(defaults.interval),
                timeout: checker.timeout_ms.map(Duration::from_millis).unwrap_or(defaults.timeout),
            };

            Ok(Arc::new(ReachabilityChecker::new(&checker.name).with_settings(settings)))
        }
        CheckerKind::Health => {
            let base = Url::parse(&config.health_api.address)
                .with_context(|| format!("invalid health API address {}", config.health_api.address))?;
            let timeout = checker
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| Duration::from_secs(config.health_api.timeout_secs));
            let ttl = checker.cache_ttl_secs.map(Duration::from_secs).unwrap_or(DEFAULT_CACHE_TTL);

            let source = HttpHealthSource::new(base, timeout).context("failed to build health API client")?;
            Ok(Arc::new(HealthChecker::with_ttl(source, ttl)))
        }
    }
}

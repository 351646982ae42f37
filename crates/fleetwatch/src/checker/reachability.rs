use futures::future::join_all;
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::{debug, warn};

use super::Checker;
use crate::device::Device;
use crate::types::{CheckResult, Event};

pub const EVENT_KEY: &str = "online";
pub const ONLINE: &str = "Online";
pub const OFFLINE: &str = "Offline";

const PAYLOAD: [u8; 56] = [0; 56];

/// Shape of a probe burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Number of echo requests sent
    pub count: u16,
    /// Spacing between two requests
    pub interval: Duration,
    /// Upper bound for the whole burst
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { count: 3, interval: Duration::from_secs(1), timeout: Duration::from_secs(5) }
    }
}

/// Per-device override read from the device's checker configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProbeOverride {
    count: Option<u16>,
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

impl ProbeOverride {
    fn apply(self, base: ProbeSettings) -> ProbeSettings {
        ProbeSettings {
            count: self.count.unwrap_or(base.count).max(1),
            interval: self.interval_ms.map(Duration::from_millis).unwrap_or(base.interval),
            timeout: self.timeout_ms.map(Duration::from_millis).unwrap_or(base.timeout),
        }
    }
}

/// Outcome of a probe burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStats {
    pub sent: u16,
    pub received: u16,
    /// Average round trip of the answered probes
    pub avg_rtt: Duration,
}

impl ProbeStats {
    pub fn from_rtts(sent: u16, rtts: &[Duration]) -> Self {
        let received = rtts.len().min(sent as usize) as u16;
        let avg_rtt = if rtts.is_empty() {
            Duration::ZERO
        } else {
            rtts.iter().sum::<Duration>() / rtts.len() as u32
        };

        Self { sent, received, avg_rtt }
    }

    pub fn lost(&self) -> u16 {
        self.sent.saturating_sub(self.received)
    }
}

/// Faults that prevent a probe session from being set up at all
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("unable to resolve {address}: {reason}")]
    Resolve { address: String, reason: String },
    #[error("unable to open probe socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Transport used to send a probe burst to an address
#[async_trait::async_trait]
pub trait ProbeSession: Send + Sync {
    async fn probe(&self, address: &str, settings: &ProbeSettings) -> Result<ProbeStats, ProbeError>;
}

/// ICMP echo transport backed by `surge-ping`
///
/// Opening the ICMP socket needs either root or `net.ipv4.ping_group_range`
/// covering the process group.
#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpSession;

impl IcmpSession {
    async fn resolve(address: &str) -> Result<IpAddr, ProbeError> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }

        let resolve_err = |reason: String| ProbeError::Resolve { address: address.to_string(), reason };

        tokio::net::lookup_host((address, 0))
            .await
            .map_err(|e| resolve_err(e.to_string()))?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| resolve_err("no addresses returned".to_string()))
    }
}

#[async_trait::async_trait]
impl ProbeSession for IcmpSession {
    async fn probe(&self, address: &str, settings: &ProbeSettings) -> Result<ProbeStats, ProbeError> {
        let ip = Self::resolve(address).await?;

        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = Client::new(&config)?;
        let ident = PingIdentifier(rand::random());

        let stats = run_burst(settings, |seq, budget| {
            let client = client.clone();
            async move {
                let mut pinger = client.pinger(ip, ident).await;
                pinger.timeout(budget);
                pinger.ping(PingSequence(seq), &PAYLOAD).await.map(|(_, rtt)| rtt)
            }
        })
        .await;

        debug!(%ip, sent = stats.sent, received = stats.received, "probe burst done");
        Ok(stats)
    }
}

/// Send `settings.count` echoes `settings.interval` apart without waiting for
/// earlier replies. Every echo shares the deadline of the whole burst, and
/// echoes scheduled at or past it are never sent.
///
/// `echo(seq, budget)` sends one request and waits at most `budget` for its
/// round trip.
pub async fn run_burst<F, Fut, E>(settings: &ProbeSettings, echo: F) -> ProbeStats
where
    F: Fn(u16, Duration) -> Fut,
    Fut: Future<Output = Result<Duration, E>>,
    E: fmt::Display,
{
    let start = Instant::now();
    let deadline = start + settings.timeout;
    let echo = &echo;

    let echoes = (0..settings.count).map(move |seq| {
        let send_at = start + settings.interval * u32::from(seq);
        async move {
            if send_at >= deadline {
                return None;
            }
            sleep_until(send_at).await;

            match timeout_at(deadline, echo(seq, deadline - send_at)).await {
                Ok(Ok(rtt)) => Some(Some(rtt)),
                Ok(Err(e)) => {
                    debug!(seq, "echo request unanswered: {}", e);
                    Some(None)
                }
                Err(_) => {
                    debug!(seq, "echo request unanswered before the burst deadline");
                    Some(None)
                }
            }
        }
    });

    let outcomes = join_all(echoes).await;
    let sent = outcomes.iter().filter(|outcome| outcome.is_some()).count() as u16;
    let rtts: Vec<Duration> = outcomes.into_iter().flatten().flatten().collect();

    ProbeStats::from_rtts(sent, &rtts)
}

/// Reachability checker: a short burst of echo requests, passing only when
/// every probe is answered.
pub struct ReachabilityChecker<P = IcmpSession> {
    name: String,
    session: P,
    settings: ProbeSettings,
}

impl ReachabilityChecker<IcmpSession> {
    /// Create a checker registered under `name`, probing over ICMP
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_session(name, IcmpSession)
    }
}

impl<P: ProbeSession> ReachabilityChecker<P> {
    pub fn with_session(name: impl Into<String>, session: P) -> Self {
        Self { name: name.into(), session, settings: ProbeSettings::default() }
    }

    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Probe settings for `device`, honouring its override under this checker's name
    pub fn settings_for(&self, device: &Device) -> ProbeSettings {
        let Some(raw) = device.checker_config.get(&self.name) else {
            return self.settings;
        };

        match serde_json::from_value::<ProbeOverride>(raw.clone()) {
            Ok(overrides) => overrides.apply(self.settings),
            Err(e) => {
                warn!(device = %device.name, checker = %self.name, "ignoring malformed probe config: {}", e);
                self.settings
            }
        }
    }
}

#[async_trait::async_trait]
impl<P: ProbeSession> Checker for ReachabilityChecker<P> {
    async fn check(&self, device: &Arc<Device>, _force_recheck: bool) -> CheckResult {
        let result = CheckResult::new(Event::new(device.clone(), EVENT_KEY, ONLINE));
        let settings = self.settings_for(device);

        let stats = match self.session.probe(&device.address, &settings).await {
            Ok(stats) => stats,
            Err(e) => return result.failure(e.to_string(), OFFLINE),
        };

        debug!(device = %device.name, sent = stats.sent, received = stats.received, "probe burst finished");

        if stats.sent == 0 {
            return result.failure(format!("no probes sent within {} ms", settings.timeout.as_millis()), OFFLINE);
        }

        if stats.lost() > 0 {
            return result
                .with_message(format!("{} of {} probes answered", stats.received, stats.sent))
                .failure(format!("lost {} of {} probes", stats.lost(), stats.sent), OFFLINE);
        }

        result.with_message(format!(
            "{} probes answered, average round trip {} ms",
            stats.sent,
            stats.avg_rtt.as_millis()
        ))
    }

    fn event_key(&self) -> &str {
        EVENT_KEY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FakeSession {
        outcome: Result<(u16, u16, Duration), String>,
        seen: Mutex<Vec<ProbeSettings>>,
    }

    impl FakeSession {
        fn answering(sent: u16, received: u16, avg: Duration) -> Self {
            Self { outcome: Ok((sent, received, avg)), seen: Mutex::new(Vec::new()) }
        }

        fn broken(reason: &str) -> Self {
            Self { outcome: Err(reason.to_string()), seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait::async_trait]
    impl ProbeSession for FakeSession {
        async fn probe(&self, address: &str, settings: &ProbeSettings) -> Result<ProbeStats, ProbeError> {
            self.seen.lock().unwrap().push(*settings);
            match &self.outcome {
                Ok((sent, received, avg_rtt)) => Ok(ProbeStats { sent: *sent, received: *received, avg_rtt: *avg_rtt }),
                Err(reason) => Err(ProbeError::Resolve { address: address.to_string(), reason: reason.clone() }),
            }
        }
    }

    fn device() -> Arc<Device> {
        Arc::new(Device::new("rm-101-dp1", "10.0.0.5"))
    }

    #[tokio::test]
    async fn test_all_echoes_answered_passes() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(3, 3, Duration::from_millis(12)));

        let result = checker.check(&device(), false).await;

        assert!(result.passed);
        assert!(result.error.is_empty());
        assert!(result.message.contains("12"));
        assert_eq!(result.event.key, EVENT_KEY);
        assert_eq!(result.event.value, ONLINE);
    }

    #[tokio::test]
    async fn test_any_loss_fails() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(3, 1, Duration::from_millis(40)));

        let result = checker.check(&device(), false).await;

        assert!(!result.passed);
        assert_eq!(result.error, "lost 2 of 3 probes");
        assert_eq!(result.event.value, OFFLINE);
    }

    #[tokio::test]
    async fn test_session_setup_failure_is_a_failed_check() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::broken("no such host"));

        let result = checker.check(&device(), true).await;

        assert!(!result.passed);
        assert!(result.error.contains("no such host"));
        assert_eq!(result.event.value, OFFLINE);
    }

    #[tokio::test]
    async fn test_device_override_changes_burst_settings() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(5, 5, Duration::from_millis(3)));
        let device = Arc::new(
            Device::new("rm-101-dp1", "10.0.0.5")
                .with_checker_config("reachability", json!({"count": 5, "timeout_ms": 8000})),
        );

        checker.check(&device, false).await;

        let seen = checker.session.seen.lock().unwrap();
        assert_eq!(seen[0].count, 5);
        assert_eq!(seen[0].timeout, Duration::from_secs(8));
        assert_eq!(seen[0].interval, Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_override_falls_back_to_defaults() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(3, 3, Duration::ZERO));
        let device = Device::new("rm-101-dp1", "10.0.0.5").with_checker_config("reachability", json!({"count": "many"}));

        assert_eq!(checker.settings_for(&device), ProbeSettings::default());
    }

    #[test]
    fn test_override_for_other_checker_is_ignored() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(3, 3, Duration::ZERO));
        let device = Device::new("rm-101-dp1", "10.0.0.5").with_checker_config("health", json!({"count": 9}));

        assert_eq!(checker.settings_for(&device).count, 3);
    }

    #[tokio::test]
    async fn test_empty_burst_fails() {
        let checker = ReachabilityChecker::with_session("reachability", FakeSession::answering(0, 0, Duration::ZERO));

        let result = checker.check(&device(), false).await;

        assert!(!result.passed);
        assert_eq!(result.error, "no probes sent within 5000 ms");
    }

    /// Answers every echo after `rtt`, except the sequence numbers in `dropped`
    fn echo_with(rtt: Duration, dropped: &'static [u16]) -> impl Fn(u16, Duration) -> BoxedEcho {
        move |seq: u16, _budget: Duration| -> BoxedEcho {
            Box::pin(async move {
                if dropped.contains(&seq) {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(rtt).await;
                Ok::<Duration, String>(rtt)
            })
        }
    }

    type BoxedEcho = std::pin::Pin<Box<dyn Future<Output = Result<Duration, String>> + Send>>;

    #[tokio::test(start_paused = true)]
    async fn test_burst_counts_a_single_dropped_echo() {
        let settings = ProbeSettings::default();

        let stats = run_burst(&settings, echo_with(Duration::from_millis(20), &[0])).await;

        assert_eq!(stats.sent, 3);
        assert_eq!(stats.received, 2);
        assert_eq!(stats.lost(), 1);
        assert_eq!(stats.avg_rtt, Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_does_not_wait_for_slow_replies() {
        let settings = ProbeSettings::default();
        let started = Instant::now();

        let stats = run_burst(&settings, echo_with(Duration::from_millis(1600), &[])).await;

        assert_eq!(stats.received, 3);
        assert_eq!(stats.lost(), 0);
        // last echo goes out at 2 s and comes back 1.6 s later
        assert!(started.elapsed() >= Duration::from_millis(3600));
        assert!(started.elapsed() < settings.timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_only_counts_echoes_sent_before_deadline() {
        let settings = ProbeSettings { count: 5, interval: Duration::from_secs(2), timeout: Duration::from_secs(5) };

        let stats = run_burst(&settings, echo_with(Duration::from_millis(10), &[])).await;

        assert_eq!(stats.sent, 3);
        assert_eq!(stats.received, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_reports_echo_errors_as_loss() {
        let settings = ProbeSettings { count: 2, ..ProbeSettings::default() };

        let stats = run_burst(&settings, |seq, _budget| async move {
            if seq == 1 { Err("network unreachable") } else { Ok(Duration::from_millis(5)) }
        })
        .await;

        assert_eq!(stats.sent, 2);
        assert_eq!(stats.received, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_echo_gets_the_remaining_budget() {
        let budgets = Mutex::new(Vec::new());

        run_burst(&ProbeSettings::default(), |seq, budget| {
            budgets.lock().unwrap().push((seq, budget));
            async { Ok::<Duration, String>(Duration::ZERO) }
        })
        .await;

        let mut budgets = budgets.into_inner().unwrap();
        budgets.sort();
        assert_eq!(
            budgets,
            vec![(0, Duration::from_secs(5)), (1, Duration::from_secs(4)), (2, Duration::from_secs(3))]
        );
    }

    #[test]
    fn test_stats_average_answered_echoes() {
        let stats = ProbeStats::from_rtts(3, &[Duration::from_millis(10), Duration::from_millis(14)]);

        assert_eq!(stats.received, 2);
        assert_eq!(stats.lost(), 1);
        assert_eq!(stats.avg_rtt, Duration::from_millis(12));
    }
}

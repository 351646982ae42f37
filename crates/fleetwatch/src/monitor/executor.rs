use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, warn};

use crate::checker::Checker;
use crate::device::Device;
use crate::types::{CheckResult, Event};

/// Event value recorded when a checker panics
pub const PANIC_EVENT_VALUE: &str = "Error";

/// A completed check on its way to the aggregation loop
#[derive(Debug)]
pub(crate) struct CheckOutcome {
    pub device: String,
    pub checker: String,
    pub result: CheckResult,
}

/// Runs single checks under the global concurrency limit and queues their results
#[derive(Clone)]
pub(crate) struct Executor {
    limiter: Arc<Semaphore>,
    results: mpsc::Sender<CheckOutcome>,
}

impl Executor {
    pub fn new(max_concurrent_checks: usize, results: mpsc::Sender<CheckOutcome>) -> Self {
        Self { limiter: Arc::new(Semaphore::new(max_concurrent_checks)), results }
    }

    /// Run `checker` on `device` and queue the result, waiting for queue space when full
    pub async fn execute(
        &self,
        checker_name: &str,
        checker: &Arc<dyn Checker>,
        device: Arc<Device>,
        force_recheck: bool,
    ) -> CheckResult {
        let result = {
            // The semaphore is never closed, a failed acquire only means no limit
            let _permit = self.limiter.acquire().await.ok();
            run_check(checker_name, checker.as_ref(), &device, force_recheck).await
        };

        debug!(device = %device.name, checker = checker_name, passed = result.passed, "check finished");

        let outcome = CheckOutcome {
            device: device.name.clone(),
            checker: checker_name.to_string(),
            result: result.clone(),
        };
        if self.results.send(outcome).await.is_err() {
            warn!(device = %device.name, checker = checker_name, "aggregation loop is gone, result not recorded");
        }

        result
    }
}

/// Run one check, turning a panic inside the checker into a failed result
pub(crate) async fn run_check(
    checker_name: &str,
    checker: &dyn Checker,
    device: &Arc<Device>,
    force_recheck: bool,
) -> CheckResult {
    match AssertUnwindSafe(checker.check(device, force_recheck)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!(device = %device.name, checker = checker_name, "checker panicked: {}", reason);

            CheckResult::new(Event::new(device.clone(), checker.event_key(), PANIC_EVENT_VALUE))
                .failure(format!("checker panicked: {}", reason), PANIC_EVENT_VALUE)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exploding;

    #[async_trait::async_trait]
    impl Checker for Exploding {
        async fn check(&self, _device: &Arc<Device>, _force_recheck: bool) -> CheckResult {
            panic!("socket table corrupted")
        }

        fn event_key(&self) -> &str {
            "online"
        }
    }

    struct Passing;

    #[async_trait::async_trait]
    impl Checker for Passing {
        async fn check(&self, device: &Arc<Device>, force_recheck: bool) -> CheckResult {
            CheckResult::new(Event::new(device.clone(), "online", "Online")).with_message(format!("forced={}", force_recheck))
        }

        fn event_key(&self) -> &str {
            "online"
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_failed_result() {
        let device = Arc::new(Device::new("rm-101-dp1", "10.0.0.5"));

        let result = run_check("reachability", &Exploding, &device, false).await;

        assert!(!result.passed);
        assert_eq!(result.error, "checker panicked: socket table corrupted");
        assert_eq!(result.event.key, "online");
        assert_eq!(result.event.value, PANIC_EVENT_VALUE);
    }

    #[tokio::test]
    async fn test_execute_queues_result() {
        let (tx, mut rx) = mpsc::channel(4);
        let executor = Executor::new(2, tx);
        let checker: Arc<dyn Checker> = Arc::new(Passing);
        let device = Arc::new(Device::new("rm-101-dp1", "10.0.0.5"));

        let result = executor.execute("reachability", &checker, device, true).await;
        let outcome = rx.recv().await.unwrap();

        assert_eq!(result.message, "forced=true");
        assert_eq!(outcome.device, "rm-101-dp1");
        assert_eq!(outcome.checker, "reachability");
        assert_eq!(outcome.result, result);
    }

    #[tokio::test]
    async fn test_execute_survives_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let executor = Executor::new(1, tx);
        let checker: Arc<dyn Checker> = Arc::new(Passing);

        let result = executor.execute("reachability", &checker, Arc::new(Device::new("a", "10.0.0.1")), false).await;

        assert!(result.passed);
    }
}

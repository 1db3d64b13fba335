//! Blocking wait for asynchronous provider operations
//!
//! Image, disk, VM and firewall operations complete in the background on the
//! provider side. Callers poll them to completion here.

use crate::error::{CloudError, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Time between status checks
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait budget for one operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Status reported by a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done,
    Failed(String),
}

/// Poll interval and overall budget
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl WaitConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}

/// Poll `check` until it reports `Done`.
///
/// Errors with `Timeout` once the budget is spent and with
/// `OperationFailed` when the operation itself reports an error.
pub async fn wait_for_operation<F, Fut>(
    operation_name: &str,
    config: &WaitConfig,
    mut check: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<OperationStatus>>,
{
    let start = Instant::now();

    loop {
        match check().await? {
            OperationStatus::Done => return Ok(()),
            OperationStatus::Failed(reason) => {
                return Err(CloudError::OperationFailed(format!(
                    "{} failed: {}",
                    operation_name, reason
                )));
            }
            OperationStatus::Pending => {}
        }

        if start.elapsed() >= config.timeout {
            return Err(CloudError::Timeout(format!(
                "{} timed out after {} seconds",
                operation_name,
                config.timeout.as_secs()
            )));
        }

        sleep(config.interval).await;
        tracing::info!("Waiting for {}...", operation_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    #[tokio::test]
    async fn test_completes_after_pending_polls() {
        let counter = AtomicU32::new(0);
        let polls = &counter;
        let result = wait_for_operation("disk creation", &fast(1_000), || async move {
            if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(OperationStatus::Pending)
            } else {
                Ok(OperationStatus::Done)
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_times_out() {
        let result = wait_for_operation("image creation", &fast(20), || async {
            Ok(OperationStatus::Pending)
        })
        .await;

        assert!(matches!(result, Err(CloudError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_propagates_operation_error() {
        let result = wait_for_operation("VM creation", &fast(1_000), || async {
            Ok(OperationStatus::Failed("QUOTA_EXCEEDED".to_string()))
        })
        .await;

        match result {
            Err(CloudError::OperationFailed(msg)) => {
                assert_eq!(msg, "VM creation failed: QUOTA_EXCEEDED")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let config = WaitConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(600));
        assert_eq!(
            WaitConfig::with_timeout(Duration::from_secs(60)).interval,
            POLL_INTERVAL
        );
    }
}

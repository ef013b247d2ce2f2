//! Retry-on-conflict for writes to the Logstash resource

use crate::error::ControllerError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Bounded retry budget for optimistic-concurrency conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(10),
        }
    }
}

/// Runs `attempt` until it succeeds, fails with a non-conflict error, or the budget runs out
///
/// `attempt` must re-read whatever it writes, so each try recomputes from fresh state.
pub async fn retry_on_conflict<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut attempt: F,
) -> Result<T, ControllerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ControllerError>>,
{
    let attempts = policy.attempts.max(1);
    for n in 1..=attempts {
        match attempt().await {
            Err(e) if e.is_conflict() => {
                debug!("{} conflicted (attempt {}/{}): {}", operation, n, attempts, e);
                if n < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            other => return other,
        }
    }
    Err(ControllerError::ConflictRetriesExhausted {
        operation: operation.to_string(),
        attempts,
    })
}

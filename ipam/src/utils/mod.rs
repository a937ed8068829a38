//! Utils is shared functions for the allocator and its backends
#[cfg(test)]
pub mod test;

use std::{fmt::Display, future::Future, time::Duration};

use tracing::{error, warn};

/// Fixed delay retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of times the operation is invoked. Zero behaves like one.
    pub attempts: u32,
    /// Delay between a failed attempt and the next one.
    pub delay: Duration,
}

/// Invoke `operation` until it succeeds or the policy runs out of attempts.
///
/// Returns the first success immediately, otherwise the error of the final attempt.
pub async fn retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= attempts => {
                error!(operation = %operation_name, attempt, %err, "giving up after retries");
                return Err(err);
            }
            Err(err) => {
                warn!(
                    operation = %operation_name,
                    attempt,
                    %err,
                    delay_ms = policy.delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

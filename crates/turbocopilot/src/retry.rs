//! Caller-side retry driven by error recovery guidance
//!
//! The connection never reconnects on its own. Applications that want to ride
//! out a runtime restart or a flaky socket wrap their calls in these helpers.

use crate::error::{CopilotError, ErrorRecovery, Result};
use std::future::Future;
use std::pin::Pin;
use tracing::warn;

/// Boxed, restartable operation
pub type RetryOperation<'a, T> =
    Box<dyn FnMut() -> Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>> + Send + 'a>;

/// Retry an operation up to `max_attempts` times
///
/// Stops early on an error that is not retriable or has no backoff.
///
/// # Example
///
/// ```no_run
/// # use turbocopilot::{retry_with_recovery, CopilotClient, ClientOptions, Result};
/// # async fn example(client: CopilotClient) -> Result<()> {
/// let pong = retry_with_recovery(
///     Box::new(|| {
///         let client = client.clone();
///         Box::pin(async move { client.ping(None).await })
///     }),
///     Some(3),
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_recovery<'a, T: 'a>(
    mut operation: RetryOperation<'a, T>,
    max_attempts: Option<u32>,
) -> Result<T> {
    let max_attempts = max_attempts.unwrap_or(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retriable() || attempt >= max_attempts {
                    return Err(err);
                }
                if !backoff(&err, attempt, max_attempts).await {
                    return Err(err);
                }
            }
        }
    }
}

/// Retry an operation using the error's own retry policy
///
/// Each failure's `max_retries()` bounds the attempts and its
/// `backoff_strategy()` sets the delay.
pub async fn retry<'a, T: 'a>(mut operation: RetryOperation<'a, T>) -> Result<T> {
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                let max_retries = err.max_retries().unwrap_or(0);

                if !err.is_retriable() || attempt > max_retries {
                    warn!(error = %err, action = err.suggested_action(), "Giving up");
                    return Err(err);
                }
                if !backoff(&err, attempt, max_retries).await {
                    return Err(err);
                }
            }
        }
    }
}

async fn backoff(err: &CopilotError, attempt: u32, limit: u32) -> bool {
    warn!(
        attempt,
        limit,
        error = %err,
        action = err.suggested_action(),
        "Attempt failed"
    );

    match err.backoff_strategy().delay_for_attempt(attempt) {
        Some(delay) => {
            tokio::time::sleep(delay).await;
            true
        }
        None => false,
    }
}

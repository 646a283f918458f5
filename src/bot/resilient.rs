//! Retry helpers for Telegram API operations.
//!
//! Webhook registration and removal run against the live Bot API at startup
//! and shutdown; a transient network error there should not abort the
//! process. Operations are retried with exponential backoff and jitter.

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;

/// Initial backoff for Telegram API retries (milliseconds)
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound on a single backoff delay (milliseconds)
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4_000;
/// Retries after the first attempt
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Backoff settings for [`retry_telegram_operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// First delay in milliseconds
    pub initial_backoff_ms: u64,
    /// Delay cap in milliseconds
    pub max_backoff_ms: u64,
    /// Retries after the first attempt
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: TELEGRAM_API_INITIAL_BACKOFF_MS,
            max_backoff_ms: TELEGRAM_API_MAX_BACKOFF_MS,
            max_retries: TELEGRAM_API_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            max_retries: 0,
        }
    }
}

/// Run `operation`, retrying on error according to `policy`.
///
/// # Errors
///
/// Returns the last error once all retries are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(policy: RetryPolicy, operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let retry_strategy = ExponentialBackoff::from_millis(policy.initial_backoff_ms.max(1))
        .max_delay(Duration::from_millis(policy.max_backoff_ms))
        .map(jitter)
        .take(policy.max_retries);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            policy.max_retries + 1,
            e
        );
        e
    })
}

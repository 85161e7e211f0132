//! Retry engine: bounded retries for transient backend failures.
//!
//! Two policies are used by the pipeline:
//! - `BackoffPolicy`: exponential backoff with +/-10% jitter, for record creation.
//! - `FixedRetry`: fixed attempt count and fixed delay, for block uploads.
//!
//! Both count attempts including the first try and never retry past their bound.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::AppError;
use crate::models::settings::UploadSettings;

/// Default initial backoff delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 500;
/// Default maximum backoff delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 16_000;
/// Default total attempts, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential backoff with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    pub fn for_create(settings: &UploadSettings) -> Self {
        Self {
            initial_delay_ms: settings.create_initial_delay_ms,
            max_delay_ms: settings.create_max_delay_ms,
            max_attempts: settings.create_max_attempts,
        }
    }
}

/// Fixed attempts, fixed delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRetry {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl FixedRetry {
    pub fn for_blocks(settings: &UploadSettings) -> Self {
        Self {
            max_attempts: settings.block_retry_attempts,
            delay_ms: settings.block_retry_delay_ms,
        }
    }
}

/// Error from the final attempt plus how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: AppError,
}

/// Whether an error is worth retrying at all.
///
/// Network errors are retryable, as are 5xx, 408 and 429 responses. Local
/// errors (Io, Encryption, Config, Internal) and other statuses are not.
pub fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::Network(_) => true,
        AppError::Status { status, .. } => matches!(status, 408 | 429 | 500..=599),
        _ => false,
    }
}

/// The backend's "try again later" answer.
pub fn is_transient_unavailable(err: &AppError) -> bool {
    matches!(err, AppError::Status { status: 503, .. })
}

/// Calculate exponential backoff delay with +/-10% jitter.
///
/// `attempt` is zero-based: the delay after the first failed try uses 0.
pub fn calculate_delay(attempt: u32, policy: &BackoffPolicy) -> u64 {
    let base = policy
        .initial_delay_ms
        .saturating_mul(1u64 << attempt.min(31));
    let capped = base.min(policy.max_delay_ms);
    let jitter_range = capped / 10;
    if jitter_range == 0 {
        return capped;
    }
    let jitter = rand::rng().random_range(0..=jitter_range * 2);
    capped - jitter_range + jitter
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// rejects, or `policy.max_attempts` tries have been made.
pub async fn retry_with_backoff<F, Fut, T, P>(
    policy: &BackoffPolicy,
    label: &str,
    should_retry: P,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
    P: Fn(&AppError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if !should_retry(&err) || attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = calculate_delay(attempt - 1, policy);
                log::warn!(
                    "{} retry: attempt={}/{}, delay_ms={}, error={}",
                    label,
                    attempt,
                    max_attempts,
                    delay,
                    err
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

/// Run `operation` with a fixed delay between tries, retrying only errors
/// `is_retryable` accepts.
pub async fn retry_fixed<F, Fut, T>(
    policy: &FixedRetry,
    label: &str,
    mut operation: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::error::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                attempt += 1;
                if !is_retryable(&err) || attempt >= max_attempts {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }

                log::warn!(
                    "{} retry: attempt={}/{}, error={}",
                    label,
                    attempt,
                    max_attempts,
                    err
                );
                tokio::time::sleep(Duration::from_millis(policy.delay_ms)).await;
            }
        }
    }
}

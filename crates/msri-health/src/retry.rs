//! Exponential back-off with jitter for source fetches.
//!
//! Only transient failures (network errors, 5xx, 429) are retried. A bad
//! payload or a missing URL will not fix itself.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

pub(crate) fn is_retriable(err: &FetchError) -> bool {
    match err {
        FetchError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        FetchError::UnexpectedStatus { status, .. } => *status >= 500 || *status == 429,
        FetchError::Timeout { .. }
        | FetchError::NoUrl(_)
        | FetchError::Deserialize { .. }
        | FetchError::UnexpectedShape { .. }
        | FetchError::Other(_) => false,
    }
}

const MAX_DELAY_MS: u64 = 30_000;

/// Un-jittered delay before the `attempt`-th retry (1-based).
fn base_delay_ms(attempt: u32, backoff_base_ms: u64) -> u64 {
    backoff_base_ms
        .saturating_mul(1u64 << attempt.saturating_sub(1).min(10))
        .min(MAX_DELAY_MS)
}

/// Worst-case wall time of one fetch: every attempt running into
/// `request_timeout`, plus the longest jittered back-off between them.
#[must_use]
pub fn retry_budget(
    request_timeout: Duration,
    max_retries: u32,
    backoff_base_ms: u64,
) -> Duration {
    let backoff_ms: u64 = (1..=max_retries)
        .map(|attempt| base_delay_ms(attempt, backoff_base_ms).saturating_mul(5) / 4)
        .sum();
    request_timeout.saturating_mul(max_retries.saturating_add(1))
        + Duration::from_millis(backoff_ms)
}

/// Runs `operation`, retrying transient errors up to `max_retries` more times.
///
/// The n-th retry waits `backoff_base_ms * 2^(n-1)` ms ± 25 % jitter, capped
/// at 30 s.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let capped = base_delay_ms(attempt, backoff_base_ms);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, backing off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

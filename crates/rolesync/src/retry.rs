//! Retry with exponential backoff.
//!
//! [`retry`] keeps calling an operation until it succeeds, fails with an
//! error the caller deems fatal, or the cancellation token fires. There is no
//! attempt limit.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Delay schedule between attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Delay after the failed attempt number `attempt` (1-indexed).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if delay.is_finite() && delay < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(delay)
        } else {
            self.max_delay
        }
    }
}

/// Why a retried operation gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The last error was not retryable.
    #[error("{0}")]
    Fatal(E),
    /// The cancellation token fired.
    #[error("Cancelled")]
    Cancelled,
}

/// Calls `operation` until it succeeds.
///
/// After each failure, `is_retryable` decides whether to try again. Before
/// sleeping, `on_retry` receives the failed attempt number and its error.
///
/// # Errors
///
/// Returns [`RetryError::Fatal`] with the first non-retryable error, or
/// [`RetryError::Cancelled`] if `cancel` fires first.
pub async fn retry<T, E, F, Fut, P, N>(
    backoff: &Backoff,
    cancel: &CancellationToken,
    mut operation: F,
    is_retryable: P,
    mut on_retry: N,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    N: FnMut(u32, &E),
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let result = tokio::select! {
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation() => result,
        };
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) if is_retryable(&error) => error,
            Err(error) => return Err(RetryError::Fatal(error)),
        };

        let delay = backoff.delay(attempt);
        debug!(
            attempt,
            delay_ms = delay.as_millis(),
            error = %error,
            "Retrying."
        );
        on_retry(attempt, &error);

        tokio::select! {
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

//! Retry logic with exponential backoff
//!
//! Two shapes of the same policy are provided:
//! - [`with_retry`] wraps one idempotent operation and retries transient
//!   failures a bounded number of times.
//! - [`Backoff`] hands out successive delays for loops that already repeat on
//!   their own (status polling), so they can slow down while the provider is
//!   unhealthy without giving up on the first error.
//!
//! # Example
//!
//! ```no_run
//! use jobpulse::retry::{IsRetryable, with_retry};
//! use jobpulse::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async { Ok::<_, MyError>(()) }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, provider overload) return `true`.
/// Permanent failures (bad credentials, missing tier, bad input) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            // Throttling and gateway hiccups
            Error::Remote { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            Error::AuthFailure(_)
            | Error::CapabilityDenied { .. }
            | Error::InvalidInput(_)
            | Error::NotFound(_)
            | Error::WaitTimedOut { .. }
            | Error::Cancelled
            | Error::Config { .. }
            | Error::Database(_)
            | Error::Sqlx(_)
            | Error::Serialization(_)
            | Error::Workbook(_)
            | Error::ApiServerError(_)
            | Error::Other(_) => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// The operation runs once, then up to `config.max_attempts` more times while
/// it keeps failing with a retryable error. Returns the first success or the
/// last error.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut backoff = Backoff::new(config, Duration::ZERO);

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                attempt += 1;
                let delay = backoff.next_delay();

                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        error = %e,
                        attempts = attempt + 1,
                        "operation failed after all retry attempts exhausted"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Exponential delay schedule with a floor
///
/// Delays start at `max(initial_delay, floor)`, grow by `backoff_multiplier`
/// and are capped at `max(max_delay, floor)`. Jitter, when enabled, is added
/// on top of the capped value.
#[derive(Clone, Debug)]
pub struct Backoff {
    initial: Duration,
    current: Duration,
    cap: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Backoff {
    /// Build a schedule from a retry policy, never yielding less than `floor`
    pub fn new(config: &RetryConfig, floor: Duration) -> Self {
        let initial = config.initial_delay.max(floor);
        Self {
            initial,
            current: initial,
            cap: config.max_delay.max(floor),
            multiplier: config.backoff_multiplier.max(1.0),
            jitter: config.jitter,
        }
    }

    /// Delay to wait now; advances the schedule
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current.min(self.cap);
        self.current = Duration::from_secs_f64(base.as_secs_f64() * self.multiplier).min(self.cap);
        if self.jitter { add_jitter(base) } else { base }
    }

    /// Return to the initial delay after a success
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}

//! Blocking wait for a set of tasks to reach a terminal status

use crate::client::StatusSource;
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::Backoff;
use crate::types::TaskId;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How the waiter paces itself
#[derive(Clone, Debug)]
pub struct WaitPolicy {
    /// Delay between successful polls
    pub poll_interval: Duration,
    /// Give up after this long
    pub timeout: Option<Duration>,
    /// Abort after this many failed polls in a row
    pub max_consecutive_failures: u32,
    /// Backoff applied after failed polls, floored at `poll_interval`
    pub retry: RetryConfig,
}

/// Polls batch statuses until every task is Finished or Stopped
pub struct CompletionWaiter<'a, S: StatusSource + ?Sized> {
    source: &'a S,
    policy: WaitPolicy,
}

impl<'a, S: StatusSource + ?Sized> CompletionWaiter<'a, S> {
    /// Create a waiter over a status source
    pub fn new(source: &'a S, policy: WaitPolicy) -> Self {
        Self { source, policy }
    }

    /// Wait until all `ids` are terminal, returning the number of polls made
    ///
    /// Each poll is a single batch status lookup for all ids. An id missing
    /// from a response counts as not done. Transport failures are logged and
    /// retried with backoff; other errors end the wait immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] when `cancel` fires
    /// - [`Error::WaitTimedOut`] when the policy timeout elapses
    /// - the last transport error after `max_consecutive_failures` failures
    /// - any non-transport error from the source
    pub async fn wait(&self, ids: &[TaskId], cancel: &CancellationToken) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        let deadline = self.policy.timeout.map(|t| started + t);
        let mut backoff = Backoff::new(&self.policy.retry, self.policy.poll_interval);
        let mut polls = 0;
        let mut failures = 0;
        let mut pending = ids.len();

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::WaitTimedOut {
                    elapsed_secs: started.elapsed().as_secs(),
                    pending,
                });
            }

            polls += 1;
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = self.source.get_statuses(ids) => outcome,
            };

            let delay = match outcome {
                Ok(statuses) => {
                    failures = 0;
                    backoff.reset();
                    pending = ids
                        .iter()
                        .filter(|id| !statuses.get(*id).is_some_and(|s| s.is_terminal()))
                        .count();

                    if pending == 0 {
                        info!(tasks = ids.len(), polls, "all tasks reached a terminal state");
                        return Ok(polls);
                    }
                    debug!(pending, polls, "tasks still running");
                    self.policy.poll_interval
                }
                Err(e) if e.is_transport() => {
                    failures += 1;
                    if failures >= self.policy.max_consecutive_failures {
                        warn!(error = %e, failures, "status polling keeps failing, giving up");
                        return Err(e);
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        error = %e,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "status poll failed, backing off"
                    );
                    delay
                }
                Err(e) => return Err(e),
            };

            // Never sleep past the deadline
            let wake = match deadline {
                Some(d) => (Instant::now() + delay).min(d),
                None => Instant::now() + delay,
            };
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }
}

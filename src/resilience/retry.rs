//! Bounded retry for format failures.
//!
//! Only format-class failures are retried: the provider answered, just not
//! in a usable shape, so a corrective instruction has a chance of helping.
//! Provider-class failures go straight to the fallback and logic-class
//! failures propagate.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{CoachError, FailureKind};

/// Input handed to each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptContext {
    /// Zero-based attempt number.
    pub index: u32,
    /// Description of the previous attempt's format failure, if any.
    pub correction: Option<String>,
}

impl AttemptContext {
    /// Whether this is a retry.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        self.index > 0
    }
}

/// Retry bound and linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit; the wait before retry `n` is `n * backoff_unit`.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_unit.saturating_mul(retry)
    }

    /// Run `attempt` until it succeeds or the policy gives up.
    ///
    /// `fallback` receives the error that ended the loop: the last format
    /// failure once attempts are exhausted (or the backoff is cancelled), or
    /// the first provider-class failure.
    ///
    /// # Errors
    ///
    /// Returns the first logic-class error unchanged.
    pub async fn run<T, A, Fut, F>(
        &self,
        cancel: &CancellationToken,
        mut attempt: A,
        fallback: F,
    ) -> Result<T, CoachError>
    where
        A: FnMut(AttemptContext) -> Fut + Send,
        Fut: Future<Output = Result<T, CoachError>> + Send,
        F: FnOnce(&CoachError) -> T + Send,
    {
        let mut context = AttemptContext {
            index: 0,
            correction: None,
        };

        loop {
            let error = match attempt(context.clone()).await {
                Ok(value) => {
                    if context.is_retry() {
                        tracing::info!(attempt = context.index + 1, "Retry succeeded");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            match error.kind() {
                FailureKind::Logic => {
                    tracing::debug!(attempt = context.index + 1, error = %error, "Logic error, not retrying");
                    return Err(error);
                }
                FailureKind::Provider => {
                    tracing::info!(
                        attempt = context.index + 1,
                        error = %error,
                        "Provider unavailable, not retrying"
                    );
                    return Ok(fallback(&error));
                }
                FailureKind::Format => {}
            }

            let next = context.index + 1;
            if next >= self.max_attempts() {
                tracing::warn!(
                    attempts = next,
                    error = %error,
                    "Format retries exhausted, using fallback"
                );
                return Ok(fallback(&error));
            }

            let delay = self.backoff(next);
            tracing::info!(
                attempt = next,
                max_attempts = self.max_attempts(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Format failure, retrying with corrective instruction"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::debug!("Retry backoff cancelled");
                    return Ok(fallback(&error));
                }
                () = tokio::time::sleep(delay) => {}
            }

            context = AttemptContext {
                index: next,
                correction: Some(error.to_string()),
            };
        }
    }
}

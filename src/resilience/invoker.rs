//! Single gate through which every provider call passes.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::breaker::FailureTracker;
use crate::error::{FailureKind, ProviderError};
use crate::traits::LanguageModel;

/// Why the fallback ran instead of the primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The tracker held the call back; the provider was not contacted.
    Unavailable,
    /// The provider call failed with a provider-class error.
    ProviderFailed(ProviderError),
}

/// Result of a guarded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invoked<T> {
    /// The provider answered.
    Primary(T),
    /// The fallback produced the value.
    Fallback {
        /// Fallback output.
        value: T,
        /// Why the fallback ran.
        reason: FallbackReason,
    },
}

impl<T> Invoked<T> {
    /// The produced value, whichever path made it.
    pub fn into_inner(self) -> T {
        match self {
            Self::Primary(value) | Self::Fallback { value, .. } => value,
        }
    }

    /// Whether the provider produced the value.
    pub const fn is_primary(&self) -> bool {
        matches!(self, Self::Primary(_))
    }
}

/// Wraps a [`LanguageModel`] behind a [`FailureTracker`], a timeout and a
/// cancellation token.
#[derive(Debug)]
pub struct ResilientInvoker<M> {
    model: M,
    tracker: Arc<FailureTracker>,
    timeout: Duration,
}

impl<M: LanguageModel> ResilientInvoker<M> {
    /// Create an invoker. Each provider call is bounded by `timeout`.
    #[must_use]
    pub const fn new(model: M, tracker: Arc<FailureTracker>, timeout: Duration) -> Self {
        Self {
            model,
            tracker,
            timeout,
        }
    }

    /// The shared failure tracker.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<FailureTracker> {
        &self.tracker
    }

    /// Run `primary` against the provider, or `fallback` when the provider
    /// is unavailable or fails.
    ///
    /// Provider-class failures (including timeout and cancellation) run the
    /// fallback; all but cancellation are recorded by the tracker. Any other
    /// failure is returned unrecorded.
    ///
    /// # Errors
    ///
    /// Returns the primary's error when it is not provider-class.
    pub async fn call<'a, T, P, Fut, F>(
        &'a self,
        primary: P,
        fallback: F,
        cancel: &CancellationToken,
    ) -> Result<Invoked<T>, ProviderError>
    where
        P: FnOnce(&'a M) -> Fut + Send,
        Fut: Future<Output = Result<T, ProviderError>> + Send,
        F: FnOnce(&FallbackReason) -> T + Send,
    {
        if !self.tracker.admit() {
            tracing::debug!(
                remaining_cooldown_ms = self
                    .tracker
                    .remaining_cooldown()
                    .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
                "Provider unavailable, using fallback"
            );
            let reason = FallbackReason::Unavailable;
            return Ok(Invoked::Fallback {
                value: fallback(&reason),
                reason,
            });
        }

        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(self.timeout, primary(&self.model)) => {
                result.unwrap_or_else(|_| {
                    Err(ProviderError::Timeout {
                        timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    })
                })
            }
        };
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(value) => {
                self.tracker.record_success();
                tracing::debug!(elapsed_ms, "Provider call succeeded");
                Ok(Invoked::Primary(value))
            }
            Err(error) if error.kind() == FailureKind::Provider => {
                if error.counts_toward_breaker() {
                    self.tracker.record_failure(FailureKind::Provider);
                }
                tracing::warn!(
                    elapsed_ms,
                    error = %error,
                    consecutive_failures = self.tracker.stats().consecutive_failures,
                    "Provider call failed, using fallback"
                );
                let reason = FallbackReason::ProviderFailed(error);
                Ok(Invoked::Fallback {
                    value: fallback(&reason),
                    reason,
                })
            }
            Err(error) => {
                tracing::debug!(elapsed_ms, error = %error, kind = ?error.kind(), "Provider call rejected");
                Err(error)
            }
        }
    }
}

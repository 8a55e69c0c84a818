//! Resilience primitives around the language-model provider.
//!
//! - [`FailureTracker`]: consecutive-failure breaker with cooldown
//! - [`ResilientInvoker`]: the only path to the provider, with timeout,
//!   cancellation and fallback dispatch
//! - [`RetryPolicy`]: bounded retry of format failures with linear backoff

mod breaker;
mod invoker;
mod retry;

pub use breaker::{CircuitState, FailureStats, FailureTracker, FailureTrackerConfig};
pub use invoker::{FallbackReason, Invoked, ResilientInvoker};
pub use retry::{AttemptContext, RetryPolicy};

//! Failure tracker guarding the provider.
//!
//! Counts consecutive provider failures and closes the gate once the
//! threshold is reached. After the cooldown the counter resets and calls
//! flow again.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::FailureKind;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls reach the provider.
    Closed,
    /// Calls are held back until the cooldown elapses.
    Open,
}

/// Configuration for the failure tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureTrackerConfig {
    /// Consecutive provider failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure.
    pub cooldown: Duration,
}

impl Default for FailureTrackerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Snapshot of tracker counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureStats {
    /// State at the time of the snapshot.
    pub state: CircuitState,
    /// Current run of provider failures.
    pub consecutive_failures: u32,
    /// Provider failures recorded since creation.
    pub total_failures: u64,
    /// Successes recorded since creation.
    pub total_successes: u64,
    /// Times the breaker opened.
    pub trips: u64,
    /// Time since the last recorded failure.
    pub since_last_failure: Option<Duration>,
}

#[derive(Debug, Default)]
struct FailureState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    total_failures: u64,
    total_successes: u64,
    trips: u64,
}

impl FailureState {
    fn is_open(&self, config: &FailureTrackerConfig) -> bool {
        self.consecutive_failures >= config.failure_threshold
    }

    fn cooldown_elapsed(&self, config: &FailureTrackerConfig) -> bool {
        self.last_failure
            .is_none_or(|last| last.elapsed() >= config.cooldown)
    }
}

/// Consecutive-failure tracker shared by every invocation of one service.
#[derive(Debug, Default)]
pub struct FailureTracker {
    config: FailureTrackerConfig,
    state: Mutex<FailureState>,
}

impl FailureTracker {
    /// Create a tracker.
    #[must_use]
    pub fn new(config: FailureTrackerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(FailureState::default()),
        }
    }

    /// Tracker configuration.
    #[must_use]
    pub const fn config(&self) -> &FailureTrackerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, FailureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state. An open breaker whose cooldown has elapsed still
    /// reports `Open` until [`admit`](Self::admit) resets it.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        if self.lock().is_open(&self.config) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Whether a provider call would be let through. No side effects.
    #[must_use]
    pub fn is_available(&self) -> bool {
        let state = self.lock();
        !state.is_open(&self.config) || state.cooldown_elapsed(&self.config)
    }

    /// Gate a provider call.
    ///
    /// Returns `true` if the call may proceed. When the breaker is open and
    /// the cooldown has elapsed, the counter resets and the call is let
    /// through as a trial.
    pub fn admit(&self) -> bool {
        let mut state = self.lock();
        if !state.is_open(&self.config) {
            return true;
        }
        if state.cooldown_elapsed(&self.config) {
            tracing::info!(
                consecutive_failures = state.consecutive_failures,
                "Failure tracker cooldown elapsed, allowing trial call"
            );
            state.consecutive_failures = 0;
            return true;
        }
        false
    }

    /// Record a failed call.
    ///
    /// Only [`FailureKind::Provider`] moves the counter. Returns whether the
    /// failure was counted.
    pub fn record_failure(&self, kind: FailureKind) -> bool {
        if kind != FailureKind::Provider {
            tracing::debug!(?kind, "Failure not counted by tracker");
            return false;
        }

        let mut state = self.lock();
        let was_open = state.is_open(&self.config);
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        state.total_failures += 1;
        state.last_failure = Some(Instant::now());

        if !was_open && state.is_open(&self.config) {
            state.trips += 1;
            tracing::warn!(
                consecutive_failures = state.consecutive_failures,
                threshold = self.config.failure_threshold,
                cooldown_secs = self.config.cooldown.as_secs(),
                "Failure tracker opened, provider calls suspended"
            );
        } else {
            tracing::debug!(
                consecutive_failures = state.consecutive_failures,
                threshold = self.config.failure_threshold,
                "Provider failure recorded"
            );
        }
        true
    }

    /// Record a successful call. Resets the counter unconditionally.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if state.consecutive_failures > 0 {
            tracing::debug!(
                consecutive_failures = state.consecutive_failures,
                "Provider recovered, failure counter reset"
            );
        }
        state.consecutive_failures = 0;
        state.total_successes += 1;
    }

    /// Clear the counter and timestamp.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.consecutive_failures = 0;
        state.last_failure = None;
    }

    /// Counter snapshot.
    #[must_use]
    pub fn stats(&self) -> FailureStats {
        let state = self.lock();
        FailureStats {
            state: if state.is_open(&self.config) {
                CircuitState::Open
            } else {
                CircuitState::Closed
            },
            consecutive_failures: state.consecutive_failures,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
            trips: state.trips,
            since_last_failure: state.last_failure.map(|t| t.elapsed()),
        }
    }

    /// Time left before an open breaker lets a trial call through.
    #[must_use]
    pub fn remaining_cooldown(&self) -> Option<Duration> {
        let state = self.lock();
        if !state.is_open(&self.config) {
            return None;
        }
        state
            .last_failure
            .map(|last| self.config.cooldown.saturating_sub(last.elapsed()))
    }
}

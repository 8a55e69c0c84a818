//! Metrics collection.
//!
//! This module provides:
//! - Per-intent request counts and latency
//! - How often the provider answered versus a fallback
//! - A bounded history of fallback events with their reasons
//!
//! # Example
//!
//! ```
//! use typing_coach::metrics::{MetricsCollector, MetricEvent};
//!
//! let metrics = MetricsCollector::new();
//! metrics.record(MetricEvent::new("chitchat", 150, true));
//! metrics.record(MetricEvent::new("chitchat", 200, true));
//! metrics.record(MetricEvent::new("generate_exercise", 300, false));
//!
//! let summary = metrics.summary();
//! assert_eq!(summary.total_requests, 3);
//! // 2 out of 3 answered by the provider = ~66.7%
//! assert!((summary.provider_rate - 0.666).abs() < 0.01);
//! assert!(summary.by_intent.contains_key("generate_exercise"));
//! ```

// Allow intentional numeric casts for metrics calculations
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::Instant;

/// Maximum number of fallback events kept.
const MAX_FALLBACKS: usize = 1_000;

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// One answered coaching request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    /// Intent of the returned response.
    pub intent: String,
    /// End-to-end latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the provider produced the answer.
    pub answered_by_provider: bool,
    /// Provider attempts made (0 when the provider was not contacted).
    pub attempts: u32,
    /// Timestamp of the event (Unix epoch seconds).
    pub timestamp: u64,
}

impl MetricEvent {
    /// Create a new metric event.
    #[must_use]
    pub fn new(intent: impl Into<String>, latency_ms: u64, answered_by_provider: bool) -> Self {
        Self {
            intent: intent.into(),
            latency_ms,
            answered_by_provider,
            attempts: u32::from(answered_by_provider),
            timestamp: now_secs(),
        }
    }

    /// Set the number of provider attempts.
    #[must_use]
    pub const fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Summary statistics for one intent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntentSummary {
    /// Requests answered with this intent.
    pub total_requests: u64,
    /// Answered by the provider.
    pub from_provider: u64,
    /// Answered by a fallback.
    pub from_fallback: u64,
    /// Average latency in milliseconds.
    pub avg_latency_ms: f64,
    /// Minimum latency in milliseconds.
    pub min_latency_ms: u64,
    /// Maximum latency in milliseconds.
    pub max_latency_ms: u64,
    /// Average provider attempts per request.
    pub avg_attempts: f64,
}

/// Overall metrics summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    /// Total requests across all intents.
    pub total_requests: u64,
    /// Share answered by the provider (0.0-1.0).
    pub provider_rate: f64,
    /// Per-intent summaries.
    pub by_intent: HashMap<String, IntentSummary>,
    /// Fallback counts per reason.
    pub fallbacks_by_reason: HashMap<String, u64>,
}

/// A request answered by a fallback generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackEvent {
    /// Intent of the fallback response.
    pub intent: String,
    /// Why the fallback ran.
    pub reason: String,
    /// Timestamp.
    pub timestamp: u64,
}

impl FallbackEvent {
    /// Create a new fallback event.
    #[must_use]
    pub fn new(intent: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            reason: reason.into(),
            timestamp: now_secs(),
        }
    }
}

/// Thread-safe metrics collector.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    events: RwLock<Vec<MetricEvent>>,
    fallbacks: RwLock<VecDeque<FallbackEvent>>,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a metric event.
    pub fn record(&self, event: MetricEvent) {
        match self.events.write() {
            Ok(mut events) => {
                events.push(event);
            }
            Err(poison_error) => {
                tracing::error!(
                    intent = %event.intent,
                    error = %poison_error,
                    "Failed to record metric event: RwLock poisoned"
                );
            }
        }
    }

    /// Record a fallback event, keeping at most the last
    /// `MAX_FALLBACKS`.
    pub fn record_fallback(&self, fallback: FallbackEvent) {
        match self.fallbacks.write() {
            Ok(mut fallbacks) => {
                if fallbacks.len() >= MAX_FALLBACKS {
                    fallbacks.pop_front();
                }
                fallbacks.push_back(fallback);
            }
            Err(poison_error) => {
                tracing::error!(
                    intent = %fallback.intent,
                    reason = %fallback.reason,
                    error = %poison_error,
                    "Failed to record fallback event: RwLock poisoned"
                );
            }
        }
    }

    /// Get summary statistics.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let events = match self.events.read() {
            Ok(e) => e.clone(),
            Err(poison_error) => {
                tracing::warn!(
                    error = %poison_error,
                    "Reading events from poisoned lock, using recovered data"
                );
                poison_error.into_inner().clone()
            }
        };

        let mut by_intent: HashMap<String, Vec<&MetricEvent>> = HashMap::new();
        for event in &events {
            by_intent.entry(event.intent.clone()).or_default().push(event);
        }

        let intent_summaries: HashMap<String, IntentSummary> = by_intent
            .into_iter()
            .map(|(intent, intent_events)| {
                let total = intent_events.len() as u64;
                let from_provider = intent_events
                    .iter()
                    .filter(|e| e.answered_by_provider)
                    .count() as u64;
                let latencies: Vec<u64> = intent_events.iter().map(|e| e.latency_ms).collect();
                let attempts: u64 = intent_events.iter().map(|e| u64::from(e.attempts)).sum();

                (
                    intent,
                    IntentSummary {
                        total_requests: total,
                        from_provider,
                        from_fallback: total - from_provider,
                        avg_latency_ms: latencies.iter().sum::<u64>() as f64 / total as f64,
                        min_latency_ms: latencies.iter().copied().min().unwrap_or(0),
                        max_latency_ms: latencies.iter().copied().max().unwrap_or(0),
                        avg_attempts: attempts as f64 / total as f64,
                    },
                )
            })
            .collect();

        let total_requests = events.len() as u64;
        let from_provider = events.iter().filter(|e| e.answered_by_provider).count() as u64;
        let provider_rate = if total_requests > 0 {
            from_provider as f64 / total_requests as f64
        } else {
            1.0
        };

        let mut fallbacks_by_reason: HashMap<String, u64> = HashMap::new();
        for fallback in self.fallbacks() {
            *fallbacks_by_reason.entry(fallback.reason).or_default() += 1;
        }

        MetricsSummary {
            total_requests,
            provider_rate,
            by_intent: intent_summaries,
            fallbacks_by_reason,
        }
    }

    /// Events for a specific intent.
    #[must_use]
    pub fn requests_by_intent(&self, intent: &str) -> Vec<MetricEvent> {
        self.events
            .read()
            .map(|events| {
                events
                    .iter()
                    .filter(|e| e.intent == intent)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Recent fallbacks, oldest first.
    #[must_use]
    pub fn fallbacks(&self) -> Vec<FallbackEvent> {
        self.fallbacks
            .read()
            .map(|f| f.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all metrics (useful for testing).
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.write() {
            events.clear();
        }
        if let Ok(mut fallbacks) = self.fallbacks.write() {
            fallbacks.clear();
        }
    }
}

/// Timer for measuring operation latency.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp
)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_event_new() {
        let event = MetricEvent::new("chitchat", 100, true);
        assert_eq!(event.intent, "chitchat");
        assert_eq!(event.latency_ms, 100);
        assert!(event.answered_by_provider);
        assert_eq!(event.attempts, 1);
        assert!(event.timestamp > 0);

        let fallback = MetricEvent::new("chitchat", 5, false);
        assert_eq!(fallback.attempts, 0);
    }

    #[test]
    fn test_metric_event_with_attempts() {
        let event = MetricEvent::new("generate_exercise", 200, true).with_attempts(3);
        assert_eq!(event.attempts, 3);
    }

    #[test]
    fn test_fallback_event_new() {
        let fallback = FallbackEvent::new("analyze_session", "provider_unavailable");
        assert_eq!(fallback.intent, "analyze_session");
        assert_eq!(fallback.reason, "provider_unavailable");
        assert!(fallback.timestamp > 0);
    }

    #[test]
    fn test_metrics_collector_summary() {
        let collector = MetricsCollector::new();
        collector.record(MetricEvent::new("generate_exercise", 100, true));
        collector.record(MetricEvent::new("generate_exercise", 200, true).with_attempts(2));
        collector.record(MetricEvent::new("generate_exercise", 300, false));
        collector.record(MetricEvent::new("chitchat", 50, true));

        let summary = collector.summary();
        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.by_intent.len(), 2);

        let exercise = summary.by_intent.get("generate_exercise").unwrap();
        assert_eq!(exercise.total_requests, 3);
        assert_eq!(exercise.from_provider, 2);
        assert_eq!(exercise.from_fallback, 1);
        assert!((exercise.avg_latency_ms - 200.0).abs() < f64::EPSILON);
        assert_eq!(exercise.min_latency_ms, 100);
        assert_eq!(exercise.max_latency_ms, 300);
        assert!((exercise.avg_attempts - 1.0).abs() < f64::EPSILON);
        assert!((summary.provider_rate - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary() {
        let summary = MetricsCollector::new().summary();
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.provider_rate, 1.0);
        assert!(summary.by_intent.is_empty());
    }

    #[test]
    fn test_fallbacks_grouped_by_reason() {
        let collector = MetricsCollector::new();
        collector.record_fallback(FallbackEvent::new("chitchat", "provider_unavailable"));
        collector.record_fallback(FallbackEvent::new("generate_exercise", "provider_unavailable"));
        collector.record_fallback(FallbackEvent::new("chitchat", "invalid_output"));

        let fallbacks = collector.fallbacks();
        assert_eq!(fallbacks.len(), 3);
        assert_eq!(fallbacks[0].intent, "chitchat");

        let summary = collector.summary();
        assert_eq!(summary.fallbacks_by_reason.get("provider_unavailable"), Some(&2));
        assert_eq!(summary.fallbacks_by_reason.get("invalid_output"), Some(&1));
    }

    #[test]
    fn test_fallback_history_is_bounded() {
        let collector = MetricsCollector::new();
        for i in 0..=MAX_FALLBACKS {
            collector.record_fallback(FallbackEvent::new(format!("intent-{i}"), "provider_failed"));
        }
        let fallbacks = collector.fallbacks();
        assert_eq!(fallbacks.len(), MAX_FALLBACKS);
        assert_eq!(fallbacks[0].intent, "intent-1");
    }

    #[test]
    fn test_requests_by_intent_and_clear() {
        let collector = MetricsCollector::new();
        collector.record(MetricEvent::new("chitchat", 100, true));
        collector.record(MetricEvent::new("analyze_session", 150, true));
        collector.record(MetricEvent::new("chitchat", 200, false));

        assert_eq!(collector.requests_by_intent("chitchat").len(), 2);
        assert!(collector.requests_by_intent("unknown").is_empty());

        collector.clear();
        assert_eq!(collector.summary().total_requests, 0);
        assert!(collector.fallbacks().is_empty());
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(timer.elapsed_ms() >= 5);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;
        use std::thread;

        let collector = Arc::new(MetricsCollector::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let collector = Arc::clone(&collector);
                thread::spawn(move || {
                    for _ in 0..10 {
                        collector.record(MetricEvent::new("chitchat", i, true));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(collector.summary().total_requests, 80);
    }
}

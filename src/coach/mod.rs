//! The coaching entry point.
//!
//! [`CoachService`] turns a user message plus performance context into a
//! [`StructuredResponse`]:
//!
//! ```text
//! message ─▶ RetryPolicy ─▶ ResilientInvoker ─▶ provider ─▶ parse_structured
//!                │                  │                            │
//!                │                  └─ unavailable / failed ─────┤
//!                └─ format retries exhausted ─▶ fallback ────────┤
//!                                                                ▼
//!                                                   per-intent post-processing
//! ```
//!
//! [`CoachService::classify_and_respond`] never fails: every error path ends
//! in deterministic fallback content whose reply explains the degraded
//! capability.

mod hints;
mod types;

pub use hints::{RequestHints, MAX_REQUESTED_WORDS};
pub use types::{
    ConversationTurn, ErrorDetail, Intent, KeyMismatch, PerformanceSnapshot, Role,
    StructuredResponse, Trend,
};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{CoachError, FailureKind, LogicError};
use crate::fallback::{
    fallback_response, practice_text, recommendation, uses_only_keys, DegradedReason,
};
use crate::metrics::{FallbackEvent, MetricEvent, MetricsCollector, Timer};
use crate::parsing::{parse_structured, CheckedPayload, GeneratedText};
use crate::prompts;
use crate::resilience::{
    FailureTracker, FailureTrackerConfig, FallbackReason, ResilientInvoker, RetryPolicy,
};
use crate::traits::LanguageModel;

/// Words that mark a reply as containing an actionable suggestion.
const RECOMMENDATION_MARKERS: &[&str] = &[
    "recommend",
    "suggest",
    "try",
    "practice",
    "practise",
    "focus",
    "work on",
];

/// Pipeline tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoachSettings {
    /// Consecutive provider failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open.
    pub cooldown: Duration,
    /// Bound on a single provider call.
    pub request_timeout: Duration,
    /// Retries after a format failure.
    pub max_format_retries: u32,
    /// Linear backoff unit between format retries.
    pub retry_backoff: Duration,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(300),
            request_timeout: Duration::from_secs(30),
            max_format_retries: 2,
            retry_backoff: Duration::from_secs(1),
        }
    }
}

/// What one pass through the retry loop produced.
#[derive(Debug)]
enum Answer {
    Checked(CheckedPayload),
    Degraded(StructuredResponse, DegradedReason),
}

/// Provider text, or why the invoker skipped the provider.
#[derive(Debug)]
enum Draft {
    Raw(String),
    Degraded(DegradedReason),
}

/// Borrowed inputs of one request.
#[derive(Debug, Clone, Copy)]
struct RequestContext<'a> {
    message: &'a str,
    snapshot: &'a PerformanceSnapshot,
    history: &'a [ConversationTurn],
    errors: Option<&'a ErrorDetail>,
    hints: &'a RequestHints,
}

impl RequestContext<'_> {
    fn degraded(&self, reason: DegradedReason) -> StructuredResponse {
        fallback_response(self.hints, self.snapshot, self.errors, reason)
    }
}

/// Intent-routed coaching over an unreliable language model.
///
/// One service owns one [`FailureTracker`]; clone the `Arc` returned by
/// [`CoachService::tracker`] to observe it.
#[derive(Debug)]
pub struct CoachService<M> {
    invoker: ResilientInvoker<M>,
    retry: RetryPolicy,
    metrics: Arc<MetricsCollector>,
}

impl<M: LanguageModel> CoachService<M> {
    /// Create a service with its own failure tracker.
    #[must_use]
    pub fn new(model: M, settings: CoachSettings) -> Self {
        let tracker = Arc::new(FailureTracker::new(FailureTrackerConfig {
            failure_threshold: settings.failure_threshold,
            cooldown: settings.cooldown,
        }));
        Self::with_tracker(model, tracker, settings)
    }

    /// Create a service around an existing failure tracker.
    #[must_use]
    pub fn with_tracker(model: M, tracker: Arc<FailureTracker>, settings: CoachSettings) -> Self {
        Self {
            invoker: ResilientInvoker::new(model, tracker, settings.request_timeout),
            retry: RetryPolicy::new(settings.max_format_retries, settings.retry_backoff),
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// The failure tracker guarding the provider.
    #[must_use]
    pub const fn tracker(&self) -> &Arc<FailureTracker> {
        self.invoker.tracker()
    }

    /// Request metrics.
    #[must_use]
    pub const fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Classify `message` and answer it. Never fails.
    ///
    /// Errors that [`Self::try_classify_and_respond`] would return are
    /// logged and answered with fallback content.
    pub async fn classify_and_respond(
        &self,
        message: &str,
        snapshot: &PerformanceSnapshot,
        history: &[ConversationTurn],
        errors: Option<&ErrorDetail>,
        cancel: &CancellationToken,
    ) -> StructuredResponse {
        match self
            .try_classify_and_respond(message, snapshot, history, errors, cancel)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(error = %error, kind = ?error.kind(), "Coaching request failed, using static fallback");
                let hints = RequestHints::from_message(message);
                let usable = if snapshot.validate().is_ok() {
                    snapshot.clone()
                } else {
                    PerformanceSnapshot::default()
                };
                let reason = DegradedReason::InternalError;
                let response = fallback_response(&hints, &usable, errors, reason);
                self.record(&response, Some(reason), 0, 0);
                response
            }
        }
    }

    /// Classify `message` and answer it.
    ///
    /// Provider outages and unusable provider output are absorbed into
    /// fallback content; only invalid input surfaces.
    ///
    /// # Errors
    ///
    /// Returns a logic-class [`CoachError`] when the message is blank, the
    /// snapshot holds impossible values, or the provider rejects the request
    /// itself.
    pub async fn try_classify_and_respond(
        &self,
        message: &str,
        snapshot: &PerformanceSnapshot,
        history: &[ConversationTurn],
        errors: Option<&ErrorDetail>,
        cancel: &CancellationToken,
    ) -> Result<StructuredResponse, CoachError> {
        if message.trim().is_empty() {
            return Err(LogicError::InvalidArgument {
                name: "message".to_string(),
                reason: "must not be blank".to_string(),
            }
            .into());
        }
        snapshot.validate()?;

        let hints = RequestHints::from_message(message);
        let request = RequestContext {
            message,
            snapshot,
            history,
            errors,
            hints: &hints,
        };

        let span = tracing::info_span!(
            "coach_request",
            request_id = %Uuid::new_v4(),
            guessed_intent = %hints.guessed_intent,
        );
        self.respond(request, cancel).instrument(span).await
    }

    async fn respond(
        &self,
        request: RequestContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<StructuredResponse, CoachError> {
        let timer = Timer::start();
        let attempts = AtomicU32::new(0);

        let answer = self
            .retry
            .run(
                cancel,
                |context| self.attempt(request, context.correction, &attempts, cancel),
                |error| {
                    let reason = if error.kind() == FailureKind::Format {
                        DegradedReason::InvalidOutput
                    } else {
                        DegradedReason::ProviderFailed
                    };
                    Answer::Degraded(request.degraded(reason), reason)
                },
            )
            .await?;

        let (response, degraded) = match answer {
            Answer::Checked(payload) => {
                let response = finish(payload, &request);
                if response.satisfies_invariant() {
                    (response, None)
                } else {
                    tracing::warn!(intent = %response.intent, "Post-processed response broke the intent invariant");
                    let reason = DegradedReason::InternalError;
                    (request.degraded(reason), Some(reason))
                }
            }
            Answer::Degraded(response, reason) => (response, Some(reason)),
        };

        let attempts = attempts.load(Ordering::Relaxed);
        self.record(&response, degraded, timer.elapsed_ms(), attempts);
        tracing::info!(
            intent = %response.intent,
            attempts,
            degraded = degraded.map(DegradedReason::as_str),
            elapsed_ms = timer.elapsed_ms(),
            "Coaching request answered"
        );
        Ok(response)
    }

    /// One provider attempt: prompt, guarded call, parse.
    async fn attempt(
        &self,
        request: RequestContext<'_>,
        correction: Option<String>,
        attempts: &AtomicU32,
        cancel: &CancellationToken,
    ) -> Result<Answer, CoachError> {
        let system = prompts::system_prompt();
        let user = prompts::user_prompt(
            request.message,
            request.snapshot,
            request.history,
            request.errors,
            request.hints,
            correction.as_deref(),
        );

        let draft = self
            .invoker
            .call(
                |model| {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    let user = &user;
                    async move { model.generate(system, user).await.map(Draft::Raw) }
                },
                |reason| {
                    Draft::Degraded(match reason {
                        FallbackReason::Unavailable => DegradedReason::ProviderUnavailable,
                        FallbackReason::ProviderFailed(_) => DegradedReason::ProviderFailed,
                    })
                },
                cancel,
            )
            .await?
            .into_inner();

        match draft {
            Draft::Raw(text) => Ok(Answer::Checked(parse_structured(&text)?)),
            Draft::Degraded(reason) => Ok(Answer::Degraded(request.degraded(reason), reason)),
        }
    }

    fn record(
        &self,
        response: &StructuredResponse,
        degraded: Option<DegradedReason>,
        latency_ms: u64,
        attempts: u32,
    ) {
        let intent = response.intent.as_str();
        self.metrics
            .record(MetricEvent::new(intent, latency_ms, degraded.is_none()).with_attempts(attempts));
        if let Some(reason) = degraded {
            self.metrics
                .record_fallback(FallbackEvent::new(intent, reason.as_str()));
        }
    }
}

/// Apply the per-intent rules to a provider payload.
fn finish(payload: CheckedPayload, request: &RequestContext<'_>) -> StructuredResponse {
    match payload.intent {
        Intent::GenerateExercise => {
            let text = match payload.text {
                GeneratedText::Ready(text) => conform_practice_text(text, request),
                GeneratedText::NeedsFill | GeneratedText::None => {
                    tracing::info!("Filling missing practice text locally");
                    practice_text(request.hints, request.snapshot).0
                }
            };
            StructuredResponse::exercise(text, payload.reply)
        }
        Intent::AnalyzeSession => StructuredResponse::analysis(complete_analysis(
            payload.reply,
            request.snapshot,
            request.errors,
        )),
        Intent::Chitchat => StructuredResponse::chitchat(payload.reply),
    }
}

/// Keep provider practice text only if it honours the requested keys and
/// word count; otherwise generate it locally.
fn conform_practice_text(text: String, request: &RequestContext<'_>) -> String {
    if let Some(keys) = &request.hints.drill_keys {
        if !uses_only_keys(&text, keys) {
            tracing::info!(keys = ?keys, "Practice text uses keys outside the drill, regenerating");
            return practice_text(request.hints, request.snapshot).0;
        }
    }
    if let Some(requested) = request.hints.word_count {
        let actual = text.split_whitespace().count();
        if !within_tolerance(actual, requested) {
            tracing::info!(requested, actual, "Practice text length outside tolerance, regenerating");
            return practice_text(request.hints, request.snapshot).0;
        }
    }
    text
}

/// Whether `actual` words is within `max(1, ceil(5%))` of `requested`.
fn within_tolerance(actual: usize, requested: usize) -> bool {
    let tolerance = requested.div_ceil(20).max(1);
    actual.abs_diff(requested) <= tolerance
}

/// Make sure an analysis reply quotes a number and gives advice.
fn complete_analysis(
    reply: String,
    snapshot: &PerformanceSnapshot,
    errors: Option<&ErrorDetail>,
) -> String {
    let mut reply = reply;
    if !quotes_snapshot(&reply, snapshot) {
        let metric = if snapshot.has_sessions() {
            format!(
                "You are averaging {:.0} WPM at {:.0}% accuracy over {} sessions.",
                snapshot.average_wpm, snapshot.average_accuracy, snapshot.session_count
            )
        } else {
            "You have completed 0 sessions so far.".to_string()
        };
        reply = format!("{} {metric}", reply.trim_end());
    }

    if !has_recommendation(&reply) {
        reply = format!(
            "{}\nRecommendation: {}",
            reply.trim_end(),
            recommendation(snapshot, errors)
        );
    }
    reply
}

/// Whether the reply states one of the snapshot's own figures, rounded the
/// way the fallback summary renders them.
fn quotes_snapshot(reply: &str, snapshot: &PerformanceSnapshot) -> bool {
    let mut figures = vec![snapshot.session_count.to_string()];
    if snapshot.has_sessions() {
        figures.push(format!("{:.0}", snapshot.average_wpm));
        figures.push(format!("{:.0}", snapshot.average_accuracy));
    }

    reply
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|token| token.trim_matches('.'))
        .filter_map(|token| token.parse::<f64>().ok())
        .any(|number| figures.contains(&format!("{number:.0}")))
}

/// Whether the reply contains a recommendation marker as a whole word, or
/// a word starting with one.
fn has_recommendation(reply: &str) -> bool {
    let lowered = reply.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    RECOMMENDATION_MARKERS.iter().any(|marker| {
        let parts: Vec<&str> = marker.split(' ').collect();
        words
            .windows(parts.len())
            .any(|run| run.iter().zip(&parts).all(|(word, part)| word.starts_with(part)))
    })
}

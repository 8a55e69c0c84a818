//! Deterministic, provider-free content.
//!
//! These generators back every path where the provider cannot be used:
//! - [`exercise_text`]: canned passages of an exact word count
//! - [`key_drill`] / [`key_drill_words`]: drills restricted to a key set
//! - [`analysis_summary`]: template review of recorded statistics
//!
//! [`fallback_response`] assembles them into a complete
//! [`StructuredResponse`] whose reply tells the user the coach is degraded.

mod analysis;
mod drill;
mod exercise;

pub use analysis::{analysis_summary, recommendation};
pub use drill::{
    key_drill, key_drill_words, normalize_keys, uses_only_keys, DEFAULT_DRILL_CHARS,
    MAX_DRILL_KEYS,
};
pub use exercise::{exercise_text, DEFAULT_EXERCISE_WORDS};

use std::fmt;

use crate::coach::{ErrorDetail, Intent, PerformanceSnapshot, RequestHints, StructuredResponse};

/// Why the answer came from a fallback instead of the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DegradedReason {
    /// The failure tracker is holding calls back.
    ProviderUnavailable,
    /// The provider call failed.
    ProviderFailed,
    /// The provider kept answering in an unusable format.
    InvalidOutput,
    /// The request could not be processed.
    InternalError,
}

impl DegradedReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderFailed => "provider_failed",
            Self::InvalidOutput => "invalid_output",
            Self::InternalError => "internal_error",
        }
    }

    /// Plain-language notice shown to the user.
    #[must_use]
    pub const fn notice(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => {
                "The AI coach is taking a short break after repeated connection problems."
            }
            Self::ProviderFailed => "The AI coach could not be reached just now.",
            Self::InvalidOutput => "The AI coach gave an answer I could not use.",
            Self::InternalError => "Something went wrong while preparing your coaching reply.",
        }
    }
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of practice text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeKind {
    /// A key drill.
    Drill,
    /// A canned passage.
    Passage,
}

/// Practice text matching the request: a drill when keys were named (or
/// weak keys requested), a passage otherwise. Honours a requested word
/// count exactly.
#[must_use]
pub fn practice_text(hints: &RequestHints, snapshot: &PerformanceSnapshot) -> (String, PracticeKind) {
    if let Some(keys) = hints.effective_drill_keys(snapshot) {
        let text = hints.word_count.map_or_else(
            || key_drill(&keys, DEFAULT_DRILL_CHARS),
            |words| key_drill_words(&keys, words),
        );
        if !text.is_empty() {
            return (text, PracticeKind::Drill);
        }
    }
    let words = hints.word_count.unwrap_or(DEFAULT_EXERCISE_WORDS);
    (exercise_text(words), PracticeKind::Passage)
}

/// Reply describing practice text the coach generated itself.
#[must_use]
pub fn practice_reply(kind: PracticeKind, hints: &RequestHints, snapshot: &PerformanceSnapshot) -> String {
    match kind {
        PracticeKind::Drill => {
            let keys = hints.effective_drill_keys(snapshot).unwrap_or_default();
            let list = keys
                .iter()
                .map(char::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!("Here is a key drill for {list}. Type each group slowly and evenly.")
        }
        PracticeKind::Passage => {
            "Here is a practice passage. Focus on accuracy first, then build speed.".to_string()
        }
    }
}

/// Complete fallback answer for a message.
///
/// The intent comes from the message hints; the reply opens with the
/// degraded-capability notice for `reason`.
#[must_use]
pub fn fallback_response(
    hints: &RequestHints,
    snapshot: &PerformanceSnapshot,
    errors: Option<&ErrorDetail>,
    reason: DegradedReason,
) -> StructuredResponse {
    let notice = reason.notice();
    match hints.guessed_intent {
        Intent::Chitchat => StructuredResponse::chitchat(format!(
            "{notice} I can still give you practice drills and a summary of your progress while it recovers."
        )),
        Intent::AnalyzeSession => StructuredResponse::analysis(format!(
            "{notice} Here is a summary from your saved statistics:\n{}",
            analysis_summary(snapshot, errors)
        )),
        Intent::GenerateExercise => {
            let (text, kind) = practice_text(hints, snapshot);
            let reply = format!("{notice} {}", practice_reply(kind, hints, snapshot));
            StructuredResponse::exercise(text, reply)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_fallback_drill_scenario() {
        let hints = RequestHints::from_message("drill with a s d, 5 words");
        let response = fallback_response(
            &hints,
            &PerformanceSnapshot::default(),
            None,
            DegradedReason::ProviderUnavailable,
        );

        assert_eq!(response.intent, Intent::GenerateExercise);
        let text = response.generated_text.as_deref().unwrap();
        assert_eq!(text.split_whitespace().count(), 5);
        assert!(uses_only_keys(text, &['a', 's', 'd']));
        assert!(response.reply.contains("drill"));
        assert!(response.satisfies_invariant());
    }

    #[test]
    fn test_fallback_analysis_scenario() {
        let hints = RequestHints::from_message("how am I doing?");
        let snapshot = PerformanceSnapshot::new(5, 45.0, 92.0);
        let response = fallback_response(&hints, &snapshot, None, DegradedReason::ProviderFailed);

        assert_eq!(response.intent, Intent::AnalyzeSession);
        assert!(response.generated_text.is_none());
        assert!(response.reply.contains("45"));
        assert!(response.reply.contains("92"));
        assert!(response.reply.starts_with(DegradedReason::ProviderFailed.notice()));
    }

    #[test]
    fn test_fallback_chitchat_explains_degradation() {
        let hints = RequestHints::from_message("hi coach");
        let response = fallback_response(
            &hints,
            &PerformanceSnapshot::default(),
            None,
            DegradedReason::InvalidOutput,
        );
        assert_eq!(response.intent, Intent::Chitchat);
        assert!(response.reply.contains("could not use"));
        assert!(response.satisfies_invariant());
    }

    #[test]
    fn test_practice_text_passage_with_word_count() {
        let hints = RequestHints::from_message("give me 40 words");
        let (text, kind) = practice_text(&hints, &PerformanceSnapshot::default());
        assert_eq!(kind, PracticeKind::Passage);
        assert_eq!(text.split_whitespace().count(), 40);
    }

    #[test]
    fn test_practice_text_weak_key_drill() {
        let hints = RequestHints::from_message("practice my weak keys");
        let snapshot = PerformanceSnapshot::default().with_weak_keys(["j", "k"]);
        let (text, kind) = practice_text(&hints, &snapshot);

        assert_eq!(kind, PracticeKind::Drill);
        assert!(uses_only_keys(&text, &['j', 'k']));
        assert!(text.len() <= DEFAULT_DRILL_CHARS);
    }

    #[test_case(DegradedReason::ProviderUnavailable ; "unavailable")]
    #[test_case(DegradedReason::ProviderFailed ; "failed")]
    #[test_case(DegradedReason::InvalidOutput ; "invalid")]
    #[test_case(DegradedReason::InternalError ; "internal")]
    fn test_every_reason_yields_valid_response(reason: DegradedReason) {
        for message in ["hello", "how am I doing?", "drill f j", "30 words please"] {
            let hints = RequestHints::from_message(message);
            let response = fallback_response(&hints, &PerformanceSnapshot::default(), None, reason);
            assert!(response.satisfies_invariant(), "{message}: {response:?}");
        }
    }
}

//! Domain types shared by the pipeline and its callers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::LogicError;

/// What the user wants from the coach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Small talk or general typing questions.
    Chitchat,
    /// A review of the user's recorded performance.
    AnalyzeSession,
    /// A practice passage or key drill.
    GenerateExercise,
}

impl Intent {
    /// All intents, in wire order.
    pub const ALL: [Self; 3] = [Self::Chitchat, Self::AnalyzeSession, Self::GenerateExercise];

    /// Wire literal of this intent.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chitchat => "chitchat",
            Self::AnalyzeSession => "analyze_session",
            Self::GenerateExercise => "generate_exercise",
        }
    }

    /// Lenient parse of a provider-supplied intent label.
    ///
    /// Case-insensitive; `-` and spaces are read as `_`.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        Self::ALL.into_iter().find(|i| i.as_str() == normalized)
    }

    /// Whether a response with this intent may carry generated text.
    #[must_use]
    pub const fn allows_generated_text(self) -> bool {
        matches!(self, Self::GenerateExercise)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three-field result returned to callers.
///
/// Serializes as exactly `{"intent", "generated_text", "reply"}`, with
/// `generated_text` written as an explicit `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StructuredResponse {
    /// Classified intent.
    pub intent: Intent,
    /// Practice text. Present only for `generate_exercise`.
    pub generated_text: Option<String>,
    /// Message shown to the user. Never empty.
    pub reply: String,
}

impl StructuredResponse {
    /// A chit-chat reply.
    #[must_use]
    pub fn chitchat(reply: impl Into<String>) -> Self {
        Self {
            intent: Intent::Chitchat,
            generated_text: None,
            reply: reply.into(),
        }
    }

    /// A session analysis reply.
    #[must_use]
    pub fn analysis(reply: impl Into<String>) -> Self {
        Self {
            intent: Intent::AnalyzeSession,
            generated_text: None,
            reply: reply.into(),
        }
    }

    /// An exercise with its practice text.
    #[must_use]
    pub fn exercise(text: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            intent: Intent::GenerateExercise,
            generated_text: Some(text.into()),
            reply: reply.into(),
        }
    }

    /// Whether the intent and generated text agree and the reply is usable.
    #[must_use]
    pub fn satisfies_invariant(&self) -> bool {
        let text_ok = match (&self.generated_text, self.intent.allows_generated_text()) {
            (None, false) => true,
            (Some(text), true) => !text.trim().is_empty(),
            _ => false,
        };
        text_ok && !self.reply.trim().is_empty()
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The typist.
    User,
    /// The coach.
    Assistant,
}

/// One earlier message in the conversation. Owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
    /// When it was said.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// A user turn stamped now.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// An assistant turn stamped now.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Direction of recent performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Getting faster or more accurate.
    Improving,
    /// No significant change.
    Stable,
    /// Getting slower or less accurate.
    Declining,
    /// Not enough sessions to tell.
    #[default]
    Unknown,
}

impl Trend {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Improving => "improving",
            Self::Stable => "stable",
            Self::Declining => "declining",
            Self::Unknown => "unknown",
        }
    }
}

/// Aggregate session statistics supplied by the metrics collaborator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSnapshot {
    /// Completed sessions.
    #[serde(alias = "sessions")]
    pub session_count: u32,
    /// Average speed in words per minute.
    #[serde(alias = "avg_wpm", alias = "average_speed")]
    pub average_wpm: f64,
    /// Average accuracy in percent (0 to 100).
    #[serde(alias = "avg_accuracy")]
    pub average_accuracy: f64,
    /// Keys the user most often gets wrong.
    pub weak_keys: Vec<String>,
    /// Direction of recent sessions.
    pub trend: Trend,
}

impl PerformanceSnapshot {
    /// Snapshot with the headline statistics set.
    #[must_use]
    pub fn new(session_count: u32, average_wpm: f64, average_accuracy: f64) -> Self {
        Self {
            session_count,
            average_wpm,
            average_accuracy,
            ..Self::default()
        }
    }

    /// Set the weak keys.
    #[must_use]
    pub fn with_weak_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.weak_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the trend.
    #[must_use]
    pub const fn with_trend(mut self, trend: Trend) -> Self {
        self.trend = trend;
        self
    }

    /// Whether any session has been recorded.
    #[must_use]
    pub const fn has_sessions(&self) -> bool {
        self.session_count > 0
    }

    /// Weak keys that are single characters, lowercased and deduplicated.
    #[must_use]
    pub fn weak_key_chars(&self) -> Vec<char> {
        let mut keys = Vec::new();
        for key in &self.weak_keys {
            let mut chars = key.trim().chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                let c = c.to_ascii_lowercase();
                if c.is_ascii_graphic() && !keys.contains(&c) {
                    keys.push(c);
                }
            }
        }
        keys
    }

    /// Reject values no metrics engine can produce.
    ///
    /// # Errors
    ///
    /// Returns [`LogicError::InvalidSnapshot`] for a negative or non-finite
    /// speed, or an accuracy outside 0 to 100.
    pub fn validate(&self) -> Result<(), LogicError> {
        if !self.average_wpm.is_finite() || self.average_wpm < 0.0 {
            return Err(LogicError::InvalidSnapshot {
                field: "average_wpm".to_string(),
                reason: format!("must be a non-negative number, got {}", self.average_wpm),
            });
        }
        if !self.average_accuracy.is_finite() || !(0.0..=100.0).contains(&self.average_accuracy)
        {
            return Err(LogicError::InvalidSnapshot {
                field: "average_accuracy".to_string(),
                reason: format!("must be between 0 and 100, got {}", self.average_accuracy),
            });
        }
        Ok(())
    }
}

/// One keystroke that did not match the expected character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMismatch {
    /// Offset into the exercise text.
    pub position: usize,
    /// Character the exercise asked for.
    pub expected: char,
    /// Character actually typed.
    pub typed: char,
    /// Milliseconds since the session started.
    pub timestamp_ms: u64,
}

/// Error detail of the most recent session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    /// Error count per expected key.
    pub key_errors: BTreeMap<String, u32>,
    /// Mismatches in typing order.
    pub mismatches: Vec<KeyMismatch>,
}

impl ErrorDetail {
    /// Record one mismatch, bumping the per-key count.
    pub fn record(&mut self, mismatch: KeyMismatch) {
        *self
            .key_errors
            .entry(mismatch.expected.to_string())
            .or_insert(0) += 1;
        self.mismatches.push(mismatch);
    }

    /// Up to `n` keys with the most errors, highest first, ties by key.
    #[must_use]
    pub fn top_error_keys(&self, n: usize) -> Vec<(&str, u32)> {
        let mut keys: Vec<(&str, u32)> = self
            .key_errors
            .iter()
            .filter(|(_, &count)| count > 0)
            .map(|(key, &count)| (key.as_str(), count))
            .collect();
        keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        keys.truncate(n);
        keys
    }

    /// Total recorded errors.
    #[must_use]
    pub fn total_errors(&self) -> u32 {
        self.key_errors.values().sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("chitchat", Some(Intent::Chitchat) ; "exact")]
    #[test_case("Analyze_Session", Some(Intent::AnalyzeSession) ; "mixed case")]
    #[test_case("generate-exercise", Some(Intent::GenerateExercise) ; "hyphen")]
    #[test_case(" generate exercise ", Some(Intent::GenerateExercise) ; "space")]
    #[test_case("exercise", None ; "partial")]
    #[test_case("", None ; "empty")]
    fn test_intent_parse(label: &str, expected: Option<Intent>) {
        assert_eq!(Intent::parse(label), expected);
    }

    #[test]
    fn test_intent_wire_literals_match_as_str() {
        for intent in Intent::ALL {
            let value = serde_json::to_value(intent).unwrap();
            assert_eq!(value, json!(intent.as_str()));
            assert_eq!(intent.to_string(), intent.as_str());
        }
    }

    #[test]
    fn test_structured_response_wire_shape_has_explicit_null() {
        let response = StructuredResponse::chitchat("Hi there!");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({"intent": "chitchat", "generated_text": null, "reply": "Hi there!"})
        );
        assert_eq!(value.as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_structured_response_invariant() {
        assert!(StructuredResponse::chitchat("hello").satisfies_invariant());
        assert!(StructuredResponse::analysis("45 WPM").satisfies_invariant());
        assert!(StructuredResponse::exercise("asdf jkl;", "Try this").satisfies_invariant());

        let mut wrong = StructuredResponse::chitchat("hello");
        wrong.generated_text = Some("text".into());
        assert!(!wrong.satisfies_invariant());

        let mut missing = StructuredResponse::exercise("x", "Try this");
        missing.generated_text = None;
        assert!(!missing.satisfies_invariant());

        assert!(!StructuredResponse::chitchat("  ").satisfies_invariant());
    }

    #[test]
    fn test_snapshot_deserializes_with_aliases_and_defaults() {
        let snapshot: PerformanceSnapshot =
            serde_json::from_value(json!({"sessions": 5, "avg_wpm": 45, "avg_accuracy": 92}))
                .unwrap();

        assert_eq!(snapshot.session_count, 5);
        assert_eq!(snapshot.average_wpm, 45.0);
        assert_eq!(snapshot.average_accuracy, 92.0);
        assert!(snapshot.weak_keys.is_empty());
        assert_eq!(snapshot.trend, Trend::Unknown);
    }

    #[test]
    fn test_snapshot_validate() {
        assert!(PerformanceSnapshot::new(5, 45.0, 92.0).validate().is_ok());
        assert!(PerformanceSnapshot::default().validate().is_ok());

        let err = PerformanceSnapshot::new(1, -3.0, 90.0).validate().unwrap_err();
        assert!(matches!(err, LogicError::InvalidSnapshot { field, .. } if field == "average_wpm"));

        let err = PerformanceSnapshot::new(1, 30.0, 120.0)
            .validate()
            .unwrap_err();
        assert!(
            matches!(err, LogicError::InvalidSnapshot { field, .. } if field == "average_accuracy")
        );

        assert!(PerformanceSnapshot::new(1, f64::NAN, 90.0).validate().is_err());
    }

    #[test]
    fn test_weak_key_chars_filters_and_dedupes() {
        let snapshot = PerformanceSnapshot::default().with_weak_keys(["Q", "p", "th", "q", " ", ";"]);
        assert_eq!(snapshot.weak_key_chars(), vec!['q', 'p', ';']);
    }

    #[test]
    fn test_error_detail_top_keys() {
        let mut detail = ErrorDetail::default();
        for (i, c) in "ssaaaqs".chars().enumerate() {
            detail.record(KeyMismatch {
                position: i,
                expected: c,
                typed: 'x',
                timestamp_ms: i as u64 * 100,
            });
        }

        assert_eq!(detail.top_error_keys(2), vec![("a", 3), ("s", 3)]);
        assert_eq!(detail.top_error_keys(5).len(), 3);
        assert_eq!(detail.total_errors(), 7);
        assert_eq!(detail.mismatches.len(), 7);
    }

    #[test]
    fn test_conversation_turn_timestamp_defaults() {
        let turn: ConversationTurn =
            serde_json::from_value(json!({"role": "user", "content": "hi"})).unwrap();
        assert_eq!(turn.role, Role::User);
        assert!(turn.timestamp <= Utc::now());
    }
}

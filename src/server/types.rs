//! Wire types of the stdio protocol.

use serde::{Deserialize, Serialize};

use crate::coach::{ConversationTurn, ErrorDetail, PerformanceSnapshot};

/// One request line.
///
/// Only `message` is required. Missing `performance` and
/// `last_session_errors` are supplied by the configured
/// [`PerformanceSource`](crate::traits::PerformanceSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachRequest {
    /// The user's message.
    pub message: String,
    /// Aggregate statistics, if the caller has them.
    #[serde(default)]
    pub performance: Option<PerformanceSnapshot>,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
    /// Detail of the latest session.
    #[serde(default)]
    pub last_session_errors: Option<ErrorDetail>,
}

/// Line written when a request cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLine {
    /// What went wrong.
    pub error: String,
}

impl ErrorLine {
    /// Create an error line.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::coach::Role;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_request() {
        let request: CoachRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert_eq!(request.message, "hi");
        assert!(request.performance.is_none());
        assert!(request.history.is_empty());
        assert!(request.last_session_errors.is_none());
    }

    #[test]
    fn test_full_request() {
        let request: CoachRequest = serde_json::from_str(
            r#"{
                "message": "how am I doing?",
                "performance": {"sessions": 5, "avg_wpm": 45, "avg_accuracy": 92, "weak_keys": ["q"]},
                "history": [{"role": "user", "content": "hello"}],
                "last_session_errors": {"key_errors": {"q": 4}, "mismatches": []}
            }"#,
        )
        .unwrap();

        let performance = request.performance.unwrap();
        assert_eq!(performance.session_count, 5);
        assert_eq!(performance.weak_keys, vec!["q".to_string()]);
        assert_eq!(request.history[0].role, Role::User);
        assert_eq!(request.last_session_errors.unwrap().total_errors(), 4);
    }

    #[test]
    fn test_message_is_required() {
        assert!(serde_json::from_str::<CoachRequest>(r#"{"history": []}"#).is_err());
    }

    #[test]
    fn test_error_line_shape() {
        let json = serde_json::to_string(&ErrorLine::new("bad line")).unwrap();
        assert_eq!(json, r#"{"error":"bad line"}"#);
    }
}

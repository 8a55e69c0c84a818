//! Prompt construction for the coach.
//!
//! The system prompt embeds the JSON schema of [`StructuredResponse`]
//! (generated with `schemars`) so the provider sees the exact wire shape.
//! The user prompt carries the bounded conversation window, the
//! performance context and, on retries, the corrective instruction.
//!
//! # Example
//!
//! ```
//! use typing_coach::prompts::{system_prompt, CONVERSATION_WINDOW};
//!
//! assert!(system_prompt().contains("generated_text"));
//! assert_eq!(CONVERSATION_WINDOW, 5);
//! ```

use std::fmt::Write as _;
use std::sync::OnceLock;

use crate::coach::{
    ConversationTurn, ErrorDetail, PerformanceSnapshot, RequestHints, Role, StructuredResponse,
};

/// Number of most recent turns included in the prompt.
pub const CONVERSATION_WINDOW: usize = 5;

const TOP_ERROR_KEYS: usize = 5;

const SYSTEM_PREAMBLE: &str = "You are a friendly, concise typing coach inside a typing tutor.

Classify every user message into exactly one intent:
- chitchat: greetings, small talk, general typing questions.
- analyze_session: questions about the user's speed, accuracy, progress or weak keys.
- generate_exercise: requests for practice text, passages or key drills.

Rules:
- Respond with a single JSON object and nothing else: no prose, no code fences.
- The object has exactly the keys \"intent\", \"generated_text\" and \"reply\".
- \"generated_text\" is the practice text for generate_exercise and null for every other intent.
- Practice text uses plain keyboard characters only. Honour any requested word count and key set exactly.
- For analyze_session, quote at least one concrete number from the statistics and give one actionable recommendation.
- \"reply\" is what the user reads; keep it under 80 words.";

/// The system prompt, including the response schema.
#[must_use]
pub fn system_prompt() -> &'static str {
    static PROMPT: OnceLock<String> = OnceLock::new();
    PROMPT.get_or_init(|| {
        let schema = schemars::schema_for!(StructuredResponse);
        let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_else(|_| {
            r#"{"intent": "chitchat|analyze_session|generate_exercise", "generated_text": "string|null", "reply": "string"}"#
                .to_string()
        });
        format!("{SYSTEM_PREAMBLE}\n\nJSON schema of the response:\n{schema_json}")
    })
}

/// The last [`CONVERSATION_WINDOW`] turns of `history`.
#[must_use]
pub fn conversation_window(history: &[ConversationTurn]) -> &[ConversationTurn] {
    &history[history.len().saturating_sub(CONVERSATION_WINDOW)..]
}

/// Statistics block for the prompt.
#[must_use]
pub fn performance_context(snapshot: &PerformanceSnapshot, errors: Option<&ErrorDetail>) -> String {
    if !snapshot.has_sessions() {
        return "The user has not completed any sessions yet.".to_string();
    }

    let mut out = format!(
        "Sessions completed: {}\nAverage speed: {:.0} WPM\nAverage accuracy: {:.0}%\nTrend: {}",
        snapshot.session_count,
        snapshot.average_wpm,
        snapshot.average_accuracy,
        snapshot.trend.as_str()
    );
    if !snapshot.weak_keys.is_empty() {
        let _ = write!(out, "\nWeak keys: {}", snapshot.weak_keys.join(", "));
    }
    if let Some(errors) = errors {
        let top = errors.top_error_keys(TOP_ERROR_KEYS);
        if !top.is_empty() {
            let listed: Vec<String> = top
                .iter()
                .map(|(key, count)| format!("'{key}' x{count}"))
                .collect();
            let _ = write!(
                out,
                "\nLast session errors ({} total): {}",
                errors.total_errors(),
                listed.join(", ")
            );
        }
    }
    out
}

/// Instruction appended after a format failure.
#[must_use]
pub fn correction_instruction(problem: &str) -> String {
    format!(
        "Your previous answer could not be used ({problem}). Respond with the JSON object only, \
         with the keys \"intent\", \"generated_text\" and \"reply\", and no text before or after it."
    )
}

/// User prompt for one attempt.
#[must_use]
pub fn user_prompt(
    message: &str,
    snapshot: &PerformanceSnapshot,
    history: &[ConversationTurn],
    errors: Option<&ErrorDetail>,
    hints: &RequestHints,
    correction: Option<&str>,
) -> String {
    let mut out = String::from("## Performance\n");
    out.push_str(&performance_context(snapshot, errors));

    let window = conversation_window(history);
    if !window.is_empty() {
        out.push_str("\n\n## Recent conversation\n");
        for turn in window {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Coach",
            };
            let _ = writeln!(out, "{speaker}: {}", turn.content.trim());
        }
    }

    let mut requirements = Vec::new();
    if let Some(words) = hints.word_count {
        requirements.push(format!("Practice text must be exactly {words} words."));
    }
    if let Some(keys) = &hints.drill_keys {
        let keys: Vec<String> = keys.iter().map(char::to_string).collect();
        requirements.push(format!(
            "Practice text may only use these keys and spaces: {}.",
            keys.join(" ")
        ));
    }
    if !requirements.is_empty() {
        out.push_str("\n\n## Requirements\n");
        out.push_str(&requirements.join("\n"));
    }

    out.push_str("\n\n## Message\n");
    out.push_str(message.trim());

    if let Some(problem) = correction {
        out.push_str("\n\n## Correction\n");
        out.push_str(&correction_instruction(problem));
    }
    out
}

//! Schema validation and per-intent invariant enforcement.

use serde_json::{Map, Value};

use crate::coach::Intent;
use crate::error::FormatError;

/// Generated text shorter than this is replaced downstream.
pub const MIN_GENERATED_CHARS: usize = 10;

/// Generated text is capped at this many characters.
pub const MAX_GENERATED_CHARS: usize = 500;

const KNOWN_KEYS: &[&str] = &["intent", "generated_text", "generatedText", "reply"];

/// Payload that passed schema validation but not yet the intent rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    /// Parsed intent.
    pub intent: Intent,
    /// Generated text as supplied.
    pub generated_text: Option<String>,
    /// Non-empty reply.
    pub reply: String,
}

/// Generated text after enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedText {
    /// The intent carries no text.
    None,
    /// Sanitized, usable text.
    Ready(String),
    /// Missing or too short; the caller must supply practice text.
    NeedsFill,
}

/// Payload that satisfies the intent invariant, pending any fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedPayload {
    /// Classified intent.
    pub intent: Intent,
    /// Reply text.
    pub reply: String,
    /// Generated text state.
    pub text: GeneratedText,
}

fn schema_error(field: &str, reason: impl Into<String>) -> FormatError {
    FormatError::Schema {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Check required fields, types and the intent enumeration.
///
/// # Errors
///
/// Returns [`FormatError::Schema`] if the value is not an object, the intent
/// is not one of the known labels, the reply is missing or blank, or the
/// generated-text key is missing or neither a string nor `null`.
pub fn validate(value: &Value) -> Result<RawPayload, FormatError> {
    let object = value
        .as_object()
        .ok_or_else(|| schema_error("$", "expected a JSON object"))?;

    let intent = object
        .get("intent")
        .and_then(Value::as_str)
        .and_then(Intent::parse)
        .ok_or_else(|| {
            schema_error(
                "intent",
                "must be one of chitchat, analyze_session, generate_exercise",
            )
        })?;

    let reply = object
        .get("reply")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| schema_error("reply", "must be a non-empty string"))?
        .to_string();

    let generated_text = match generated_text_field(object) {
        Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => return Err(schema_error("generated_text", "must be a string or null")),
        None => return Err(schema_error("generated_text", "is required (use null)")),
    };

    let unexpected: Vec<&str> = object
        .keys()
        .map(String::as_str)
        .filter(|k| !KNOWN_KEYS.contains(k))
        .collect();
    if !unexpected.is_empty() {
        tracing::debug!(keys = ?unexpected, "Ignoring unexpected payload keys");
    }

    Ok(RawPayload {
        intent,
        generated_text,
        reply,
    })
}

fn generated_text_field(object: &Map<String, Value>) -> Option<&Value> {
    object
        .get("generated_text")
        .or_else(|| object.get("generatedText"))
}

/// Apply the intent rules to a validated payload.
///
/// Non-exercise intents lose any generated text. Exercise text is
/// sanitized, and marked [`GeneratedText::NeedsFill`] when what remains is
/// shorter than [`MIN_GENERATED_CHARS`].
#[must_use]
pub fn enforce(raw: RawPayload) -> CheckedPayload {
    let text = if raw.intent.allows_generated_text() {
        let sanitized = raw.generated_text.as_deref().map(sanitize).unwrap_or_default();
        if sanitized.chars().count() < MIN_GENERATED_CHARS {
            tracing::debug!(
                intent = %raw.intent,
                chars = sanitized.chars().count(),
                "Generated text missing or too short, marking for fill"
            );
            GeneratedText::NeedsFill
        } else {
            GeneratedText::Ready(sanitized)
        }
    } else {
        if raw.generated_text.as_deref().is_some_and(|t| !t.trim().is_empty()) {
            tracing::info!(
                intent = %raw.intent,
                "Discarding generated text for intent that does not carry it"
            );
        }
        GeneratedText::None
    };

    CheckedPayload {
        intent: raw.intent,
        reply: raw.reply,
        text,
    }
}

/// Restrict text to typeable keyboard characters.
///
/// Typographic punctuation becomes its ASCII counterpart, other characters
/// outside printable ASCII are dropped, whitespace runs collapse to one
/// space and the result is capped at [`MAX_GENERATED_CHARS`] on a word
/// boundary.
#[must_use]
pub fn sanitize(text: &str) -> String {
    let typeable: String = text
        .chars()
        .filter_map(|c| match c {
            '\u{2018}' | '\u{2019}' => Some('\''),
            '\u{201C}' | '\u{201D}' => Some('"'),
            '\u{2013}' | '\u{2014}' => Some('-'),
            '\u{2026}' => Some('.'),
            c if c.is_whitespace() => Some(' '),
            c if c.is_ascii_graphic() => Some(c),
            _ => None,
        })
        .collect();

    let mut out = String::with_capacity(typeable.len().min(MAX_GENERATED_CHARS));
    for word in typeable.split_whitespace() {
        let needed = if out.is_empty() { word.len() } else { word.len() + 1 };
        if out.len() + needed > MAX_GENERATED_CHARS {
            if out.is_empty() {
                out.push_str(&word[..MAX_GENERATED_CHARS]);
            }
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

//! Turning raw provider text into a checked payload.
//!
//! Pipeline: [`extract_candidates`] -> strict parse (with one [`repair`] on
//! syntax errors) -> [`validate`] -> [`enforce`]. Every failure is a
//! [`FormatError`].

mod extract;
mod repair;
mod validate;

pub use extract::{
    extract_candidates, extract_payload, is_balanced, truncate_for_preview, ExtractionCandidate,
    ExtractionStrategy,
};
pub use repair::repair;
pub use validate::{
    enforce, sanitize, validate, CheckedPayload, GeneratedText, RawPayload, MAX_GENERATED_CHARS,
    MIN_GENERATED_CHARS,
};

use serde_json::error::Category;
use serde_json::Value;

use crate::error::FormatError;

/// Parse a candidate, repairing it once if the strict parse hits a syntax
/// error.
///
/// # Errors
///
/// Returns [`FormatError::Malformed`] if the candidate does not parse, or
/// still does not parse after repair.
pub fn parse_candidate(candidate: &ExtractionCandidate) -> Result<Value, FormatError> {
    match serde_json::from_str::<Value>(&candidate.text) {
        Ok(value) => Ok(value),
        Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => {
            tracing::debug!(
                strategy = %candidate.strategy,
                error = %e,
                "Strict parse failed, attempting repair"
            );
            serde_json::from_str::<Value>(&repair(&candidate.text)).map_err(|repaired_err| {
                FormatError::Malformed {
                    message: format!("{e} (after repair: {repaired_err})"),
                }
            })
        }
        Err(e) => Err(FormatError::Malformed {
            message: e.to_string(),
        }),
    }
}

/// Extract, parse, validate and enforce a payload from raw provider text.
///
/// Candidates are tried in strategy order; the first that survives every
/// stage wins.
///
/// # Errors
///
/// Returns [`FormatError::NoPayload`] if no candidate was found, otherwise
/// the error of the last candidate tried.
pub fn parse_structured(raw: &str) -> Result<CheckedPayload, FormatError> {
    let candidates = extract_candidates(raw);
    let mut last_error = FormatError::NoPayload {
        preview: truncate_for_preview(raw, 100),
    };

    for candidate in &candidates {
        match parse_candidate(candidate).and_then(|value| validate(&value)) {
            Ok(payload) => {
                tracing::debug!(strategy = %candidate.strategy, intent = %payload.intent, "Payload extracted");
                return Ok(enforce(payload));
            }
            Err(error) => {
                tracing::debug!(strategy = %candidate.strategy, error = %error, "Candidate rejected");
                last_error = error;
            }
        }
    }

    Err(last_error)
}

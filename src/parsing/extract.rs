//! Locating the structured payload inside free provider text.

use std::fmt;

use crate::error::FormatError;

/// Labels that may introduce the payload, matched case-insensitively.
const PAYLOAD_LABELS: &[&str] = &["response:", "json:", "output:"];

/// How a candidate was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractionStrategy {
    /// First `{` to last `}` of the whole text.
    OuterBraces,
    /// Body of a fenced code block.
    FencedBlock,
    /// First object after an explicit label such as `Response:`.
    Labelled,
}

impl ExtractionStrategy {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OuterBraces => "outer_braces",
            Self::FencedBlock => "fenced_block",
            Self::Labelled => "labelled",
        }
    }
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A substring believed to hold the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    /// Strategy that produced it.
    pub strategy: ExtractionStrategy,
    /// Candidate text, delimiters balanced.
    pub text: String,
}

/// All balanced candidates, in strategy order, without duplicates.
#[must_use]
pub fn extract_candidates(raw: &str) -> Vec<ExtractionCandidate> {
    let found = [
        (ExtractionStrategy::OuterBraces, outer_span(raw)),
        (ExtractionStrategy::FencedBlock, fenced_block(raw).and_then(outer_span)),
        (ExtractionStrategy::Labelled, labelled(raw)),
    ];

    let mut candidates: Vec<ExtractionCandidate> = Vec::new();
    for (strategy, text) in found {
        let Some(text) = text else { continue };
        if !is_balanced(text) || candidates.iter().any(|c| c.text == text) {
            continue;
        }
        candidates.push(ExtractionCandidate {
            strategy,
            text: text.to_string(),
        });
    }
    candidates
}

/// The first balanced candidate.
///
/// # Errors
///
/// Returns [`FormatError::NoPayload`] when no strategy yields a balanced
/// candidate.
pub fn extract_payload(raw: &str) -> Result<ExtractionCandidate, FormatError> {
    extract_candidates(raw)
        .into_iter()
        .next()
        .ok_or_else(|| FormatError::NoPayload {
            preview: truncate_for_preview(raw, 100),
        })
}

/// Slice from the first `{` to the last `}`.
pub(crate) fn outer_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Body of the first fenced code block, skipping a language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    let body_start = after_fence.find('\n').map_or(0, |i| i + 1);
    let body = &after_fence[body_start..];
    let close = body.find("```")?;
    let body = body[..close].trim();
    (!body.is_empty()).then_some(body)
}

/// First balanced object after a payload label.
fn labelled(text: &str) -> Option<&str> {
    let lowered = text.to_ascii_lowercase();
    PAYLOAD_LABELS.iter().find_map(|label| {
        let at = lowered.find(label)?;
        balanced_object(&text[at + label.len()..])
    })
}

/// The first brace group of `text` that closes, string-aware.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if ch == '\\' && in_string {
            escape_next = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether `text` is a single object whose braces and brackets pair up
/// outside strings.
#[must_use]
pub fn is_balanced(text: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;
    let mut closed = false;

    for ch in text.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match ch {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch.is_whitespace() {
            continue;
        }
        if closed || (stack.is_empty() && ch != '{') {
            return false;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                let open = if ch == '}' { '{' } else { '[' };
                if stack.pop() != Some(open) {
                    return false;
                }
                closed = stack.is_empty();
            }
            _ => {}
        }
    }

    closed && !in_string
}

/// Truncate text for previews in errors and logs, on a char boundary.
#[must_use]
pub fn truncate_for_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

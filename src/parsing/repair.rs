//! Best-effort syntactic repair of near-JSON payloads.
//!
//! Repair only fixes syntax: it never invents fields or values. Callers run
//! it once per candidate, and only after a strict parse failed with a
//! syntax-class error.

use super::extract::outer_span;

/// Apply every repair pass to `text`.
///
/// Passes, in order:
/// 1. drop prose outside the outermost braces
/// 2. replace typographic quotes with ASCII quotes
/// 3. rewrite single-quoted strings as double-quoted ones
/// 4. remove trailing commas before `}` or `]`
#[must_use]
pub fn repair(text: &str) -> String {
    let trimmed = outer_span(text).unwrap_or(text);
    let normalized = normalize_quotes(trimmed);
    let double_quoted = single_to_double_quotes(&normalized);
    remove_trailing_commas(&double_quoted)
}

fn normalize_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect()
}

/// A `'` closes a single-quoted string only when the next non-space
/// character ends a JSON value; otherwise it is an apostrophe.
fn closes_value(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace())
        .is_none_or(|c| matches!(c, ':' | ',' | '}' | ']'))
}

fn single_to_double_quotes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_double = false;
    let mut in_single = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_double {
            out.push(c);
            if c == '\\' {
                if let Some(&next) = chars.get(i + 1) {
                    out.push(next);
                    i += 1;
                }
            } else if c == '"' {
                in_double = false;
            }
        } else if in_single {
            match c {
                '\\' if chars.get(i + 1) == Some(&'\'') => {
                    out.push('\'');
                    i += 1;
                }
                '\'' if closes_value(&chars[i + 1..]) => {
                    out.push('"');
                    in_single = false;
                }
                '"' => out.push_str("\\\""),
                _ => out.push(c),
            }
        } else {
            match c {
                '"' => {
                    in_double = true;
                    out.push(c);
                }
                '\'' => {
                    in_single = true;
                    out.push('"');
                }
                _ => out.push(c),
            }
        }
        i += 1;
    }
    out
}

fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            out.push(c);
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn parse(text: &str) -> Value {
        serde_json::from_str(&repair(text)).unwrap()
    }

    #[test]
    fn test_clean_payload_is_unchanged() {
        let clean = r#"{"intent":"chitchat","generated_text":null,"reply":"Hi"}"#;
        assert_eq!(repair(clean), clean);
    }

    #[test]
    fn test_single_quotes() {
        let value = parse("{'intent': 'chitchat', 'generated_text': null, 'reply': 'Hi'}");
        assert_eq!(
            value,
            json!({"intent": "chitchat", "generated_text": null, "reply": "Hi"})
        );
    }

    #[test]
    fn test_apostrophe_inside_single_quoted_string() {
        let value = parse("{'reply': 'you're doing great'}");
        assert_eq!(value, json!({"reply": "you're doing great"}));
    }

    #[test]
    fn test_double_quote_inside_single_quoted_string_is_escaped() {
        let value = parse(r#"{'reply': 'type "hello" twice'}"#);
        assert_eq!(value, json!({"reply": "type \"hello\" twice"}));
    }

    #[test]
    fn test_apostrophe_inside_double_quoted_string_is_kept() {
        let value = parse(r#"{"reply": "it's fine",}"#);
        assert_eq!(value, json!({"reply": "it's fine"}));
    }

    #[test]
    fn test_trailing_commas() {
        let value = parse(r#"{"a": [1, 2, ], "b": {"c": 3,},}"#);
        assert_eq!(value, json!({"a": [1, 2], "b": {"c": 3}}));
    }

    #[test]
    fn test_comma_inside_string_is_kept() {
        let value = parse(r#"{"reply": "wait,}", }"#);
        assert_eq!(value, json!({"reply": "wait,}"}));
    }

    #[test]
    fn test_curly_quotes() {
        let value = parse("{\u{201C}reply\u{201D}: \u{201C}Hi\u{201D}}");
        assert_eq!(value, json!({"reply": "Hi"}));
    }

    #[test]
    fn test_strips_surrounding_prose() {
        let value = parse("Here you go: {\"reply\": \"Hi\"} hope that helps");
        assert_eq!(value, json!({"reply": "Hi"}));
    }
}

//! Provider-free reading of the user's message.
//!
//! The pipeline uses these hints to route fallbacks when the provider is
//! unavailable and to check exercise output against what was asked for.

use super::types::{Intent, PerformanceSnapshot};
use crate::fallback::MAX_DRILL_KEYS;

/// Largest word count honoured from a request.
pub const MAX_REQUESTED_WORDS: usize = 500;

const DRILL_TRIGGERS: &[&str] = &["drill", "drills", "key", "keys", "letter", "letters"];

const FILLER_WORDS: &[&str] = &[
    "with", "on", "for", "the", "using", "use", "of", "only", "and", "just", "me", "my", "these",
    "keys", "key", "letters", "letter", "characters", "chars",
];

/// Single letters that are also English words. Read as keys only when
/// another key is named alongside them.
const LETTER_WORDS: &[char] = &['a', 'i'];

const ANALYSIS_PHRASES: &[&str] = &[
    "how am i",
    "how did i",
    "how was my",
    "how's my",
    "doing",
    "progress",
    "stats",
    "statistics",
    "accuracy",
    "speed",
    "wpm",
    "analy",
    "performance",
    "weakest",
    "results",
];

const EXERCISE_PHRASES: &[&str] = &[
    "drill",
    "exercise",
    "practice",
    "practise",
    "passage",
    "paragraph",
    "sentence",
    "generate",
    "give me",
    "something to type",
];

/// What the message explicitly asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHints {
    /// Requested number of words, if stated.
    pub word_count: Option<usize>,
    /// Keys named for a drill, if any.
    pub drill_keys: Option<Vec<char>>,
    /// Whether the user asked to work on their weak keys.
    pub wants_weak_keys: bool,
    /// Keyword-based intent, used when the provider cannot classify.
    pub guessed_intent: Intent,
}

impl RequestHints {
    /// Read hints from a message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        let tokens = tokenize(&lowered);

        let word_count = requested_word_count(&tokens);
        let drill_keys = requested_drill_keys(&tokens);
        let wants_weak_keys = lowered.contains("weak");
        let guessed_intent = guess_intent(&lowered, word_count, drill_keys.as_ref());

        Self {
            word_count,
            drill_keys,
            wants_weak_keys,
            guessed_intent,
        }
    }

    /// Keys a drill should use: the named ones, else the snapshot's weak
    /// keys when the user asked for them.
    #[must_use]
    pub fn effective_drill_keys(&self, snapshot: &PerformanceSnapshot) -> Option<Vec<char>> {
        if let Some(keys) = &self.drill_keys {
            return Some(keys.clone());
        }
        if self.wants_weak_keys {
            let mut keys = snapshot.weak_key_chars();
            keys.truncate(MAX_DRILL_KEYS);
            if !keys.is_empty() {
                return Some(keys);
            }
        }
        None
    }
}

fn tokenize(lowered: &str) -> Vec<String> {
    lowered
        .replace('-', " ")
        .split(|c: char| c.is_whitespace() || c == ',' || c == ':')
        .filter(|t| !t.is_empty())
        .map(|t| {
            if t.chars().count() > 1 {
                t.trim_end_matches(['.', '?', '!', ')'])
                    .trim_start_matches('(')
                    .to_string()
            } else {
                t.to_string()
            }
        })
        .filter(|t| !t.is_empty())
        .collect()
}

fn requested_word_count(tokens: &[String]) -> Option<usize> {
    tokens.windows(2).find_map(|pair| {
        let unit = pair[1].as_str();
        if unit != "word" && unit != "words" {
            return None;
        }
        pair[0]
            .parse::<usize>()
            .ok()
            .map(|n| n.clamp(1, MAX_REQUESTED_WORDS))
    })
}

fn requested_drill_keys(tokens: &[String]) -> Option<Vec<char>> {
    tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| DRILL_TRIGGERS.contains(&t.as_str()))
        .find_map(|(i, _)| keys_after(&tokens[i + 1..]))
}

fn keys_after(tokens: &[String]) -> Option<Vec<char>> {
    let mut keys: Vec<char> = Vec::new();
    for token in tokens {
        if FILLER_WORDS.contains(&token.as_str()) {
            continue;
        }
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_graphic() && !c.is_ascii_digit() => {
                if !keys.contains(&c) {
                    keys.push(c);
                }
            }
            _ => break,
        }
        if keys.len() == MAX_DRILL_KEYS {
            break;
        }
    }

    match keys.as_slice() {
        [] => None,
        [only] if LETTER_WORDS.contains(only) => None,
        _ => Some(keys),
    }
}

fn guess_intent(lowered: &str, word_count: Option<usize>, keys: Option<&Vec<char>>) -> Intent {
    if keys.is_some() || word_count.is_some() {
        Intent::GenerateExercise
    } else if ANALYSIS_PHRASES.iter().any(|p| lowered.contains(p)) {
        Intent::AnalyzeSession
    } else if EXERCISE_PHRASES.iter().any(|p| lowered.contains(p)) {
        Intent::GenerateExercise
    } else {
        Intent::Chitchat
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_drill_with_keys_and_word_count() {
        let hints = RequestHints::from_message("drill with a s d, 5 words");
        assert_eq!(hints.drill_keys, Some(vec!['a', 's', 'd']));
        assert_eq!(hints.word_count, Some(5));
        assert_eq!(hints.guessed_intent, Intent::GenerateExercise);
    }

    #[test_case("give me 50 words to type", Some(50) ; "plain")]
    #[test_case("a 120-word passage please", Some(120) ; "hyphenated")]
    #[test_case("write 1 word", Some(1) ; "singular")]
    #[test_case("10000 words of text", Some(MAX_REQUESTED_WORDS) ; "clamped high")]
    #[test_case("0 words", Some(1) ; "clamped low")]
    #[test_case("some words please", None ; "no number")]
    #[test_case("I typed 5 sentences", None ; "wrong unit")]
    fn test_requested_word_count(message: &str, expected: Option<usize>) {
        assert_eq!(RequestHints::from_message(message).word_count, expected);
    }

    #[test_case("keys: f j", Some(vec!['f', 'j']) ; "labelled")]
    #[test_case("a drill for the home row", None ; "no keys after filler")]
    #[test_case("drill on q w e r t y u i o p", Some(vec!['q', 'w', 'e', 'r', 't', 'y', 'u', 'i']) ; "capped at eight")]
    #[test_case("letters a a b", Some(vec!['a', 'b']) ; "deduplicated")]
    #[test_case("drill with ; and p", Some(vec![';', 'p']) ; "skips filler between keys")]
    #[test_case("drill my weak keys: f j", Some(vec!['f', 'j']) ; "later trigger")]
    #[test_case("drill 5 words", None ; "digits are not keys")]
    #[test_case("give me a drill for a beginner", None ; "article is not a key")]
    #[test_case("a drill I can do on the bus", None ; "pronoun is not a key")]
    #[test_case("drill with a and s", Some(vec!['a', 's']) ; "letter word among keys")]
    #[test_case("drill for a beginner with keys f j", Some(vec!['f', 'j']) ; "later trigger after article")]
    fn test_requested_drill_keys(message: &str, expected: Option<Vec<char>>) {
        assert_eq!(RequestHints::from_message(message).drill_keys, expected);
    }

    #[test_case("how am I doing?", Intent::AnalyzeSession ; "doing")]
    #[test_case("what's my accuracy lately", Intent::AnalyzeSession ; "accuracy")]
    #[test_case("give me a practice passage", Intent::GenerateExercise ; "practice")]
    #[test_case("hello there!", Intent::Chitchat ; "greeting")]
    #[test_case("how fast is 40 words per minute", Intent::GenerateExercise ; "word count wins")]
    fn test_guessed_intent(message: &str, expected: Intent) {
        assert_eq!(RequestHints::from_message(message).guessed_intent, expected);
    }

    #[test]
    fn test_effective_drill_keys_prefers_named_keys() {
        let snapshot = PerformanceSnapshot::default().with_weak_keys(["q", "z"]);
        let hints = RequestHints::from_message("drill my weak keys: f j");
        assert_eq!(hints.effective_drill_keys(&snapshot), Some(vec!['f', 'j']));
    }

    #[test]
    fn test_effective_drill_keys_uses_weak_keys() {
        let snapshot = PerformanceSnapshot::default().with_weak_keys(["Q", "z", "th"]);
        let hints = RequestHints::from_message("practice my weak spots");
        assert!(hints.wants_weak_keys);
        assert_eq!(hints.effective_drill_keys(&snapshot), Some(vec!['q', 'z']));

        let plain = RequestHints::from_message("practice please");
        assert_eq!(plain.effective_drill_keys(&snapshot), None);
    }
}

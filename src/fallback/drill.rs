//! Key drills restricted to an explicit key set.
//!
//! A drill is a stream of space-separated patterns built from the keys:
//! single-key runs (`aaaa`), pairwise alternation (`asas`), triples
//! (`asd`) and the full set forwards and backwards (`asdf fdsa`).

/// Largest key set a drill will use.
pub const MAX_DRILL_KEYS: usize = 8;

/// Character length used when a drill has no requested size.
pub const DEFAULT_DRILL_CHARS: usize = 60;

const SINGLE_RUN: usize = 4;

/// Distinct, non-whitespace keys in first-seen order, capped at
/// [`MAX_DRILL_KEYS`].
#[must_use]
pub fn normalize_keys(keys: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(keys.len().min(MAX_DRILL_KEYS));
    for &key in keys {
        if key.is_whitespace() || key.is_control() || out.contains(&key) {
            continue;
        }
        out.push(key);
        if out.len() == MAX_DRILL_KEYS {
            break;
        }
    }
    out
}

/// One cycle of drill patterns for a key set.
fn patterns(keys: &[char]) -> Vec<String> {
    let mut out = Vec::new();

    for &k in keys {
        out.push(std::iter::repeat_n(k, SINGLE_RUN).collect());
    }

    for (i, &a) in keys.iter().enumerate() {
        for &b in &keys[i + 1..] {
            out.push([a, b, a, b].iter().collect());
        }
    }

    for (i, &a) in keys.iter().enumerate() {
        for (j, &b) in keys.iter().enumerate().skip(i + 1) {
            for &c in &keys[j + 1..] {
                out.push([a, b, c].iter().collect());
            }
        }
    }

    if keys.len() > 1 {
        for whole in [keys.iter().collect(), keys.iter().rev().collect::<String>()] {
            if !out.contains(&whole) {
                out.push(whole);
            }
        }
    }

    out
}

/// Drill text no longer than `target_len` characters.
///
/// Patterns are never split. At least one pattern is always emitted, so the
/// result can exceed a `target_len` shorter than the first pattern. Returns
/// an empty string when no usable keys are given.
#[must_use]
pub fn key_drill(keys: &[char], target_len: usize) -> String {
    let keys = normalize_keys(keys);
    let patterns = patterns(&keys);

    let mut text = String::new();
    for pattern in patterns.iter().cycle() {
        if text.is_empty() {
            text.push_str(pattern);
            continue;
        }
        if text.len() + 1 + pattern.len() > target_len {
            break;
        }
        text.push(' ');
        text.push_str(pattern);
    }
    text
}

/// Drill text of exactly `words` patterns.
///
/// Returns an empty string when no usable keys are given.
#[must_use]
pub fn key_drill_words(keys: &[char], words: usize) -> String {
    let keys = normalize_keys(keys);
    let patterns = patterns(&keys);

    patterns
        .iter()
        .cycle()
        .take(words)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether every non-space character of `text` is one of `keys`.
#[must_use]
pub fn uses_only_keys(text: &str, keys: &[char]) -> bool {
    text.chars().filter(|c| *c != ' ').all(|c| keys.contains(&c))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_patterns_for_three_keys() {
        let p = patterns(&['a', 's', 'd']);
        assert_eq!(
            p,
            vec![
                "aaaa", "ssss", "dddd", "asas", "adad", "sdsd", "asd", "dsa"
            ]
        );
    }

    #[test]
    fn test_patterns_are_distinct() {
        for n in 1..=MAX_DRILL_KEYS {
            let keys: Vec<char> = ('a'..='z').take(n).collect();
            let p = patterns(&keys);
            let mut unique = p.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), p.len(), "{n} keys");
        }
    }

    #[test]
    fn test_single_key_has_only_runs() {
        assert_eq!(patterns(&['f']), vec!["ffff"]);
        assert_eq!(key_drill_words(&['f'], 3), "ffff ffff ffff");
    }

    #[test]
    fn test_key_drill_words_exact_count() {
        assert_eq!(
            key_drill_words(&['a', 's', 'd'], 5),
            "aaaa ssss dddd asas adad"
        );
    }

    #[test]
    fn test_key_drill_respects_target_length() {
        let text = key_drill(&['a', 's', 'd'], 14);
        assert_eq!(text, "aaaa ssss dddd");
    }

    #[test]
    fn test_key_drill_emits_one_pattern_when_target_tiny() {
        assert_eq!(key_drill(&['j', 'k'], 1), "jjjj");
    }

    #[test]
    fn test_empty_keys_produce_empty_drill() {
        assert!(key_drill(&[], 40).is_empty());
        assert!(key_drill_words(&[' ', '\n'], 5).is_empty());
    }

    #[test]
    fn test_normalize_keys_dedupes_and_caps() {
        let keys: Vec<char> = "aabbcdefghijk".chars().collect();
        assert_eq!(
            normalize_keys(&keys),
            vec!['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']
        );
    }

    #[test]
    fn test_uses_only_keys() {
        assert!(uses_only_keys("asas dddd", &['a', 's', 'd']));
        assert!(!uses_only_keys("asas fff", &['a', 's', 'd']));
    }

    proptest! {
        #[test]
        fn prop_drill_uses_only_requested_keys(
            keys in prop::collection::vec(prop::char::range('a', 'z'), 1..=8),
            len in 1usize..=400,
        ) {
            let text = key_drill(&keys, len);
            prop_assert!(!text.is_empty());
            prop_assert!(uses_only_keys(&text, &keys));
        }

        #[test]
        fn prop_drill_never_exceeds_target_beyond_first_pattern(
            keys in prop::collection::vec(prop::char::range('a', 'z'), 1..=8),
            len in 10usize..=400,
        ) {
            prop_assert!(key_drill(&keys, len).len() <= len);
        }

        #[test]
        fn prop_drill_words_exact(
            keys in prop::collection::vec(prop::char::range('a', 'z'), 1..=8),
            words in 1usize..=200,
        ) {
            let text = key_drill_words(&keys, words);
            prop_assert_eq!(text.split_whitespace().count(), words);
            prop_assert!(uses_only_keys(&text, &keys));
        }
    }
}

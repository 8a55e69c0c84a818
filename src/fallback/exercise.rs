//! Canned practice passages.

/// Word count used when the user did not ask for one.
pub const DEFAULT_EXERCISE_WORDS: usize = 30;

const PRACTICE_SENTENCES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "Pack my box with five dozen liquor jugs.",
    "Sphinx of black quartz, judge my vow.",
    "How vexingly quick daft zebras jump!",
    "Steady hands and calm breathing make every keystroke count.",
    "Bright vixens jump; dozy fowl quack.",
];

const EXTENSION_PHRASES: &[&str] = &[
    "keep your eyes on the screen",
    "rest your fingers on the home row",
    "let accuracy lead and speed will follow",
    "breathe slowly and keep a steady rhythm",
];

/// Practice text of exactly `word_count` words.
///
/// Cycles through the canonical sentences, then the extension phrases, and
/// cuts the stream at the requested count. Returns an empty string for zero.
#[must_use]
pub fn exercise_text(word_count: usize) -> String {
    PRACTICE_SENTENCES
        .iter()
        .chain(EXTENSION_PHRASES)
        .cycle()
        .flat_map(|s| s.split_whitespace())
        .take(word_count)
        .collect::<Vec<_>>()
        .join(" ")
}

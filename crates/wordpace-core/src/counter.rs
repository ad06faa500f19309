//! Unicode-aware word counting

use regex::Regex;
use std::sync::LazyLock;

/// Code point of the first CJK Unified Ideograph. Tokens starting above it
/// count one word per character.
const CJK_THRESHOLD: u32 = 19968;

/// Two disjoint alternatives: space-delimited scripts (Latin, Greek, Cyrillic,
/// Arabic, digits, underscore) and scripts written without word spacing
/// (CJK, Hiragana, Katakana, Hangul).
static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"[a-zA-Z0-9_\x{00C0}-\x{00FF}\x{0392}-\x{03C9}\x{0400}-\x{04FF}\x{0600}-\x{06FF}]+",
        "|",
        r"[\x{4E00}-\x{9FFF}\x{3400}-\x{4DBF}\x{F900}-\x{FAFF}\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{AC00}-\x{D7AF}]+",
    ))
    .expect("word pattern is a valid regex")
});

/// Count the words in a document.
///
/// A matched token counts as one word, unless its first character lies above
/// the start of the CJK Unified Ideographs block, in which case every
/// character of the token counts as a word.
pub fn count_words(text: &str) -> u64 {
    WORD_PATTERN
        .find_iter(text)
        .map(|m| token_weight(m.as_str()))
        .sum()
}

fn token_weight(token: &str) -> u64 {
    match token.chars().next() {
        Some(first) if u32::from(first) > CJK_THRESHOLD => token.chars().count() as u64,
        Some(_) => 1,
        None => 0,
    }
}

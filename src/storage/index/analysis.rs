//! Text analysis for the full-text part of the index.

use std::collections::BTreeSet;
use unicode_segmentation::UnicodeSegmentation;

/// Tokens longer than this many bytes are dropped.
pub const MAX_TOKEN_LENGTH: usize = 255;

/// Splits text into lower-cased word tokens, in order of appearance.
///
/// Word boundaries follow Unicode segmentation rules; punctuation and
/// whitespace never appear in a token.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|word| word.len() <= MAX_TOKEN_LENGTH)
        .collect()
}

/// Returns the distinct terms of `text`.
#[must_use]
pub fn terms(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

//! Chapter text → ordered word tokens.

use std::ops::Index;

/// Split chapter text on whitespace runs.
///
/// Tokens keep their punctuation exactly as normalized; the same text always
/// yields the same sequence, so a word index stays meaningful after the
/// sequence is regenerated from the chapter.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_owned).collect()
}

/// Count tokens without allocating them.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Immutable token sequence for the active chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence {
    tokens: Vec<String>,
}

impl TokenSequence {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            tokens: tokenize(text),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Index of the last token, `None` when empty
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.tokens.len().checked_sub(1)
    }

    /// Clamp an index into `0..len`, `0` when empty
    #[must_use]
    pub fn clamp(&self, index: usize) -> usize {
        self.last_index().map_or(0, |last| index.min(last))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }
}

impl Index<usize> for TokenSequence {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        &self.tokens[index]
    }
}

impl From<Vec<String>> for TokenSequence {
    fn from(tokens: Vec<String>) -> Self {
        Self { tokens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tokenize_normalized_chapter() {
        let tokens = tokenize("Hello world.\n\nNext. See");
        assert_eq!(tokens, vec!["Hello", "world.", "Next.", "See"]);
    }

    #[test]
    fn test_tokenize_keeps_punctuation_and_case() {
        let tokens = tokenize("  \"Well,\" she said—QUIETLY!  ");
        assert_eq!(tokens, vec!["\"Well,\"", "she", "said—QUIETLY!"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \n\t ").is_empty());
    }

    #[test]
    fn test_word_count_matches_tokenize() {
        let text = "one two\n\nthree";
        assert_eq!(word_count(text), tokenize(text).len());
    }

    #[test]
    fn test_sequence_clamp() {
        let sequence = TokenSequence::from_text("a b c");
        assert_eq!(sequence.clamp(0), 0);
        assert_eq!(sequence.clamp(7), 2);
        assert_eq!(sequence.last_index(), Some(2));
        assert_eq!(&sequence[1], "b");

        let empty = TokenSequence::default();
        assert_eq!(empty.clamp(5), 0);
        assert_eq!(empty.last_index(), None);
    }

    proptest! {
        #[test]
        fn prop_tokenize_is_deterministic(text in "\\PC*") {
            prop_assert_eq!(tokenize(&text), tokenize(&text));
        }

        #[test]
        fn prop_tokens_have_no_whitespace(text in "\\PC*") {
            for token in tokenize(&text) {
                prop_assert!(!token.is_empty());
                prop_assert!(!token.chars().any(char::is_whitespace));
            }
        }
    }
}

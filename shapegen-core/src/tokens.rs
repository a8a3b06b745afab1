//! Token counting.
//!
//! Threads are trimmed against a token budget. Exact counts come from the
//! model's own tokenizer when the generation collaborator exposes one; the
//! [`CharRatioCounter`] estimate is used otherwise.

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens `text` occupies.
    fn count(&self, text: &str) -> usize;
}

/// Estimates tokens from a characters-per-token ratio.
#[derive(Debug, Clone, Copy)]
pub struct CharRatioCounter {
    chars_per_token: f64,
}

impl CharRatioCounter {
    /// Create an estimator with the given ratio.
    ///
    /// Non-positive ratios fall back to the default of 4 characters per token.
    #[must_use]
    pub fn new(chars_per_token: f64) -> Self {
        let chars_per_token = if chars_per_token > 0.0 {
            chars_per_token
        } else {
            4.0
        };
        Self { chars_per_token }
    }
}

impl Default for CharRatioCounter {
    fn default() -> Self {
        // Reasonable default for English
        Self::new(4.0)
    }
}

impl TokenCounter for CharRatioCounter {
    fn count(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token).ceil() as usize
    }
}

/// Adapts a closure into a [`TokenCounter`].
pub struct FnCounter<F>(pub F);

impl<F> TokenCounter for FnCounter<F>
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count(&self, text: &str) -> usize {
        (self.0)(text)
    }
}

impl<F> std::fmt::Debug for FnCounter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCounter").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_ratio_rounds_up() {
        let counter = CharRatioCounter::default();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn test_char_ratio_counts_chars_not_bytes() {
        let counter = CharRatioCounter::new(1.0);
        assert_eq!(counter.count("ção"), 3);
    }

    #[test]
    fn test_invalid_ratio_falls_back() {
        let counter = CharRatioCounter::new(0.0);
        assert_eq!(counter.count("abcdefgh"), 2);
    }

    #[test]
    fn test_fn_counter() {
        let counter = FnCounter(|text: &str| text.split_whitespace().count());
        assert_eq!(counter.count("one two three"), 3);
    }
}

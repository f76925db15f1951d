// Token estimation
//
// The budget manager never needs exact token counts, just a stable
// overestimate-ish figure to compare against the budget. The default
// estimator assumes roughly 3 characters per token, rounding up.

/// Estimates how many tokens a piece of text costs against the budget.
pub trait TokenEstimator: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// ceil(chars / 3). Deliberately conservative for code-heavy text.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharEstimator;

impl TokenEstimator for CharEstimator {
    fn count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(CharEstimator.count(""), 0);
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(CharEstimator.count("a"), 1);
        assert_eq!(CharEstimator.count("abc"), 1);
        assert_eq!(CharEstimator.count("abcd"), 2);
        assert_eq!(CharEstimator.count("abcdef"), 2);
        assert_eq!(CharEstimator.count("abcdefg"), 3);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 3 multibyte chars -> 1 token
        assert_eq!(CharEstimator.count("日本語"), 1);
    }
}

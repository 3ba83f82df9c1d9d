//! Edit-distance matching for fuzzy queries
//!
//! Similarity between a query token `q` and an index term `t`:
//!
//! ```text
//! sim(q, t) = 1 - lev(q, t) / min(|q|, |t|)
//! ```
//!
//! lengths counted in characters. A term matches when `sim` is strictly
//! greater than the minimum similarity. With the default of 0.75, a
//! six-letter token tolerates one edit and a four-letter token none.

/// Levenshtein distance between two character sequences
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Levenshtein distance, or `None` as soon as it must exceed `max`
pub fn bounded_levenshtein(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let d = a.len().max(b.len());
        return (d <= max).then_some(d);
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        let mut row_min = curr[0];
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
            row_min = row_min.min(curr[j + 1]);
        }
        // Distances never shrink from one row to the next.
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let d = prev[b.len()];
    (d <= max).then_some(d)
}

/// Matches index terms against one query token
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    token: Vec<char>,
    min_similarity: f32,
}

impl FuzzyMatcher {
    /// Create a matcher for `token`
    pub fn new(token: &str, min_similarity: f32) -> Self {
        FuzzyMatcher {
            token: token.chars().collect(),
            min_similarity,
        }
    }

    /// Minimum similarity a term must exceed
    pub fn min_similarity(&self) -> f32 {
        self.min_similarity
    }

    /// Similarity of `term` to the token, if it exceeds the minimum
    pub fn similarity(&self, term: &str) -> Option<f32> {
        let term: Vec<char> = term.chars().collect();
        let shorter = self.token.len().min(term.len());
        if shorter == 0 {
            return None;
        }
        let max_edits = ((1.0 - self.min_similarity) * shorter as f32).floor() as usize;
        let distance = bounded_levenshtein(&self.token, &term, max_edits)?;
        let sim = 1.0 - distance as f32 / shorter as f32;
        (sim > self.min_similarity).then_some(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein(&chars(""), &chars("")), 0);
        assert_eq!(levenshtein(&chars("abc"), &chars("abc")), 0);
        assert_eq!(levenshtein(&chars("abc"), &chars("abd")), 1);
        assert_eq!(levenshtein(&chars("abc"), &chars("abcd")), 1);
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
    }

    #[test]
    fn test_bounded_levenshtein_cuts_off() {
        assert_eq!(bounded_levenshtein(&chars("kitten"), &chars("sitting"), 3), Some(3));
        assert_eq!(bounded_levenshtein(&chars("kitten"), &chars("sitting"), 2), None);
        assert_eq!(bounded_levenshtein(&chars("a"), &chars("abcdef"), 2), None);
    }

    #[test]
    fn test_one_substitution_matches_long_token() {
        let m = FuzzyMatcher::new("batman", 0.75);
        let sim = m.similarity("batmen").unwrap();
        assert!((sim - (1.0 - 1.0 / 6.0)).abs() < 1e-6);
    }

    #[test]
    fn test_exact_match_has_similarity_one() {
        let m = FuzzyMatcher::new("heat", 0.75);
        assert_eq!(m.similarity("heat"), Some(1.0));
    }

    #[test]
    fn test_threshold_is_strict() {
        // 1 - 1/4 = 0.75 is not greater than 0.75
        let m = FuzzyMatcher::new("test", 0.75);
        assert_eq!(m.similarity("tent"), None);
    }

    #[test]
    fn test_beyond_threshold_rejected() {
        let m = FuzzyMatcher::new("batman", 0.75);
        assert_eq!(m.similarity("bat"), None);
        assert_eq!(m.similarity("catwoman"), None);
        assert_eq!(m.similarity("robin"), None);
    }

    #[test]
    fn test_unicode_counts_characters() {
        let m = FuzzyMatcher::new("amélie", 0.75);
        assert!(m.similarity("amelie").is_some());
    }

    proptest! {
        #[test]
        fn prop_bounded_agrees_with_full(a in "[a-d]{0,8}", b in "[a-d]{0,8}", max in 0usize..6) {
            let (a, b) = (chars(&a), chars(&b));
            let full = levenshtein(&a, &b);
            let bounded = bounded_levenshtein(&a, &b, max);
            if full <= max {
                prop_assert_eq!(bounded, Some(full));
            } else {
                prop_assert_eq!(bounded, None);
            }
        }

        #[test]
        fn prop_levenshtein_symmetric(a in "[a-z]{0,10}", b in "[a-z]{0,10}") {
            prop_assert_eq!(levenshtein(&chars(&a), &chars(&b)), levenshtein(&chars(&b), &chars(&a)));
        }
    }
}

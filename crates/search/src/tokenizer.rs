//! Text analysis shared by indexing and querying
//!
//! Pipeline: UAX#29 word boundaries → lowercase
//!           → split on non-alphanumeric characters → drop empty tokens
//!
//! The same analyzer instance must tokenize documents and queries. The index
//! owns it and hands it to every committed snapshot, so a searcher never
//! analyzes a query differently from the documents it searches.

use unicode_segmentation::UnicodeSegmentation;

/// Splits raw text into normalized terms
///
/// Implementations must be pure and deterministic: the same text always
/// yields the same tokens.
pub trait Analyzer: Send + Sync {
    /// Tokenize text into normalized terms, in text order
    fn tokenize(&self, text: &str) -> Vec<String>;

    /// Name for debugging and logging
    fn name(&self) -> &str;
}

/// Case-folding word tokenizer
///
/// No stopwords, no stemming, single-character tokens kept: media titles are
/// short and every word in them matters ("M", "Up", "It").
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        tokenize(text)
    }

    fn name(&self) -> &str {
        "standard"
    }
}

/// Tokenize text into searchable terms
///
/// # Example
///
/// ```
/// use mediasearch_search::tokenizer::tokenize;
///
/// let tokens = tokenize("Spider-Man: Into the Spider-Verse");
/// assert_eq!(tokens, vec!["spider", "man", "into", "the", "spider", "verse"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.unicode_words() {
        let lower = word.to_lowercase();
        tokens.extend(
            lower
                .split(|c: char| !c.is_alphanumeric())
                .filter(|s| !s.is_empty())
                .map(String::from),
        );
    }
    tokens
}

/// Tokenize and deduplicate, preserving first-occurrence order
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

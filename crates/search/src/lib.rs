//! Full-text matching for the media index
//!
//! This crate provides:
//! - Analyzer trait and the standard tokenizer
//! - Segmented InvertedIndex with O(1) snapshots (CommittedIndex)
//! - Bounded Levenshtein matching for fuzzy terms
//! - MatchScorer trait with the default linear scorer
//! - QueryPlan: a query string as an OR of fuzzy and prefix leaves
//! - Searcher: top-k evaluation of a plan against one snapshot
//!
//! Nothing here takes locks or touches disk; the engine crate owns
//! concurrency and persistence.
//!
//! # Usage
//!
//! ```
//! use mediasearch_core::IndexedDocument;
//! use mediasearch_search::{InvertedIndex, SearchOptions, Searcher};
//!
//! let mut index = InvertedIndex::new();
//! index.upsert(IndexedDocument::new("1", "Batman Begins", "A hero rises"));
//!
//! let searcher = Searcher::bind(index.snapshot(), SearchOptions::default()).unwrap();
//! let hits = searcher.search("batman").unwrap();
//! assert_eq!(hits[0].id.as_str(), "1");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fuzzy;
pub mod index;
pub mod query;
pub mod scorer;
pub mod searcher;
pub mod tokenizer;

// Re-export commonly used types
pub use fuzzy::{bounded_levenshtein, levenshtein, FuzzyMatcher};
pub use index::{
    compaction_threshold, CommittedIndex, FieldIndex, InvertedIndex, Posting, PostingList,
    SegmentStats, MIN_COMPACTION_THRESHOLD,
};
pub use query::{LeafKind, LeafQuery, QueryPlan, DEFAULT_MIN_SIMILARITY};
pub use scorer::{LinearScorer, MatchScorer};
pub use searcher::{SearchHit, SearchOptions, Searcher, DEFAULT_MAX_RESULTS};
pub use tokenizer::{tokenize, tokenize_unique, Analyzer, StandardAnalyzer};

//! Query model
//!
//! A query string becomes a boolean OR of leaf queries. For every query
//! token and every indexed field there is one fuzzy leaf and one prefix
//! leaf, so `n` tokens produce `4n` leaves.
//!
//! The string is split on whitespace first; each whitespace term is then
//! normalized with the index analyzer. A term the analyzer reduces to
//! nothing (pure punctuation, say) is skipped rather than failing the
//! search.

use crate::tokenizer::Analyzer;
use mediasearch_core::{Error, Field, Result};
use tracing::debug;

/// Minimum fuzzy similarity used unless configured otherwise
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.75;

/// How a leaf matches index terms
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LeafKind {
    /// Terms whose similarity to the token exceeds `min_similarity`
    Fuzzy {
        /// Exclusive lower bound on similarity
        min_similarity: f32,
    },
    /// Terms starting with the token
    Prefix,
}

/// One leaf of the OR query
#[derive(Debug, Clone, PartialEq)]
pub struct LeafQuery {
    /// Field whose dictionary the leaf scans
    pub field: Field,
    /// Normalized query token
    pub token: String,
    /// Matching mode
    pub kind: LeafKind,
}

impl LeafQuery {
    /// Score multiplier of this leaf
    pub fn boost(&self) -> f32 {
        self.field.boost()
    }
}

/// A parsed query: the OR of its leaves
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    leaves: Vec<LeafQuery>,
    skipped: Vec<String>,
}

impl QueryPlan {
    /// Parse a raw query string
    ///
    /// # Errors
    ///
    /// `EmptyQuery` if the string is empty or whitespace only.
    pub fn parse(query: &str, analyzer: &dyn Analyzer, min_similarity: f32) -> Result<Self> {
        let mut terms = query.split_whitespace().peekable();
        if terms.peek().is_none() {
            return Err(Error::EmptyQuery);
        }

        let mut leaves = Vec::new();
        let mut skipped = Vec::new();
        for term in terms {
            let tokens = analyzer.tokenize(term);
            if tokens.is_empty() {
                debug!(target: "mediasearch::search", term, "Skipping query term with no searchable tokens");
                skipped.push(term.to_string());
                continue;
            }
            for token in tokens {
                for field in Field::ALL {
                    leaves.push(LeafQuery {
                        field,
                        token: token.clone(),
                        kind: LeafKind::Fuzzy { min_similarity },
                    });
                    leaves.push(LeafQuery {
                        field,
                        token: token.clone(),
                        kind: LeafKind::Prefix,
                    });
                }
            }
        }

        Ok(QueryPlan { leaves, skipped })
    }

    /// Leaf queries, in query order
    pub fn leaves(&self) -> &[LeafQuery] {
        &self.leaves
    }

    /// Whitespace terms that produced no tokens
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// True if no leaf survived parsing; such a plan matches nothing
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

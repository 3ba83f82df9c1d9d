//! Query evaluation against one committed snapshot
//!
//! A `Searcher` is bound to exactly one `CommittedIndex`. It never sees a
//! later commit; the engine drops it on commit and binds a new one on the
//! next query.
//!
//! # Evaluation
//!
//! 1. Every leaf enumerates matching terms in its field dictionaries (one
//!    per segment): fuzzy leaves scan them with a bounded edit distance,
//!    prefix leaves range-scan them. Postings of tombstoned documents are
//!    skipped.
//! 2. Per leaf, each matched document keeps its best match quality.
//! 3. `boost × best quality` is added to the document's score in a dense
//!    accumulator indexed by ordinal.
//! 4. Top-k by score descending, ties by `DocId` ascending.

use crate::fuzzy::FuzzyMatcher;
use crate::index::{CommittedIndex, PostingList};
use crate::query::{LeafKind, LeafQuery, QueryPlan, DEFAULT_MIN_SIMILARITY};
use crate::scorer::{LinearScorer, MatchScorer};
use mediasearch_core::{DocId, Result};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Maximum number of hits returned unless configured otherwise
pub const DEFAULT_MAX_RESULTS: usize = 20;

// ============================================================================
// Options / Hits
// ============================================================================

/// Search tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Top-k cut-off
    pub max_results: usize,
    /// Fuzzy similarity threshold (exclusive)
    pub min_similarity: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_results: DEFAULT_MAX_RESULTS,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// A ranked result
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matched document
    pub id: DocId,
    /// Relevance score (higher is better)
    pub score: f32,
}

// ============================================================================
// Searcher
// ============================================================================

/// Read-only query evaluator bound to one snapshot
pub struct Searcher {
    index: CommittedIndex,
    scorer: Arc<dyn MatchScorer>,
    options: SearchOptions,
}

impl fmt::Debug for Searcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("generation", &self.index.generation())
            .field("docs", &self.index.len())
            .field("scorer", &self.scorer.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Searcher {
    /// Bind a searcher to a snapshot with the default scorer
    ///
    /// # Errors
    ///
    /// `IndexCorruption` if the snapshot fails its consistency check.
    pub fn bind(index: CommittedIndex, options: SearchOptions) -> Result<Self> {
        Self::bind_with_scorer(index, options, Arc::new(LinearScorer::default()))
    }

    /// Bind a searcher with a custom scorer
    pub fn bind_with_scorer(
        index: CommittedIndex,
        options: SearchOptions,
        scorer: Arc<dyn MatchScorer>,
    ) -> Result<Self> {
        index.verify()?;
        Ok(Searcher {
            index,
            scorer,
            options,
        })
    }

    /// Generation of the bound snapshot
    pub fn generation(&self) -> u64 {
        self.index.generation()
    }

    /// The bound snapshot
    pub fn index(&self) -> &CommittedIndex {
        &self.index
    }

    /// Active options
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Parse and run a query string
    ///
    /// # Errors
    ///
    /// `EmptyQuery` for an empty or whitespace-only string.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let plan = QueryPlan::parse(query, self.index.analyzer(), self.options.min_similarity)?;
        Ok(self.execute(&plan))
    }

    /// Run a parsed query
    pub fn execute(&self, plan: &QueryPlan) -> Vec<SearchHit> {
        let k = self.options.max_results;
        if plan.is_empty() || k == 0 || self.index.is_empty() {
            return Vec::new();
        }

        let mut scores = vec![0.0f32; self.index.ordinal_bound()];
        let mut seen = vec![false; scores.len()];
        let mut touched: Vec<u32> = Vec::new();

        for leaf in plan.leaves() {
            let best = self.leaf_matches(leaf);
            let boost = leaf.boost();
            for (doc, quality) in best {
                let did = doc as usize;
                if !seen[did] {
                    seen[did] = true;
                    touched.push(doc);
                }
                scores[did] += boost * quality;
            }
        }

        let mut hits: Vec<SearchHit> = touched
            .into_iter()
            .filter(|&doc| scores[doc as usize] > 0.0)
            .filter_map(|doc| {
                self.index.doc_id(doc).map(|id| SearchHit {
                    id: id.clone(),
                    score: scores[doc as usize],
                })
            })
            .collect();

        if hits.len() > k {
            // O(n) partition puts the top-k in [0..k], unordered
            hits.select_nth_unstable_by(k - 1, rank);
            hits.truncate(k);
        }
        hits.sort_unstable_by(rank);
        hits
    }

    /// Best match quality per document for one leaf
    fn leaf_matches(&self, leaf: &LeafQuery) -> FxHashMap<u32, f32> {
        let index = &self.index;
        let filter_dead = index.has_tombstones();
        let mut best: FxHashMap<u32, f32> = FxHashMap::default();
        let mut record = |postings: &PostingList, quality: f32| {
            for posting in postings.iter() {
                if filter_dead && !index.is_live(posting.doc) {
                    continue;
                }
                let slot = best.entry(posting.doc).or_insert(0.0);
                if quality > *slot {
                    *slot = quality;
                }
            }
        };

        match leaf.kind {
            LeafKind::Fuzzy { min_similarity } => {
                let matcher = FuzzyMatcher::new(&leaf.token, min_similarity);
                for dict in index.dictionaries(leaf.field) {
                    for (term, postings) in dict.terms() {
                        if let Some(sim) = matcher.similarity(term) {
                            record(postings, self.scorer.fuzzy_quality(sim, min_similarity));
                        }
                    }
                }
            }
            LeafKind::Prefix => {
                let quality = self.scorer.prefix_quality();
                for dict in index.dictionaries(leaf.field) {
                    for (_, postings) in dict.with_prefix(&leaf.token) {
                        record(postings, quality);
                    }
                }
            }
        }
        best
    }
}

/// Score descending, then id ascending
fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

// ============================================================================
// Tests
// ============================================================================

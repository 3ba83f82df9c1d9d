//! Inverted index and document store
//!
//! This module provides:
//! - PostingList: sorted postings (document ordinal + term frequency)
//! - FieldIndex: one ordered term dictionary per indexed field
//! - InvertedIndex: the mutable working index owned by the writer
//! - CommittedIndex: an immutable snapshot searchers bind to
//!
//! # Segments
//!
//! Documents live in two segments. The sealed segment holds the bulk of the
//! corpus and is never mutated once built. The active segment takes every
//! upsert. Removing or replacing a sealed document records a tombstone for
//! its ordinal instead of touching the sealed segment.
//!
//! Each part sits behind its own `Arc`, so `snapshot()` is O(1) and the
//! first mutation after it copies only the active segment and the
//! tombstones (`Arc::make_mut`). A snapshot never observes a later mutation.
//!
//! When the active segment plus tombstones outgrow `compaction_threshold`,
//! the next snapshot merges everything live into a new sealed segment. The
//! threshold grows with the square root of the corpus, so both the per-batch
//! copy and the amortized merge stay well below a full rebuild.
//!
//! # Document Ordinals
//!
//! Postings carry a compact `u32` ordinal instead of a cloned `DocId`.
//! Ordinals are global: the sealed segment owns `[0, active.base)` and the
//! active segment everything above. Ordinals freed in the active segment are
//! recycled, and a re-upserted active document keeps its ordinal.

use crate::tokenizer::{Analyzer, StandardAnalyzer};
use mediasearch_core::{DocId, Error, Field, IndexedDocument, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Smallest active segment + tombstone count that triggers a merge
pub const MIN_COMPACTION_THRESHOLD: usize = 256;

/// Active documents + tombstones tolerated before the next merge
pub fn compaction_threshold(live_docs: usize) -> usize {
    let root = (live_docs as f64).sqrt() as usize;
    root.max(MIN_COMPACTION_THRESHOLD)
}

// ============================================================================
// PostingList
// ============================================================================

/// Entry in a posting list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Document ordinal (resolve via `CommittedIndex::doc_id`)
    pub doc: u32,
    /// Term frequency in this field of the document
    pub tf: u32,
}

/// Documents containing a term, sorted by ordinal
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    entries: Vec<Posting>,
}

impl PostingList {
    /// Create a new empty posting list
    pub fn new() -> Self {
        PostingList { entries: vec![] }
    }

    /// Insert or replace the posting for `doc`
    pub fn insert(&mut self, doc: u32, tf: u32) {
        match self.entries.binary_search_by_key(&doc, |p| p.doc) {
            Ok(pos) => self.entries[pos].tf = tf,
            Err(pos) => self.entries.insert(pos, Posting { doc, tf }),
        }
    }

    /// Remove the posting for `doc`, returning whether it was present
    pub fn remove(&mut self, doc: u32) -> bool {
        match self.entries.binary_search_by_key(&doc, |p| p.doc) {
            Ok(pos) => {
                self.entries.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Check whether `doc` is in the list
    pub fn contains(&self, doc: u32) -> bool {
        self.entries.binary_search_by_key(&doc, |p| p.doc).is_ok()
    }

    /// Postings in ascending ordinal order
    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.entries.iter()
    }

    /// Number of documents containing this term
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if posting list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// FieldIndex
// ============================================================================

/// Term dictionary of one field
///
/// Ordered so that prefix enumeration is a range scan.
#[derive(Debug, Clone, Default)]
pub struct FieldIndex {
    terms: BTreeMap<String, PostingList>,
}

impl FieldIndex {
    /// Add a document's tokens, returning its distinct terms
    fn add(&mut self, doc: u32, tokens: Vec<String>) -> Vec<String> {
        let mut tf: BTreeMap<String, u32> = BTreeMap::new();
        for token in tokens {
            *tf.entry(token).or_insert(0) += 1;
        }
        let mut distinct = Vec::with_capacity(tf.len());
        for (term, count) in tf {
            self.terms.entry(term.clone()).or_default().insert(doc, count);
            distinct.push(term);
        }
        distinct
    }

    /// Remove a document from the posting lists of `terms`
    fn remove(&mut self, doc: u32, terms: &[String]) {
        for term in terms {
            let now_empty = match self.terms.get_mut(term) {
                Some(list) => {
                    list.remove(doc);
                    list.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.terms.remove(term);
            }
        }
    }

    /// Posting list of an exact term
    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    /// All terms with their posting lists, in term order
    pub fn terms(&self) -> impl Iterator<Item = (&str, &PostingList)> {
        self.terms.iter().map(|(t, p)| (t.as_str(), p))
    }

    /// Terms starting with `prefix` (including `prefix` itself), in term order
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a PostingList)> + 'a {
        self.terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(t, _)| t.starts_with(prefix))
            .map(|(t, p)| (t.as_str(), p))
    }

    /// Number of distinct terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

// ============================================================================
// Segments
// ============================================================================

/// Stored fields of one document plus the terms it contributed
#[derive(Debug, Clone)]
struct StoredDocument {
    doc: IndexedDocument,
    /// Distinct terms per field, indexed by `Field::slot`
    terms: [Vec<String>; 2],
}

/// Document store + per-field dictionaries for one ordinal range
#[derive(Debug, Clone, Default)]
struct Segment {
    /// First ordinal owned by this segment
    base: u32,
    /// DocId -> global ordinal
    ords: FxHashMap<DocId, u32>,
    /// `ord - base` -> stored document (None for recycled slots)
    slots: Vec<Option<StoredDocument>>,
    /// Recycled ordinals
    free: Vec<u32>,
    /// Dictionaries indexed by `Field::slot`
    fields: [FieldIndex; 2],
}

impl Segment {
    fn with_base(base: u32) -> Self {
        Segment {
            base,
            ..Default::default()
        }
    }

    /// One past the highest ordinal this segment can hold
    fn bound(&self) -> u32 {
        self.base + self.slots.len() as u32
    }

    fn slot(&self, ord: u32) -> Option<&StoredDocument> {
        let local = ord.checked_sub(self.base)?;
        self.slots.get(local as usize)?.as_ref()
    }

    fn allocate(&mut self, id: &DocId) -> u32 {
        let ord = match self.free.pop() {
            Some(ord) => ord,
            None => {
                self.slots.push(None);
                self.bound() - 1
            }
        };
        self.ords.insert(id.clone(), ord);
        ord
    }

    /// Index a tokenized document, replacing any version already here
    fn insert(&mut self, doc: IndexedDocument, name: Vec<String>, overview: Vec<String>) {
        let ord = match self.ords.get(&doc.id) {
            Some(&ord) => {
                self.unindex(ord);
                ord
            }
            None => self.allocate(&doc.id),
        };
        let name_terms = self.fields[Field::Name.slot()].add(ord, name);
        let overview_terms = self.fields[Field::Overview.slot()].add(ord, overview);
        self.slots[(ord - self.base) as usize] = Some(StoredDocument {
            doc,
            terms: [name_terms, overview_terms],
        });
    }

    fn remove(&mut self, id: &DocId) -> bool {
        let Some(ord) = self.ords.remove(id) else {
            return false;
        };
        self.unindex(ord);
        self.free.push(ord);
        true
    }

    /// Drop a document's postings, leaving its slot empty
    fn unindex(&mut self, ord: u32) -> Option<StoredDocument> {
        let local = ord.checked_sub(self.base)?;
        let stored = self.slots.get_mut(local as usize)?.take()?;
        for field in Field::ALL {
            self.fields[field.slot()].remove(ord, &stored.terms[field.slot()]);
        }
        Some(stored)
    }

    /// Every id maps to an occupied slot holding that id, and the number
    /// of occupied slots equals the number of ids
    fn verify(&self) -> std::result::Result<(), String> {
        let occupied = self.slots.iter().filter(|s| s.is_some()).count();
        if occupied != self.ords.len() {
            return Err(format!(
                "{} stored documents but {} indexed ids",
                occupied,
                self.ords.len()
            ));
        }
        for (id, &ord) in &self.ords {
            match self.slot(ord) {
                Some(stored) if &stored.doc.id == id => {}
                _ => {
                    return Err(format!(
                        "id {} points at ordinal {} which does not hold it",
                        id, ord
                    ))
                }
            }
        }
        Ok(())
    }
}

/// A segment that will never change again
///
/// Its consistency check runs once, the first time a searcher binds.
#[derive(Debug, Default)]
struct SealedSegment {
    segment: Segment,
    checked: OnceLock<std::result::Result<(), String>>,
}

impl SealedSegment {
    fn new(segment: Segment) -> Self {
        SealedSegment {
            segment,
            checked: OnceLock::new(),
        }
    }

    fn verify(&self) -> std::result::Result<(), String> {
        self.checked.get_or_init(|| self.segment.verify()).clone()
    }
}

/// Segment sizes, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentStats {
    /// Live documents in the sealed segment
    pub sealed: usize,
    /// Documents in the active segment
    pub active: usize,
    /// Sealed ordinals removed or superseded since the last merge
    pub tombstones: usize,
}

/// Sealed segment, active segment and tombstones; each shared separately
#[derive(Debug, Clone)]
struct IndexData {
    sealed: Arc<SealedSegment>,
    active: Arc<Segment>,
    /// Sealed ordinals that are no longer live
    tombstones: Arc<FxHashSet<u32>>,
}

impl Default for IndexData {
    fn default() -> Self {
        Self::sealing(Segment::default())
    }
}

impl IndexData {
    /// Seal `segment` and open an empty active segment above it
    fn sealing(segment: Segment) -> Self {
        let base = segment.bound();
        IndexData {
            sealed: Arc::new(SealedSegment::new(segment)),
            active: Arc::new(Segment::with_base(base)),
            tombstones: Arc::new(FxHashSet::default()),
        }
    }

    /// Ordinal of a sealed document that is still live
    fn sealed_live(&self, id: &DocId) -> Option<u32> {
        let ord = *self.sealed.segment.ords.get(id)?;
        (!self.tombstones.contains(&ord)).then_some(ord)
    }

    fn contains(&self, id: &DocId) -> bool {
        self.active.ords.contains_key(id) || self.sealed_live(id).is_some()
    }

    fn stored(&self, ord: u32) -> Option<&StoredDocument> {
        if ord >= self.active.base {
            self.active.slot(ord)
        } else if self.tombstones.contains(&ord) {
            None
        } else {
            self.sealed.segment.slot(ord)
        }
    }

    fn document(&self, id: &DocId) -> Option<&IndexedDocument> {
        let ord = match self.active.ords.get(id) {
            Some(&ord) => ord,
            None => self.sealed_live(id)?,
        };
        self.stored(ord).map(|stored| &stored.doc)
    }

    fn live(&self) -> impl Iterator<Item = &StoredDocument> {
        let sealed = &self.sealed.segment;
        let tombstones = &self.tombstones;
        sealed
            .slots
            .iter()
            .enumerate()
            .filter(move |(i, _)| !tombstones.contains(&(sealed.base + *i as u32)))
            .filter_map(|(_, slot)| slot.as_ref())
            .chain(self.active.slots.iter().filter_map(Option::as_ref))
    }

    fn sorted_documents(&self) -> Vec<&IndexedDocument> {
        let mut docs: Vec<&IndexedDocument> = self.live().map(|s| &s.doc).collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    fn len(&self) -> usize {
        self.sealed.segment.ords.len() - self.tombstones.len() + self.active.ords.len()
    }

    fn doc_freq(&self, field: Field, term: &str) -> usize {
        let sealed = self.sealed.segment.fields[field.slot()]
            .get(term)
            .map(|list| {
                list.iter()
                    .filter(|p| !self.tombstones.contains(&p.doc))
                    .count()
            })
            .unwrap_or(0);
        let active = self.active.fields[field.slot()]
            .get(term)
            .map(PostingList::len)
            .unwrap_or(0);
        sealed + active
    }

    fn segment_stats(&self) -> SegmentStats {
        SegmentStats {
            sealed: self.sealed.segment.ords.len() - self.tombstones.len(),
            active: self.active.ords.len(),
            tombstones: self.tombstones.len(),
        }
    }
}

// ============================================================================
// InvertedIndex
// ============================================================================

/// Mutable inverted index + document store
///
/// Owned by the writer. Readers never see it directly; they bind to the
/// `CommittedIndex` returned by `snapshot()`.
pub struct InvertedIndex {
    data: IndexData,
    analyzer: Arc<dyn Analyzer>,
    generation: u64,
    pending: bool,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvertedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvertedIndex")
            .field("docs", &self.len())
            .field("analyzer", &self.analyzer.name())
            .field("generation", &self.generation)
            .field("pending", &self.pending)
            .field("segments", &self.data.segment_stats())
            .finish()
    }
}

impl InvertedIndex {
    /// Create an empty index with the standard analyzer
    pub fn new() -> Self {
        Self::with_analyzer(Arc::new(StandardAnalyzer))
    }

    /// Create an empty index with a custom analyzer
    pub fn with_analyzer(analyzer: Arc<dyn Analyzer>) -> Self {
        InvertedIndex {
            data: IndexData::default(),
            analyzer,
            generation: 0,
            pending: false,
        }
    }

    /// The analyzer used for documents, and later for queries
    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    // ========================================================================
    // Index Updates
    // ========================================================================

    /// Index a document, replacing any previous version with the same id
    ///
    /// Upserting the same document twice leaves the index exactly as one
    /// upsert would.
    pub fn upsert(&mut self, doc: IndexedDocument) {
        let name_tokens = self.analyzer.tokenize(&doc.name);
        let overview_tokens = self.analyzer.tokenize(&doc.overview);

        if !self.data.active.ords.contains_key(&doc.id) {
            if let Some(ord) = self.data.sealed_live(&doc.id) {
                Arc::make_mut(&mut self.data.tombstones).insert(ord);
            }
        }
        Arc::make_mut(&mut self.data.active).insert(doc, name_tokens, overview_tokens);
        self.pending = true;
    }

    /// Remove a document and all postings referencing it
    ///
    /// Returns false (and changes nothing) if the id is not indexed.
    pub fn remove(&mut self, id: &DocId) -> bool {
        let removed = if self.data.active.ords.contains_key(id) {
            Arc::make_mut(&mut self.data.active).remove(id)
        } else if let Some(ord) = self.data.sealed_live(id) {
            Arc::make_mut(&mut self.data.tombstones).insert(ord)
        } else {
            false
        };
        self.pending |= removed;
        removed
    }

    /// Remove every document
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        self.data = IndexData::default();
        self.pending = true;
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Publish the current state as an immutable snapshot
    ///
    /// Every call produces a new generation, even when nothing changed.
    /// Segments are merged first if the active side has grown too large.
    pub fn snapshot(&mut self) -> CommittedIndex {
        let pending_work = self.data.active.ords.len() + self.data.tombstones.len();
        if pending_work > compaction_threshold(self.len()) {
            self.compact();
        }
        self.generation += 1;
        self.pending = false;
        CommittedIndex {
            data: self.data.clone(),
            analyzer: Arc::clone(&self.analyzer),
            generation: self.generation,
        }
    }

    /// Merge every live document into a fresh sealed segment
    pub fn compact(&mut self) {
        let stats = self.data.segment_stats();
        let merged = if stats.sealed == 0 && stats.tombstones == 0 {
            // Nothing to merge with: the active segment becomes the sealed one
            let active = std::mem::take(&mut self.data.active);
            Arc::try_unwrap(active).unwrap_or_else(|shared| (*shared).clone())
        } else {
            let mut merged = Segment::default();
            for stored in self.data.live() {
                merged.insert(
                    stored.doc.clone(),
                    self.analyzer.tokenize(&stored.doc.name),
                    self.analyzer.tokenize(&stored.doc.overview),
                );
            }
            merged
        };
        self.data = IndexData::sealing(merged);
        debug!(
            target: "mediasearch::search",
            sealed = stats.sealed + stats.active,
            merged_active = stats.active,
            dropped_tombstones = stats.tombstones,
            "Compacted index segments"
        );
    }

    /// True if documents changed since the last snapshot
    pub fn has_pending_changes(&self) -> bool {
        self.pending
    }

    /// Generation of the last snapshot (0 before the first)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if no documents are indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether an id is indexed
    pub fn contains(&self, id: &DocId) -> bool {
        self.data.contains(id)
    }

    /// Stored fields of an indexed document
    pub fn get(&self, id: &DocId) -> Option<&IndexedDocument> {
        self.data.document(id)
    }

    /// All indexed documents, sorted by id
    pub fn documents(&self) -> Vec<&IndexedDocument> {
        self.data.sorted_documents()
    }

    /// Number of live documents containing `term` in `field`
    pub fn doc_freq(&self, field: Field, term: &str) -> usize {
        self.data.doc_freq(field, term)
    }

    /// Current segment sizes
    pub fn segment_stats(&self) -> SegmentStats {
        self.data.segment_stats()
    }
}

// ============================================================================
// CommittedIndex
// ============================================================================

/// Immutable snapshot of the index as of one commit
///
/// Cheap to clone. Carries the analyzer the documents were indexed with.
#[derive(Clone)]
pub struct CommittedIndex {
    data: IndexData,
    analyzer: Arc<dyn Analyzer>,
    generation: u64,
}

impl fmt::Debug for CommittedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommittedIndex")
            .field("docs", &self.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl CommittedIndex {
    /// An empty snapshot at generation 0
    pub fn empty(analyzer: Arc<dyn Analyzer>) -> Self {
        CommittedIndex {
            data: IndexData::default(),
            analyzer,
            generation: 0,
        }
    }

    /// Commit generation of this snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The analyzer documents were indexed with
    pub fn analyzer(&self) -> &dyn Analyzer {
        self.analyzer.as_ref()
    }

    /// Term dictionaries of a field, sealed segment first
    ///
    /// Postings may reference dead ordinals; filter them with `is_live`.
    pub fn dictionaries(&self, field: Field) -> impl Iterator<Item = &FieldIndex> {
        [
            &self.data.sealed.segment.fields[field.slot()],
            &self.data.active.fields[field.slot()],
        ]
        .into_iter()
    }

    /// False for ordinals of removed or replaced sealed documents
    pub fn is_live(&self, ord: u32) -> bool {
        !self.data.tombstones.contains(&ord)
    }

    /// Check if any posting may need the `is_live` filter
    pub fn has_tombstones(&self) -> bool {
        !self.data.tombstones.is_empty()
    }

    /// Number of live documents containing `term` in `field`
    pub fn doc_freq(&self, field: Field, term: &str) -> usize {
        self.data.doc_freq(field, term)
    }

    /// Resolve an ordinal to its document id
    pub fn doc_id(&self, ord: u32) -> Option<&DocId> {
        self.data.stored(ord).map(|stored| &stored.doc.id)
    }

    /// Stored fields of a document
    pub fn document(&self, id: &DocId) -> Option<&IndexedDocument> {
        self.data.document(id)
    }

    /// All documents, sorted by id
    pub fn documents(&self) -> Vec<&IndexedDocument> {
        self.data.sorted_documents()
    }

    /// Check whether an id is in this snapshot
    pub fn contains(&self, id: &DocId) -> bool {
        self.data.contains(id)
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the snapshot holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upper bound (exclusive) of ordinals; sizes dense score accumulators
    pub fn ordinal_bound(&self) -> usize {
        self.data.active.bound() as usize
    }

    /// Segment sizes of this snapshot
    pub fn segment_stats(&self) -> SegmentStats {
        self.data.segment_stats()
    }

    /// Structural consistency check run when a searcher binds
    ///
    /// Each segment must be internally consistent, every tombstone must name
    /// a stored sealed document, and no id may be live in both segments.
    /// The sealed segment is checked once; later binds only pay for the
    /// active segment and the tombstones.
    pub fn verify(&self) -> Result<()> {
        let data = &self.data;
        let sealed = &data.sealed.segment;
        data.sealed.verify().map_err(Error::corruption)?;
        data.active.verify().map_err(Error::corruption)?;
        if data.active.base != sealed.bound() {
            return Err(Error::corruption(format!(
                "active segment starts at {} but sealed segment ends at {}",
                data.active.base,
                sealed.bound()
            )));
        }
        for &ord in data.tombstones.iter() {
            if sealed.slot(ord).is_none() {
                return Err(Error::corruption(format!(
                    "tombstone for ordinal {} which holds no document",
                    ord
                )));
            }
        }
        for id in data.active.ords.keys() {
            if data.sealed_live(id).is_some() {
                return Err(Error::corruption(format!(
                    "id {} is live in both segments",
                    id
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, name: &str, overview: &str) -> IndexedDocument {
        IndexedDocument::new(id, name, overview)
    }

    /// Index with `n` documents already merged into the sealed segment
    fn sealed_index(n: usize) -> InvertedIndex {
        let mut index = InvertedIndex::new();
        for i in 0..n {
            index.upsert(doc(&format!("s{:04}", i), "Sealed Title", "Sealed overview"));
        }
        index.compact();
        index
    }

    #[test]
    fn test_upsert_indexes_both_fields() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Batman Begins", "A hero rises"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.doc_freq(Field::Name, "batman"), 1);
        assert_eq!(index.doc_freq(Field::Name, "hero"), 0);
        assert_eq!(index.doc_freq(Field::Overview, "hero"), 1);
        assert_eq!(index.doc_freq(Field::Overview, "batman"), 0);
    }

    #[test]
    fn test_term_frequency() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Tora! Tora! Tora!", ""));

        let snap = index.snapshot();
        let postings = snap
            .dictionaries(Field::Name)
            .find_map(|dict| dict.get("tora"))
            .unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings.iter().next().unwrap().tf, 3);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut index = InvertedIndex::new();
        let d = doc("1", "Heat", "A group of professional bank robbers");
        index.upsert(d.clone());
        let once = index.snapshot();
        index.upsert(d);
        let twice = index.snapshot();

        assert_eq!(once.len(), twice.len());
        assert_eq!(once.ordinal_bound(), twice.ordinal_bound());
        assert_eq!(twice.doc_freq(Field::Name, "heat"), 1);
        assert_eq!(twice.doc_freq(Field::Overview, "robbers"), 1);
    }

    #[test]
    fn test_upsert_replaces_previous_version() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Alien", "space horror"));
        index.upsert(doc("1", "Aliens", "space marines"));

        assert_eq!(index.len(), 1);
        assert_eq!(index.doc_freq(Field::Name, "alien"), 0);
        assert_eq!(index.doc_freq(Field::Name, "aliens"), 1);
        assert_eq!(index.doc_freq(Field::Overview, "horror"), 0);
        assert_eq!(index.doc_freq(Field::Overview, "space"), 1);
        assert_eq!(index.get(&DocId::from("1")).unwrap().name, "Aliens");
    }

    #[test]
    fn test_remove_document() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Hello World", ""));
        index.upsert(doc("2", "Hello There", ""));

        assert!(index.remove(&DocId::from("1")));

        assert_eq!(index.len(), 1);
        assert_eq!(index.doc_freq(Field::Name, "hello"), 1);
        assert_eq!(index.doc_freq(Field::Name, "world"), 0);
        assert!(index.get(&DocId::from("1")).is_none());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Hello", ""));
        index.snapshot();

        assert!(!index.remove(&DocId::from("missing")));
        assert!(!index.has_pending_changes());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_terms_are_dropped_from_dictionary() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Solaris", ""));
        index.remove(&DocId::from("1"));

        let snap = index.snapshot();
        assert!(snap.dictionaries(Field::Name).all(FieldIndex::is_empty));
    }

    #[test]
    fn test_ordinals_are_recycled() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "One", ""));
        index.upsert(doc("2", "Two", ""));
        index.remove(&DocId::from("1"));
        index.upsert(doc("3", "Three", ""));

        let snap = index.snapshot();
        assert_eq!(snap.ordinal_bound(), 2);
        assert!(snap.verify().is_ok());
    }

    #[test]
    fn test_snapshot_isolated_from_later_writes() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Vertigo", ""));
        let before = index.snapshot();

        index.upsert(doc("2", "Psycho", ""));
        index.remove(&DocId::from("1"));
        let after = index.snapshot();

        assert!(before.contains(&DocId::from("1")));
        assert!(!before.contains(&DocId::from("2")));
        assert!(!after.contains(&DocId::from("1")));
        assert!(after.contains(&DocId::from("2")));
        assert!(after.generation() > before.generation());
    }

    #[test]
    fn test_prefix_range_scan() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "bat batman batmobile ball", ""));
        let snap = index.snapshot();

        let terms: Vec<&str> = snap
            .dictionaries(Field::Name)
            .flat_map(|dict| dict.with_prefix("bat"))
            .map(|(t, _)| t)
            .collect();
        assert_eq!(terms, vec!["bat", "batman", "batmobile"]);
    }

    #[test]
    fn test_documents_sorted_by_id() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("b", "B", ""));
        index.upsert(doc("a", "A", ""));
        let ids: Vec<&str> = index.documents().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_clear() {
        let mut index = InvertedIndex::new();
        index.upsert(doc("1", "Hello", ""));
        index.snapshot();
        index.clear();

        assert!(index.is_empty());
        assert!(index.has_pending_changes());
    }

    #[test]
    fn test_posting_list() {
        let mut list = PostingList::new();
        assert!(list.is_empty());

        list.insert(5, 1);
        list.insert(2, 3);
        list.insert(5, 2);

        let docs: Vec<u32> = list.iter().map(|p| p.doc).collect();
        assert_eq!(docs, vec![2, 5]);
        assert_eq!(list.iter().last().unwrap().tf, 2);

        assert!(list.remove(2));
        assert!(!list.remove(2));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_verify_fresh_snapshot() {
        let mut index = InvertedIndex::new();
        for i in 0..10 {
            index.upsert(doc(&i.to_string(), "Title", "Overview"));
        }
        index.remove(&DocId::from("3"));
        assert!(index.snapshot().verify().is_ok());
    }

    // ========================================================================
    // Segment tests
    // ========================================================================

    #[test]
    fn test_large_batch_is_sealed_on_snapshot() {
        let mut index = InvertedIndex::new();
        for i in 0..(MIN_COMPACTION_THRESHOLD + 1) {
            index.upsert(doc(&i.to_string(), "Title", ""));
        }
        let snap = index.snapshot();
        let stats = snap.segment_stats();
        assert_eq!(stats.sealed, MIN_COMPACTION_THRESHOLD + 1);
        assert_eq!(stats.active, 0);
        assert!(snap.verify().is_ok());
    }

    #[test]
    fn test_small_batch_touches_only_active_segment() {
        let mut index = sealed_index(1_000);
        let before = index.snapshot();

        index.upsert(doc("new", "Fresh", ""));
        let after = index.snapshot();

        // The sealed segment is shared, not copied
        assert!(Arc::ptr_eq(&before.data.sealed, &after.data.sealed));
        assert_eq!(after.segment_stats().active, 1);
        assert_eq!(after.len(), 1_001);
    }

    #[test]
    fn test_replacing_sealed_document_tombstones_it() {
        let mut index = sealed_index(300);
        let id = DocId::from("s0007");

        index.upsert(doc("s0007", "Replacement", ""));
        let snap = index.snapshot();

        assert_eq!(snap.len(), 300);
        assert_eq!(snap.segment_stats().tombstones, 1);
        assert_eq!(snap.document(&id).unwrap().name, "Replacement");
        assert_eq!(snap.doc_freq(Field::Name, "sealed"), 299);
        assert_eq!(snap.doc_freq(Field::Name, "replacement"), 1);
        assert!(snap.verify().is_ok());
    }

    #[test]
    fn test_removing_sealed_document() {
        let mut index = sealed_index(300);
        assert!(index.remove(&DocId::from("s0001")));
        assert!(!index.remove(&DocId::from("s0001")));

        let snap = index.snapshot();
        assert_eq!(snap.len(), 299);
        assert!(!snap.contains(&DocId::from("s0001")));
        assert!(snap.documents().iter().all(|d| d.id.as_str() != "s0001"));
        assert!(snap.verify().is_ok());
    }

    #[test]
    fn test_tombstones_dropped_by_merge() {
        let mut index = sealed_index(300);
        // Enough replacements to cross the threshold
        for i in 0..(MIN_COMPACTION_THRESHOLD / 2 + 1) {
            index.upsert(doc(&format!("s{:04}", i), "Renamed", ""));
        }
        let snap = index.snapshot();
        let stats = snap.segment_stats();

        assert_eq!(stats.tombstones, 0);
        assert_eq!(stats.active, 0);
        assert_eq!(snap.len(), 300);
        assert_eq!(snap.doc_freq(Field::Name, "renamed"), MIN_COMPACTION_THRESHOLD / 2 + 1);
        assert!(snap.verify().is_ok());
    }

    #[test]
    fn test_compaction_threshold_grows_with_corpus() {
        assert_eq!(compaction_threshold(0), MIN_COMPACTION_THRESHOLD);
        assert_eq!(compaction_threshold(1_000_000), 1_000);
    }

    #[test]
    fn test_verify_detects_doubly_live_id() {
        let mut index = sealed_index(10);
        let mut snap = index.snapshot();
        // Bypass upsert so the sealed copy is not tombstoned
        let data = &mut snap.data;
        Arc::make_mut(&mut data.active).insert(
            doc("s0003", "Twin", ""),
            vec!["twin".to_string()],
            Vec::new(),
        );
        assert!(matches!(snap.verify(), Err(Error::IndexCorruption(_))));
    }
}

//! Index state shared between writers and searchers
//!
//! One `RwLock` guards the writer, the last committed snapshot and the
//! cached searcher:
//!
//! - a writer batch holds the lock exclusively, commits once, and clears
//!   the cached searcher before releasing it
//! - a search holds the lock shared for its whole execution
//! - a search that finds no cached searcher retakes the lock exclusively,
//!   binds one to the current snapshot, and downgrades to shared to run
//!
//! So no search sees a snapshot older than the last finished commit, and
//! none sees a batch half-applied.

use crate::writer::{BatchReport, IndexWriter};
use mediasearch_core::{DocId, Error, IndexedDocument, Result};
use mediasearch_search::{CommittedIndex, SearchHit, SearchOptions, Searcher};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, error};

struct IndexState {
    writer: IndexWriter,
    committed: CommittedIndex,
    searcher: Option<Searcher>,
    closed: bool,
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    /// Documents in the last commit
    pub documents: usize,
    /// Generation of the last commit
    pub generation: u64,
    /// True if a searcher is bound to the last commit
    pub searcher_bound: bool,
}

/// Writer + searcher cache behind one lock
pub struct SharedIndex {
    state: RwLock<IndexState>,
    options: SearchOptions,
}

impl SharedIndex {
    /// Wrap a writer and its current committed snapshot
    pub fn new(writer: IndexWriter, committed: CommittedIndex, options: SearchOptions) -> Self {
        SharedIndex {
            state: RwLock::new(IndexState {
                writer,
                committed,
                searcher: None,
                closed: false,
            }),
            options,
        }
    }

    /// Apply an add/update batch under exclusive access
    ///
    /// # Errors
    ///
    /// `ShutDown` once `close` has run.
    pub fn add_or_update(&self, docs: Vec<IndexedDocument>) -> Result<BatchReport> {
        let mut state = self.state.write();
        if state.closed {
            return Err(Error::ShutDown);
        }
        let (report, committed) = state.writer.add_or_update(docs);
        Self::publish(&mut state, committed);
        Ok(report)
    }

    /// Apply a removal batch under exclusive access
    ///
    /// # Errors
    ///
    /// `ShutDown` once `close` has run.
    pub fn remove(&self, ids: Vec<DocId>) -> Result<BatchReport> {
        let mut state = self.state.write();
        if state.closed {
            return Err(Error::ShutDown);
        }
        let (report, committed) = state.writer.remove(ids);
        Self::publish(&mut state, committed);
        Ok(report)
    }

    fn publish(state: &mut IndexState, committed: CommittedIndex) {
        state.committed = committed;
        // Dropped before the write lock is released
        state.searcher = None;
    }

    /// Run a query against the latest commit
    ///
    /// # Errors
    ///
    /// `EmptyQuery` for an empty or whitespace-only query. A snapshot that
    /// fails its consistency check is logged and yields no hits.
    pub fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::EmptyQuery);
        }
        let started = Instant::now();

        let state = self.state.read();
        let state = if state.searcher.is_some() {
            state
        } else {
            drop(state);
            match self.bind() {
                Some(state) => state,
                None => return Ok(Vec::new()),
            }
        };

        let Some(searcher) = state.searcher.as_ref() else {
            return Ok(Vec::new());
        };
        let hits = searcher.search(query)?;
        debug!(
            target: "mediasearch::search",
            query,
            hits = hits.len(),
            generation = searcher.generation(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Search complete"
        );
        Ok(hits)
    }

    /// Bind a searcher if none is cached; returns the lock held shared
    fn bind(&self) -> Option<RwLockReadGuard<'_, IndexState>> {
        let mut state = self.state.write();
        // Another search may have bound one while we waited
        if state.searcher.is_none() {
            match Searcher::bind(state.committed.clone(), self.options) {
                Ok(searcher) => {
                    debug!(
                        target: "mediasearch::search",
                        generation = searcher.generation(),
                        "Bound searcher"
                    );
                    state.searcher = Some(searcher);
                }
                Err(e) => {
                    error!(
                        target: "mediasearch::search",
                        error = %e,
                        generation = state.committed.generation(),
                        "Cannot bind searcher; returning no results"
                    );
                    return None;
                }
            }
        }
        Some(RwLockWriteGuard::downgrade(state))
    }

    /// Fold the change log into the snapshot and refuse further batches
    ///
    /// Returns false if the last commit is still not fully on disk.
    /// Idempotent.
    pub fn close(&self) -> bool {
        let mut state = self.state.write();
        state.closed = true;
        state.searcher = None;
        if !state.writer.needs_checkpoint() {
            return true;
        }
        let committed = state.committed.clone();
        state.writer.checkpoint(&committed)
    }

    /// Current counters
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        IndexStats {
            documents: state.committed.len(),
            generation: state.committed.generation(),
            searcher_bound: state.searcher.is_some(),
        }
    }

    /// Snapshot of the last commit
    pub fn committed(&self) -> CommittedIndex {
        self.state.read().committed.clone()
    }
}

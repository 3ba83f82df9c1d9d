//! Batch writer
//!
//! Every public write is one batch: validate each document, apply the
//! valid ones to the live index, then commit once. A rejected document is
//! logged and reported; it never fails the batch.
//!
//! When the engine is disk-backed, a commit that changed the index appends
//! the batch's effective changes to the change log. Once the log outgrows
//! the snapshot, the next commit checkpoints: it rewrites the snapshot and
//! empties the log. A failed write is logged and repaired by a checkpoint
//! at the next commit or at shutdown; the in-memory commit stands either
//! way.

use crate::changelog::{ChangeLog, LogRecord};
use crate::snapshot::{write_snapshot, SnapshotData};
use mediasearch_core::{DocId, Error, IndexedDocument, Limits};
use mediasearch_search::{CommittedIndex, InvertedIndex};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Log size below which no checkpoint is forced, whatever the snapshot size
pub const MIN_CHECKPOINT_BYTES: u64 = 4 * 1024 * 1024;

// ============================================================================
// BatchReport
// ============================================================================

/// A document the writer refused
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDocument {
    /// Identifier as submitted
    pub id: DocId,
    /// Human-readable reason
    pub reason: String,
}

/// Outcome of one writer batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    /// Documents indexed or removed
    pub applied: usize,
    /// Documents rejected, in batch order
    pub skipped: Vec<SkippedDocument>,
    /// Generation of the commit that ended the batch
    pub generation: u64,
}

impl BatchReport {
    /// True if nothing was rejected
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

// ============================================================================
// IndexWriter
// ============================================================================

#[derive(Debug)]
struct Persistence {
    snapshot_path: PathBuf,
    log_path: PathBuf,
    fsync: bool,
    /// None until the first checkpoint succeeds
    log: Option<ChangeLog>,
    /// Size of the last snapshot written
    snapshot_bytes: u64,
    /// Log size that never forces a checkpoint
    min_checkpoint_bytes: u64,
}

/// Owns the live index and turns batches into commits
#[derive(Debug)]
pub struct IndexWriter {
    index: InvertedIndex,
    limits: Limits,
    persistence: Option<Persistence>,
    /// Effective changes of the batch in progress (disk-backed only)
    batch: LogRecord,
    unpersisted: bool,
}

impl IndexWriter {
    /// In-memory writer
    pub fn new(limits: Limits) -> Self {
        IndexWriter {
            index: InvertedIndex::new(),
            limits,
            persistence: None,
            batch: LogRecord::default(),
            unpersisted: false,
        }
    }

    /// Writer that persists to a snapshot file plus a change log
    pub fn persistent(limits: Limits, snapshot_path: PathBuf, log_path: PathBuf, fsync: bool) -> Self {
        IndexWriter {
            persistence: Some(Persistence {
                snapshot_path,
                log_path,
                fsync,
                log: None,
                snapshot_bytes: 0,
                min_checkpoint_bytes: MIN_CHECKPOINT_BYTES,
            }),
            ..Self::new(limits)
        }
    }

    /// Lower the log size below which no checkpoint is forced
    pub fn with_min_checkpoint_bytes(mut self, bytes: u64) -> Self {
        if let Some(persistence) = self.persistence.as_mut() {
            persistence.min_checkpoint_bytes = bytes;
        }
        self
    }

    /// Rebuild the index from a recovered document set and commit it
    ///
    /// Documents that violate the current limits are dropped with a warning.
    /// A disk-backed writer then checkpoints, so the snapshot holds the
    /// recovered state and the change log starts empty.
    pub fn restore(&mut self, documents: Vec<IndexedDocument>) -> CommittedIndex {
        let total = documents.len();
        let mut dropped = 0usize;
        for doc in documents {
            match self.limits.validate(&doc) {
                Ok(()) => self.index.upsert(doc),
                Err(e) => {
                    dropped += 1;
                    warn!(target: "mediasearch::writer", id = %doc.id, error = %e, "Dropping restored document");
                }
            }
        }
        debug!(target: "mediasearch::writer", total, dropped, "Index rebuilt from storage");
        let committed = self.index.snapshot();
        if self.persistence.is_some() {
            self.checkpoint(&committed);
        }
        committed
    }

    /// Index or replace documents, then commit
    ///
    /// Duplicate ids within the batch are applied in order, so the last
    /// occurrence wins.
    pub fn add_or_update(&mut self, docs: Vec<IndexedDocument>) -> (BatchReport, CommittedIndex) {
        let mut report = BatchReport::default();
        let logging = self.persistence.is_some();
        for doc in docs {
            if let Err(e) = self.limits.validate(&doc) {
                let err = Error::rejected(&doc.id, e.to_string());
                warn!(target: "mediasearch::writer", error = %err, "Skipping document");
                report.skipped.push(SkippedDocument {
                    id: doc.id,
                    reason: e.to_string(),
                });
                continue;
            }
            debug!(target: "mediasearch::writer", id = %doc.id, "Indexing document");
            if logging {
                self.batch.upserts.push(doc.clone());
            }
            self.index.upsert(doc);
            report.applied += 1;
        }
        let committed = self.commit();
        report.generation = committed.generation();
        (report, committed)
    }

    /// Remove documents by id, then commit
    ///
    /// Ids that are not indexed are ignored and do not count as applied.
    pub fn remove(&mut self, ids: Vec<DocId>) -> (BatchReport, CommittedIndex) {
        let mut report = BatchReport::default();
        let logging = self.persistence.is_some();
        for id in ids {
            if id.as_str().trim().is_empty() {
                warn!(target: "mediasearch::writer", "Skipping removal with empty id");
                report.skipped.push(SkippedDocument {
                    id,
                    reason: "Document id is empty".to_string(),
                });
                continue;
            }
            if self.index.remove(&id) {
                debug!(target: "mediasearch::writer", id = %id, "Removed document");
                if logging {
                    self.batch.removed.push(id);
                }
                report.applied += 1;
            }
        }
        let committed = self.commit();
        report.generation = committed.generation();
        (report, committed)
    }

    /// Publish the live index and persist the batch
    fn commit(&mut self) -> CommittedIndex {
        let changed = self.index.has_pending_changes();
        let committed = self.index.snapshot();
        let mut batch = std::mem::take(&mut self.batch);
        if self.persistence.is_none() {
            return committed;
        }
        if self.unpersisted {
            // The log may be missing records or hold a torn one
            self.checkpoint(&committed);
        } else if changed {
            batch.generation = committed.generation();
            self.append(&batch, &committed);
        }
        committed
    }

    /// Append one batch to the change log; checkpoint if it grew too large
    fn append(&mut self, record: &LogRecord, committed: &CommittedIndex) {
        let Some(persistence) = self.persistence.as_mut() else {
            return;
        };
        let result = match persistence.log.as_mut() {
            Some(log) => log.append(record),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "change log is not open")),
        };
        match result {
            Ok(()) => {
                let limit = persistence.snapshot_bytes.max(persistence.min_checkpoint_bytes);
                let oversized = persistence.log.as_ref().map_or(false, |log| log.bytes() > limit);
                if oversized {
                    self.checkpoint(committed);
                }
            }
            Err(e) => {
                error!(
                    target: "mediasearch::writer",
                    path = %persistence.log_path.display(),
                    error = %e,
                    generation = committed.generation(),
                    "Failed to append to change log; in-memory commit stands"
                );
                self.unpersisted = true;
            }
        }
    }

    /// Write `committed` as the new snapshot and empty the change log
    ///
    /// Returns false if either step failed. A no-op for in-memory writers.
    pub fn checkpoint(&mut self, committed: &CommittedIndex) -> bool {
        let Some(persistence) = self.persistence.as_mut() else {
            return true;
        };
        let documents: Vec<IndexedDocument> = committed.documents().into_iter().cloned().collect();
        let count = documents.len();
        let result = write_snapshot(
            &persistence.snapshot_path,
            &SnapshotData::new(documents),
            persistence.fsync,
        )
        .and_then(|bytes| {
            persistence.snapshot_bytes = bytes;
            match persistence.log.as_mut() {
                Some(log) => log.reset(),
                None => {
                    persistence.log = Some(ChangeLog::create(&persistence.log_path, persistence.fsync)?);
                    Ok(())
                }
            }
        });
        match result {
            Ok(()) => {
                info!(
                    target: "mediasearch::writer",
                    documents = count,
                    generation = committed.generation(),
                    "Checkpointed index snapshot"
                );
                self.unpersisted = false;
                true
            }
            Err(e) => {
                error!(
                    target: "mediasearch::writer",
                    path = %persistence.snapshot_path.display(),
                    error = %e,
                    generation = committed.generation(),
                    "Failed to checkpoint index snapshot; in-memory commit stands"
                );
                self.unpersisted = true;
                false
            }
        }
    }

    /// True if the last committed state has not fully reached disk
    pub fn has_unpersisted_changes(&self) -> bool {
        self.unpersisted
    }

    /// True if a checkpoint would write anything new
    pub fn needs_checkpoint(&self) -> bool {
        self.unpersisted
            || self
                .persistence
                .as_ref()
                .and_then(|p| p.log.as_ref())
                .map_or(false, |log| log.records() > 0)
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if no documents are indexed
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Active limits
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

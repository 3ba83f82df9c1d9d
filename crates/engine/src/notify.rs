//! Change notifications from the library catalog
//!
//! The catalog owns item records; the engine only observes them. A
//! `ChangeSource` accepts listeners and delivers `ChangeEvent`s to them.
//! `ChangeHub` is an in-process source for hosts without one of their own.

use mediasearch_core::{DocId, IndexedDocument};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One batch of catalog changes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeEvent {
    /// Newly created items
    pub added: Vec<IndexedDocument>,
    /// Items whose indexed fields may have changed
    pub updated: Vec<IndexedDocument>,
    /// Deleted items
    pub removed: Vec<DocId>,
}

impl ChangeEvent {
    /// Event with only additions
    pub fn added(docs: Vec<IndexedDocument>) -> Self {
        ChangeEvent {
            added: docs,
            ..Default::default()
        }
    }

    /// Event with only updates
    pub fn updated(docs: Vec<IndexedDocument>) -> Self {
        ChangeEvent {
            updated: docs,
            ..Default::default()
        }
    }

    /// Event with only removals
    pub fn removed(ids: Vec<DocId>) -> Self {
        ChangeEvent {
            removed: ids,
            ..Default::default()
        }
    }

    /// True if the event carries no changes
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Split into the upsert batch (added then updated) and the removal batch
    pub fn into_batches(self) -> (Vec<IndexedDocument>, Vec<DocId>) {
        let mut upserts = self.added;
        upserts.extend(self.updated);
        (upserts, self.removed)
    }
}

/// Receives change events
///
/// Called on the emitter's thread; implementations must not block.
pub trait ChangeListener: Send + Sync {
    /// Handle one event
    fn on_change(&self, event: ChangeEvent);
}

/// Handle returned by `ChangeSource::subscribe`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw id; sources choose their own numbering
    pub fn new(raw: u64) -> Self {
        SubscriptionId(raw)
    }

    /// The raw id
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Something that emits catalog changes
pub trait ChangeSource: Send + Sync {
    /// Register a listener
    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId;

    /// Deregister a listener; unknown ids are ignored
    fn unsubscribe(&self, id: SubscriptionId);
}

/// In-process change source
///
/// `publish` delivers an event to every listener, in subscription order.
#[derive(Default)]
pub struct ChangeHub {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeListener>)>>,
    next_id: AtomicU64,
}

impl ChangeHub {
    /// Create a hub with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every listener
    pub fn publish(&self, event: ChangeEvent) {
        // Clone the list so listeners may (un)subscribe from the callback
        let listeners: Vec<Arc<dyn ChangeListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener.on_change(event.clone());
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl fmt::Debug for ChangeHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeHub")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl ChangeSource for ChangeHub {
    fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.write().retain(|(sub, _)| *sub != id);
    }
}

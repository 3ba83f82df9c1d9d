//! Resolving search hits to host items
//!
//! The engine returns identifiers. Hosts that want their own item records
//! pass an `ItemLookup`; ids it cannot resolve are dropped from the results.

use mediasearch_core::DocId;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

/// Maps a `DocId` to a host item
pub trait ItemLookup<T> {
    /// The item for `id`, or `None` if it no longer exists
    fn lookup(&self, id: &DocId) -> Option<T>;
}

impl<T, F> ItemLookup<T> for F
where
    F: Fn(&DocId) -> Option<T>,
{
    fn lookup(&self, id: &DocId) -> Option<T> {
        self(id)
    }
}

impl<T: Clone, S: BuildHasher> ItemLookup<T> for HashMap<DocId, T, S> {
    fn lookup(&self, id: &DocId) -> Option<T> {
        self.get(id).cloned()
    }
}

impl<T: Clone> ItemLookup<T> for BTreeMap<DocId, T> {
    fn lookup(&self, id: &DocId) -> Option<T> {
        self.get(id).cloned()
    }
}

/// Resolve ids in order, skipping the ones the lookup does not know
pub fn resolve<T, L>(ids: &[DocId], lookup: &L) -> Vec<T>
where
    L: ItemLookup<T> + ?Sized,
{
    ids.iter().filter_map(|id| lookup.lookup(id)).collect()
}

//! The `SearchEngine` facade
//!
//! An explicit instance with an explicit lifecycle:
//!
//! ```text
//! new ──init──▶ running ──shutdown──▶ shut down
//! ```
//!
//! Calls before `init` fail with `NotInitialized`, calls after `shutdown`
//! with `ShutDown`. Both `init` and `shutdown` are idempotent.

use crate::background::NotificationQueue;
use crate::changelog::read_log;
use crate::config::EngineConfig;
use crate::lookup::{resolve, ItemLookup};
use crate::notify::{ChangeEvent, ChangeListener, ChangeSource, SubscriptionId};
use crate::shared::SharedIndex;
use crate::snapshot::load_snapshot;
use crate::storage::StorageDir;
use crate::writer::{BatchReport, IndexWriter};
use mediasearch_core::{DocId, Error, IndexedDocument, Limits, Result};
use mediasearch_search::SearchHit;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Where the index lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    /// Nothing touches disk; the index is lost on shutdown
    Memory,
    /// Storage directory holding config, snapshot, change log and lock
    Disk(PathBuf),
}

/// Point-in-time engine counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Documents in the last commit
    pub documents: usize,
    /// Generation of the last commit
    pub generation: u64,
    /// True if a searcher is bound to the last commit
    pub searcher_bound: bool,
    /// Notifications waiting to be applied
    pub queue_depth: usize,
    /// Notifications applied by the background worker
    pub notifications_applied: u64,
}

enum Lifecycle {
    Created,
    Running(Arc<Runtime>),
    ShutDown,
}

struct Runtime {
    config: EngineConfig,
    index: Arc<SharedIndex>,
    queue: Arc<NotificationQueue>,
    storage: Mutex<Option<StorageDir>>,
    subscriptions: Mutex<Vec<(Arc<dyn ChangeSource>, SubscriptionId)>>,
}

/// Media-library search engine
pub struct SearchEngine {
    storage: Storage,
    config: Option<EngineConfig>,
    limits: Limits,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.lifecycle.lock() {
            Lifecycle::Created => "created",
            Lifecycle::Running(_) => "running",
            Lifecycle::ShutDown => "shut down",
        };
        f.debug_struct("SearchEngine")
            .field("storage", &self.storage)
            .field("state", &state)
            .finish()
    }
}

impl SearchEngine {
    /// Create an engine; nothing happens until `init`
    ///
    /// A disk-backed engine reads its config from `mediasearch.toml` in
    /// the storage directory, an in-memory one uses the defaults.
    pub fn new(storage: Storage) -> Self {
        SearchEngine {
            storage,
            config: None,
            limits: Limits::default(),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// Create an engine with an explicit config
    ///
    /// The config file of a disk-backed engine is still created if
    /// missing, but its contents are ignored.
    pub fn with_config(storage: Storage, config: EngineConfig) -> Self {
        SearchEngine {
            storage,
            config: Some(config),
            limits: Limits::default(),
            lifecycle: Mutex::new(Lifecycle::Created),
        }
    }

    /// In-memory engine with default config
    pub fn ephemeral() -> Self {
        Self::new(Storage::Memory)
    }

    /// Disk-backed engine rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::new(Storage::Disk(path.as_ref().to_path_buf()))
    }

    /// Replace the per-document size limits; takes effect at `init`
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Prepare storage, load the last snapshot and start the worker
    ///
    /// Calling `init` on a running engine does nothing.
    ///
    /// # Errors
    ///
    /// `StorageLocked` if another live engine owns the directory, `Config`
    /// for an invalid config, `Io` if storage cannot be prepared, and
    /// `ShutDown` after `shutdown`.
    pub fn init(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match &*lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::ShutDown => return Err(Error::ShutDown),
            Lifecycle::Created => {}
        }
        let runtime = self.start()?;
        let stats = runtime.index.stats();
        info!(
            target: "mediasearch::engine",
            storage = ?self.storage,
            documents = stats.documents,
            "Search engine initialized"
        );
        *lifecycle = Lifecycle::Running(Arc::new(runtime));
        Ok(())
    }

    fn start(&self) -> Result<Runtime> {
        let (config, mut writer, documents, storage) = match &self.storage {
            Storage::Memory => {
                let config = self.config.clone().unwrap_or_default();
                config.validate()?;
                (config, IndexWriter::new(self.limits.clone()), Vec::new(), None)
            }
            Storage::Disk(path) => {
                let storage = StorageDir::open(path)?;
                let config_path = storage.config_path();
                EngineConfig::write_default_if_missing(&config_path)?;
                let config = match &self.config {
                    Some(config) => {
                        config.validate()?;
                        config.clone()
                    }
                    None => EngineConfig::from_file(&config_path)?,
                };
                let documents = load_documents(&storage.snapshot_path(), &storage.log_path());
                let writer = IndexWriter::persistent(
                    self.limits.clone(),
                    storage.snapshot_path(),
                    storage.log_path(),
                    config.fsync,
                );
                (config, writer, documents, Some(storage))
            }
        };

        let committed = writer.restore(documents);
        let index = Arc::new(SharedIndex::new(writer, committed, config.search_options()));
        let queue = Arc::new(NotificationQueue::start(config.queue_depth)?);

        Ok(Runtime {
            config,
            index,
            queue,
            storage: Mutex::new(storage),
            subscriptions: Mutex::new(Vec::new()),
        })
    }

    /// Unsubscribe, apply queued notifications, persist, release storage
    ///
    /// Idempotent; shutting down an engine that was never initialized just
    /// marks it shut down.
    pub fn shutdown(&self) -> Result<()> {
        let runtime = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::ShutDown) {
                Lifecycle::Running(runtime) => runtime,
                Lifecycle::Created | Lifecycle::ShutDown => return Ok(()),
            }
        };

        let subscriptions: Vec<_> = runtime.subscriptions.lock().drain(..).collect();
        for (source, id) in subscriptions {
            source.unsubscribe(id);
            debug!(target: "mediasearch::engine", subscription = %id, "Unsubscribed");
        }

        runtime.queue.shutdown();

        if !runtime.index.close() {
            error!(
                target: "mediasearch::engine",
                "Index snapshot could not be written at shutdown; recent changes are lost"
            );
        }

        if let Some(mut storage) = runtime.storage.lock().take() {
            storage.release();
        }

        info!(target: "mediasearch::engine", storage = ?self.storage, "Search engine shut down");
        Ok(())
    }

    fn runtime(&self) -> Result<Arc<Runtime>> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running(runtime) => Ok(Arc::clone(runtime)),
            Lifecycle::Created => Err(Error::NotInitialized),
            Lifecycle::ShutDown => Err(Error::ShutDown),
        }
    }

    /// True between `init` and `shutdown`
    pub fn is_running(&self) -> bool {
        matches!(&*self.lifecycle.lock(), Lifecycle::Running(_))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Index or replace a batch of documents
    ///
    /// Invalid documents are skipped and listed in the report; the rest of
    /// the batch is committed.
    pub fn add_or_update(&self, docs: Vec<IndexedDocument>) -> Result<BatchReport> {
        self.runtime()?.index.add_or_update(docs)
    }

    /// Remove a batch of documents
    pub fn remove(&self, ids: Vec<DocId>) -> Result<BatchReport> {
        self.runtime()?.index.remove(ids)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Ranked ids matching `query`, best first
    ///
    /// # Errors
    ///
    /// `EmptyQuery` for an empty or whitespace-only query.
    pub fn search(&self, query: &str) -> Result<Vec<DocId>> {
        Ok(self
            .search_with_scores(query)?
            .into_iter()
            .map(|hit| hit.id)
            .collect())
    }

    /// Ranked hits with their scores
    pub fn search_with_scores(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.runtime()?.index.search(query)
    }

    /// Ranked host items; ids the lookup cannot resolve are dropped
    pub fn search_items<T, L>(&self, query: &str, lookup: &L) -> Result<Vec<T>>
    where
        L: ItemLookup<T> + ?Sized,
    {
        let ids = self.search(query)?;
        Ok(resolve(&ids, lookup))
    }

    /// Current counters
    pub fn stats(&self) -> Result<EngineStats> {
        let runtime = self.runtime()?;
        let index = runtime.index.stats();
        let queue = runtime.queue.stats();
        Ok(EngineStats {
            documents: index.documents,
            generation: index.generation,
            searcher_bound: index.searcher_bound,
            queue_depth: queue.queue_depth,
            notifications_applied: queue.jobs_completed,
        })
    }

    /// Active configuration
    pub fn config(&self) -> Result<EngineConfig> {
        Ok(self.runtime()?.config.clone())
    }

    // ========================================================================
    // Change notifications
    // ========================================================================

    /// Observe a change source until shutdown
    ///
    /// Each event becomes an add/update batch (added, then updated) followed
    /// by a removal batch, applied off the emitter's thread in arrival order.
    pub fn subscribe(&self, source: Arc<dyn ChangeSource>) -> Result<SubscriptionId> {
        let runtime = self.runtime()?;
        let listener = Arc::new(EngineListener {
            index: Arc::clone(&runtime.index),
            queue: Arc::clone(&runtime.queue),
        });
        let id = source.subscribe(listener);
        runtime.subscriptions.lock().push((source, id));
        debug!(target: "mediasearch::engine", subscription = %id, "Subscribed to change source");
        Ok(id)
    }

    /// Block until every queued notification has been applied
    pub fn flush(&self) -> Result<()> {
        self.runtime()?.queue.drain();
        Ok(())
    }
}

impl Drop for SearchEngine {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Recover the committed document set: snapshot, then the change log on top
///
/// An unreadable file is moved aside and recovery continues without it.
fn load_documents(snapshot_path: &Path, log_path: &Path) -> Vec<IndexedDocument> {
    let mut documents: BTreeMap<DocId, IndexedDocument> = match load_snapshot(snapshot_path) {
        Ok(Some(data)) => {
            info!(
                target: "mediasearch::storage",
                documents = data.documents.len(),
                "Loaded index snapshot"
            );
            data.documents
                .into_iter()
                .map(|doc| (doc.id.clone(), doc))
                .collect()
        }
        Ok(None) => BTreeMap::new(),
        Err(e) => {
            set_aside(snapshot_path, &e, "Index snapshot unreadable, starting with an empty index");
            BTreeMap::new()
        }
    };

    match read_log(log_path) {
        Ok(Some(replay)) => {
            if replay.torn_tail {
                warn!(
                    target: "mediasearch::storage",
                    path = %log_path.display(),
                    records = replay.records.len(),
                    "Change log ends in an incomplete record; replaying up to it"
                );
            }
            let records = replay.records.len();
            for record in replay.records {
                for doc in record.upserts {
                    documents.insert(doc.id.clone(), doc);
                }
                for id in &record.removed {
                    documents.remove(id);
                }
            }
            if records > 0 {
                info!(target: "mediasearch::storage", records, "Replayed change log");
            }
        }
        Ok(None) => {}
        Err(e) => set_aside(log_path, &e, "Change log unreadable, ignoring it"),
    }

    documents.into_values().collect()
}

/// Log an unreadable file as corruption and rename it to `*.corrupt`
fn set_aside(path: &Path, e: &std::io::Error, message: &str) {
    let err = Error::corruption(e.to_string());
    error!(
        target: "mediasearch::storage",
        path = %path.display(),
        error = %err,
        "{}",
        message
    );
    // Keep the bad file for inspection instead of overwriting it
    let mut aside = path.as_os_str().to_owned();
    aside.push(".corrupt");
    if let Err(e) = std::fs::rename(path, &aside) {
        warn!(target: "mediasearch::storage", error = %e, "Could not move unreadable file aside");
    }
}

// ============================================================================
// Notification listener
// ============================================================================

struct EngineListener {
    index: Arc<SharedIndex>,
    queue: Arc<NotificationQueue>,
}

impl ChangeListener for EngineListener {
    fn on_change(&self, event: ChangeEvent) {
        if event.is_empty() {
            return;
        }
        let index = Arc::clone(&self.index);
        if self.queue.submit(move || apply_event(&index, event)).is_err() {
            debug!(target: "mediasearch::engine", "Dropping change notification after shutdown");
        }
    }
}

fn apply_event(index: &SharedIndex, event: ChangeEvent) {
    let (upserts, removed) = event.into_batches();
    if !upserts.is_empty() {
        if let Err(e) = index.add_or_update(upserts) {
            debug!(target: "mediasearch::engine", error = %e, "Change notification not applied");
            return;
        }
    }
    if !removed.is_empty() {
        if let Err(e) = index.remove(removed) {
            debug!(target: "mediasearch::engine", error = %e, "Change notification not applied");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ChangeHub;

    fn running() -> SearchEngine {
        let engine = SearchEngine::ephemeral();
        engine.init().unwrap();
        engine
    }

    #[test]
    fn test_calls_before_init_fail() {
        let engine = SearchEngine::ephemeral();
        assert!(matches!(engine.search("heat"), Err(Error::NotInitialized)));
        assert!(matches!(
            engine.add_or_update(vec![IndexedDocument::named("1", "Heat")]),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(engine.stats(), Err(Error::NotInitialized)));
    }

    #[test]
    fn test_init_is_idempotent() {
        let engine = running();
        engine.add_or_update(vec![IndexedDocument::named("1", "Heat")]).unwrap();
        engine.init().unwrap();
        assert_eq!(engine.stats().unwrap().documents, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let engine = running();
        engine.shutdown().unwrap();
        engine.shutdown().unwrap();
        assert!(!engine.is_running());
        assert!(matches!(engine.search("heat"), Err(Error::ShutDown)));
        assert!(matches!(engine.init(), Err(Error::ShutDown)));
    }

    #[test]
    fn test_shutdown_without_init() {
        let engine = SearchEngine::ephemeral();
        engine.shutdown().unwrap();
        assert!(matches!(engine.stats(), Err(Error::ShutDown)));
    }

    #[test]
    fn test_add_search_remove() {
        let engine = running();
        engine
            .add_or_update(vec![IndexedDocument::new("1", "Batman Begins", "A hero rises")])
            .unwrap();
        assert_eq!(engine.search("batman").unwrap(), vec![DocId::from("1")]);

        engine.remove(vec!["1".into()]).unwrap();
        assert!(engine.search("batman").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_config_fails_init() {
        let config = EngineConfig {
            max_results: 0,
            ..EngineConfig::default()
        };
        let engine = SearchEngine::with_config(Storage::Memory, config);
        assert!(matches!(engine.init(), Err(Error::Config(_))));
        assert!(!engine.is_running());
    }

    #[test]
    fn test_configured_result_cap() {
        let config = EngineConfig {
            max_results: 2,
            ..EngineConfig::default()
        };
        let engine = SearchEngine::with_config(Storage::Memory, config);
        engine.init().unwrap();
        let docs = (0..5)
            .map(|i| IndexedDocument::named(i.to_string(), "Heat"))
            .collect();
        engine.add_or_update(docs).unwrap();
        assert_eq!(engine.search("heat").unwrap().len(), 2);
    }

    #[test]
    fn test_subscription_applies_events_in_order() {
        let engine = running();
        let hub = Arc::new(ChangeHub::new());
        engine.subscribe(hub.clone()).unwrap();

        hub.publish(ChangeEvent::added(vec![IndexedDocument::named("1", "Heat")]));
        hub.publish(ChangeEvent::updated(vec![IndexedDocument::named("1", "Ronin")]));
        hub.publish(ChangeEvent::removed(vec!["1".into()]));
        hub.publish(ChangeEvent::added(vec![IndexedDocument::named("2", "Collateral")]));
        engine.flush().unwrap();

        assert!(engine.search("heat").unwrap().is_empty());
        assert!(engine.search("ronin").unwrap().is_empty());
        assert_eq!(engine.search("collateral").unwrap(), vec![DocId::from("2")]);
    }

    #[test]
    fn test_shutdown_unsubscribes() {
        let engine = running();
        let hub = Arc::new(ChangeHub::new());
        engine.subscribe(hub.clone()).unwrap();
        assert_eq!(hub.listener_count(), 1);

        engine.shutdown().unwrap();
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_backlog_keeps_latest_update() {
        let config = EngineConfig {
            queue_depth: 1,
            ..EngineConfig::default()
        };
        let engine = SearchEngine::with_config(Storage::Memory, config);
        engine.init().unwrap();
        let hub = Arc::new(ChangeHub::new());
        engine.subscribe(hub.clone()).unwrap();

        // A large first batch keeps the worker busy while the rest queue up
        let filler = (0..5_000)
            .map(|i| IndexedDocument::new(format!("f{}", i), "Filler", "Padding text"))
            .collect();
        hub.publish(ChangeEvent::added(filler));
        hub.publish(ChangeEvent::added(vec![IndexedDocument::named("x", "Oldtitle")]));
        hub.publish(ChangeEvent::updated(vec![IndexedDocument::named("x", "Newtitle")]));
        engine.flush().unwrap();

        assert_eq!(engine.search("newtitle").unwrap(), vec![DocId::from("x")]);
        assert!(engine.search("oldtitle").unwrap().is_empty());
        assert_eq!(engine.stats().unwrap().documents, 5_001);
    }

    #[test]
    fn test_search_items_drops_unresolved() {
        let engine = running();
        engine
            .add_or_update(vec![
                IndexedDocument::named("1", "Heat"),
                IndexedDocument::named("2", "Heat"),
            ])
            .unwrap();

        let lookup = |id: &DocId| (id.as_str() == "2").then(|| "Heat (1995)".to_string());
        let items = engine.search_items("heat", &lookup).unwrap();
        assert_eq!(items, vec!["Heat (1995)".to_string()]);
    }

    #[test]
    fn test_stats_report_searcher_state() {
        let engine = running();
        engine.add_or_update(vec![IndexedDocument::named("1", "Heat")]).unwrap();
        assert!(!engine.stats().unwrap().searcher_bound);
        engine.search("heat").unwrap();
        assert!(engine.stats().unwrap().searcher_bound);
    }
}

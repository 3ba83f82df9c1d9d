//! Search engine for a media library
//!
//! This crate wires the index from `mediasearch-search` into a running
//! service:
//! - SearchEngine: facade with init/shutdown lifecycle
//! - SharedIndex: writer batches and cached searchers behind one RwLock
//! - IndexWriter: validated batches, one commit each, change log + snapshot
//! - NotificationQueue: ordered background application of catalog changes
//! - StorageDir: storage directory with stale-lock recovery
//! - EngineConfig: `mediasearch.toml`
//!
//! # Usage
//!
//! ```
//! use mediasearch_core::IndexedDocument;
//! use mediasearch_engine::SearchEngine;
//!
//! let engine = SearchEngine::ephemeral();
//! engine.init().unwrap();
//! engine
//!     .add_or_update(vec![IndexedDocument::new("1", "Batman Begins", "A hero rises")])
//!     .unwrap();
//! assert_eq!(engine.search("batman").unwrap()[0].as_str(), "1");
//! engine.shutdown().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod changelog;
pub mod config;
pub mod engine;
pub mod lookup;
pub mod notify;
pub mod shared;
pub mod snapshot;
pub mod storage;
pub mod writer;

pub use background::{NotificationQueue, QueueError, QueueStats};
pub use changelog::{ChangeLog, LogRecord};
pub use config::{EngineConfig, CONFIG_FILE_NAME};
pub use engine::{EngineStats, SearchEngine, Storage};
pub use lookup::ItemLookup;
pub use notify::{ChangeEvent, ChangeHub, ChangeListener, ChangeSource, SubscriptionId};
pub use shared::{IndexStats, SharedIndex};
pub use storage::{StorageDir, LOCK_FILE_NAME, LOG_FILE_NAME, SNAPSHOT_FILE_NAME};
pub use writer::{BatchReport, IndexWriter, SkippedDocument};

pub use mediasearch_search::{SearchHit, SearchOptions};

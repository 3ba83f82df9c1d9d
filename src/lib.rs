//! mediasearch - embedded fuzzy search for media libraries
//!
//! Indexes item records (a title and a free-text overview) and answers
//! approximate keyword queries ranked by relevance. Title matches weigh
//! twice overview matches; query words match index words by prefix or
//! within a small edit distance.
//!
//! # Quick Start
//!
//! ```
//! use mediasearch::{IndexedDocument, SearchEngine};
//!
//! let engine = SearchEngine::ephemeral();
//! engine.init()?;
//!
//! engine.add_or_update(vec![
//!     IndexedDocument::new("1", "Batman Begins", "A hero rises"),
//!     IndexedDocument::new("2", "Heat", "Cops and robbers"),
//! ])?;
//!
//! let ids = engine.search("batmen")?;
//! assert_eq!(ids[0].as_str(), "1");
//!
//! engine.shutdown()?;
//! # Ok::<(), mediasearch::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `mediasearch-core`: document model, limits, errors
//! - `mediasearch-search`: analyzer, inverted index, query evaluation
//! - `mediasearch-engine`: lifecycle, persistence, concurrency, notifications
//!
//! Only the engine facade and the types it speaks are re-exported here.

pub use mediasearch_core::{DocId, Error, Field, IndexedDocument, LimitError, Limits, Result};
pub use mediasearch_engine::{
    BatchReport, ChangeEvent, ChangeHub, ChangeListener, ChangeSource, EngineConfig, EngineStats,
    ItemLookup, SearchEngine, SearchHit, SkippedDocument, Storage, SubscriptionId,
};

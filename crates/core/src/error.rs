//! Error types for mediasearch
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only clearly invalid caller input (`EmptyQuery`) and lifecycle misuse
//! (`NotInitialized`, `ShutDown`) ever reach the caller of a search or a
//! write batch. Storage faults are logged and degraded inside the engine.

use crate::document::DocId;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mediasearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mediasearch
#[derive(Debug, Error)]
pub enum Error {
    /// Search was called with an empty or whitespace-only query string
    #[error("Empty query: a search needs at least one term")]
    EmptyQuery,

    /// Committed index or persisted snapshot is unreadable or inconsistent
    #[error("Index corruption: {0}")]
    IndexCorruption(String),

    /// A single document in a batch could not be indexed
    #[error("Document {id} rejected: {reason}")]
    DocumentRejected {
        /// Identifier of the rejected document
        id: DocId,
        /// Why it was rejected
        reason: String,
    },

    /// The storage directory is locked by a live owner
    #[error("Index storage at '{}' is already in use", .0.display())]
    StorageLocked(PathBuf),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Engine used before `init()`
    #[error("Search engine is not initialized")]
    NotInitialized,

    /// Engine used after `shutdown()`
    #[error("Search engine has been shut down")]
    ShutDown,
}

impl Error {
    /// Construct a corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::IndexCorruption(msg.into())
    }

    /// Construct a per-document rejection
    pub fn rejected(id: &DocId, reason: impl Into<String>) -> Self {
        Error::DocumentRejected {
            id: id.clone(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the caller rather than by storage
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::EmptyQuery | Error::NotInitialized | Error::ShutDown
        )
    }
}

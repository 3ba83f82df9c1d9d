//! Core types for mediasearch
//!
//! This crate defines the foundational types shared by the search core and
//! the engine:
//! - DocId: Opaque, stable identifier of an indexed media item
//! - Field: The two indexed fields (Name, Overview) and their boosts
//! - IndexedDocument: One media-library record as the index sees it
//! - Limits: Size limits enforced per document by the writer
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod limits;

pub use document::{DocId, Field, IndexedDocument};
pub use error::{Error, Result};
pub use limits::{LimitError, Limits};

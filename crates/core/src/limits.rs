//! Size limits for indexed documents
//!
//! The writer validates every document against these limits before it
//! touches the index. A violation rejects that one document; the rest of
//! the batch is still applied.

use crate::document::{Field, IndexedDocument};
use thiserror::Error;

/// Size limits for indexed documents
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum identifier length in bytes (default: 512)
    pub max_id_bytes: usize,

    /// Maximum length of a single field in bytes (default: 1MB)
    pub max_field_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_id_bytes: 512,
            max_field_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_id_bytes: 16,
            max_field_bytes: 64,
        }
    }

    /// Validate a document against all limits
    pub fn validate(&self, doc: &IndexedDocument) -> Result<(), LimitError> {
        let id = doc.id.as_str();
        if id.trim().is_empty() {
            return Err(LimitError::EmptyId);
        }
        if id.len() > self.max_id_bytes {
            return Err(LimitError::IdTooLong {
                actual: id.len(),
                max: self.max_id_bytes,
            });
        }
        for field in Field::ALL {
            let len = doc.field(field).len();
            if len > self.max_field_bytes {
                return Err(LimitError::FieldTooLarge {
                    field,
                    actual: len,
                    max: self.max_field_bytes,
                });
            }
        }
        Ok(())
    }
}

/// Limit validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LimitError {
    /// Identifier is empty or whitespace
    #[error("Document id is empty")]
    EmptyId,

    /// Identifier exceeds maximum length
    #[error("Id too long: {actual} bytes exceeds maximum {max}")]
    IdTooLong {
        /// Actual id length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// A field exceeds maximum length
    #[error("Field {field} too large: {actual} bytes exceeds maximum {max}")]
    FieldTooLarge {
        /// Offending field
        field: Field,
        /// Actual size
        actual: usize,
        /// Maximum allowed size
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        let limits = Limits::default();
        let doc = IndexedDocument::new("1", "Alien", "In space no one can hear you scream");
        assert!(limits.validate(&doc).is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let limits = Limits::default();
        let doc = IndexedDocument::named("  ", "Alien");
        assert_eq!(limits.validate(&doc), Err(LimitError::EmptyId));
    }

    #[test]
    fn test_id_at_max_length() {
        let limits = Limits::with_small_limits();
        let doc = IndexedDocument::named("x".repeat(limits.max_id_bytes), "Alien");
        assert!(limits.validate(&doc).is_ok());
    }

    #[test]
    fn test_id_exceeds_max_length() {
        let limits = Limits::with_small_limits();
        let doc = IndexedDocument::named("x".repeat(limits.max_id_bytes + 1), "Alien");
        assert!(matches!(
            limits.validate(&doc),
            Err(LimitError::IdTooLong { .. })
        ));
    }

    #[test]
    fn test_overview_too_large() {
        let limits = Limits::with_small_limits();
        let doc = IndexedDocument::new("1", "Alien", "y".repeat(65));
        match limits.validate(&doc) {
            Err(LimitError::FieldTooLarge { field, actual, max }) => {
                assert_eq!(field, Field::Overview);
                assert_eq!(actual, 65);
                assert_eq!(max, 64);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}

//! Document model
//!
//! A media-library record reaches the index as an [`IndexedDocument`]: a
//! stable identifier plus the raw text of the two indexed fields. Full
//! records stay with the catalog that owns them; hits are resolved back to
//! records through the identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// DocId
// ============================================================================

/// Opaque, stable identifier of an indexed item
///
/// Usually the text form of the catalog's UUID, but any string is accepted.
/// Ordering is lexicographic and is used as the deterministic tie-break
/// when two hits score the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Create an identifier from any string
    pub fn new(id: impl Into<String>) -> Self {
        DocId(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the identifier text
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        DocId(s.to_string())
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        DocId(s)
    }
}

impl From<Uuid> for DocId {
    fn from(u: Uuid) -> Self {
        DocId(u.to_string())
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Field
// ============================================================================

/// The indexed fields
///
/// Each field has its own term dictionary so that matching and boosting are
/// per field. Name matches weigh twice as much as Overview matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// Item title
    Name,
    /// Free-text description
    Overview,
}

impl Field {
    /// All indexed fields, in dictionary order
    pub const ALL: [Field; 2] = [Field::Name, Field::Overview];

    /// Field name as used by the catalog
    pub fn name(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Overview => "Overview",
        }
    }

    /// Score multiplier for matches in this field
    pub fn boost(self) -> f32 {
        match self {
            Field::Name => 2.0,
            Field::Overview => 1.0,
        }
    }

    /// Dense index of the field (0 for Name, 1 for Overview)
    pub fn slot(self) -> usize {
        match self {
            Field::Name => 0,
            Field::Overview => 1,
        }
    }

    /// Parse a catalog field name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Field> {
        if name.eq_ignore_ascii_case("name") {
            Some(Field::Name)
        } else if name.eq_ignore_ascii_case("overview") {
            Some(Field::Overview)
        } else {
            None
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// IndexedDocument
// ============================================================================

/// One media-library record as stored in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Stable identifier
    pub id: DocId,
    /// Title text
    pub name: String,
    /// Description text, empty when the record has none
    #[serde(default)]
    pub overview: String,
}

impl IndexedDocument {
    /// Create a document with a name and an overview
    pub fn new(id: impl Into<DocId>, name: impl Into<String>, overview: impl Into<String>) -> Self {
        IndexedDocument {
            id: id.into(),
            name: name.into(),
            overview: overview.into(),
        }
    }

    /// Create a document that has no overview
    pub fn named(id: impl Into<DocId>, name: impl Into<String>) -> Self {
        Self::new(id, name, String::new())
    }

    /// Build a document from a field-name → text mapping
    ///
    /// Unknown field names are ignored. Missing fields become empty strings.
    pub fn from_fields<I, K, V>(id: impl Into<DocId>, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut doc = Self::new(id, String::new(), String::new());
        for (key, value) in fields {
            match Field::from_name(key.as_ref()) {
                Some(Field::Name) => doc.name = value.into(),
                Some(Field::Overview) => doc.overview = value.into(),
                None => {}
            }
        }
        doc
    }

    /// Raw text of a field
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Overview => &self.overview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_doc_id_ordering_is_lexicographic() {
        let mut ids = vec![DocId::from("b"), DocId::from("a"), DocId::from("ab")];
        ids.sort();
        assert_eq!(ids, vec![DocId::from("a"), DocId::from("ab"), DocId::from("b")]);
    }

    #[test]
    fn test_doc_id_from_uuid() {
        let u = Uuid::new_v4();
        let id = DocId::from(u);
        assert_eq!(id.as_str(), u.to_string());
    }

    #[test]
    fn test_field_boosts() {
        assert_eq!(Field::Name.boost(), 2.0);
        assert_eq!(Field::Overview.boost(), 1.0);
        assert_eq!(Field::Name.boost() / Field::Overview.boost(), 2.0);
    }

    #[test]
    fn test_field_from_name() {
        assert_eq!(Field::from_name("Name"), Some(Field::Name));
        assert_eq!(Field::from_name("overview"), Some(Field::Overview));
        assert_eq!(Field::from_name("Genre"), None);
    }

    #[test]
    fn test_from_fields_ignores_unknown() {
        let mut fields = HashMap::new();
        fields.insert("Name", "Alien");
        fields.insert("Genre", "Horror");
        let doc = IndexedDocument::from_fields("1", fields);
        assert_eq!(doc.name, "Alien");
        assert_eq!(doc.overview, "");
    }

    #[test]
    fn test_overview_defaults_to_empty_when_deserialized() {
        let doc: IndexedDocument = serde_json::from_str(r#"{"id":"7","name":"Heat"}"#).unwrap();
        assert_eq!(doc.id, DocId::from("7"));
        assert_eq!(doc.field(Field::Overview), "");
    }
}

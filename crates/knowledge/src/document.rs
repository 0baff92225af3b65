//! Uniform document representation shared by every source type.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata key holding the document type.
pub const TYPE_KEY: &str = "type";

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Bool(b) => write!(f, "{}", b),
            MetaValue::Int(i) => write!(f, "{}", i),
            MetaValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        MetaValue::Int(value)
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Bool(value)
    }
}

/// Document and chunk metadata. Ordered so serialisation is byte-stable.
pub type Metadata = BTreeMap<String, MetaValue>;

/// The four document types the knowledge base holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    RitualGuide,
    DestinationInfo,
    Hotel,
    UserReview,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::RitualGuide => "ritual_guide",
            DocType::DestinationInfo => "destination_info",
            DocType::Hotel => "hotel",
            DocType::UserReview => "user_review",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised source record: text body plus typed metadata.
///
/// Fields are private; a document cannot change after normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    body: String,
    metadata: Metadata,
}

impl Document {
    pub fn new(body: String, metadata: Metadata) -> Self {
        Self { body, metadata }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// The `type` metadata value, if present.
    pub fn doc_type(&self) -> Option<&str> {
        self.metadata.get(TYPE_KEY).and_then(MetaValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_value_json_is_plain_scalar() {
        let mut metadata = Metadata::new();
        metadata.insert("type".to_string(), DocType::Hotel.as_str().into());
        metadata.insert("stars".to_string(), 5i64.into());
        metadata.insert("has_kaaba_view".to_string(), true.into());

        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(json, r#"{"has_kaaba_view":true,"stars":5,"type":"hotel"}"#);

        let back: Metadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_doc_type_accessor() {
        let mut metadata = Metadata::new();
        metadata.insert(TYPE_KEY.to_string(), "user_review".into());
        let doc = Document::new("body".to_string(), metadata);
        assert_eq!(doc.doc_type(), Some("user_review"));
    }
}

//! Passages and retrieval candidates.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload key under which the passage text is stored.
pub const DOCUMENT_KEY: &str = "document";

/// Metadata attached to a passage: field name to JSON scalar, in the order the
/// fields were requested at ingestion.
pub type Metadata = IndexMap<String, Value>;

/// One retrievable unit of text, produced from a single source row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Passage {
    /// The text that is embedded and returned as context.
    pub document: String,
    /// Caller-chosen fields carried alongside the text.
    pub metadata: Metadata,
}

impl Passage {
    pub fn new(document: impl Into<String>, metadata: Metadata) -> Self {
        Self { document: document.into(), metadata }
    }

    /// Split a flat store payload into text and metadata.
    ///
    /// The `document` key becomes the text (non-string values are rendered as
    /// JSON); every other key is metadata.
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let mut document = String::new();
        let mut metadata = Metadata::new();
        for (key, value) in payload {
            if key == DOCUMENT_KEY {
                document = match value {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
            } else {
                metadata.insert(key, value);
            }
        }
        Self { document, metadata }
    }

    /// Flatten into a store payload. A metadata field named `document` is
    /// shadowed by the text.
    pub fn to_payload(&self) -> Map<String, Value> {
        let mut payload: Map<String, Value> =
            self.metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        payload.insert(DOCUMENT_KEY.to_string(), Value::String(self.document.clone()));
        payload
    }

    /// The string form both rerankers score and the answer prompt carries.
    pub fn render(&self) -> String {
        let metadata = self
            .metadata
            .iter()
            .map(|(k, v)| format!("'{k}': '{}'", scalar_text(v)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("document: {}\nthe document metadata is:\n{metadata}", self.document)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// A [`Passage`] with the first-stage relevance score the store assigned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalCandidate {
    pub passage: Passage,
    /// Opaque and only comparable within one result list.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_splits_document_from_metadata() {
        let payload = json!({"document": "Paris is the capital.", "title": "France", "year": 2020});
        let Value::Object(map) = payload else { unreachable!() };
        let passage = Passage::from_payload(map);
        assert_eq!(passage.document, "Paris is the capital.");
        assert_eq!(passage.metadata.len(), 2);
        assert_eq!(passage.metadata["year"], json!(2020));

        let back = passage.to_payload();
        assert_eq!(back["document"], json!("Paris is the capital."));
        assert_eq!(back["title"], json!("France"));
    }

    #[test]
    fn render_keeps_metadata_insertion_order() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), json!("France"));
        metadata.insert("rank".into(), json!(1));
        metadata.insert("note".into(), Value::Null);
        let rendered = Passage::new("Paris", metadata).render();
        assert_eq!(
            rendered,
            "document: Paris\nthe document metadata is:\n'title': 'France', 'rank': '1', 'note': 'None'"
        );
    }

    #[test]
    fn render_without_metadata_keeps_header() {
        let rendered = Passage::new("text", Metadata::new()).render();
        assert_eq!(rendered, "document: text\nthe document metadata is:\n");
    }
}

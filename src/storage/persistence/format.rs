//! On-disk document format.
//!
//! Each document is one self-contained JSON tree:
//!
//! ```json
//! {
//!   "id": "5f0c…",
//!   "metadata": [{ "name": "title", "dataType": "string", "values": ["Notes"] }],
//!   "relations": [{ "relationType": "parentOf", "target": "9a1e…" }],
//!   "data": { "mimeType": "text/html", "indexable": true, "parseable": false, "markup": "<p>…</p>" },
//!   "extensions": [{ "name": "geo", "indexable": true, "content": { "lat": "52.1" } }]
//! }
//! ```
//!
//! The four sections always appear in this order. Tagged bodies (xml, html)
//! are kept verbatim under `markup`; every other body is stored as escaped
//! JSON string under `text`. This is the contract between the store and any
//! backup or export tool.

use crate::models::{Body, DocId, Document, Extension, Metadatum, Relation};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Serializable document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Document ID.
    pub id: String,
    /// Metadata section.
    #[serde(default)]
    pub metadata: Vec<StoredMetadatum>,
    /// Relations section.
    #[serde(default)]
    pub relations: Vec<StoredRelation>,
    /// Body section.
    #[serde(default)]
    pub data: StoredData,
    /// Extensions section.
    #[serde(default)]
    pub extensions: Vec<StoredExtension>,
}

/// One metadata entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMetadatum {
    /// Metadata name.
    pub name: String,
    /// Advisory data type.
    #[serde(default = "default_data_type")]
    pub data_type: String,
    /// Ordered values.
    #[serde(default)]
    pub values: Vec<String>,
}

/// One relation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRelation {
    /// Relation type, omitted for untyped relations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    /// Target document ID.
    pub target: String,
}

/// Body section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredData {
    /// Body mime type.
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Full-text index flag.
    #[serde(default = "default_true")]
    pub indexable: bool,
    /// Nested-document hint.
    #[serde(default)]
    pub parseable: bool,
    /// Plaintext, escaped as a JSON string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Tagged text, embedded verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

/// One extension entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExtension {
    /// Extension name.
    pub name: String,
    /// Full-text index flag.
    #[serde(default = "default_true")]
    pub indexable: bool,
    /// Nested tree.
    #[serde(default)]
    pub content: serde_json::Value,
}

fn default_data_type() -> String {
    crate::models::DEFAULT_DATA_TYPE.to_string()
}

fn default_mime_type() -> String {
    crate::models::DEFAULT_MIME_TYPE.to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for StoredData {
    fn default() -> Self {
        Self::from(&Body::default())
    }
}

impl From<&Body> for StoredData {
    fn from(body: &Body) -> Self {
        let (text, markup) = if body.is_tagged() {
            (None, Some(body.text.clone()))
        } else {
            (Some(body.text.clone()), None)
        };
        Self {
            mime_type: body.mime_type.clone(),
            indexable: body.indexable,
            parseable: body.parseable,
            text,
            markup,
        }
    }
}

impl From<StoredData> for Body {
    fn from(data: StoredData) -> Self {
        Self {
            mime_type: data.mime_type,
            text: data.markup.or(data.text).unwrap_or_default(),
            indexable: data.indexable,
            parseable: data.parseable,
        }
    }
}

impl From<&Document> for StoredDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id().as_str().to_string(),
            metadata: doc
                .metadata()
                .iter()
                .map(|m| StoredMetadatum {
                    name: m.name.clone(),
                    data_type: m.data_type.clone(),
                    values: m.values.clone(),
                })
                .collect(),
            relations: doc
                .relations()
                .iter()
                .map(|r| StoredRelation {
                    relation_type: r.relation_type.clone(),
                    target: r.target.as_str().to_string(),
                })
                .collect(),
            data: StoredData::from(doc.body()),
            extensions: doc
                .extensions()
                .iter()
                .map(|e| StoredExtension {
                    name: e.name.clone(),
                    indexable: e.indexable,
                    content: e.content.clone(),
                })
                .collect(),
        }
    }
}

impl StoredDocument {
    /// Converts the stored tree back into a document.
    #[must_use]
    pub fn into_document(self) -> Document {
        let mut doc = Document::with_id(self.id).with_body(Body::from(self.data));
        for m in self.metadata {
            doc.add_metadatum(Metadatum {
                name: m.name,
                values: m.values,
                data_type: m.data_type,
            });
        }
        for r in self.relations {
            doc.push_relation(Relation {
                relation_type: r.relation_type,
                target: DocId::new(r.target),
            });
        }
        for e in self.extensions {
            doc.set_extension(Extension {
                name: e.name,
                content: e.content,
                indexable: e.indexable,
            });
        }
        doc
    }
}

/// Serializes a document to its on-disk bytes.
///
/// # Errors
///
/// Returns [`Error::AccessFailure`] if serialization fails.
pub fn encode(doc: &Document) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(&StoredDocument::from(doc))
        .map_err(|e| Error::access("serialize_document", e))
}

/// Parses on-disk bytes stored under `expected_id`.
///
/// # Errors
///
/// Returns [`Error::ParseFailure`] if the bytes are not a valid document or
/// carry a different ID than the artifact they were read from.
pub fn decode(expected_id: &DocId, bytes: &[u8]) -> Result<Document> {
    let stored: StoredDocument = serde_json::from_slice(bytes).map_err(|e| Error::ParseFailure {
        id: expected_id.clone(),
        cause: e.to_string(),
    })?;

    if stored.id != expected_id.as_str() {
        return Err(Error::ParseFailure {
            id: expected_id.clone(),
            cause: format!("stored document carries id '{}'", stored.id),
        });
    }

    Ok(stored.into_document())
}

/// Parses a standalone document tree whose ID is taken from the tree itself.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not a valid document tree.
pub fn parse_document(json: &str) -> Result<Document> {
    let stored: StoredDocument = serde_json::from_str(json)
        .map_err(|e| Error::InvalidInput(format!("not a document tree: {e}")))?;
    Ok(stored.into_document())
}

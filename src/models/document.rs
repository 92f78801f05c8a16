//! Document types and identifiers.

use super::Body;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default advisory data type of a [`Metadatum`].
pub const DEFAULT_DATA_TYPE: &str = "string";

/// Unique identifier for a document within a repository.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocId(String);

impl DocId {
    /// Creates a document ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID (UUID v4, hyphenated).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks that the ID can name a stored artifact on its own.
    ///
    /// Only alphanumeric characters, dashes, and underscores are allowed, so
    /// the ID never escapes the repository directory.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 255
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A named, ordered list of values attached to a document.
///
/// A metadatum with no values is legal and survives storage unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadatum {
    /// Metadata name. Not unique within a document.
    pub name: String,
    /// Ordered values.
    pub values: Vec<String>,
    /// Advisory data type, `"string"` unless set.
    pub data_type: String,
}

impl Metadatum {
    /// Creates an empty metadatum with the default data type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            data_type: DEFAULT_DATA_TYPE.to_string(),
        }
    }

    /// Creates a metadatum holding a single value.
    #[must_use]
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name).value(value)
    }

    /// Creates a metadatum holding the given values in order.
    #[must_use]
    pub fn with_values<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut metadatum = Self::new(name);
        metadatum.values = values.into_iter().map(Into::into).collect();
        metadatum
    }

    /// Appends a value.
    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }

    /// Sets the advisory data type.
    #[must_use]
    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }
}

/// A directed edge from the owning document to another document.
///
/// The target is not checked for existence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    /// Semantic class of the edge, e.g. `parentOf`.
    pub relation_type: Option<String>,
    /// The document this edge points at.
    pub target: DocId,
}

impl Relation {
    /// Creates a typed relation.
    #[must_use]
    pub fn new(relation_type: impl Into<String>, target: impl Into<DocId>) -> Self {
        Self {
            relation_type: Some(relation_type.into()),
            target: target.into(),
        }
    }

    /// Creates a relation without a type.
    #[must_use]
    pub fn untyped(target: impl Into<DocId>) -> Self {
        Self {
            relation_type: None,
            target: target.into(),
        }
    }

    /// Returns true if this relation has the given type.
    ///
    /// `None` matches any relation.
    #[must_use]
    pub fn is_of_type(&self, relation_type: Option<&str>) -> bool {
        relation_type.is_none_or(|t| self.relation_type.as_deref() == Some(t))
    }
}

/// A named, independently serialized sub-document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    /// Extension name, unique within a document.
    pub name: String,
    /// Nested tree content.
    pub content: serde_json::Value,
    /// Whether the string leaves of `content` are full-text indexed.
    pub indexable: bool,
}

impl Extension {
    /// Creates an indexable extension.
    #[must_use]
    pub fn new(name: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            content,
            indexable: true,
        }
    }

    /// Sets whether the extension is indexed.
    #[must_use]
    pub const fn indexable(mut self, indexable: bool) -> Self {
        self.indexable = indexable;
        self
    }

    /// Collects every string leaf of the content tree, depth first.
    #[must_use]
    pub fn text_leaves(&self) -> Vec<&str> {
        fn walk<'a>(value: &'a serde_json::Value, out: &mut Vec<&'a str>) {
            match value {
                serde_json::Value::String(s) => out.push(s),
                serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
                serde_json::Value::Object(map) => map.values().for_each(|v| walk(v, out)),
                _ => {},
            }
        }

        let mut out = Vec::new();
        walk(&self.content, &mut out);
        out
    }
}

/// A semi-structured document.
///
/// The lists are only reachable through shared slices; every change goes
/// through a method on the document, so a fetched copy can be edited and
/// stored again without aliasing the stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: DocId,
    metadata: Vec<Metadatum>,
    relations: Vec<Relation>,
    body: Body,
    extensions: Vec<Extension>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document with a generated ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(DocId::generate())
    }

    /// Creates an empty document with the given ID.
    #[must_use]
    pub fn with_id(id: impl Into<DocId>) -> Self {
        Self {
            id: id.into(),
            metadata: Vec::new(),
            relations: Vec::new(),
            body: Body::default(),
            extensions: Vec::new(),
        }
    }

    /// Returns the document ID.
    #[must_use]
    pub const fn id(&self) -> &DocId {
        &self.id
    }

    /// Returns the metadata in insertion order.
    #[must_use]
    pub fn metadata(&self) -> &[Metadatum] {
        &self.metadata
    }

    /// Returns the relations in insertion order.
    #[must_use]
    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Returns the extensions in insertion order.
    #[must_use]
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Appends a metadatum. Existing entries with the same name are kept.
    pub fn add_metadatum(&mut self, metadatum: Metadatum) {
        self.metadata.push(metadatum);
    }

    /// Builder form of [`Self::add_metadatum`].
    #[must_use]
    pub fn with_metadatum(mut self, metadatum: Metadatum) -> Self {
        self.add_metadatum(metadatum);
        self
    }

    /// Replaces every entry named `metadatum.name` with `metadatum`.
    ///
    /// The new entry takes the position of the first replaced entry, or is
    /// appended if the name was absent.
    pub fn set_metadatum(&mut self, metadatum: Metadatum) {
        match self.metadata.iter().position(|m| m.name == metadatum.name) {
            Some(pos) => {
                let name = metadatum.name.clone();
                self.metadata[pos] = metadatum;
                let mut index = 0;
                self.metadata.retain(|m| {
                    let keep = index == pos || m.name != name;
                    index += 1;
                    keep
                });
            },
            None => self.metadata.push(metadatum),
        }
    }

    /// Removes every entry with the given name, returning how many were removed.
    pub fn remove_metadata(&mut self, name: &str) -> usize {
        let before = self.metadata.len();
        self.metadata.retain(|m| m.name != name);
        before - self.metadata.len()
    }

    /// Returns all values stored under `name`, across duplicate entries, in order.
    #[must_use]
    pub fn metadata_values(&self, name: &str) -> Vec<&str> {
        self.metadata
            .iter()
            .filter(|m| m.name == name)
            .flat_map(|m| m.values.iter().map(String::as_str))
            .collect()
    }

    /// Returns the first value stored under `name`.
    #[must_use]
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.metadata
            .iter()
            .filter(|m| m.name == name)
            .find_map(|m| m.values.first().map(String::as_str))
    }

    /// Returns true if any entry named `name` holds exactly `value`.
    #[must_use]
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.metadata
            .iter()
            .any(|m| m.name == name && m.values.iter().any(|v| v == value))
    }

    /// Adds a typed relation to `target`.
    pub fn add_relation(&mut self, relation_type: impl Into<String>, target: impl Into<DocId>) {
        self.relations.push(Relation::new(relation_type, target));
    }

    /// Adds a prebuilt relation.
    pub fn push_relation(&mut self, relation: Relation) {
        self.relations.push(relation);
    }

    /// Builder form of [`Self::push_relation`].
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.push_relation(relation);
        self
    }

    /// Removes relations of `relation_type` pointing at `target`.
    ///
    /// `None` removes relations of any type. Returns true if any were removed.
    pub fn remove_relation(&mut self, relation_type: Option<&str>, target: &DocId) -> bool {
        let before = self.relations.len();
        self.relations
            .retain(|r| !(r.target == *target && r.is_of_type(relation_type)));
        before != self.relations.len()
    }

    /// Returns the targets of all relations of the given type.
    #[must_use]
    pub fn relations_of_type(&self, relation_type: &str) -> Vec<&DocId> {
        self.relations
            .iter()
            .filter(|r| r.is_of_type(Some(relation_type)))
            .map(|r| &r.target)
            .collect()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Builder form of [`Self::set_body`].
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.set_body(body);
        self
    }

    /// Returns the extension with the given name.
    #[must_use]
    pub fn extension(&self, name: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.name == name)
    }

    /// Adds an extension, replacing any existing one with the same name in place.
    pub fn set_extension(&mut self, extension: Extension) {
        match self.extensions.iter_mut().find(|e| e.name == extension.name) {
            Some(existing) => *existing = extension,
            None => self.extensions.push(extension),
        }
    }

    /// Builder form of [`Self::set_extension`].
    #[must_use]
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.set_extension(extension);
        self
    }

    /// Removes the extension with the given name.
    pub fn remove_extension(&mut self, name: &str) -> Option<Extension> {
        let pos = self.extensions.iter().position(|e| e.name == name)?;
        Some(self.extensions.remove(pos))
    }

    /// Returns the distinct metadata names in first-seen order.
    #[must_use]
    pub fn metadata_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for m in &self.metadata {
            if !names.contains(&m.name.as_str()) {
                names.push(&m.name);
            }
        }
        names
    }
}

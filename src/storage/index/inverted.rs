//! Inverted index data structure.
//!
//! Holds one [`IndexEntry`] per document and a term → document postings map
//! for the full-text part. Persisted as a JSON file; postings are rebuilt
//! from the entries on load and are never written out.

use super::analysis;
use crate::models::{DocId, Document, SearchCriteria};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// File name of the persisted index inside a repository's index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Current persisted format version.
const FORMAT_VERSION: u32 = 1;

/// An indexed relation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRelation {
    /// Relation type, absent for untyped relations.
    #[serde(
        rename = "relationType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub relation_type: Option<String>,
    /// Target document ID.
    pub target: DocId,
}

/// Everything the index knows about one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Stored metadata fields: name → values, duplicates merged in order.
    #[serde(default)]
    pub fields: BTreeMap<String, Vec<String>>,
    /// Relation fields in declaration order.
    #[serde(default)]
    pub relations: Vec<IndexedRelation>,
    /// Indexed but unstored terms from the body and indexable extensions.
    #[serde(default)]
    pub terms: BTreeSet<String>,
}

impl IndexEntry {
    /// Derives the entry for a document.
    #[must_use]
    pub fn from_document(document: &Document) -> Self {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for metadatum in document.metadata() {
            if metadatum.values.is_empty() {
                continue;
            }
            fields
                .entry(metadatum.name.clone())
                .or_default()
                .extend(metadatum.values.iter().cloned());
        }

        let relations = document
            .relations()
            .iter()
            .map(|r| IndexedRelation {
                relation_type: r.relation_type.clone(),
                target: r.target.clone(),
            })
            .collect();

        let mut terms = document
            .body()
            .indexable_text()
            .map(|text| analysis::terms(&text))
            .unwrap_or_default();
        for extension in document.extensions().iter().filter(|e| e.indexable) {
            for leaf in extension.text_leaves() {
                terms.extend(analysis::terms(leaf));
            }
        }

        Self {
            fields,
            relations,
            terms,
        }
    }

    /// Returns true if every criterion is satisfied by some stored value.
    ///
    /// Stops at the first criterion that fails.
    #[must_use]
    pub fn matches(&self, criteria: &SearchCriteria) -> bool {
        criteria.iter().all(|(name, value)| {
            self.fields
                .get(name)
                .is_some_and(|values| values.iter().any(|v| v == value))
        })
    }

    /// Returns true if some relation points at `target` with the given type.
    #[must_use]
    pub fn relates_to(&self, target: &DocId, relation_type: Option<&str>) -> bool {
        self.relations.iter().any(|r| {
            r.target == *target
                && relation_type.is_none_or(|t| r.relation_type.as_deref() == Some(t))
        })
    }
}

/// Per-repository inverted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvertedIndex {
    version: u32,
    entries: BTreeMap<DocId, IndexEntry>,
    #[serde(skip)]
    postings: BTreeMap<String, BTreeSet<DocId>>,
}

impl Default for InvertedIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl InvertedIndex {
    /// Creates an empty index.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
            postings: BTreeMap::new(),
        }
    }

    /// Loads an index file. A missing file yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccessFailure`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(Error::access("load_index", e)),
        };

        let mut index: Self =
            serde_json::from_str(&content).map_err(|e| Error::access("parse_index", e))?;
        if index.version != FORMAT_VERSION {
            return Err(Error::access(
                "parse_index",
                format!(
                    "unsupported index version {} (expected {FORMAT_VERSION})",
                    index.version
                ),
            ));
        }
        index.rebuild_postings();
        Ok(index)
    }

    /// Writes the index to `path`, replacing any previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccessFailure`] if the file cannot be written. The
    /// previous file is left intact in that case.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string(self).map_err(|e| Error::access("serialize_index", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::access("create_index_dir", e))?;
        }

        let temp = path.with_extension("json.tmp");
        fs::write(&temp, content).map_err(|e| Error::access("write_index", e))?;
        fs::rename(&temp, path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::access("rename_index", e)
        })
    }

    fn rebuild_postings(&mut self) {
        self.postings.clear();
        for (id, entry) in &self.entries {
            for term in &entry.terms {
                self.postings
                    .entry(term.clone())
                    .or_default()
                    .insert(id.clone());
            }
        }
    }

    fn unlink_postings(&mut self, id: &DocId, entry: &IndexEntry) {
        for term in &entry.terms {
            if let Some(ids) = self.postings.get_mut(term) {
                ids.remove(id);
                if ids.is_empty() {
                    self.postings.remove(term);
                }
            }
        }
    }

    /// Inserts or replaces the entry for `id`.
    pub fn upsert(&mut self, id: DocId, entry: IndexEntry) {
        if let Some(previous) = self.entries.remove(&id) {
            self.unlink_postings(&id, &previous);
        }
        for term in &entry.terms {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(id.clone());
        }
        self.entries.insert(id, entry);
    }

    /// Indexes a document, replacing its previous entry.
    pub fn index_document(&mut self, document: &Document) {
        self.upsert(document.id().clone(), IndexEntry::from_document(document));
    }

    /// Removes the entry for `id`. Returns true if one existed.
    pub fn remove(&mut self, id: &DocId) -> bool {
        match self.entries.remove(id) {
            Some(entry) => {
                self.unlink_postings(id, &entry);
                true
            },
            None => false,
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.postings.clear();
    }

    /// Returns the number of indexed documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `id`.
    #[must_use]
    pub fn entry(&self, id: &DocId) -> Option<&IndexEntry> {
        self.entries.get(id)
    }

    /// Returns true if `id` is indexed.
    #[must_use]
    pub fn contains(&self, id: &DocId) -> bool {
        self.entries.contains_key(id)
    }

    /// Full scan returning every document that satisfies all criteria.
    #[must_use]
    pub fn narrowing_search(&self, criteria: &SearchCriteria) -> Vec<DocId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.matches(criteria))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns documents containing every term of `query`.
    #[must_use]
    pub fn text_search(&self, query: &str) -> Vec<DocId> {
        let terms = analysis::terms(query);
        let mut postings = Vec::with_capacity(terms.len());
        for term in &terms {
            match self.postings.get(term) {
                Some(ids) => postings.push(ids),
                None => return Vec::new(),
            }
        }
        postings.sort_by_key(|ids| ids.len());

        let Some((smallest, rest)) = postings.split_first() else {
            return Vec::new();
        };
        smallest
            .iter()
            .filter(|id| rest.iter().all(|ids| ids.contains(*id)))
            .cloned()
            .collect()
    }

    /// Full scan of relation fields for documents pointing at `target`.
    #[must_use]
    pub fn reverse_related(&self, target: &DocId, relation_type: Option<&str>) -> Vec<DocId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.relates_to(target, relation_type))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Returns every document's stored values for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameNotStored`] if no document has the field.
    pub fn metadata_by_name(&self, name: &str) -> Result<BTreeMap<DocId, Vec<String>>> {
        let values: BTreeMap<DocId, Vec<String>> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| entry.fields.get(name).map(|v| (id.clone(), v.clone())))
            .collect();

        if values.is_empty() {
            return Err(Error::NameNotStored(name.to_string()));
        }
        Ok(values)
    }

    /// Returns one document's stored values for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`] if the document is not indexed and
    /// [`Error::NameNotStored`] if it has no such field.
    pub fn metadatum_for_doc(&self, name: &str, id: &DocId) -> Result<Vec<String>> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| Error::DocumentNotFound(id.clone()))?;
        entry
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NameNotStored(name.to_string()))
    }

    /// Returns every stored metadata name, sorted.
    #[must_use]
    pub fn metadata_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .entries
            .values()
            .flat_map(|entry| entry.fields.keys())
            .collect();
        names.into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Body, Extension, Metadatum, Relation};
    use tempfile::TempDir;

    fn sample_index() -> InvertedIndex {
        let mut index = InvertedIndex::new();
        index.index_document(
            &Document::with_id("A")
                .with_metadatum(Metadatum::with_value("type", "note"))
                .with_metadatum(Metadatum::with_value("title", "x"))
                .with_body(Body::plain("Rust ownership rules")),
        );
        index.index_document(
            &Document::with_id("B")
                .with_metadatum(Metadatum::with_value("type", "note"))
                .with_metadatum(Metadatum::with_value("title", "y"))
                .with_relation(Relation::new("parentOf", "C"))
                .with_body(Body::html("<p>Borrowing <b>rules</b></p>")),
        );
        index.index_document(
            &Document::with_id("C")
                .with_metadatum(Metadatum::with_value("type", "course"))
                .with_relation(Relation::untyped("A")),
        );
        index
    }

    fn ids(values: &[&str]) -> Vec<DocId> {
        values.iter().map(|v| DocId::new(*v)).collect()
    }

    #[test]
    fn test_narrowing_search_and_semantics() {
        let index = sample_index();

        let note = SearchCriteria::new().with("type", "note");
        assert_eq!(index.narrowing_search(&note), ids(&["A", "B"]));

        let note_x = note.with("title", "x");
        assert_eq!(index.narrowing_search(&note_x), ids(&["A"]));

        assert_eq!(
            index.narrowing_search(&SearchCriteria::new()),
            ids(&["A", "B", "C"])
        );
    }

    #[test]
    fn test_narrowing_search_is_case_sensitive() {
        let index = sample_index();
        let criteria = SearchCriteria::new().with("type", "Note");
        assert!(index.narrowing_search(&criteria).is_empty());
    }

    #[test]
    fn test_narrowing_search_missing_field_fails() {
        let index = sample_index();
        let criteria = SearchCriteria::new().with("author", "anyone");
        assert!(index.narrowing_search(&criteria).is_empty());
    }

    #[test]
    fn test_duplicate_metadata_names_merge() {
        let mut index = InvertedIndex::new();
        index.index_document(
            &Document::with_id("D")
                .with_metadatum(Metadatum::with_value("tag", "a"))
                .with_metadatum(Metadatum::with_values("tag", ["b", "c"])),
        );

        assert_eq!(
            index.metadatum_for_doc("tag", &DocId::new("D")).unwrap(),
            vec!["a", "b", "c"]
        );
        let criteria = SearchCriteria::new().with("tag", "c");
        assert_eq!(index.narrowing_search(&criteria), ids(&["D"]));
    }

    #[test]
    fn test_reverse_related() {
        let index = sample_index();
        let c = DocId::new("C");

        assert_eq!(index.reverse_related(&c, Some("parentOf")), ids(&["B"]));
        assert!(index.reverse_related(&c, Some("childOf")).is_empty());
        assert_eq!(index.reverse_related(&DocId::new("A"), None), ids(&["C"]));
        assert!(
            index
                .reverse_related(&DocId::new("A"), Some("parentOf"))
                .is_empty()
        );
    }

    #[test]
    fn test_text_search() {
        let index = sample_index();

        assert_eq!(index.text_search("RULES"), ids(&["A", "B"]));
        assert_eq!(index.text_search("borrowing rules"), ids(&["B"]));
        assert!(index.text_search("rules missing").is_empty());
        assert!(index.text_search("").is_empty());
        // markup is stripped before tokenizing
        assert!(index.text_search("p").is_empty());
    }

    #[test]
    fn test_text_search_extensions_and_unindexable_body() {
        let mut index = InvertedIndex::new();
        index.index_document(
            &Document::with_id("E")
                .with_body(Body::plain("hidden words").indexable(false))
                .with_extension(Extension::new(
                    "geo",
                    serde_json::json!({"place": "Lisbon", "tags": ["harbour"]}),
                ))
                .with_extension(
                    Extension::new("private", serde_json::json!({"note": "secret"}))
                        .indexable(false),
                ),
        );

        assert_eq!(index.text_search("lisbon harbour"), ids(&["E"]));
        assert!(index.text_search("hidden").is_empty());
        assert!(index.text_search("secret").is_empty());
    }

    #[test]
    fn test_upsert_replaces_entry() {
        let mut index = sample_index();
        index.index_document(
            &Document::with_id("A")
                .with_metadatum(Metadatum::with_value("type", "draft"))
                .with_body(Body::plain("fresh")),
        );
        let snapshot = index.clone();
        index.index_document(
            &Document::with_id("A")
                .with_metadatum(Metadatum::with_value("type", "draft"))
                .with_body(Body::plain("fresh")),
        );

        assert_eq!(index.entry(&DocId::new("A")), snapshot.entry(&DocId::new("A")));
        assert_eq!(index.len(), 3);
        assert_eq!(
            index.narrowing_search(&SearchCriteria::new().with("type", "note")),
            ids(&["B"])
        );
        assert_eq!(index.text_search("ownership"), Vec::<DocId>::new());
        assert_eq!(index.text_search("fresh"), ids(&["A"]));
    }

    #[test]
    fn test_remove() {
        let mut index = sample_index();
        assert!(index.remove(&DocId::new("A")));
        assert!(!index.remove(&DocId::new("A")));
        assert!(!index.contains(&DocId::new("A")));
        assert_eq!(index.text_search("ownership"), Vec::<DocId>::new());
    }

    #[test]
    fn test_metadata_by_name() {
        let index = sample_index();

        let titles = index.metadata_by_name("title").unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[&DocId::new("B")], vec!["y"]);

        assert!(matches!(
            index.metadata_by_name("author"),
            Err(Error::NameNotStored(_))
        ));
    }

    #[test]
    fn test_metadatum_for_doc_errors() {
        let index = sample_index();

        assert!(matches!(
            index.metadatum_for_doc("title", &DocId::new("Z")),
            Err(Error::DocumentNotFound(_))
        ));
        assert!(matches!(
            index.metadatum_for_doc("title", &DocId::new("C")),
            Err(Error::NameNotStored(_))
        ));
    }

    #[test]
    fn test_metadata_names() {
        let index = sample_index();
        assert_eq!(index.metadata_names(), vec!["title", "type"]);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repo").join(INDEX_FILE_NAME);

        let index = sample_index();
        index.save(&path).unwrap();
        let loaded = InvertedIndex::load(&path).unwrap();

        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.text_search("rules"), ids(&["A", "B"]));
        assert_eq!(
            loaded.reverse_related(&DocId::new("C"), Some("parentOf")),
            ids(&["B"])
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let dir = TempDir::new().unwrap();
        let index = InvertedIndex::load(&dir.path().join(INDEX_FILE_NAME)).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_corrupt_is_access_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        fs::write(&path, "not an index").unwrap();

        assert!(matches!(
            InvertedIndex::load(&path),
            Err(Error::AccessFailure { .. })
        ));
    }
}

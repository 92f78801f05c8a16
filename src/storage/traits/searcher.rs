//! Searcher trait.

use super::DocumentStore;
use crate::Result;
use crate::models::{DocId, SearchCriteria, SearchHit};
use std::collections::BTreeMap;

/// Read-only query surface over one repository's index.
///
/// No method may mutate the index. Implementations read a consistent
/// snapshot per call and never take document locks.
pub trait Searcher: Send + Sync {
    /// Returns the backend selector name.
    fn backend_name(&self) -> &'static str;

    /// Returns IDs of documents matching every `(name, value)` criterion.
    ///
    /// A document matches iff, for each criterion, at least one of its stored
    /// values for `name` equals `value` exactly (case-sensitive). Empty
    /// criteria match every indexed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn narrowing_search(&self, criteria: &SearchCriteria) -> Result<Vec<DocId>>;

    /// Runs a narrowing search and loads each match from `store`.
    ///
    /// Each hit carries the stored values of every criteria name plus each
    /// of `extra_fields`. Matches missing from the store are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or a matched document
    /// cannot be loaded for a reason other than being absent.
    fn fetch_documents(
        &self,
        criteria: &SearchCriteria,
        extra_fields: &[String],
        store: &dyn DocumentStore,
    ) -> Result<Vec<SearchHit>>;

    /// Returns every document's values for metadata `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameNotStored`](crate::Error::NameNotStored) if no
    /// indexed document carries `name`.
    fn metadata_by_name(&self, name: &str) -> Result<BTreeMap<DocId, Vec<String>>>;

    /// Returns one document's values for metadata `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`](crate::Error::DocumentNotFound) if
    /// the document is not indexed and
    /// [`Error::NameNotStored`](crate::Error::NameNotStored) if it has no
    /// field `name`.
    fn metadatum_for_doc(&self, name: &str, id: &DocId) -> Result<Vec<String>>;

    /// Returns IDs of documents declaring a relation to `id`.
    ///
    /// `relation_type` of `None` matches relations of any type.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn reverse_related(&self, id: &DocId, relation_type: Option<&str>) -> Result<Vec<DocId>>;

    /// Returns every metadata name present in the index, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn all_metadata_names(&self) -> Result<Vec<String>>;

    /// Returns IDs of documents whose indexed text contains every query term.
    ///
    /// Terms are matched case-insensitively. An empty query matches nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn text_search(&self, query: &str) -> Result<Vec<DocId>>;

    /// Returns the number of indexed documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn count(&self) -> Result<usize>;

    /// Returns true if one instance may be cached and shared across callers.
    fn is_reusable(&self) -> bool;
}

//! Indexer trait.
//!
//! The index is a **derived view** of the document store. It must always be
//! re-derivable from the store with [`Indexer::reindex_all`] and must never
//! hold entries for documents absent from the store.
//!
//! ## Error Recovery
//!
//! | Error Type | Recovery Strategy |
//! |------------|-------------------|
//! | `Error::AccessFailure` | Retry; the previous index file is left intact |
//! | `Error::InitializationFailure` | Index file unreadable or corrupt when opening; delete it, reopen (a missing file opens empty) and call `reindex_all()` |
//!
//! Searchers reading a corrupt index file report `Error::AccessFailure`.

use super::DocumentStore;
use crate::Result;
use crate::models::{DocId, Document};

/// Trait for index writers.
pub trait Indexer: Send + Sync {
    /// Returns the backend selector name.
    fn backend_name(&self) -> &'static str;

    /// Indexes a document, replacing any previous entry for its ID.
    ///
    /// Calling this twice for the same document leaves the index exactly as
    /// calling it once.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    fn update(&self, document: &Document) -> Result<()>;

    /// Removes a document's entry.
    ///
    /// Reports `true` even when there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error only if the index cannot be written.
    fn delete_from_index(&self, id: &DocId) -> Result<bool>;

    /// Rebuilds the index from scratch from `store`.
    ///
    /// Documents that fail to load are logged and skipped. Returns the number
    /// of documents indexed, which may be less than `store.count()`. Must not
    /// run concurrently with writes to the same repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or the index cannot be
    /// written.
    fn reindex_all(&self, store: &dyn DocumentStore) -> Result<usize>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be written.
    fn clear(&self) -> Result<()>;

    /// Returns the number of indexed documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    fn document_count(&self) -> Result<usize>;

    /// Returns true if one instance may be cached and shared across callers.
    fn is_reusable(&self) -> bool;
}

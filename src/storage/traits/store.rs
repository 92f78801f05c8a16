//! Document store trait.

use crate::Result;
use crate::models::{DocId, Document};
use crate::storage::LockGuard;

/// Trait for document store backends.
///
/// A store is the system of record for one repository. Every document ID
/// maps to exactly one stored artifact named by that ID.
///
/// # Implementor Notes
///
/// - Methods use `&self`; use interior mutability for mutable state
/// - `put` is a full overwrite, never a merge
/// - `remove` on an absent ID returns `Ok(false)`
/// - `put` and `remove` take the document lock themselves; the `_locked`
///   forms run under a guard the caller already holds, so a caller can keep
///   the document locked across a longer sequence
/// - Report [`is_reusable`](Self::is_reusable) honestly: callers only cache
///   and share instances that say they are safe to reuse
pub trait DocumentStore: Send + Sync {
    /// Returns the backend selector name.
    fn backend_name(&self) -> &'static str;

    /// Writes a document, returning its ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentExists`](crate::Error::DocumentExists) if
    /// `overwrite` is false and the ID is present, or an access failure if the
    /// write fails or the document lock cannot be acquired.
    fn put(&self, document: &Document, overwrite: bool) -> Result<DocId>;

    /// Writes a document while the caller holds its lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) if `guard`
    /// does not hold this document in the store's lock table, otherwise as
    /// [`put`](Self::put).
    fn put_locked(
        &self,
        document: &Document,
        overwrite: bool,
        guard: &LockGuard<'_>,
    ) -> Result<DocId>;

    /// Reads a document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`](crate::Error::DocumentNotFound) for
    /// a missing ID and [`Error::ParseFailure`](crate::Error::ParseFailure) for
    /// a corrupt stored document.
    fn get(&self, id: &DocId) -> Result<Document>;

    /// Returns true if a document with this ID is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be inspected.
    fn has(&self, id: &DocId) -> Result<bool>;

    /// Deletes a document. Returns `false` if it was already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the document lock cannot be acquired or the stored
    /// artifact exists but cannot be deleted.
    fn remove(&self, id: &DocId) -> Result<bool>;

    /// Deletes a document while the caller holds its lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`](crate::Error::InvalidInput) if `guard`
    /// does not hold `id` in the store's lock table, otherwise as
    /// [`remove`](Self::remove).
    fn remove_locked(&self, id: &DocId, guard: &LockGuard<'_>) -> Result<bool>;

    /// Lists all stored document IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be listed.
    fn list_ids(&self) -> Result<Vec<DocId>>;

    /// Returns the number of stored documents.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be listed.
    fn count(&self) -> Result<usize> {
        Ok(self.list_ids()?.len())
    }

    /// Returns true if one instance may be cached and shared across callers.
    fn is_reusable(&self) -> bool;
}

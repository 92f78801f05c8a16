//! In-memory document store.
//!
//! Keeps each document in its encoded form, so every `get` hands back an
//! independent copy and goes through the same parse path as the filesystem
//! store. Intended for tests and ephemeral repositories.

use super::format;
use crate::models::{DocId, Document};
use crate::storage::{LockGuard, LockTable};
use crate::storage::traits::{DocumentStore, RepositoryDepot, is_safe_repository_name};
use crate::{Error, Result};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Shared map of repository name to encoded documents.
type Repositories = Arc<Mutex<HashMap<String, Arc<RwLock<HashMap<DocId, Vec<u8>>>>>>>;

/// In-memory document store for one repository.
#[derive(Debug)]
pub struct MemoryStore {
    documents: Arc<RwLock<HashMap<DocId, Vec<u8>>>>,
    locks: Arc<LockTable>,
    lock_timeout: Duration,
}

impl MemoryStore {
    /// Selector name in the backend registry.
    pub const BACKEND_NAME: &'static str = "memory";

    /// Creates a standalone, empty store.
    #[must_use]
    pub fn new(locks: Arc<LockTable>, lock_timeout: Duration) -> Self {
        Self {
            documents: Arc::default(),
            locks,
            lock_timeout,
        }
    }

    /// Stores raw bytes under `id`, bypassing encoding.
    ///
    /// Used to plant corrupt documents.
    pub fn put_raw(&self, id: &DocId, bytes: impl Into<Vec<u8>>) {
        self.write().insert(id.clone(), bytes.into());
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<DocId, Vec<u8>>> {
        self.documents.read().unwrap_or_else(|poisoned| {
            tracing::warn!("MemoryStore read lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<DocId, Vec<u8>>> {
        self.documents.write().unwrap_or_else(|poisoned| {
            tracing::warn!("MemoryStore write lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn put(&self, document: &Document, overwrite: bool) -> Result<DocId> {
        let guard = self.locks.lock_or_timeout(document.id(), self.lock_timeout)?;
        self.put_locked(document, overwrite, &guard)
    }

    fn put_locked(
        &self,
        document: &Document,
        overwrite: bool,
        guard: &LockGuard<'_>,
    ) -> Result<DocId> {
        let id = document.id().clone();
        guard.ensure_covers(&self.locks, &id)?;

        let bytes = format::encode(document)?;
        let mut documents = self.write();
        if !overwrite && documents.contains_key(&id) {
            return Err(Error::DocumentExists(id));
        }
        documents.insert(id.clone(), bytes);
        Ok(id)
    }

    fn get(&self, id: &DocId) -> Result<Document> {
        let bytes = self
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(id.clone()))?;
        format::decode(id, &bytes)
    }

    fn has(&self, id: &DocId) -> Result<bool> {
        Ok(self.read().contains_key(id))
    }

    fn remove(&self, id: &DocId) -> Result<bool> {
        let guard = self.locks.lock_or_timeout(id, self.lock_timeout)?;
        self.remove_locked(id, &guard)
    }

    fn remove_locked(&self, id: &DocId, guard: &LockGuard<'_>) -> Result<bool> {
        guard.ensure_covers(&self.locks, id)?;
        Ok(self.write().remove(id).is_some())
    }

    fn list_ids(&self) -> Result<Vec<DocId>> {
        let mut ids: Vec<DocId> = self.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn is_reusable(&self) -> bool {
        true
    }
}

/// Depot whose repositories live in process memory.
///
/// Clones share the same repositories.
#[derive(Debug, Clone, Default)]
pub struct MemoryDepot {
    repositories: Repositories,
}

impl MemoryDepot {
    /// Creates an empty depot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn repositories(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Arc<RwLock<HashMap<DocId, Vec<u8>>>>>> {
        self.repositories.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("MemoryDepot mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Opens a store sharing the contents of `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the repository was never
    /// created.
    pub fn open(
        &self,
        repository: &str,
        locks: Arc<LockTable>,
        lock_timeout: Duration,
    ) -> Result<MemoryStore> {
        let documents = self.repositories().get(repository).cloned().ok_or_else(|| {
            Error::initialization(
                MemoryStore::BACKEND_NAME,
                format!("repository '{repository}' does not exist"),
            )
        })?;
        Ok(MemoryStore {
            documents,
            locks,
            lock_timeout,
        })
    }
}

impl RepositoryDepot for MemoryDepot {
    fn create(&self, repository: &str) -> Result<()> {
        if !is_safe_repository_name(repository) {
            return Err(Error::InvalidInput(format!(
                "repository name contains invalid characters: {repository}"
            )));
        }
        self.repositories()
            .entry(repository.to_string())
            .or_default();
        Ok(())
    }

    fn destroy(&self, repository: &str) -> Result<bool> {
        Ok(self.repositories().remove(repository).is_some())
    }

    fn exists(&self, repository: &str) -> bool {
        self.repositories().contains_key(repository)
    }

    fn list(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self.repositories().keys().cloned().collect();
        Ok(names.into_iter().collect())
    }
}

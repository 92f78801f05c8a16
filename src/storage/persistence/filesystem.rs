//! Filesystem-based document store.
//!
//! Stores each document as an individual JSON tree at
//! `{storage.root}/{repository}/{id}.json`. The path is derived solely from
//! the document ID.
//!
//! # Security
//!
//! - **Path traversal**: document IDs and repository names are validated so
//!   no artifact escapes its repository directory
//! - **File size limits**: oversized files are refused before being read
//!
//! # Write path
//!
//! `put` and `remove` take the document's entry in the shared [`LockTable`]
//! (or run under a guard the caller already holds, via `put_locked` and
//! `remove_locked`). A write goes to a hidden temporary file that is renamed
//! over the artifact. Readers never see a partially written document, and
//! the lock is released on every exit path.

use super::format;
use crate::config::RepositoryContext;
use crate::models::{DocId, Document};
use crate::storage::{LockGuard, LockTable};
use crate::storage::traits::{DocumentStore, RepositoryDepot, is_safe_repository_name};
use crate::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::instrument;

/// Maximum size of a stored document file (16 MiB).
const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// File extension of stored documents.
const DOCUMENT_EXTENSION: &str = "json";

/// Filesystem-based document store for one repository.
#[derive(Debug)]
pub struct FilesystemStore {
    /// Repository name.
    repository: String,
    /// Directory holding this repository's documents.
    base_path: PathBuf,
    /// Shared advisory lock table.
    locks: Arc<LockTable>,
    /// How long `put` waits for a document lock.
    lock_timeout: Duration,
}

impl FilesystemStore {
    /// Selector name in the backend registry.
    pub const BACKEND_NAME: &'static str = "filesystem";

    /// Opens the store for an existing repository under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe repository name and
    /// [`Error::InitializationFailure`] if the repository was never created.
    pub fn open(
        root: &Path,
        repository: &str,
        locks: Arc<LockTable>,
        lock_timeout: Duration,
    ) -> Result<Self> {
        if !is_safe_repository_name(repository) {
            return Err(Error::InvalidInput(format!(
                "repository name contains invalid characters: {repository}"
            )));
        }

        let base_path = root.join(repository);
        if !base_path.is_dir() {
            return Err(Error::initialization(
                Self::BACKEND_NAME,
                format!("repository '{repository}' does not exist"),
            ));
        }

        Ok(Self {
            repository: repository.to_string(),
            base_path,
            locks,
            lock_timeout,
        })
    }

    /// Opens the store using `storage.root` and `lock.timeout_ms` from `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is incomplete or the repository does not exist.
    pub fn from_context(
        context: &RepositoryContext,
        repository: &str,
        locks: Arc<LockTable>,
    ) -> Result<Self> {
        Self::open(
            &context.storage_root()?,
            repository,
            locks,
            context.lock_timeout()?,
        )
    }

    /// Returns the repository directory.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the repository name.
    #[must_use]
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Returns the artifact path for a document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the ID could escape the repository
    /// directory.
    pub fn document_path(&self, id: &DocId) -> Result<PathBuf> {
        if !id.is_safe() {
            return Err(Error::InvalidInput(format!(
                "document ID contains invalid characters: {id}"
            )));
        }
        Ok(self
            .base_path
            .join(format!("{}.{DOCUMENT_EXTENSION}", id.as_str())))
    }

    fn temp_path(&self, id: &DocId) -> PathBuf {
        self.base_path
            .join(format!(".{}.{DOCUMENT_EXTENSION}.tmp", id.as_str()))
    }

    fn write_atomically(&self, id: &DocId, path: &Path, bytes: &[u8]) -> Result<()> {
        let temp = self.temp_path(id);
        fs::write(&temp, bytes).map_err(|e| Error::access("write_document_file", e))?;
        fs::rename(&temp, path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::access("rename_document_file", e)
        })
    }

    fn record_operation_metrics(operation: &'static str, start: Instant, status: &'static str) {
        metrics::counter!(
            "storage_operations_total",
            "backend" => Self::BACKEND_NAME,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::histogram!(
            "storage_operation_duration_ms",
            "backend" => Self::BACKEND_NAME,
            "operation" => operation,
            "status" => status
        )
        .record(start.elapsed().as_secs_f64() * 1000.0);
    }
}

impl DocumentStore for FilesystemStore {
    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    fn put(&self, document: &Document, overwrite: bool) -> Result<DocId> {
        let guard = self.locks.lock_or_timeout(document.id(), self.lock_timeout)?;
        self.put_locked(document, overwrite, &guard)
    }

    #[instrument(skip(self, document, guard), fields(repository = %self.repository, doc.id = %document.id(), overwrite))]
    fn put_locked(
        &self,
        document: &Document,
        overwrite: bool,
        guard: &LockGuard<'_>,
    ) -> Result<DocId> {
        let start = Instant::now();
        let result = (|| {
            let id = document.id().clone();
            guard.ensure_covers(&self.locks, &id)?;
            let path = self.document_path(&id)?;

            if !overwrite && path.exists() {
                return Err(Error::DocumentExists(id));
            }

            let bytes = format::encode(document)?;
            self.write_atomically(&id, &path, &bytes)?;
            Ok(id)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("put", start, status);
        result
    }

    #[instrument(skip(self), fields(repository = %self.repository, doc.id = %id))]
    fn get(&self, id: &DocId) -> Result<Document> {
        let start = Instant::now();
        let result = (|| {
            let path = match self.document_path(id) {
                Ok(p) => p,
                Err(_) => return Err(Error::DocumentNotFound(id.clone())),
            };

            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(Error::DocumentNotFound(id.clone()));
                },
                Err(e) => return Err(Error::access("read_document_metadata", e)),
            };

            if metadata.len() > MAX_FILE_SIZE {
                return Err(Error::ParseFailure {
                    id: id.clone(),
                    cause: format!("file exceeds maximum size of {MAX_FILE_SIZE} bytes"),
                });
            }

            let bytes = match fs::read(&path) {
                Ok(b) => b,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(Error::DocumentNotFound(id.clone()));
                },
                Err(e) => return Err(Error::access("read_document_file", e)),
            };

            format::decode(id, &bytes)
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("get", start, status);
        result
    }

    fn has(&self, id: &DocId) -> Result<bool> {
        let Ok(path) = self.document_path(id) else {
            return Ok(false);
        };
        Ok(path.is_file())
    }

    fn remove(&self, id: &DocId) -> Result<bool> {
        let guard = self.locks.lock_or_timeout(id, self.lock_timeout)?;
        self.remove_locked(id, &guard)
    }

    #[instrument(skip(self, guard), fields(repository = %self.repository, doc.id = %id))]
    fn remove_locked(&self, id: &DocId, guard: &LockGuard<'_>) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            guard.ensure_covers(&self.locks, id)?;
            let Ok(path) = self.document_path(id) else {
                return Ok(false);
            };

            match fs::remove_file(&path) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(Error::access("delete_document_file", e)),
            }
        })();

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("remove", start, status);
        result
    }

    fn list_ids(&self) -> Result<Vec<DocId>> {
        let entries =
            fs::read_dir(&self.base_path).map_err(|e| Error::access("read_storage_dir", e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::access("read_dir_entry", e))?;
            if let Some(id) = extract_doc_id_from_path(&entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn is_reusable(&self) -> bool {
        true
    }
}

/// Extracts a document ID from a stored artifact path.
fn extract_doc_id_from_path(path: &Path) -> Option<DocId> {
    if path.extension().is_none_or(|ext| ext != DOCUMENT_EXTENSION) {
        return None;
    }

    let id = DocId::new(path.file_stem()?.to_str()?);
    id.is_safe().then_some(id)
}

/// Depot mapping each repository to one directory under a root.
#[derive(Debug, Clone)]
pub struct DirectoryDepot {
    root: PathBuf,
}

impl DirectoryDepot {
    /// Creates a depot over `root`. The root is created lazily.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe repository name.
    pub fn repository_path(&self, repository: &str) -> Result<PathBuf> {
        if !is_safe_repository_name(repository) {
            return Err(Error::InvalidInput(format!(
                "repository name contains invalid characters: {repository}"
            )));
        }
        Ok(self.root.join(repository))
    }
}

impl RepositoryDepot for DirectoryDepot {
    fn create(&self, repository: &str) -> Result<()> {
        let path = self.repository_path(repository)?;
        fs::create_dir_all(&path).map_err(|e| Error::access("create_repository_dir", e))?;
        tracing::debug!(repository, path = %path.display(), "Created repository directory");
        Ok(())
    }

    fn destroy(&self, repository: &str) -> Result<bool> {
        let path = self.repository_path(repository)?;
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::access("delete_repository_dir", e)),
        }
    }

    fn exists(&self, repository: &str) -> bool {
        self.repository_path(repository)
            .is_ok_and(|path| path.is_dir())
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::access("read_depot_root", e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::access("read_dir_entry", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_safe_repository_name(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

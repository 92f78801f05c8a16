//! File-backed inverted index writer.

use super::inverted::{INDEX_FILE_NAME, InvertedIndex};
use crate::config::RepositoryContext;
use crate::models::{DocId, Document};
use crate::storage::persistence::DirectoryDepot;
use crate::storage::traits::{DocumentStore, Indexer, RepositoryDepot};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::instrument;

/// Writer for one repository's inverted index.
///
/// Keeps the index in memory and rewrites `index.json` after every change.
/// A failed write rolls the in-memory change back, so memory and disk never
/// disagree. One instance per repository is expected; it is safe to share.
#[derive(Debug)]
pub struct InvertedIndexer {
    repository: String,
    index_path: PathBuf,
    index: Mutex<InvertedIndex>,
}

impl InvertedIndexer {
    /// Selector name in the backend registry.
    pub const BACKEND_NAME: &'static str = "inverted";

    /// Opens the index of an existing repository under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the repository's index
    /// directory is missing or the index file cannot be loaded.
    pub fn open(root: &Path, repository: &str) -> Result<Self> {
        let dir = DirectoryDepot::new(root).repository_path(repository)?;
        if !dir.is_dir() {
            return Err(Error::initialization(
                Self::BACKEND_NAME,
                format!("index for repository '{repository}' does not exist"),
            ));
        }

        let index_path = dir.join(INDEX_FILE_NAME);
        let index = InvertedIndex::load(&index_path)
            .map_err(|e| Error::initialization(Self::BACKEND_NAME, e))?;
        tracing::debug!(repository, documents = index.len(), "Opened inverted index");

        Ok(Self {
            repository: repository.to_string(),
            index_path,
            index: Mutex::new(index),
        })
    }

    /// Opens the index using `index.root` from `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is incomplete or the index is missing.
    pub fn from_context(context: &RepositoryContext, repository: &str) -> Result<Self> {
        Self::open(&context.index_root()?, repository)
    }

    /// Returns the path of the persisted index.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn lock_index(&self) -> MutexGuard<'_, InvertedIndex> {
        self.index.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("InvertedIndexer mutex was poisoned, recovering");
            poisoned.into_inner()
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

impl Indexer for InvertedIndexer {
    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    #[instrument(skip(self, document), fields(repository = %self.repository, doc.id = %document.id()))]
    fn update(&self, document: &Document) -> Result<()> {
        let start = Instant::now();
        let mut index = self.lock_index();
        let id = document.id().clone();
        let previous = index.entry(&id).cloned();

        index.index_document(document);
        let result = index.save(&self.index_path);
        if result.is_err() {
            match previous {
                Some(entry) => index.upsert(id, entry),
                None => {
                    index.remove(&id);
                },
            }
        }

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("update", start, status);
        result
    }

    #[instrument(skip(self), fields(repository = %self.repository, doc.id = %id))]
    fn delete_from_index(&self, id: &DocId) -> Result<bool> {
        let start = Instant::now();
        let mut index = self.lock_index();

        let Some(previous) = index.entry(id).cloned() else {
            Self::record_operation_metrics("delete", start, "noop");
            return Ok(true);
        };

        index.remove(id);
        let result = index.save(&self.index_path);
        if result.is_err() {
            index.upsert(id.clone(), previous);
        }

        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("delete", start, status);
        result.map(|()| true)
    }

    #[instrument(skip(self, store), fields(repository = %self.repository, store = store.backend_name()))]
    fn reindex_all(&self, store: &dyn DocumentStore) -> Result<usize> {
        let start = Instant::now();
        let mut rebuilt = InvertedIndex::new();
        let mut skipped = 0usize;

        for id in store.list_ids()? {
            match store.get(&id) {
                Ok(document) => rebuilt.index_document(&document),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(doc.id = %id, error = %e, "Skipping document during reindex");
                },
            }
        }

        let mut index = self.lock_index();
        let result = rebuilt.save(&self.index_path);
        let status = if result.is_ok() { "success" } else { "error" };
        Self::record_operation_metrics("reindex_all", start, status);
        result?;

        let indexed = rebuilt.len();
        *index = rebuilt;
        tracing::info!(indexed, skipped, "Rebuilt index");
        Ok(indexed)
    }

    fn clear(&self) -> Result<()> {
        let mut index = self.lock_index();
        let empty = InvertedIndex::new();
        empty.save(&self.index_path)?;
        *index = empty;
        Ok(())
    }

    fn document_count(&self) -> Result<usize> {
        Ok(self.lock_index().len())
    }

    fn is_reusable(&self) -> bool {
        true
    }
}

/// Depot for index directories, each holding one `index.json`.
#[derive(Debug, Clone)]
pub struct InvertedIndexDepot {
    directories: DirectoryDepot,
}

impl InvertedIndexDepot {
    /// Creates a depot over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            directories: DirectoryDepot::new(root),
        }
    }
}

impl RepositoryDepot for InvertedIndexDepot {
    fn create(&self, repository: &str) -> Result<()> {
        self.directories.create(repository)?;
        let path = self
            .directories
            .repository_path(repository)?
            .join(INDEX_FILE_NAME);
        if !path.exists() {
            InvertedIndex::new().save(&path)?;
        }
        Ok(())
    }

    fn destroy(&self, repository: &str) -> Result<bool> {
        self.directories.destroy(repository)
    }

    fn exists(&self, repository: &str) -> bool {
        self.directories.exists(repository)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.directories.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Body, Metadatum, SearchCriteria};
    use crate::storage::LockTable;
    use crate::storage::persistence::MemoryStore;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open_indexer(dir: &TempDir) -> InvertedIndexer {
        InvertedIndexDepot::new(dir.path()).create("repo").unwrap();
        InvertedIndexer::open(dir.path(), "repo").unwrap()
    }

    fn note(id: &str, title: &str) -> Document {
        Document::with_id(id)
            .with_metadatum(Metadatum::with_value("type", "note"))
            .with_metadatum(Metadatum::with_value("title", title))
    }

    #[test]
    fn test_depot_writes_empty_index() {
        let dir = TempDir::new().unwrap();
        let depot = InvertedIndexDepot::new(dir.path());
        depot.create("repo").unwrap();

        assert!(dir.path().join("repo").join(INDEX_FILE_NAME).is_file());
        assert!(depot.exists("repo"));
        assert_eq!(depot.list().unwrap(), vec!["repo"]);
    }

    #[test]
    fn test_open_missing_index() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            InvertedIndexer::open(dir.path(), "repo"),
            Err(Error::InitializationFailure { .. })
        ));
    }

    #[test]
    fn test_update_is_persisted() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        indexer.update(&note("a", "x")).unwrap();

        let reloaded = InvertedIndex::load(indexer.index_path()).unwrap();
        assert_eq!(
            reloaded.narrowing_search(&SearchCriteria::new().with("title", "x")),
            vec![DocId::new("a")]
        );
    }

    #[test]
    fn test_update_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        let doc = note("a", "x");

        indexer.update(&doc).unwrap();
        let once = fs::read(indexer.index_path()).unwrap();
        indexer.update(&doc).unwrap();
        let twice = fs::read(indexer.index_path()).unwrap();

        assert_eq!(once, twice);
        assert_eq!(indexer.document_count().unwrap(), 1);
    }

    #[test]
    fn test_delete_always_reports_success() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        indexer.update(&note("a", "x")).unwrap();

        assert!(indexer.delete_from_index(&DocId::new("a")).unwrap());
        assert!(indexer.delete_from_index(&DocId::new("a")).unwrap());
        assert!(indexer.delete_from_index(&DocId::new("never")).unwrap());
        assert_eq!(indexer.document_count().unwrap(), 0);
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        indexer.update(&note("a", "x")).unwrap();

        // A directory where the temp file should go makes the write fail.
        fs::create_dir(indexer.index_path().with_extension("json.tmp")).unwrap();

        assert!(indexer.update(&note("b", "y")).is_err());
        assert_eq!(indexer.document_count().unwrap(), 1);
        assert!(indexer.delete_from_index(&DocId::new("a")).is_err());
        assert_eq!(indexer.document_count().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_index_recovers_by_rebuild() {
        let dir = TempDir::new().unwrap();
        let index_path = open_indexer(&dir).index_path().to_path_buf();
        fs::write(&index_path, "{ truncated").unwrap();

        assert!(matches!(
            InvertedIndexer::open(dir.path(), "repo"),
            Err(Error::InitializationFailure { .. })
        ));

        fs::remove_file(&index_path).unwrap();
        let indexer = InvertedIndexer::open(dir.path(), "repo").unwrap();
        let store = MemoryStore::new(Arc::new(LockTable::new()), Duration::ZERO);
        store.put(&note("a", "x"), false).unwrap();

        assert_eq!(indexer.reindex_all(&store).unwrap(), 1);
        assert!(InvertedIndex::load(&index_path).unwrap().contains(&DocId::new("a")));
    }

    #[test]
    fn test_reindex_all_skips_corrupt_documents() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        let store = MemoryStore::new(Arc::new(LockTable::new()), Duration::ZERO);

        store.put(&note("a", "x"), false).unwrap();
        store
            .put(&Document::with_id("b").with_body(Body::plain("text")), false)
            .unwrap();
        store.put_raw(&DocId::new("bad"), "{ broken");
        indexer.update(&note("stale", "z")).unwrap();

        assert_eq!(indexer.reindex_all(&store).unwrap(), 2);
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(indexer.document_count().unwrap(), 2);

        let reloaded = InvertedIndex::load(indexer.index_path()).unwrap();
        assert!(!reloaded.contains(&DocId::new("stale")));
        assert!(!reloaded.contains(&DocId::new("bad")));
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let indexer = open_indexer(&dir);
        indexer.update(&note("a", "x")).unwrap();
        indexer.clear().unwrap();

        assert_eq!(indexer.document_count().unwrap(), 0);
        assert!(InvertedIndex::load(indexer.index_path()).unwrap().is_empty());
    }
}

//! Repository manager.
//!
//! Facade over the per-repository store, indexer and searcher. Backends are
//! built through the [`BackendRegistry`] and cached per repository when they
//! report themselves reusable.
//!
//! # Write ordering
//!
//! | Operation | Sequence | On partial failure |
//! |-----------|----------|--------------------|
//! | `store`/`put` | store write, then index update | document is retrievable but not searchable; retry with `reindex_document` |
//! | `remove` | index delete, then store delete | index failure: store untouched. Store failure: bytes stay on disk, invisible to search |
//!
//! Both sequences run under the document's entry in the lock table, so two
//! writers on one ID can never leave the index describing a different
//! version than the store holds.

use super::BackendRegistry;
use crate::config::{DocRepoConfig, RepositoryContext};
use crate::models::{DocId, Document, SearchCriteria, SearchHit};
use crate::storage::{DocumentStore, Indexer, LockGuard, LockTable, RepositoryDepot, Searcher};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

/// Repository names reserved for internal settings.
pub const RESERVED_REPOSITORY_NAMES: [&str; 2] = ["settings", "user-settings"];

type Cache<T> = RwLock<HashMap<String, Arc<T>>>;

fn read_cache<T: ?Sized>(cache: &Cache<T>) -> RwLockReadGuard<'_, HashMap<String, Arc<T>>> {
    cache.read().unwrap_or_else(|poisoned| {
        tracing::warn!("Backend cache lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn write_cache<T: ?Sized>(cache: &Cache<T>) -> RwLockWriteGuard<'_, HashMap<String, Arc<T>>> {
    cache.write().unwrap_or_else(|poisoned| {
        tracing::warn!("Backend cache lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Returns the cached backend for `repository` or builds one.
///
/// Only instances whose `reusable` check passes are kept. When two callers
/// race to build, the first inserted instance wins.
fn cached<T: ?Sized>(
    cache: &Cache<T>,
    repository: &str,
    build: impl FnOnce() -> Result<Arc<T>>,
    reusable: impl Fn(&T) -> bool,
) -> Result<Arc<T>> {
    if let Some(backend) = read_cache(cache).get(repository) {
        tracing::debug!(repository, "Backend cache hit");
        return Ok(Arc::clone(backend));
    }

    let backend = build()?;
    if !reusable(backend.as_ref()) {
        return Ok(backend);
    }

    let mut cache = write_cache(cache);
    Ok(Arc::clone(
        cache.entry(repository.to_string()).or_insert(backend),
    ))
}

/// Entry point for storing, fetching, removing and searching documents.
pub struct RepositoryManager {
    context: RepositoryContext,
    registry: BackendRegistry,
    locks: Arc<LockTable>,
    stores: Cache<dyn DocumentStore>,
    indexers: Cache<dyn Indexer>,
    searchers: Cache<dyn Searcher>,
}

impl std::fmt::Debug for RepositoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryManager")
            .field("context", &self.context)
            .field("registry", &self.registry)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl RepositoryManager {
    /// Creates a manager with the built-in backends and its own lock table.
    #[must_use]
    pub fn new(context: RepositoryContext) -> Self {
        Self::with_registry(
            context,
            BackendRegistry::with_defaults(),
            Arc::new(LockTable::new()),
        )
    }

    /// Creates a manager with an explicit registry and lock table.
    #[must_use]
    pub fn with_registry(
        context: RepositoryContext,
        registry: BackendRegistry,
        locks: Arc<LockTable>,
    ) -> Self {
        Self {
            context,
            registry,
            locks,
            stores: RwLock::default(),
            indexers: RwLock::default(),
            searchers: RwLock::default(),
        }
    }

    /// Creates a manager from typed configuration.
    #[must_use]
    pub fn from_config(config: &DocRepoConfig) -> Self {
        Self::new(config.to_context())
    }

    /// Returns the repository context.
    #[must_use]
    pub const fn context(&self) -> &RepositoryContext {
        &self.context
    }

    /// Returns the lock table handed to every store.
    #[must_use]
    pub fn lock_table(&self) -> Arc<LockTable> {
        Arc::clone(&self.locks)
    }

    fn depots(&self) -> Result<(Arc<dyn RepositoryDepot>, Arc<dyn RepositoryDepot>)> {
        Ok((
            self.registry.store_depot(&self.context)?,
            self.registry.index_depot(&self.context)?,
        ))
    }

    /// Locks a document for a whole store/index sequence.
    fn lock_document(&self, id: &DocId) -> Result<LockGuard<'_>> {
        self.locks.lock_or_timeout(id, self.context.lock_timeout()?)
    }

    fn evict(&self, repository: &str) {
        write_cache(&self.stores).remove(repository);
        write_cache(&self.indexers).remove(repository);
        write_cache(&self.searchers).remove(repository);
    }

    // ---- repository lifecycle ----

    /// Creates a repository: storage location plus an empty index.
    ///
    /// Creating an existing repository is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unsafe name, or an error if
    /// either location cannot be allocated.
    #[instrument(skip(self))]
    pub fn create_repository(&self, repository: &str) -> Result<()> {
        let (store_depot, index_depot) = self.depots()?;
        store_depot.create(repository)?;
        index_depot.create(repository)?;
        tracing::info!(repository, "Created repository");
        Ok(())
    }

    /// Creates the repository for a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `user` names a reserved settings
    /// repository.
    pub fn create_user_repository(&self, user: &str) -> Result<()> {
        if RESERVED_REPOSITORY_NAMES.contains(&user) {
            return Err(Error::InvalidInput(format!(
                "repository name '{user}' is reserved"
            )));
        }
        self.create_repository(user)
    }

    /// Deletes a repository's documents and index. Returns false if neither existed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be deleted.
    #[instrument(skip(self))]
    pub fn destroy_repository(&self, repository: &str) -> Result<bool> {
        let (store_depot, index_depot) = self.depots()?;
        self.evict(repository);

        let index_removed = index_depot.destroy(repository)?;
        let store_removed = store_depot.destroy(repository)?;
        tracing::info!(repository, store_removed, index_removed, "Destroyed repository");
        Ok(store_removed || index_removed)
    }

    /// Returns true if the repository's storage location exists.
    #[must_use]
    pub fn repository_exists(&self, repository: &str) -> bool {
        self.registry
            .store_depot(&self.context)
            .is_ok_and(|depot| depot.exists(repository))
    }

    /// Lists repositories, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage root cannot be listed.
    pub fn list_repositories(&self) -> Result<Vec<String>> {
        self.registry.store_depot(&self.context)?.list()
    }

    // ---- backend accessors ----

    /// Returns the document store for `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the backend cannot be built.
    pub fn document_store(&self, repository: &str) -> Result<Arc<dyn DocumentStore>> {
        cached(
            &self.stores,
            repository,
            || {
                self.registry
                    .create_store(&self.context, repository, Arc::clone(&self.locks))
            },
            |store| store.is_reusable(),
        )
    }

    /// Returns the indexer for `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the backend cannot be built.
    pub fn indexer(&self, repository: &str) -> Result<Arc<dyn Indexer>> {
        cached(
            &self.indexers,
            repository,
            || self.registry.create_indexer(&self.context, repository),
            |indexer| indexer.is_reusable(),
        )
    }

    /// Returns a searcher for `repository`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the backend cannot be built.
    pub fn searcher(&self, repository: &str) -> Result<Arc<dyn Searcher>> {
        cached(
            &self.searchers,
            repository,
            || self.registry.create_searcher(&self.context, repository),
            |searcher| searcher.is_reusable(),
        )
    }

    // ---- document operations ----

    /// Stores a document, replacing any previous version, then indexes it.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails. If the write succeeds but
    /// indexing fails, the index error is returned and the document is
    /// retrievable but not searchable until [`reindex_document`](Self::reindex_document).
    pub fn store(&self, repository: &str, document: &Document) -> Result<DocId> {
        self.put(repository, document, true)
    }

    /// Stores a document, failing with [`Error::DocumentExists`] when
    /// `overwrite` is false and the ID is taken, then indexes it.
    ///
    /// # Errors
    ///
    /// See [`store`](Self::store).
    #[instrument(skip(self, document), fields(doc.id = %document.id()))]
    pub fn put(&self, repository: &str, document: &Document, overwrite: bool) -> Result<DocId> {
        let store = self.document_store(repository)?;
        let indexer = self.indexer(repository)?;

        let guard = self.lock_document(document.id())?;
        let id = store.put_locked(document, overwrite, &guard)?;
        if let Err(e) = indexer.update(document) {
            tracing::warn!(
                repository,
                doc.id = %id,
                error = %e,
                "Document stored but not indexed"
            );
            return Err(e);
        }
        Ok(id)
    }

    /// Fetches a document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DocumentNotFound`] or [`Error::ParseFailure`] from the store.
    pub fn fetch(&self, repository: &str, id: &DocId) -> Result<Document> {
        self.document_store(repository)?.get(id)
    }

    /// Removes a document from the index, then from the store.
    ///
    /// Returns whether the store held the document.
    ///
    /// # Errors
    ///
    /// If the index delete fails the store is not touched. If the store
    /// delete fails the document stays on disk but is no longer searchable.
    #[instrument(skip(self), fields(doc.id = %id))]
    pub fn remove(&self, repository: &str, id: &DocId) -> Result<bool> {
        let store = self.document_store(repository)?;
        let indexer = self.indexer(repository)?;

        let guard = self.lock_document(id)?;
        indexer.delete_from_index(id)?;
        store.remove_locked(id, &guard).inspect_err(|e| {
            tracing::warn!(
                repository,
                doc.id = %id,
                error = %e,
                "Document removed from index but not from store"
            );
        })
    }

    /// Re-runs the index step for one stored document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be fetched or indexed.
    pub fn reindex_document(&self, repository: &str, id: &DocId) -> Result<()> {
        let store = self.document_store(repository)?;
        let indexer = self.indexer(repository)?;

        let _guard = self.lock_document(id)?;
        indexer.update(&store.get(id)?)
    }

    /// Rebuilds the repository's index from its store.
    ///
    /// Returns the number of documents indexed. Must not run concurrently
    /// with writes to the same repository.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or the index written.
    #[instrument(skip(self))]
    pub fn reindex(&self, repository: &str) -> Result<usize> {
        let store = self.document_store(repository)?;
        self.indexer(repository)?.reindex_all(store.as_ref())
    }

    // ---- queries ----

    /// Narrowing search returning matching IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn search(&self, repository: &str, criteria: &SearchCriteria) -> Result<Vec<DocId>> {
        self.searcher(repository)?.narrowing_search(criteria)
    }

    /// Narrowing search returning full documents and the requested fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or a document cannot be loaded.
    pub fn search_documents(
        &self,
        repository: &str,
        criteria: &SearchCriteria,
        extra_fields: &[String],
    ) -> Result<Vec<SearchHit>> {
        let store = self.document_store(repository)?;
        self.searcher(repository)?
            .fetch_documents(criteria, extra_fields, store.as_ref())
    }

    /// Full-text search over body and extension text.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn text_search(&self, repository: &str, query: &str) -> Result<Vec<DocId>> {
        self.searcher(repository)?.text_search(query)
    }

    /// Returns IDs of documents declaring a relation to `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn reverse_related(
        &self,
        repository: &str,
        id: &DocId,
        relation_type: Option<&str>,
    ) -> Result<Vec<DocId>> {
        self.searcher(repository)?.reverse_related(id, relation_type)
    }

    /// Returns every document's values for metadata `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NameNotStored`] if no document has the field.
    pub fn metadata_by_name(
        &self,
        repository: &str,
        name: &str,
    ) -> Result<BTreeMap<DocId, Vec<String>>> {
        self.searcher(repository)?.metadata_by_name(name)
    }

    /// Returns every metadata name in the repository's index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn metadata_names(&self, repository: &str) -> Result<Vec<String>> {
        self.searcher(repository)?.all_metadata_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, INDEX_ROOT, STORAGE_ROOT};
    use crate::models::{Body, Metadatum, Relation};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> RepositoryManager {
        let context = RepositoryContext::new()
            .with(STORAGE_ROOT, dir.path().join("docs").display().to_string())
            .with(INDEX_ROOT, dir.path().join("index").display().to_string());
        let manager = RepositoryManager::new(context);
        manager.create_repository("repo").unwrap();
        manager
    }

    fn note(id: &str) -> Document {
        Document::with_id(id)
            .with_metadatum(Metadatum::with_value("type", "note"))
            .with_body(Body::plain("hello world"))
    }

    #[test]
    fn test_store_fetch_search() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let id = manager.store("repo", &note("a")).unwrap();
        assert_eq!(manager.fetch("repo", &id).unwrap(), note("a"));
        assert_eq!(
            manager
                .search("repo", &SearchCriteria::new().with("type", "note"))
                .unwrap(),
            vec![id.clone()]
        );
        assert_eq!(manager.text_search("repo", "HELLO").unwrap(), vec![id]);
    }

    #[test]
    fn test_put_without_overwrite() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        manager.put("repo", &note("a"), false).unwrap();
        let result = manager.put("repo", &Document::with_id("a"), false);
        assert!(matches!(result, Err(Error::DocumentExists(_))));
        assert_eq!(manager.fetch("repo", &DocId::new("a")).unwrap(), note("a"));
    }

    #[test]
    fn test_remove_clears_index_and_store() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let id = manager.store("repo", &note("a")).unwrap();

        assert!(manager.remove("repo", &id).unwrap());
        assert!(!manager.remove("repo", &id).unwrap());
        assert!(manager.fetch("repo", &id).unwrap_err().is_not_found());
        assert!(manager.search("repo", &SearchCriteria::new()).unwrap().is_empty());
    }

    #[test]
    fn test_reverse_related() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let b = manager.store("repo", &note("b")).unwrap();
        let mut a = note("a");
        a.add_relation("parentOf", b.clone());
        manager.store("repo", &a).unwrap();

        assert_eq!(
            manager.reverse_related("repo", &b, Some("parentOf")).unwrap(),
            vec![DocId::new("a")]
        );
        assert!(
            manager
                .reverse_related("repo", &b, Some("childOf"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_search_documents_with_extra_fields() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager
            .store(
                "repo",
                &note("a").with_metadatum(Metadatum::with_value("title", "First")),
            )
            .unwrap();

        let hits = manager
            .search_documents(
                "repo",
                &SearchCriteria::new().with("type", "note"),
                &["title".to_string()],
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fields["title"], vec!["First"]);
        assert_eq!(manager.metadata_names("repo").unwrap(), vec!["title", "type"]);
    }

    #[test]
    fn test_repository_lifecycle() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store("repo", &note("a")).unwrap();
        manager.create_repository("other").unwrap();

        assert_eq!(manager.list_repositories().unwrap(), vec!["other", "repo"]);
        assert!(manager.destroy_repository("repo").unwrap());
        assert!(!manager.repository_exists("repo"));
        assert!(!manager.destroy_repository("repo").unwrap());
        assert!(matches!(
            manager.fetch("repo", &DocId::new("a")),
            Err(Error::InitializationFailure { .. })
        ));
    }

    #[test]
    fn test_recreated_repository_starts_empty() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        manager.store("repo", &note("a")).unwrap();

        manager.destroy_repository("repo").unwrap();
        manager.create_repository("repo").unwrap();
        assert!(manager.search("repo", &SearchCriteria::new()).unwrap().is_empty());
        assert_eq!(manager.indexer("repo").unwrap().document_count().unwrap(), 0);
    }

    #[test]
    fn test_create_user_repository_rejects_reserved() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        for name in RESERVED_REPOSITORY_NAMES {
            assert!(matches!(
                manager.create_user_repository(name),
                Err(Error::InvalidInput(_))
            ));
            assert!(!manager.repository_exists(name));
        }
        manager.create_user_repository("alice").unwrap();
        assert!(manager.repository_exists("alice"));
    }

    #[test]
    fn test_reusable_backends_are_cached() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let first = manager.document_store("repo").unwrap();
        let second = manager.document_store("repo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let first = manager.indexer("repo").unwrap();
        let second = manager.indexer("repo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let first = manager.searcher("repo").unwrap();
        let second = manager.searcher("repo").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_non_reusable_searcher_built_per_call() {
        let dir = TempDir::new().unwrap();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);

        let mut registry = BackendRegistry::with_defaults();
        registry.register_searcher("counting", move |ctx, repo| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(crate::storage::InvertedSearcher::from_context(ctx, repo)?)
                as Arc<dyn Searcher>)
        });
        let context = RepositoryContext::new()
            .with(STORAGE_ROOT, dir.path().join("docs").display().to_string())
            .with(INDEX_ROOT, dir.path().join("index").display().to_string())
            .with(BackendKind::Searcher.selector_key(), "counting");
        let manager =
            RepositoryManager::with_registry(context, registry, Arc::new(LockTable::new()));
        manager.create_repository("repo").unwrap();

        manager.search("repo", &SearchCriteria::new()).unwrap();
        manager.search("repo", &SearchCriteria::new()).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_store_reports_index_failure_and_reindex_document_recovers() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);
        let indexer = manager.indexer("repo").unwrap();
        let temp = dir.path().join("index").join("repo").join("index.json.tmp");
        std::fs::create_dir(&temp).unwrap();

        let doc = note("a").with_relation(Relation::untyped("b"));
        assert!(manager.store("repo", &doc).is_err());
        assert_eq!(manager.fetch("repo", doc.id()).unwrap(), doc);
        assert_eq!(indexer.document_count().unwrap(), 0);

        std::fs::remove_dir(&temp).unwrap();
        manager.reindex_document("repo", doc.id()).unwrap();
        assert_eq!(
            manager.search("repo", &SearchCriteria::new()).unwrap(),
            vec![DocId::new("a")]
        );
    }
}

//! Backend registry for storage layer initialization.
//!
//! Maps the selector names found in a [`RepositoryContext`] to constructor
//! functions, so the manager can be re-parametrized without code changes.
//!
//! # Architecture
//!
//! ```text
//! BackendRegistry
//!   ├── stores:    "filesystem" | "memory"  → (depot, open) → Arc<dyn DocumentStore>
//!   ├── indexers:  "inverted"               → (depot, open) → Arc<dyn Indexer>
//!   └── searchers: "inverted"               → open          → Arc<dyn Searcher>
//! ```
//!
//! Searchers read what an indexer writes and have no depot of their own.

use crate::config::{BackendKind, RepositoryContext};
use crate::storage::{
    DirectoryDepot, DocumentStore, FilesystemStore, Indexer, InvertedIndexDepot,
    InvertedIndexer, InvertedSearcher, LockTable, MemoryDepot, MemoryStore, RepositoryDepot,
    Searcher,
};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds the depot for a backend from the context.
pub type DepotConstructor =
    Arc<dyn Fn(&RepositoryContext) -> Result<Arc<dyn RepositoryDepot>> + Send + Sync>;

/// Opens a store for one repository.
pub type StoreConstructor = Arc<
    dyn Fn(&RepositoryContext, &str, Arc<LockTable>) -> Result<Arc<dyn DocumentStore>>
        + Send
        + Sync,
>;

/// Opens an indexer for one repository.
pub type IndexerConstructor =
    Arc<dyn Fn(&RepositoryContext, &str) -> Result<Arc<dyn Indexer>> + Send + Sync>;

/// Opens a searcher for one repository.
pub type SearcherConstructor =
    Arc<dyn Fn(&RepositoryContext, &str) -> Result<Arc<dyn Searcher>> + Send + Sync>;

#[derive(Clone)]
struct StoreEntry {
    depot: DepotConstructor,
    open: StoreConstructor,
}

#[derive(Clone)]
struct IndexerEntry {
    depot: DepotConstructor,
    open: IndexerConstructor,
}

/// Registry of backend constructors keyed by selector name.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    stores: HashMap<String, StoreEntry>,
    indexers: HashMap<String, IndexerEntry>,
    searchers: HashMap<String, SearcherConstructor>,
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("stores", &self.selectors(BackendKind::Store))
            .field("indexers", &self.selectors(BackendKind::Indexer))
            .field("searchers", &self.selectors(BackendKind::Searcher))
            .finish()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in backends.
    ///
    /// The `memory` store keeps its repositories for the lifetime of this
    /// registry and its clones.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register_store(
            FilesystemStore::BACKEND_NAME,
            |ctx| Ok(Arc::new(DirectoryDepot::new(ctx.storage_root()?)) as Arc<dyn RepositoryDepot>),
            |ctx, repo, locks| {
                Ok(Arc::new(FilesystemStore::from_context(ctx, repo, locks)?)
                    as Arc<dyn DocumentStore>)
            },
        );

        let memory = MemoryDepot::new();
        let memory_open = memory.clone();
        registry.register_store(
            MemoryStore::BACKEND_NAME,
            move |_| Ok(Arc::new(memory.clone()) as Arc<dyn RepositoryDepot>),
            move |ctx, repo, locks| {
                Ok(Arc::new(memory_open.open(repo, locks, ctx.lock_timeout()?)?)
                    as Arc<dyn DocumentStore>)
            },
        );

        registry.register_indexer(
            InvertedIndexer::BACKEND_NAME,
            |ctx| {
                Ok(Arc::new(InvertedIndexDepot::new(ctx.index_root()?)) as Arc<dyn RepositoryDepot>)
            },
            |ctx, repo| {
                Ok(Arc::new(InvertedIndexer::from_context(ctx, repo)?) as Arc<dyn Indexer>)
            },
        );

        registry.register_searcher(InvertedSearcher::BACKEND_NAME, |ctx, repo| {
            Ok(Arc::new(InvertedSearcher::from_context(ctx, repo)?) as Arc<dyn Searcher>)
        });

        registry
    }

    /// Registers a store backend under `name`, replacing any previous one.
    ///
    /// The opened store must serialize writes through the lock table it is
    /// given: the manager holds guards from that table across its write
    /// sequences and hands them to `put_locked`/`remove_locked`.
    pub fn register_store<D, O>(&mut self, name: impl Into<String>, depot: D, open: O)
    where
        D: Fn(&RepositoryContext) -> Result<Arc<dyn RepositoryDepot>> + Send + Sync + 'static,
        O: Fn(&RepositoryContext, &str, Arc<LockTable>) -> Result<Arc<dyn DocumentStore>>
            + Send
            + Sync
            + 'static,
    {
        self.stores.insert(
            name.into(),
            StoreEntry {
                depot: Arc::new(depot),
                open: Arc::new(open),
            },
        );
    }

    /// Registers an indexer backend under `name`, replacing any previous one.
    pub fn register_indexer<D, O>(&mut self, name: impl Into<String>, depot: D, open: O)
    where
        D: Fn(&RepositoryContext) -> Result<Arc<dyn RepositoryDepot>> + Send + Sync + 'static,
        O: Fn(&RepositoryContext, &str) -> Result<Arc<dyn Indexer>> + Send + Sync + 'static,
    {
        self.indexers.insert(
            name.into(),
            IndexerEntry {
                depot: Arc::new(depot),
                open: Arc::new(open),
            },
        );
    }

    /// Registers a searcher backend under `name`, replacing any previous one.
    pub fn register_searcher<O>(&mut self, name: impl Into<String>, open: O)
    where
        O: Fn(&RepositoryContext, &str) -> Result<Arc<dyn Searcher>> + Send + Sync + 'static,
    {
        self.searchers.insert(name.into(), Arc::new(open));
    }

    /// Returns the registered selector names of one kind, sorted.
    #[must_use]
    pub fn selectors(&self, kind: BackendKind) -> Vec<&str> {
        let mut names: Vec<&str> = match kind {
            BackendKind::Store => self.stores.keys().map(String::as_str).collect(),
            BackendKind::Indexer => self.indexers.keys().map(String::as_str).collect(),
            BackendKind::Searcher => self.searchers.keys().map(String::as_str).collect(),
        };
        names.sort_unstable();
        names
    }

    fn unknown(kind: BackendKind, selector: &str) -> Error {
        Error::initialization(
            selector,
            format!("no {} backend registered under this name", kind.as_str()),
        )
    }

    fn store_entry(&self, context: &RepositoryContext) -> Result<&StoreEntry> {
        let selector = context.selector(BackendKind::Store);
        self.stores
            .get(selector)
            .ok_or_else(|| Self::unknown(BackendKind::Store, selector))
    }

    fn indexer_entry(&self, context: &RepositoryContext) -> Result<&IndexerEntry> {
        let selector = context.selector(BackendKind::Indexer);
        self.indexers
            .get(selector)
            .ok_or_else(|| Self::unknown(BackendKind::Indexer, selector))
    }

    /// Builds the depot of the store selected by `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] for an unknown selector or an
    /// incomplete context.
    pub fn store_depot(&self, context: &RepositoryContext) -> Result<Arc<dyn RepositoryDepot>> {
        (self.store_entry(context)?.depot)(context)
    }

    /// Builds the depot of the indexer selected by `context`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] for an unknown selector or an
    /// incomplete context.
    pub fn index_depot(&self, context: &RepositoryContext) -> Result<Arc<dyn RepositoryDepot>> {
        (self.indexer_entry(context)?.depot)(context)
    }

    /// Opens the store selected by `context` for `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is unknown or the backend fails to open.
    pub fn create_store(
        &self,
        context: &RepositoryContext,
        repository: &str,
        locks: Arc<LockTable>,
    ) -> Result<Arc<dyn DocumentStore>> {
        let store = (self.store_entry(context)?.open)(context, repository, locks)?;
        tracing::debug!(repository, backend = store.backend_name(), "Created store backend");
        Ok(store)
    }

    /// Opens the indexer selected by `context` for `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is unknown or the backend fails to open.
    pub fn create_indexer(
        &self,
        context: &RepositoryContext,
        repository: &str,
    ) -> Result<Arc<dyn Indexer>> {
        let indexer = (self.indexer_entry(context)?.open)(context, repository)?;
        tracing::debug!(repository, backend = indexer.backend_name(), "Created indexer backend");
        Ok(indexer)
    }

    /// Opens the searcher selected by `context` for `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector is unknown or the backend fails to open.
    pub fn create_searcher(
        &self,
        context: &RepositoryContext,
        repository: &str,
    ) -> Result<Arc<dyn Searcher>> {
        let selector = context.selector(BackendKind::Searcher);
        let open = self
            .searchers
            .get(selector)
            .ok_or_else(|| Self::unknown(BackendKind::Searcher, selector))?;
        open(context, repository)
    }
}

//! Storage layer abstraction.
//!
//! This module provides a two-layer storage architecture:
//! - **Persistence**: Authoritative document storage (Filesystem, Memory)
//! - **Index**: Derived inverted index for narrowing and full-text search
//!
//! Writes to the same document are serialized through a shared
//! [`LockTable`].

// Allow significant_drop_tightening - guards are held for the whole write on purpose.
#![allow(clippy::significant_drop_tightening)]
// Allow manual_let_else for clearer error handling in some contexts.
#![allow(clippy::manual_let_else)]
// Allow cast precision loss for duration metrics.
#![allow(clippy::cast_precision_loss)]

pub mod index;
pub mod lock;
pub mod persistence;
pub mod traits;

pub use index::{InvertedIndexDepot, InvertedIndexer, InvertedSearcher};
pub use lock::{LockGuard, LockTable};
pub use persistence::{DirectoryDepot, FilesystemStore, MemoryDepot, MemoryStore};
pub use traits::{DocumentStore, Indexer, RepositoryDepot, Searcher, is_safe_repository_name};

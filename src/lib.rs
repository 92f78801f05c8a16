//! # docrepo
//!
//! A small document repository: semi-structured documents backed by a
//! pluggable store and a derived inverted index.
//!
//! ## Features
//!
//! - Documents with ordered metadata, typed relations, a text/markup body,
//!   and named extensions
//! - File-backed store writing one self-describing JSON tree per document
//! - Inverted index per repository with narrowing (AND) search, full-text
//!   term search, and reverse-relation lookup
//! - Advisory per-document lock table serializing concurrent writes
//! - Configuration-driven backend registry
//!
//! ## Example
//!
//! ```rust,ignore
//! use docrepo::{Document, Metadatum, RepositoryManager, SearchCriteria};
//!
//! let manager = RepositoryManager::from_config(&config);
//! manager.create_repository("notes")?;
//!
//! let doc = Document::new().with_metadatum(Metadatum::with_value("type", "note"));
//! manager.store("notes", &doc)?;
//!
//! let ids = manager.search("notes", &SearchCriteria::new().with("type", "note"))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{BackendKind, DocRepoConfig, RepositoryContext};
pub use models::{
    Body, DocId, Document, Extension, Metadatum, Relation, SearchCriteria, SearchHit,
};
pub use services::{BackendRegistry, RepositoryManager};
pub use storage::{DocumentStore, Indexer, LockTable, RepositoryDepot, Searcher};

/// Error type for docrepo operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InitializationFailure` | A backend or its configuration cannot be constructed |
/// | `AccessFailure` | Storage or index I/O fails, or a document lock times out |
/// | `DocumentNotFound` | A document ID is absent from the store or index |
/// | `DocumentExists` | A non-overwriting put hits an existing ID |
/// | `ParseFailure` | Stored bytes do not deserialize to a document |
/// | `NameNotStored` | A requested metadata name has no field in the index |
/// | `InvalidInput` | Unsafe IDs or repository names, reserved names, bad CLI input |
#[derive(Debug, ThisError)]
pub enum Error {
    /// A backend could not be constructed. Not retried automatically.
    #[error("failed to initialize backend '{backend}': {cause}")]
    InitializationFailure {
        /// The backend selector or component being built.
        backend: String,
        /// The underlying cause.
        cause: String,
    },

    /// Reading or writing storage or the index failed.
    ///
    /// May be transient; callers may retry.
    #[error("operation '{operation}' failed: {cause}")]
    AccessFailure {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// No document with this ID exists.
    #[error("document not found: {0}")]
    DocumentNotFound(DocId),

    /// A document with this ID already exists.
    #[error("document already exists: {0}")]
    DocumentExists(DocId),

    /// The stored document is corrupt or malformed.
    #[error("failed to parse document '{id}': {cause}")]
    ParseFailure {
        /// The document whose stored form failed to parse.
        id: DocId,
        /// The underlying cause.
        cause: String,
    },

    /// No indexed field carries this metadata name.
    #[error("metadata name not stored: {0}")]
    NameNotStored(String),

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Builds an [`Error::AccessFailure`] from any displayable cause.
    pub fn access(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::AccessFailure {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::InitializationFailure`] from any displayable cause.
    pub fn initialization(backend: &str, cause: impl std::fmt::Display) -> Self {
        Self::InitializationFailure {
            backend: backend.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::AccessFailure { .. })
    }

    /// Returns true for [`Error::DocumentNotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::DocumentNotFound(_))
    }
}

/// Result type alias for docrepo operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Repository services.
//!
//! The [`RepositoryManager`] orchestrates the storage backends built by the
//! [`BackendRegistry`].

mod manager;
mod registry;

pub use manager::{RESERVED_REPOSITORY_NAMES, RepositoryManager};
pub use registry::{
    BackendRegistry, DepotConstructor, IndexerConstructor, SearcherConstructor, StoreConstructor,
};

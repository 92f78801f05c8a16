//! Storage backend traits.

mod depot;
mod indexer;
mod searcher;
mod store;

pub use depot::{RepositoryDepot, is_safe_repository_name};
pub use indexer::Indexer;
pub use searcher::Searcher;
pub use store::DocumentStore;

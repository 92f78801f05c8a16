//! Inverted index backend.
//!
//! The index for repository `r` lives at `{index.root}/r/index.json`. The
//! [`InvertedIndexer`] owns writes; [`InvertedSearcher`] instances read a
//! fresh snapshot of the file per call.

pub mod analysis;
mod indexer;
mod inverted;
mod searcher;

pub use indexer::{InvertedIndexDepot, InvertedIndexer};
pub use inverted::{INDEX_FILE_NAME, IndexEntry, IndexedRelation, InvertedIndex};
pub use searcher::InvertedSearcher;

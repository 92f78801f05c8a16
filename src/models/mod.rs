//! Data models for docrepo.
//!
//! Pure data and invariants; nothing in this module performs I/O.

mod body;
mod document;
mod search;

pub use body::{Body, DEFAULT_MIME_TYPE, is_tagged_mime_type, strip_markup};
pub use document::{DEFAULT_DATA_TYPE, DocId, Document, Extension, Metadatum, Relation};
pub use search::{SearchCriteria, SearchHit};

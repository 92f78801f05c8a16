//! Document store implementations.

mod filesystem;
pub mod format;
mod memory;

pub use filesystem::{DirectoryDepot, FilesystemStore};
pub use memory::{MemoryDepot, MemoryStore};

//! Repository depot trait.

use crate::Result;

/// Creates, locates, and deletes named repositories for one backend kind.
pub trait RepositoryDepot: Send + Sync {
    /// Allocates storage for `repository`. Creating an existing repository is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unsafe or storage cannot be allocated.
    fn create(&self, repository: &str) -> Result<()>;

    /// Recursively deletes `repository`. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is unsafe or storage cannot be deleted.
    fn destroy(&self, repository: &str) -> Result<bool>;

    /// Returns true if `repository` exists.
    fn exists(&self, repository: &str) -> bool;

    /// Lists repository names, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the depot cannot be listed.
    fn list(&self) -> Result<Vec<String>>;
}

/// Checks that a repository name is a safe single path component.
#[must_use]
pub fn is_safe_repository_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
}

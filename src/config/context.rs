//! Ordered key/value configuration consumed by backend constructors.

use super::BackendKind;
use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Key for the document storage root directory.
pub const STORAGE_ROOT: &str = "storage.root";

/// Key for the index root directory.
pub const INDEX_ROOT: &str = "index.root";

/// Key for the document lock timeout in milliseconds.
pub const LOCK_TIMEOUT_MS: &str = "lock.timeout_ms";

/// Lock timeout used when the context does not set one.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// An ordered string-keyed configuration bag.
///
/// Keys are unique; setting an existing key replaces its value in place, so
/// iteration order is always first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryContext {
    entries: Vec<(String, String)>,
}

impl RepositoryContext {
    /// Creates an empty context.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Sets `key` to `value`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            },
        }
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if `key` is set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the context is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a required path value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the key is missing or empty.
    pub fn path(&self, key: &str) -> Result<PathBuf> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(PathBuf::from(v)),
            _ => Err(Error::initialization(
                key,
                format!("repository context has no value for '{key}'"),
            )),
        }
    }

    /// Returns the storage root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `storage.root` is not set.
    pub fn storage_root(&self) -> Result<PathBuf> {
        self.path(STORAGE_ROOT)
    }

    /// Returns the index root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if `index.root` is not set.
    pub fn index_root(&self) -> Result<PathBuf> {
        self.path(INDEX_ROOT)
    }

    /// Returns the backend selector for `kind`, falling back to its default.
    #[must_use]
    pub fn selector(&self, kind: BackendKind) -> &str {
        self.get(kind.selector_key())
            .unwrap_or_else(|| kind.default_selector())
    }

    /// Returns the document lock timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the value is not an integer.
    pub fn lock_timeout(&self) -> Result<Duration> {
        self.get(LOCK_TIMEOUT_MS).map_or(Ok(DEFAULT_LOCK_TIMEOUT), |v| {
            v.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| Error::initialization(LOCK_TIMEOUT_MS, e))
        })
    }
}

impl<K, V> FromIterator<(K, V)> for RepositoryContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut context = Self::new();
        for (k, v) in iter {
            context.set(k, v);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut ctx = RepositoryContext::new().with("a", "1").with("b", "2");
        assert_eq!(ctx.set("a", "3"), Some("1".to_string()));

        let entries: Vec<_> = ctx.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_remove() {
        let mut ctx = RepositoryContext::new().with("a", "1");
        assert_eq!(ctx.remove("a"), Some("1".to_string()));
        assert_eq!(ctx.remove("a"), None);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_missing_path_is_initialization_failure() {
        let ctx = RepositoryContext::new().with(INDEX_ROOT, "  ");
        assert!(matches!(
            ctx.storage_root(),
            Err(Error::InitializationFailure { .. })
        ));
        assert!(matches!(
            ctx.index_root(),
            Err(Error::InitializationFailure { .. })
        ));
    }

    #[test]
    fn test_selector_defaults() {
        let ctx = RepositoryContext::new().with(BackendKind::Store.selector_key(), "memory");
        assert_eq!(ctx.selector(BackendKind::Store), "memory");
        assert_eq!(ctx.selector(BackendKind::Indexer), "inverted");
        assert_eq!(ctx.selector(BackendKind::Searcher), "inverted");
    }

    #[test]
    fn test_lock_timeout() {
        assert_eq!(
            RepositoryContext::new().lock_timeout().unwrap(),
            DEFAULT_LOCK_TIMEOUT
        );
        let ctx = RepositoryContext::new().with(LOCK_TIMEOUT_MS, "250");
        assert_eq!(ctx.lock_timeout().unwrap(), Duration::from_millis(250));
        let ctx = RepositoryContext::new().with(LOCK_TIMEOUT_MS, "soon");
        assert!(ctx.lock_timeout().is_err());
    }

    #[test]
    fn test_from_iter_dedupes_keys() {
        let ctx: RepositoryContext = [("a", "1"), ("b", "2"), ("a", "3")].into_iter().collect();
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get("a"), Some("3"));
    }
}

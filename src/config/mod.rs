//! Configuration management.

mod context;

pub use context::{
    DEFAULT_LOCK_TIMEOUT, INDEX_ROOT, LOCK_TIMEOUT_MS, RepositoryContext, STORAGE_ROOT,
};

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default directory name under the platform data dir.
const APP_DIR_NAME: &str = "docrepo";

/// The three backend kinds a repository is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Document store (system of record).
    Store,
    /// Index writer.
    Indexer,
    /// Read-only index query surface.
    Searcher,
}

impl BackendKind {
    /// Returns the context key holding this kind's selector.
    #[must_use]
    pub const fn selector_key(self) -> &'static str {
        match self {
            Self::Store => "backend.store",
            Self::Indexer => "backend.indexer",
            Self::Searcher => "backend.searcher",
        }
    }

    /// Returns the selector used when the context names none.
    #[must_use]
    pub const fn default_selector(self) -> &'static str {
        match self {
            Self::Store => "filesystem",
            Self::Indexer | Self::Searcher => "inverted",
        }
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Store => "store",
            Self::Indexer => "indexer",
            Self::Searcher => "searcher",
        }
    }
}

/// Logging settings as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `docrepo=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Optional log file (appended to).
    pub file: Option<PathBuf>,
}

/// Main configuration for docrepo.
#[derive(Debug, Clone)]
pub struct DocRepoConfig {
    /// Root directory for stored documents.
    pub storage_root: PathBuf,
    /// Root directory for search indexes.
    pub index_root: PathBuf,
    /// Store backend selector.
    pub store_backend: String,
    /// Indexer backend selector.
    pub indexer_backend: String,
    /// Searcher backend selector.
    pub searcher_backend: String,
    /// Document lock timeout in milliseconds.
    pub lock_timeout_ms: u64,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Storage root.
    pub storage_root: Option<String>,
    /// Index root.
    pub index_root: Option<String>,
    /// Lock timeout in milliseconds.
    pub lock_timeout_ms: Option<u64>,
    /// Backend selectors.
    pub backends: Option<ConfigFileBackends>,
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
}

/// Backends section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileBackends {
    /// Store selector.
    pub store: Option<String>,
    /// Indexer selector.
    pub indexer: Option<String>,
    /// Searcher selector.
    pub searcher: Option<String>,
}

impl Default for DocRepoConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            storage_root: data_dir.join("documents"),
            index_root: data_dir.join("index"),
            store_backend: BackendKind::Store.default_selector().to_string(),
            indexer_backend: BackendKind::Indexer.default_selector().to_string(),
            searcher_backend: BackendKind::Searcher.default_selector().to_string(),
            lock_timeout_ms: u64::try_from(DEFAULT_LOCK_TIMEOUT.as_millis()).unwrap_or(5_000),
            logging: LoggingSettings::default(),
        }
    }
}

/// Returns the platform data directory for docrepo.
///
/// Falls back to `./.docrepo` when no home directory can be resolved.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".docrepo"),
        |dirs| dirs.data_dir().join(APP_DIR_NAME),
    )
}

impl DocRepoConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration rooted at a single data directory.
    #[must_use]
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            storage_root: data_dir.join("documents"),
            index_root: data_dir.join("index"),
            ..Self::default()
        }
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::initialization("config", format!("{}: {e}", path.display())))?;

        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::initialization("config", e))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `{config_dir}/docrepo/config.toml`; returns defaults if the file
    /// is missing or unreadable.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let path = base_dirs.config_dir().join(APP_DIR_NAME).join("config.toml");
        if path.exists() {
            match Self::load_from_file(&path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file"),
            }
        }

        Self::default()
    }

    /// Applies `DOCREPO_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("DOCREPO_STORAGE_ROOT") {
            self.storage_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCREPO_INDEX_ROOT") {
            self.index_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("DOCREPO_LOCK_TIMEOUT_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                self.lock_timeout_ms = parsed;
            }
        }
        if let Ok(v) = std::env::var("DOCREPO_LOG") {
            self.logging.level = Some(v);
        }
        self
    }

    /// Converts a `ConfigFile` to `DocRepoConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(storage_root) = file.storage_root {
            config.storage_root = PathBuf::from(storage_root);
        }
        if let Some(index_root) = file.index_root {
            config.index_root = PathBuf::from(index_root);
        }
        if let Some(timeout) = file.lock_timeout_ms {
            config.lock_timeout_ms = timeout;
        }
        if let Some(backends) = file.backends {
            if let Some(v) = backends.store {
                config.store_backend = v;
            }
            if let Some(v) = backends.indexer {
                config.indexer_backend = v;
            }
            if let Some(v) = backends.searcher {
                config.searcher_backend = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Builds the repository context handed to backend constructors.
    #[must_use]
    pub fn to_context(&self) -> RepositoryContext {
        RepositoryContext::new()
            .with(STORAGE_ROOT, self.storage_root.to_string_lossy())
            .with(INDEX_ROOT, self.index_root.to_string_lossy())
            .with(BackendKind::Store.selector_key(), &self.store_backend)
            .with(BackendKind::Indexer.selector_key(), &self.indexer_backend)
            .with(BackendKind::Searcher.selector_key(), &self.searcher_backend)
            .with(LOCK_TIMEOUT_MS, self.lock_timeout_ms.to_string())
    }

    /// Sets the storage root.
    #[must_use]
    pub fn with_storage_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_root = path.into();
        self
    }

    /// Sets the index root.
    #[must_use]
    pub fn with_index_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_root = path.into();
        self
    }
}

//! Binary entry point for docrepo.
//!
//! Administrative CLI over the repository manager. Every command prints JSON
//! on stdout; errors go to stderr with a non-zero exit code.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use docrepo::observability::{self, LoggingConfig};
use docrepo::storage::persistence::format::{self, StoredDocument};
use docrepo::{DocId, DocRepoConfig, Error, RepositoryManager, SearchCriteria};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// docrepo - semi-structured document repositories with an inverted index.
#[derive(Parser)]
#[command(name = "docrepo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "DOCREPO_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create a repository.
    Create {
        /// Repository name.
        repo: String,
    },

    /// Delete a repository and its index.
    Destroy {
        /// Repository name.
        repo: String,
    },

    /// List repositories.
    List,

    /// Store a document read from a JSON file.
    Put {
        /// Repository name.
        repo: String,

        /// File holding the document in the on-disk format.
        file: PathBuf,

        /// Fail if a document with the same ID exists.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Print a document.
    Get {
        /// Repository name.
        repo: String,

        /// Document ID.
        id: String,
    },

    /// Remove a document.
    Remove {
        /// Repository name.
        repo: String,

        /// Document ID.
        id: String,
    },

    /// Narrowing search over metadata.
    Search {
        /// Repository name.
        repo: String,

        /// Required `name=value` pair; repeat for AND.
        #[arg(short, long = "where", value_name = "NAME=VALUE", value_parser = parse_criterion)]
        criteria: Vec<(String, String)>,

        /// Extra metadata field to return with each hit; implies full documents.
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Full-text search over body and extension text.
    Text {
        /// Repository name.
        repo: String,

        /// Query terms; all must match.
        query: String,
    },

    /// List documents that declare a relation to a document.
    Reverse {
        /// Repository name.
        repo: String,

        /// Target document ID.
        id: String,

        /// Relation type; any type when omitted.
        #[arg(short = 't', long = "type")]
        relation_type: Option<String>,
    },

    /// List metadata names present in the index.
    Names {
        /// Repository name.
        repo: String,
    },

    /// Rebuild a repository's index from its documents.
    Reindex {
        /// Repository name.
        repo: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let logging = LoggingConfig::from_settings(&config.logging, cli.verbose)
        .and_then(|logging| observability::init_logging(&logging));
    if let Err(e) = logging {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let manager = RepositoryManager::from_config(&config);
    match run_command(&manager, cli.command) {
        Ok(output) => {
            println!("{output:#}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from `path` or the default location, then applies
/// environment overrides.
fn load_config(path: Option<&Path>) -> docrepo::Result<DocRepoConfig> {
    let config = match path {
        Some(path) => DocRepoConfig::load_from_file(path)?,
        None => DocRepoConfig::load_default(),
    };
    Ok(config.with_env_overrides())
}

/// Parses a `name=value` search criterion.
fn parse_criterion(pair: &str) -> Result<(String, String), String> {
    SearchCriteria::parse_pair(pair).ok_or_else(|| format!("expected NAME=VALUE, got '{pair}'"))
}

/// Runs the selected command and returns its JSON output.
fn run_command(manager: &RepositoryManager, command: Commands) -> docrepo::Result<serde_json::Value> {
    match command {
        Commands::Create { repo } => {
            manager.create_repository(&repo)?;
            Ok(json!({ "created": repo }))
        },
        Commands::Destroy { repo } => {
            let destroyed = manager.destroy_repository(&repo)?;
            Ok(json!({ "repository": repo, "destroyed": destroyed }))
        },
        Commands::List => Ok(json!(manager.list_repositories()?)),
        Commands::Put {
            repo,
            file,
            no_overwrite,
        } => {
            let contents = std::fs::read_to_string(&file).map_err(|e| {
                Error::InvalidInput(format!("cannot read {}: {e}", file.display()))
            })?;
            let document = format::parse_document(&contents)?;
            let id = manager.put(&repo, &document, !no_overwrite)?;
            Ok(json!({ "stored": id }))
        },
        Commands::Get { repo, id } => {
            let document = manager.fetch(&repo, &DocId::new(id))?;
            serde_json::to_value(StoredDocument::from(&document))
                .map_err(|e| Error::access("render_document", e))
        },
        Commands::Remove { repo, id } => {
            let id = DocId::new(id);
            let removed = manager.remove(&repo, &id)?;
            Ok(json!({ "id": id, "removed": removed }))
        },
        Commands::Search {
            repo,
            criteria,
            fields,
        } => {
            let criteria: SearchCriteria = criteria.into_iter().collect();
            if fields.is_empty() {
                return Ok(json!(manager.search(&repo, &criteria)?));
            }
            let hits = manager.search_documents(&repo, &criteria, &fields)?;
            Ok(hits
                .iter()
                .map(|hit| json!({ "id": hit.id(), "fields": hit.fields }))
                .collect())
        },
        Commands::Text { repo, query } => Ok(json!(manager.text_search(&repo, &query)?)),
        Commands::Reverse {
            repo,
            id,
            relation_type,
        } => Ok(json!(manager.reverse_related(
            &repo,
            &DocId::new(id),
            relation_type.as_deref()
        )?)),
        Commands::Names { repo } => Ok(json!(manager.metadata_names(&repo)?)),
        Commands::Reindex { repo } => {
            let indexed = manager.reindex(&repo)?;
            Ok(json!({ "repository": repo, "indexed": indexed }))
        },
    }
}

//! Snapshot reader over a repository's inverted index.

use super::inverted::{INDEX_FILE_NAME, InvertedIndex};
use crate::config::RepositoryContext;
use crate::models::{DocId, SearchCriteria, SearchHit};
use crate::storage::persistence::DirectoryDepot;
use crate::storage::traits::{DocumentStore, Searcher};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Read-only searcher that loads a fresh snapshot of `index.json` per call.
///
/// Holds no state between calls and never blocks the indexer. Instances
/// are cheap and not meant to be cached.
#[derive(Debug, Clone)]
pub struct InvertedSearcher {
    repository: String,
    index_path: PathBuf,
}

impl InvertedSearcher {
    /// Selector name in the backend registry.
    pub const BACKEND_NAME: &'static str = "inverted";

    /// Opens a searcher over an existing repository's index under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InitializationFailure`] if the index directory is missing.
    pub fn open(root: &Path, repository: &str) -> Result<Self> {
        let dir = DirectoryDepot::new(root).repository_path(repository)?;
        if !dir.is_dir() {
            return Err(Error::initialization(
                Self::BACKEND_NAME,
                format!("index for repository '{repository}' does not exist"),
            ));
        }

        Ok(Self {
            repository: repository.to_string(),
            index_path: dir.join(INDEX_FILE_NAME),
        })
    }

    /// Opens a searcher using `index.root` from `context`.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is incomplete or the index is missing.
    pub fn from_context(context: &RepositoryContext, repository: &str) -> Result<Self> {
        Self::open(&context.index_root()?, repository)
    }

    fn snapshot(&self) -> Result<InvertedIndex> {
        InvertedIndex::load(&self.index_path)
    }
}

impl Searcher for InvertedSearcher {
    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }

    #[instrument(skip(self), fields(repository = %self.repository, criteria = criteria.len()))]
    fn narrowing_search(&self, criteria: &SearchCriteria) -> Result<Vec<DocId>> {
        Ok(self.snapshot()?.narrowing_search(criteria))
    }

    #[instrument(skip(self, store), fields(repository = %self.repository))]
    fn fetch_documents(
        &self,
        criteria: &SearchCriteria,
        extra_fields: &[String],
        store: &dyn DocumentStore,
    ) -> Result<Vec<SearchHit>> {
        let index = self.snapshot()?;
        let wanted: Vec<&str> = criteria
            .iter()
            .map(|(name, _)| name)
            .chain(extra_fields.iter().map(String::as_str))
            .collect();

        let mut hits = Vec::new();
        for id in index.narrowing_search(criteria) {
            let document = match store.get(&id) {
                Ok(document) => document,
                Err(Error::DocumentNotFound(_)) => {
                    tracing::warn!(doc.id = %id, "Index entry has no stored document, skipping");
                    continue;
                },
                Err(e) => return Err(e),
            };

            let entry = index.entry(&id);
            let fields = wanted
                .iter()
                .map(|name| {
                    let values = entry
                        .and_then(|e| e.fields.get(*name))
                        .cloned()
                        .unwrap_or_default();
                    ((*name).to_string(), values)
                })
                .collect();
            hits.push(SearchHit { document, fields });
        }
        Ok(hits)
    }

    fn metadata_by_name(&self, name: &str) -> Result<BTreeMap<DocId, Vec<String>>> {
        self.snapshot()?.metadata_by_name(name)
    }

    fn metadatum_for_doc(&self, name: &str, id: &DocId) -> Result<Vec<String>> {
        self.snapshot()?.metadatum_for_doc(name, id)
    }

    #[instrument(skip(self), fields(repository = %self.repository, doc.id = %id))]
    fn reverse_related(&self, id: &DocId, relation_type: Option<&str>) -> Result<Vec<DocId>> {
        Ok(self.snapshot()?.reverse_related(id, relation_type))
    }

    fn all_metadata_names(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.metadata_names())
    }

    #[instrument(skip(self), fields(repository = %self.repository))]
    fn text_search(&self, query: &str) -> Result<Vec<DocId>> {
        Ok(self.snapshot()?.text_search(query))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.snapshot()?.len())
    }

    fn is_reusable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, Metadatum, Relation};
    use crate::storage::LockTable;
    use crate::storage::index::{InvertedIndexDepot, InvertedIndexer};
    use crate::storage::persistence::MemoryStore;
    use crate::storage::traits::{Indexer, RepositoryDepot};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        indexer: InvertedIndexer,
        searcher: InvertedSearcher,
        store: MemoryStore,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        InvertedIndexDepot::new(dir.path()).create("repo").unwrap();
        let indexer = InvertedIndexer::open(dir.path(), "repo").unwrap();
        let searcher = InvertedSearcher::open(dir.path(), "repo").unwrap();
        let store = MemoryStore::new(Arc::new(LockTable::new()), Duration::ZERO);

        let docs = [
            Document::with_id("A")
                .with_metadatum(Metadatum::with_value("type", "note"))
                .with_metadatum(Metadatum::with_value("title", "x")),
            Document::with_id("B")
                .with_metadatum(Metadatum::with_value("type", "note"))
                .with_metadatum(Metadatum::with_value("title", "y"))
                .with_relation(Relation::new("parentOf", "C")),
            Document::with_id("C").with_metadatum(Metadatum::with_value("type", "course")),
        ];
        for doc in &docs {
            store.put(doc, true).unwrap();
            indexer.update(doc).unwrap();
        }

        Fixture {
            _dir: dir,
            indexer,
            searcher,
            store,
        }
    }

    #[test]
    fn test_searcher_sees_latest_writes() {
        let f = fixture();
        let criteria = SearchCriteria::new().with("type", "note");
        assert_eq!(f.searcher.narrowing_search(&criteria).unwrap().len(), 2);

        f.indexer.delete_from_index(&DocId::new("A")).unwrap();
        assert_eq!(
            f.searcher.narrowing_search(&criteria).unwrap(),
            vec![DocId::new("B")]
        );
        assert_eq!(f.searcher.count().unwrap(), 2);
    }

    #[test]
    fn test_fetch_documents_with_fields() {
        let f = fixture();
        let criteria = SearchCriteria::new().with("type", "note");
        let hits = f
            .searcher
            .fetch_documents(&criteria, &["title".to_string()], &f.store)
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id().as_str(), "A");
        assert_eq!(hits[0].fields["type"], vec!["note"]);
        assert_eq!(hits[1].fields["title"], vec!["y"]);
        assert_eq!(hits[1].document.relations().len(), 1);
    }

    #[test]
    fn test_fetch_documents_skips_stale_entries() {
        let f = fixture();
        f.store.remove(&DocId::new("A")).unwrap();

        let hits = f
            .searcher
            .fetch_documents(&SearchCriteria::new(), &[], &f.store)
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id().as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
    }

    #[test]
    fn test_metadata_queries() {
        let f = fixture();

        assert_eq!(
            f.searcher.all_metadata_names().unwrap(),
            vec!["title", "type"]
        );
        assert_eq!(f.searcher.metadata_by_name("type").unwrap().len(), 3);
        assert_eq!(
            f.searcher
                .metadatum_for_doc("title", &DocId::new("B"))
                .unwrap(),
            vec!["y"]
        );
        assert!(matches!(
            f.searcher.metadata_by_name("missing"),
            Err(Error::NameNotStored(_))
        ));
    }

    #[test]
    fn test_reverse_related() {
        let f = fixture();
        let c = DocId::new("C");

        assert_eq!(
            f.searcher.reverse_related(&c, Some("parentOf")).unwrap(),
            vec![DocId::new("B")]
        );
        assert!(
            f.searcher
                .reverse_related(&c, Some("childOf"))
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_searcher_is_not_reusable() {
        let f = fixture();
        assert!(!f.searcher.is_reusable());
        assert!(f.indexer.is_reusable());
    }
}

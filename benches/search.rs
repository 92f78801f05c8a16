//! Benchmarks for search operations.
//!
//! Measures the read path over a filesystem-backed repository:
//! - Narrowing search with one and two criteria
//! - Full-text search over plain bodies
//! - Reverse relation lookup

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use docrepo::{Body, DocId, DocRepoConfig, Document, Metadatum, Relation, RepositoryManager, SearchCriteria};
use std::hint::black_box;
use tempfile::TempDir;

const REPO: &str = "bench";
const COLORS: [&str; 4] = ["red", "green", "blue", "yellow"];
const WORDS: [&str; 8] = [
    "storage", "index", "lock", "search", "relation", "metadata", "body", "extension",
];

/// Creates a repository populated with `count` documents.
fn populated_manager(dir: &TempDir, count: usize) -> RepositoryManager {
    let manager = RepositoryManager::from_config(&DocRepoConfig::in_dir(dir.path()));
    manager.create_repository(REPO).expect("create repository");

    for i in 0..count {
        let text = format!(
            "{} {} document number {i}",
            WORDS[i % WORDS.len()],
            WORDS[(i / WORDS.len()) % WORDS.len()]
        );
        let mut doc = Document::with_id(format!("doc-{i}"))
            .with_metadatum(Metadatum::with_value("color", COLORS[i % COLORS.len()]))
            .with_metadatum(Metadatum::with_value("bucket", (i % 10).to_string()))
            .with_body(Body::plain(text));
        if i > 0 {
            doc.push_relation(Relation::new("childOf", "doc-0"));
        }
        manager.store(REPO, &doc).expect("store document");
    }
    manager
}

fn bench_narrowing_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("narrowing_search");

    for count in [100, 1_000] {
        let dir = TempDir::new().unwrap();
        let manager = populated_manager(&dir, count);
        let one = SearchCriteria::new().with("color", "blue");
        let two = SearchCriteria::new().with("color", "blue").with("bucket", "3");

        group.bench_with_input(BenchmarkId::new("one_criterion", count), &one, |b, criteria| {
            b.iter(|| manager.search(REPO, black_box(criteria)).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("two_criteria", count), &two, |b, criteria| {
            b.iter(|| manager.search(REPO, black_box(criteria)).unwrap());
        });
    }

    group.finish();
}

fn bench_text_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_search");

    for count in [100, 1_000] {
        let dir = TempDir::new().unwrap();
        let manager = populated_manager(&dir, count);

        group.bench_with_input(BenchmarkId::new("two_terms", count), &count, |b, _| {
            b.iter(|| manager.text_search(REPO, black_box("storage index")).unwrap());
        });
    }

    group.finish();
}

fn bench_reverse_related(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_related");
    let target = DocId::new("doc-0");

    for count in [100, 1_000] {
        let dir = TempDir::new().unwrap();
        let manager = populated_manager(&dir, count);

        group.bench_with_input(BenchmarkId::new("typed", count), &target, |b, target| {
            b.iter(|| {
                manager
                    .reverse_related(REPO, black_box(target), Some("childOf"))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_narrowing_search,
    bench_text_search,
    bench_reverse_related
);
criterion_main!(benches);

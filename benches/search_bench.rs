//! Search benchmarks
//!
//! Benchmarks for the core search primitives using Criterion.
//! Run with: cargo bench

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use noema_graph::entity::Entity;
use noema_graph::search::bm25::Bm25Index;
use noema_graph::search::fuzzy::{fuzzy_search, FuzzySearchCache};
use noema_graph::search::ranked::RankedIndex;
use noema_graph::search::SearchFilter;
use noema_graph::text::{edit_distance, tokenize};

fn sample_entities(n: usize) -> HashMap<String, Entity> {
    let topics = ["machine learning", "distributed systems", "graph theory", "rust ownership", "sqlite storage"];
    (0..n)
        .map(|i| {
            let mut e = Entity::new(format!("entity-{i}"), "note");
            e.add_observation(format!("{} observation about {}", topics[i % topics.len()], i));
            e.importance = Some((i % 11) as u8);
            (e.name.clone(), e)
        })
        .collect()
}

fn bench_tokenize(c: &mut Criterion) {
    let text = "Machine Learning systems often rely on distributed, fault-tolerant storage!";
    c.bench_function("tokenize", |b| {
        b.iter(|| black_box(tokenize(text)));
    });
}

fn bench_edit_distance(c: &mut Criterion) {
    c.bench_function("edit_distance_short", |b| {
        b.iter(|| black_box(edit_distance("distributed systems", "distributed system")));
    });
}

fn bench_ranked_search(c: &mut Criterion) {
    let entities = sample_entities(500);
    let mut index = RankedIndex::new();
    index.rebuild(entities.values());
    let filter = SearchFilter::default();

    c.bench_function("ranked_search_500docs", |b| {
        b.iter(|| black_box(index.search(&entities, "machine learning systems", &filter)));
    });
}

fn bench_bm25_search(c: &mut Criterion) {
    let entities = sample_entities(500);
    let mut index = Bm25Index::new();
    index.rebuild(entities.values());
    index.finalize();
    let filter = SearchFilter::default();

    c.bench_function("bm25_search_500docs", |b| {
        b.iter(|| black_box(index.search(&entities, "machine learning systems", &filter)));
    });
}

fn bench_fuzzy_search_small(c: &mut Criterion) {
    let entities = sample_entities(100);
    let cache = FuzzySearchCache::new();
    let filter = SearchFilter::default();

    c.bench_function("fuzzy_search_100docs_singlethreaded", |b| {
        b.iter(|| black_box(fuzzy_search(&entities, &cache, "machne lerning", 0.7, &filter)));
    });
}

fn bench_fuzzy_search_large(c: &mut Criterion) {
    let entities = sample_entities(800);
    let cache = FuzzySearchCache::new();
    let filter = SearchFilter::default();

    c.bench_function("fuzzy_search_800docs_parallel", |b| {
        b.iter(|| black_box(fuzzy_search(&entities, &cache, "machne lerning", 0.6, &filter)));
    });
}

criterion_group!(
    benches,
    bench_tokenize,
    bench_edit_distance,
    bench_ranked_search,
    bench_bm25_search,
    bench_fuzzy_search_small,
    bench_fuzzy_search_large,
);
criterion_main!(benches);

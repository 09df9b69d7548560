//! Fuzzy (edit-distance) search
//!
//! `similarity(a, b) = 1 - edit_distance(a, b) / max(len(a), len(b))`.
//! Large, permissive queries (>= 500 entities and threshold < 0.8) are
//! sharded across a rayon thread pool; anything smaller runs single
//! threaded, and any worker panic falls back to the single-threaded path
//! rather than surfacing a partial result.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use rayon::prelude::*;

use crate::entity::Entity;
use crate::search::{ScoredMatch, SearchFilter};
use crate::text::edit_distance;

pub const DEFAULT_THRESHOLD: f64 = 0.7;
const PARALLEL_ENTITY_THRESHOLD: usize = 500;
const PARALLEL_SIMILARITY_CEILING: f64 = 0.8;
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
const CACHE_CAPACITY: usize = 100;
const WORKER_TIMEOUT: Duration = Duration::from_secs(30);

pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (edit_distance(a, b) as f64 / max_len as f64)
}

type CacheKey = (String, u64, Vec<String>, Option<u8>, Option<u8>, usize, Option<usize>);

fn cache_key(query_lc: &str, threshold: f64, filter: &SearchFilter) -> CacheKey {
    let mut tags = filter.tags.clone();
    tags.sort();
    (
        query_lc.to_string(),
        threshold.to_bits(),
        tags,
        filter.min_importance,
        filter.max_importance,
        filter.offset,
        filter.limit,
    )
}

pub struct FuzzySearchCache {
    entries: Mutex<LruCache<CacheKey, (Instant, Vec<ScoredMatch>)>>,
}

impl Default for FuzzySearchCache {
    fn default() -> Self {
        Self {
            entries: Mutex::new(LruCache::new(std::num::NonZeroUsize::new(CACHE_CAPACITY).unwrap())),
        }
    }
}

impl FuzzySearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &CacheKey) -> Option<Vec<ScoredMatch>> {
        let mut entries = self.entries.lock().unwrap();
        let (inserted, value) = entries.get(key)?;
        if inserted.elapsed() > CACHE_TTL {
            entries.pop(key);
            return None;
        }
        Some(value.clone())
    }

    fn put(&self, key: CacheKey, value: Vec<ScoredMatch>) {
        self.entries.lock().unwrap().put(key, (Instant::now(), value));
    }

    pub fn invalidate(&self) {
        self.entries.lock().unwrap().clear();
    }
}

fn score_chunk(chunk: &[&Entity], query_lc: &str, threshold: f64, filter: &SearchFilter) -> Vec<ScoredMatch> {
    chunk
        .iter()
        .filter(|e| filter.matches(e))
        .filter_map(|entity| {
            let name_sim = similarity(&entity.name.to_lowercase(), query_lc);
            let type_sim = similarity(&entity.entity_type, query_lc);
            let best = name_sim.max(type_sim);
            if best >= threshold {
                Some(ScoredMatch { name: entity.name.clone(), score: best })
            } else {
                None
            }
        })
        .collect()
}

/// Fuzzy search over every entity, scoring by the best of name/type
/// similarity, deduplicated by name, cached for `CACHE_TTL`.
pub fn fuzzy_search(
    entities: &std::collections::HashMap<String, Entity>,
    cache: &FuzzySearchCache,
    query: &str,
    threshold: f64,
    filter: &SearchFilter,
) -> Vec<ScoredMatch> {
    let query_lc = query.to_lowercase();
    let key = cache_key(&query_lc, threshold, filter);
    if let Some(cached) = cache.get(&key) {
        return cached;
    }

    let all: Vec<&Entity> = entities.values().collect();
    let use_parallel = all.len() >= PARALLEL_ENTITY_THRESHOLD && threshold < PARALLEL_SIMILARITY_CEILING;

    let mut scored = if use_parallel {
        run_parallel(&all, &query_lc, threshold, filter)
            .unwrap_or_else(|| score_chunk(&all, &query_lc, threshold, filter))
    } else {
        score_chunk(&all, &query_lc, threshold, filter)
    };

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then_with(|| a.name.cmp(&b.name)));
    let names: Vec<String> = scored.iter().map(|m| m.name.clone()).collect();
    let kept: HashSet<String> = filter.paginate(names).into_iter().collect();
    scored.retain(|m| kept.contains(&m.name));

    cache.put(key, scored.clone());
    scored
}

/// Shard `entities` across `min(num_cpus, chunks_needed)` rayon workers.
/// Returns `None` (triggering the single-threaded fallback) on panic or on
/// exceeding `WORKER_TIMEOUT`.
fn run_parallel(
    entities: &[&Entity],
    query_lc: &str,
    threshold: f64,
    filter: &SearchFilter,
) -> Option<Vec<ScoredMatch>> {
    let started = Instant::now();
    let num_workers = rayon::current_num_threads().max(1).min(entities.len().max(1));
    let chunk_size = entities.len().div_ceil(num_workers).max(1);

    let result = std::panic::catch_unwind(|| {
        entities
            .par_chunks(chunk_size)
            .map(|chunk| score_chunk(chunk, query_lc, threshold, filter))
            .reduce(Vec::new, |mut acc, mut chunk_result| {
                acc.append(&mut chunk_result);
                acc
            })
    });

    if started.elapsed() > WORKER_TIMEOUT {
        return None;
    }
    result.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_at_threshold_one() {
        assert!((similarity("same", "same") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn similarity_is_not_case_sensitive_by_itself() {
        // callers are expected to lowercase both sides before comparing
        assert!(similarity("alice", "alicia") < 1.0);
        assert!(similarity("alice", "alicia") > 0.5);
    }

    #[test]
    fn finds_near_matches_above_threshold() {
        let e = Entity::new("Alicia", "person");
        let entities: std::collections::HashMap<String, Entity> = [(e.name.clone(), e)].into_iter().collect();
        let cache = FuzzySearchCache::new();
        let results = fuzzy_search(&entities, &cache, "alice", 0.6, &SearchFilter::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "Alicia");
    }

    #[test]
    fn below_threshold_excluded() {
        let e = Entity::new("Zephyr", "person");
        let entities: std::collections::HashMap<String, Entity> = [(e.name.clone(), e)].into_iter().collect();
        let cache = FuzzySearchCache::new();
        let results = fuzzy_search(&entities, &cache, "alice", DEFAULT_THRESHOLD, &SearchFilter::default());
        assert!(results.is_empty());
    }
}

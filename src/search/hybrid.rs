//! Hybrid search: semantic + lexical + symbolic fusion
//!
//! Three lanes run concurrently. `semantic` is pluggable and may be absent
//! entirely (embedding generation is out of scope for this crate); when it
//! is, its weight is redistributed across the remaining lanes rather than
//! silently scored as zero. Each lane's raw scores are min-max normalized
//! independently before the weighted sum, so lanes on different scales
//! don't dominate each other.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::entity::Entity;
use crate::index::Indexes;
use crate::search::bm25::Bm25Index;
use crate::search::{SearchFilter, ScoredMatch};

pub const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.5;
pub const DEFAULT_LEXICAL_WEIGHT: f64 = 0.3;
pub const DEFAULT_SYMBOLIC_WEIGHT: f64 = 0.2;

/// Pluggable semantic lane. No implementation ships in this crate; callers
/// that have embeddings wire one in via the facade.
pub trait SemanticLane: Send + Sync {
    fn score(&self, query: &str, entities: &[&Entity]) -> Vec<(String, f64)>;
}

#[derive(Debug, Clone)]
pub struct LaneTiming {
    pub layer: &'static str,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
    pub result_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct HybridMatch {
    pub name: String,
    pub raw_scores: HashMap<&'static str, f64>,
    pub matched_layers: Vec<&'static str>,
    pub normalized_scores: HashMap<&'static str, f64>,
    pub combined_score: f64,
}

#[derive(Debug, Clone)]
pub struct HybridResult {
    pub matches: Vec<HybridMatch>,
    pub lane_timings: Vec<LaneTiming>,
}

fn normalize(scores: &HashMap<String, f64>) -> HashMap<String, f64> {
    if scores.is_empty() {
        return HashMap::new();
    }
    let min = scores.values().cloned().fold(f64::INFINITY, f64::min);
    let max = scores.values().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < 1e-12 {
        let value = if max != 0.0 { 1.0 } else { 0.0 };
        return scores.keys().map(|k| (k.clone(), value)).collect();
    }
    scores.iter().map(|(k, v)| (k.clone(), (v - min) / (max - min))).collect()
}

fn run_lane(
    layer: &'static str,
    f: impl FnOnce() -> Vec<ScoredMatch> + std::panic::UnwindSafe,
) -> (LaneTiming, HashMap<String, f64>) {
    let start = Instant::now();
    let result = std::panic::catch_unwind(f);
    let duration = start.elapsed();
    match result {
        Ok(scores) => {
            let map: HashMap<String, f64> = scores.into_iter().map(|m| (m.name, m.score)).collect();
            let timing = LaneTiming { layer, duration, success: true, error: None, result_count: map.len() };
            (timing, map)
        }
        Err(_) => {
            let timing = LaneTiming {
                layer,
                duration,
                success: false,
                error: Some("lane panicked".to_string()),
                result_count: 0,
            };
            (timing, HashMap::new())
        }
    }
}

/// Run all three lanes concurrently and fuse their normalized scores with
/// weighted sum. `semantic` is optional; its weight is redistributed across
/// whichever lanes actually ran when absent.
pub fn hybrid_search(
    entities: &HashMap<String, Entity>,
    indexes: &Indexes,
    bm25_index: &Bm25Index,
    semantic: Option<&dyn SemanticLane>,
    query: &str,
    filter: &SearchFilter,
) -> HybridResult {
    let entity_refs: Vec<&Entity> = entities.values().collect();

    let (lexical_timing, lexical_scores, symbolic_timing, symbolic_scores, semantic_timing, semantic_scores) =
        std::thread::scope(|scope| {
            let lexical_handle = scope.spawn(|| {
                run_lane("lexical", || bm25_index.search(entities, query, filter))
            });
            let symbolic_handle = scope.spawn(|| {
                run_lane("symbolic", || {
                    let needle = query.to_lowercase();
                    crate::search::basic::substring_search(entities, indexes, &needle, filter)
                        .into_iter()
                        .map(|name| ScoredMatch { name, score: 1.0 })
                        .collect()
                })
            });
            let semantic_result = semantic.map(|lane| {
                run_lane("semantic", || {
                    lane.score(query, &entity_refs)
                        .into_iter()
                        .map(|(name, score)| ScoredMatch { name, score })
                        .collect()
                })
            });

            let (lt, ls) = lexical_handle.join().unwrap_or_else(|_| {
                (
                    LaneTiming { layer: "lexical", duration: Duration::ZERO, success: false, error: Some("join failed".into()), result_count: 0 },
                    HashMap::new(),
                )
            });
            let (st, ss) = symbolic_handle.join().unwrap_or_else(|_| {
                (
                    LaneTiming { layer: "symbolic", duration: Duration::ZERO, success: false, error: Some("join failed".into()), result_count: 0 },
                    HashMap::new(),
                )
            });
            let (semt, sems) = match semantic_result {
                Some((t, s)) => (Some(t), s),
                None => (None, HashMap::new()),
            };
            (lt, ls, st, ss, semt, sems)
        });

    let lexical_norm = normalize(&lexical_scores);
    let symbolic_norm = normalize(&symbolic_scores);
    let semantic_norm = normalize(&semantic_scores);

    let mut weights: Vec<(&'static str, f64)> = vec![("lexical", DEFAULT_LEXICAL_WEIGHT), ("symbolic", DEFAULT_SYMBOLIC_WEIGHT)];
    if semantic.is_some() {
        weights.push(("semantic", DEFAULT_SEMANTIC_WEIGHT));
    }
    let total_weight: f64 = weights.iter().map(|(_, w)| w).sum();
    let weights: HashMap<&'static str, f64> =
        weights.into_iter().map(|(layer, w)| (layer, w / total_weight)).collect();

    let mut names: std::collections::HashSet<String> = union_of_keys(&lexical_scores, &symbolic_scores, &semantic_scores);

    let mut matches: Vec<HybridMatch> = names
        .drain()
        .filter(|name| entities.get(name).map(|e| filter.matches(e)).unwrap_or(false))
        .map(|name| {
            let mut raw_scores = HashMap::new();
            let mut normalized_scores = HashMap::new();
            let mut matched_layers = Vec::new();
            let mut combined = 0.0;

            if let Some(v) = lexical_scores.get(&name) {
                raw_scores.insert("lexical", *v);
                matched_layers.push("lexical");
                let n = *lexical_norm.get(&name).unwrap_or(&0.0);
                normalized_scores.insert("lexical", n);
                combined += n * weights.get("lexical").copied().unwrap_or(0.0);
            }
            if let Some(v) = symbolic_scores.get(&name) {
                raw_scores.insert("symbolic", *v);
                matched_layers.push("symbolic");
                let n = *symbolic_norm.get(&name).unwrap_or(&0.0);
                normalized_scores.insert("symbolic", n);
                combined += n * weights.get("symbolic").copied().unwrap_or(0.0);
            }
            if let Some(v) = semantic_scores.get(&name) {
                raw_scores.insert("semantic", *v);
                matched_layers.push("semantic");
                let n = *semantic_norm.get(&name).unwrap_or(&0.0);
                normalized_scores.insert("semantic", n);
                combined += n * weights.get("semantic").copied().unwrap_or(0.0);
            }

            HybridMatch { name, raw_scores, matched_layers, normalized_scores, combined_score: combined }
        })
        .collect();

    matches.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap()
            .then_with(|| a.name.cmp(&b.name))
    });

    let paged_names: Vec<String> = matches.iter().map(|m| m.name.clone()).collect();
    let kept: std::collections::HashSet<String> = filter.paginate(paged_names).into_iter().collect();
    matches.retain(|m| kept.contains(&m.name));

    let mut lane_timings = vec![lexical_timing, symbolic_timing];
    if let Some(t) = semantic_timing {
        lane_timings.push(t);
    }

    HybridResult { matches, lane_timings }
}

fn union_of_keys(
    a: &HashMap<String, f64>,
    b: &HashMap<String, f64>,
    c: &HashMap<String, f64>,
) -> std::collections::HashSet<String> {
    let mut set = std::collections::HashSet::new();
    set.extend(a.keys().cloned());
    set.extend(b.keys().cloned());
    set.extend(c.keys().cloned());
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuses_lexical_and_symbolic_matches() {
        let mut alice = Entity::new("Alice", "person");
        alice.add_observation("loves rust programming");
        let entities: HashMap<String, Entity> = [(alice.name.clone(), alice.clone())].into_iter().collect();
        let mut idx = Indexes::new();
        idx.rebuild(&[alice.clone()], &[]);
        let mut bm25 = Bm25Index::new();
        bm25.rebuild([alice].iter());

        let result = hybrid_search(&entities, &idx, &bm25, None, "rust", &SearchFilter::default());
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].name, "Alice");
        assert!(result.matches[0].matched_layers.contains(&"lexical"));
        assert_eq!(result.lane_timings.len(), 2);
    }

    #[test]
    fn no_matches_returns_empty() {
        let entities = HashMap::new();
        let idx = Indexes::new();
        let bm25 = Bm25Index::new();
        let result = hybrid_search(&entities, &idx, &bm25, None, "nothing", &SearchFilter::default());
        assert!(result.matches.is_empty());
    }
}

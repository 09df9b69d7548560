//! Centrality measures: degree, betweenness (Brandes), PageRank

use std::collections::{HashMap, VecDeque};

use crate::entity::Entity;
use crate::graph::{neighbors, Direction, EdgeFilter};
use crate::index::Indexes;

const PAGERANK_DAMPING: f64 = 0.85;
const PAGERANK_TOLERANCE: f64 = 1e-6;
const PAGERANK_MAX_ITER: usize = 100;

fn all_nodes(entities: &HashMap<String, Entity>, filter: &EdgeFilter) -> Vec<String> {
    let mut nodes: Vec<String> = entities
        .values()
        .filter(|e| filter.entity_types.as_ref().map(|t| t.contains(&e.entity_type)).unwrap_or(true))
        .map(|e| e.name.clone())
        .collect();
    nodes.sort();
    nodes
}

/// Degree centrality normalized by `n - 1` (0.0 for a single-node graph).
pub fn degree_centrality(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    filter: &EdgeFilter,
) -> HashMap<String, f64> {
    let nodes = all_nodes(entities, filter);
    let denom = (nodes.len().saturating_sub(1)) as f64;
    nodes
        .iter()
        .map(|name| {
            let degree = neighbors(indexes, entities, name, Direction::Both, filter).len() as f64;
            let score = if denom > 0.0 { degree / denom } else { 0.0 };
            (name.clone(), score)
        })
        .collect()
}

/// Brandes' algorithm for betweenness centrality over the undirected
/// (both-direction) view of the graph, unweighted.
pub fn betweenness_centrality(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    filter: &EdgeFilter,
) -> HashMap<String, f64> {
    let nodes = all_nodes(entities, filter);
    let mut betweenness: HashMap<String, f64> = nodes.iter().map(|n| (n.clone(), 0.0)).collect();

    for source in &nodes {
        let mut stack: Vec<String> = Vec::new();
        let mut predecessors: HashMap<String, Vec<String>> = nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
        let mut sigma: HashMap<String, f64> = nodes.iter().map(|n| (n.clone(), 0.0)).collect();
        let mut dist: HashMap<String, i64> = nodes.iter().map(|n| (n.clone(), -1)).collect();
        sigma.insert(source.clone(), 1.0);
        dist.insert(source.clone(), 0);

        let mut queue = VecDeque::new();
        queue.push_back(source.clone());
        while let Some(v) = queue.pop_front() {
            stack.push(v.clone());
            for w in neighbors(indexes, entities, &v, Direction::Both, filter) {
                if !dist.contains_key(&w) {
                    continue;
                }
                if dist[&w] < 0 {
                    dist.insert(w.clone(), dist[&v] + 1);
                    queue.push_back(w.clone());
                }
                if dist[&w] == dist[&v] + 1 {
                    let sv = sigma[&v];
                    *sigma.get_mut(&w).unwrap() += sv;
                    predecessors.get_mut(&w).unwrap().push(v.clone());
                }
            }
        }

        let mut delta: HashMap<String, f64> = nodes.iter().map(|n| (n.clone(), 0.0)).collect();
        while let Some(w) = stack.pop() {
            for v in predecessors.get(&w).cloned().unwrap_or_default() {
                let contribution = (sigma[&v] / sigma[&w]) * (1.0 + delta[&w]);
                *delta.get_mut(&v).unwrap() += contribution;
            }
            if w != *source {
                *betweenness.get_mut(&w).unwrap() += delta[&w];
            }
        }
    }

    // Undirected graph: every shortest path is counted from both endpoints.
    for value in betweenness.values_mut() {
        *value /= 2.0;
    }
    betweenness
}

/// PageRank with damping 0.85, convergence tolerance 1e-6, capped at 100
/// iterations. Dangling nodes (no outgoing edges) redistribute their mass
/// uniformly.
pub fn pagerank(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    filter: &EdgeFilter,
) -> HashMap<String, f64> {
    let nodes = all_nodes(entities, filter);
    let n = nodes.len();
    if n == 0 {
        return HashMap::new();
    }
    let mut rank: HashMap<String, f64> = nodes.iter().map(|name| (name.clone(), 1.0 / n as f64)).collect();

    let out_links: HashMap<String, Vec<String>> = nodes
        .iter()
        .map(|name| (name.clone(), neighbors(indexes, entities, name, Direction::Outgoing, filter)))
        .collect();

    for _ in 0..PAGERANK_MAX_ITER {
        let dangling_mass: f64 = nodes
            .iter()
            .filter(|name| out_links[*name].is_empty())
            .map(|name| rank[name])
            .sum();

        let mut next: HashMap<String, f64> = nodes
            .iter()
            .map(|name| (name.clone(), (1.0 - PAGERANK_DAMPING) / n as f64 + PAGERANK_DAMPING * dangling_mass / n as f64))
            .collect();

        for name in &nodes {
            let out_degree = out_links[name].len();
            if out_degree == 0 {
                continue;
            }
            let share = PAGERANK_DAMPING * rank[name] / out_degree as f64;
            for target in &out_links[name] {
                if let Some(v) = next.get_mut(target) {
                    *v += share;
                }
            }
        }

        let delta: f64 = nodes.iter().map(|n| (next[n] - rank[n]).abs()).sum();
        rank = next;
        if delta < PAGERANK_TOLERANCE {
            break;
        }
    }

    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RelationRecord;

    fn triangle() -> (HashMap<String, Entity>, Indexes) {
        let a = Entity::new("A", "node");
        let b = Entity::new("B", "node");
        let c = Entity::new("C", "node");
        let entities: HashMap<String, Entity> =
            [a.clone(), b.clone(), c.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(
            &[a, b, c],
            &[RelationRecord::new("A", "B", "r"), RelationRecord::new("B", "C", "r"), RelationRecord::new("C", "A", "r")],
        );
        (entities, idx)
    }

    #[test]
    fn degree_centrality_is_equal_on_a_triangle() {
        let (entities, idx) = triangle();
        let scores = degree_centrality(&idx, &entities, &EdgeFilter::default());
        for v in scores.values() {
            assert!((v - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn pagerank_sums_to_roughly_one() {
        let (entities, idx) = triangle();
        let scores = pagerank(&idx, &entities, &EdgeFilter::default());
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-3);
    }

    #[test]
    fn betweenness_is_zero_on_a_complete_triangle() {
        let (entities, idx) = triangle();
        let scores = betweenness_centrality(&idx, &entities, &EdgeFilter::default());
        for v in scores.values() {
            assert!(*v < 1e-9);
        }
    }
}

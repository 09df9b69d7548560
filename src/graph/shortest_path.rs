//! Shortest path: unweighted BFS and weighted Dijkstra

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::entity::Entity;
use crate::graph::{neighbors, Direction, EdgeFilter};
use crate::index::Indexes;

#[derive(Debug, Clone)]
pub struct Path {
    pub nodes: Vec<String>,
    pub cost: f64,
}

fn reconstruct(parent: &HashMap<String, String>, start: &str, goal: &str) -> Vec<String> {
    let mut path = vec![goal.to_string()];
    let mut current = goal.to_string();
    while current != start {
        match parent.get(&current) {
            Some(p) => {
                path.push(p.clone());
                current = p.clone();
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Unweighted shortest path via BFS (each edge costs 1).
pub fn shortest_path_bfs(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    start: &str,
    goal: &str,
    direction: Direction,
    filter: &EdgeFilter,
) -> Option<Path> {
    if start == goal {
        return Some(Path { nodes: vec![start.to_string()], cost: 0.0 });
    }
    if !entities.contains_key(start) || !entities.contains_key(goal) {
        return None;
    }

    let mut visited = std::collections::HashSet::new();
    let mut queue = std::collections::VecDeque::new();
    let mut parent: HashMap<String, String> = HashMap::new();
    visited.insert(start.to_string());
    queue.push_back(start.to_string());

    while let Some(current) = queue.pop_front() {
        if current == goal {
            let nodes = reconstruct(&parent, start, goal);
            return Some(Path { cost: (nodes.len() - 1) as f64, nodes });
        }
        for next in neighbors(indexes, entities, &current, direction, filter) {
            if visited.insert(next.clone()) {
                parent.insert(next.clone(), current.clone());
                queue.push_back(next);
            }
        }
    }
    None
}

#[derive(PartialEq)]
struct HeapEntry {
    cost: f64,
    node: String,
}

impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.cost.partial_cmp(&self.cost).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Weighted shortest path via Dijkstra. `weight` maps a relation type to an
/// edge cost (defaulting to 1.0 for unrecognized types via the closure).
pub fn shortest_path_dijkstra(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    start: &str,
    goal: &str,
    direction: Direction,
    filter: &EdgeFilter,
    weight: impl Fn(&str) -> f64,
) -> Option<Path> {
    if !entities.contains_key(start) || !entities.contains_key(goal) {
        return None;
    }

    let mut dist: HashMap<String, f64> = HashMap::new();
    let mut parent: HashMap<String, String> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(start.to_string(), 0.0);
    heap.push(HeapEntry { cost: 0.0, node: start.to_string() });

    while let Some(HeapEntry { cost, node }) = heap.pop() {
        if node == goal {
            let nodes = reconstruct(&parent, start, goal);
            return Some(Path { nodes, cost });
        }
        if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
            continue;
        }
        let relations = indexes.relations();
        let edges: Vec<crate::entity::Relation> = match direction {
            Direction::Outgoing => relations.from(&node).into_iter().collect(),
            Direction::Incoming => relations.to(&node).into_iter().collect(),
            Direction::Both => relations.bidirectional(&node).into_iter().collect(),
        };
        for relation in edges {
            if !filter.allows_relation(&relation) {
                continue;
            }
            let other = if relation.from == node { relation.to.clone() } else { relation.from.clone() };
            if other == node || !filter.allows_entity(entities, &other) {
                continue;
            }
            let next_cost = cost + weight(&relation.relation_type);
            if next_cost < *dist.get(&other).unwrap_or(&f64::INFINITY) {
                dist.insert(other.clone(), next_cost);
                parent.insert(other.clone(), node.clone());
                heap.push(HeapEntry { cost: next_cost, node: other });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RelationRecord;

    #[test]
    fn bfs_finds_shortest_hop_count() {
        let a = Entity::new("A", "node");
        let b = Entity::new("B", "node");
        let c = Entity::new("C", "node");
        let entities: HashMap<String, Entity> =
            [a.clone(), b.clone(), c.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(
            &[a, b, c],
            &[RelationRecord::new("A", "B", "next"), RelationRecord::new("B", "C", "next"), RelationRecord::new("A", "C", "shortcut")],
        );
        let path = shortest_path_bfs(&idx, &entities, "A", "C", Direction::Outgoing, &EdgeFilter::default()).unwrap();
        assert_eq!(path.nodes, vec!["A", "C"]);
    }

    #[test]
    fn dijkstra_prefers_cheaper_weighted_path() {
        let a = Entity::new("A", "node");
        let b = Entity::new("B", "node");
        let c = Entity::new("C", "node");
        let entities: HashMap<String, Entity> =
            [a.clone(), b.clone(), c.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(
            &[a, b, c],
            &[RelationRecord::new("A", "B", "cheap"), RelationRecord::new("B", "C", "cheap"), RelationRecord::new("A", "C", "expensive")],
        );
        let weight = |rt: &str| if rt == "expensive" { 10.0 } else { 1.0 };
        let path =
            shortest_path_dijkstra(&idx, &entities, "A", "C", Direction::Outgoing, &EdgeFilter::default(), weight).unwrap();
        assert_eq!(path.nodes, vec!["A", "B", "C"]);
        assert!((path.cost - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_goal_returns_none() {
        let a = Entity::new("A", "node");
        let b = Entity::new("B", "node");
        let entities: HashMap<String, Entity> = [a.clone(), b.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(&[a, b], &[]);
        assert!(shortest_path_bfs(&idx, &entities, "A", "B", Direction::Outgoing, &EdgeFilter::default()).is_none());
    }
}

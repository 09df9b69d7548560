//! Graph traversal: BFS/DFS, shortest path, centrality, connected components
//!
//! Every algorithm here reads from the same `Indexes::relations()` adjacency
//! and an entity-type filter over the entity cache; none of them own graph
//! state, they're pure functions over borrowed data (mirroring how the text
//! search module treats its indexes as read-only).

pub mod centrality;
pub mod components;
pub mod shortest_path;
pub mod traversal;

use std::collections::HashSet;

use crate::entity::{Entity, Relation};
use crate::index::Indexes;

/// Which edges to follow from a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// Shared edge filter used by every traversal/path/centrality algorithm
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub relation_types: Option<HashSet<String>>,
    pub entity_types: Option<HashSet<String>>,
}

impl EdgeFilter {
    fn allows_relation(&self, relation: &Relation) -> bool {
        match &self.relation_types {
            Some(types) => types.contains(&relation.relation_type.to_lowercase()),
            None => true,
        }
    }

    fn allows_entity(&self, entities: &std::collections::HashMap<String, Entity>, name: &str) -> bool {
        match &self.entity_types {
            Some(types) => entities.get(name).map(|e| types.contains(&e.entity_type)).unwrap_or(false),
            None => true,
        }
    }
}

/// Neighbors of `name` reachable by one edge in `direction`, honoring `filter`.
pub fn neighbors(
    indexes: &Indexes,
    entities: &std::collections::HashMap<String, Entity>,
    name: &str,
    direction: Direction,
    filter: &EdgeFilter,
) -> Vec<String> {
    let relations = indexes.relations();
    let edges: Vec<Relation> = match direction {
        Direction::Outgoing => relations.from(name).into_iter().collect(),
        Direction::Incoming => relations.to(name).into_iter().collect(),
        Direction::Both => relations.bidirectional(name).into_iter().collect(),
    };

    let mut out = Vec::new();
    for relation in edges {
        if !filter.allows_relation(&relation) {
            continue;
        }
        let other = if relation.from == name { relation.to.clone() } else { relation.from.clone() };
        if other == name {
            continue;
        }
        if filter.allows_entity(entities, &other) {
            out.push(other);
        }
    }
    out.sort();
    out.dedup();
    out
}

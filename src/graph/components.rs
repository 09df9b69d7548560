//! Connected components via union-find

use std::collections::HashMap;

use crate::entity::Entity;
use crate::graph::EdgeFilter;
use crate::index::Indexes;

struct UnionFind {
    parent: HashMap<String, String>,
    rank: HashMap<String, u32>,
}

impl UnionFind {
    fn new(nodes: &[String]) -> Self {
        Self {
            parent: nodes.iter().map(|n| (n.clone(), n.clone())).collect(),
            rank: nodes.iter().map(|n| (n.clone(), 0)).collect(),
        }
    }

    fn find(&mut self, node: &str) -> String {
        let parent = self.parent.get(node).cloned().unwrap_or_else(|| node.to_string());
        if parent == node {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(node.to_string(), root.clone());
        root
    }

    fn union(&mut self, a: &str, b: &str) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let rank_a = *self.rank.get(&ra).unwrap_or(&0);
        let rank_b = *self.rank.get(&rb).unwrap_or(&0);
        match rank_a.cmp(&rank_b) {
            std::cmp::Ordering::Less => {
                self.parent.insert(ra, rb);
            }
            std::cmp::Ordering::Greater => {
                self.parent.insert(rb, ra);
            }
            std::cmp::Ordering::Equal => {
                self.parent.insert(rb, ra.clone());
                *self.rank.get_mut(&ra).unwrap() += 1;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentsResult {
    pub components: Vec<Vec<String>>,
    pub largest_component_size: usize,
}

/// Partition every entity (subject to `filter.entity_types`) into connected
/// components over the undirected view of relations, largest first.
pub fn connected_components(
    indexes: &Indexes,
    entities: &HashMap<String, Entity>,
    filter: &EdgeFilter,
) -> ComponentsResult {
    let mut nodes: Vec<String> = entities
        .values()
        .filter(|e| filter.entity_types.as_ref().map(|t| t.contains(&e.entity_type)).unwrap_or(true))
        .map(|e| e.name.clone())
        .collect();
    nodes.sort();

    let mut uf = UnionFind::new(&nodes);
    let node_set: std::collections::HashSet<&String> = nodes.iter().collect();
    for relation in indexes.relations().all() {
        if !node_set.contains(&relation.from) || !node_set.contains(&relation.to) {
            continue;
        }
        if let Some(types) = &filter.relation_types {
            if !types.contains(&relation.relation_type.to_lowercase()) {
                continue;
            }
        }
        uf.union(&relation.from, &relation.to);
    }

    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for node in &nodes {
        let root = uf.find(node);
        groups.entry(root).or_default().push(node.clone());
    }

    let mut components: Vec<Vec<String>> = groups.into_values().collect();
    for component in &mut components {
        component.sort();
    }
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

    let largest_component_size = components.first().map(|c| c.len()).unwrap_or(0);
    ComponentsResult { components, largest_component_size }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RelationRecord;

    #[test]
    fn two_disjoint_pairs_form_two_components() {
        let a = Entity::new("A", "node");
        let b = Entity::new("B", "node");
        let c = Entity::new("C", "node");
        let d = Entity::new("D", "node");
        let entities: HashMap<String, Entity> =
            [a.clone(), b.clone(), c.clone(), d.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(&[a, b, c, d], &[RelationRecord::new("A", "B", "r"), RelationRecord::new("C", "D", "r")]);

        let result = connected_components(&idx, &entities, &EdgeFilter::default());
        assert_eq!(result.components.len(), 2);
        assert_eq!(result.largest_component_size, 2);
    }

    #[test]
    fn isolated_node_is_its_own_component() {
        let a = Entity::new("A", "node");
        let entities: HashMap<String, Entity> = [(a.name.clone(), a.clone())].into_iter().collect();
        let mut idx = Indexes::new();
        idx.rebuild(&[a], &[]);
        let result = connected_components(&idx, &entities, &EdgeFilter::default());
        assert_eq!(result.components, vec![vec!["A".to_string()]]);
    }
}

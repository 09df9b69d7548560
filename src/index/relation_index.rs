//! Directed relation index
//!
//! Maintains `from_index` and `to_index` maps of name -> set of relations so
//! outgoing, incoming, and bidirectional lookups are O(1) amortized.
//! Bidirectional lookups union the two sides.

use std::collections::{HashMap, HashSet};

use crate::entity::Relation;

#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    from_index: HashMap<String, HashSet<Relation>>,
    to_index: HashMap<String, HashSet<Relation>>,
}

impl RelationIndex {
    pub fn clear(&mut self) {
        self.from_index.clear();
        self.to_index.clear();
    }

    pub fn insert(&mut self, relation: &Relation) {
        self.from_index
            .entry(relation.from.clone())
            .or_default()
            .insert(relation.clone());
        self.to_index
            .entry(relation.to.clone())
            .or_default()
            .insert(relation.clone());
    }

    pub fn remove(&mut self, relation: &Relation) {
        if let Some(set) = self.from_index.get_mut(&relation.from) {
            set.remove(relation);
            if set.is_empty() {
                self.from_index.remove(&relation.from);
            }
        }
        if let Some(set) = self.to_index.get_mut(&relation.to) {
            set.remove(relation);
            if set.is_empty() {
                self.to_index.remove(&relation.to);
            }
        }
    }

    /// Remove every relation whose `from` or `to` is `name` — used on entity
    /// deletion (invariant 5: cascade delete).
    pub fn remove_touching(&mut self, name: &str) {
        let outgoing: Vec<Relation> = self.from(name).into_iter().collect();
        let incoming: Vec<Relation> = self.to(name).into_iter().collect();
        for r in outgoing.iter().chain(incoming.iter()) {
            self.remove(r);
        }
    }

    pub fn from(&self, name: &str) -> HashSet<Relation> {
        self.from_index.get(name).cloned().unwrap_or_default()
    }

    pub fn to(&self, name: &str) -> HashSet<Relation> {
        self.to_index.get(name).cloned().unwrap_or_default()
    }

    /// Union of outgoing and incoming relations touching `name`
    pub fn bidirectional(&self, name: &str) -> HashSet<Relation> {
        let mut all = self.from(name);
        all.extend(self.to(name));
        all
    }

    pub fn all(&self) -> HashSet<Relation> {
        let mut all = HashSet::new();
        for set in self.from_index.values() {
            all.extend(set.iter().cloned());
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bidirectional_unions_both_sides() {
        let mut idx = RelationIndex::default();
        idx.insert(&Relation {
            from: "Alice".into(),
            to: "Bob".into(),
            relation_type: "knows".into(),
        });
        idx.insert(&Relation {
            from: "Carol".into(),
            to: "Alice".into(),
            relation_type: "manages".into(),
        });
        assert_eq!(idx.bidirectional("Alice").len(), 2);
        assert_eq!(idx.from("Alice").len(), 1);
        assert_eq!(idx.to("Alice").len(), 1);
    }

    #[test]
    fn remove_touching_clears_both_directions() {
        let mut idx = RelationIndex::default();
        idx.insert(&Relation {
            from: "Alice".into(),
            to: "Bob".into(),
            relation_type: "knows".into(),
        });
        idx.insert(&Relation {
            from: "Bob".into(),
            to: "Carol".into(),
            relation_type: "knows".into(),
        });
        idx.remove_touching("Bob");
        assert!(idx.from("Alice").is_empty());
        assert!(idx.from("Bob").is_empty());
        assert!(idx.to("Carol").is_empty());
    }
}

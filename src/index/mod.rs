//! Derived indexes over the graph cache
//!
//! Every operation here is O(1) amortized except full rebuilds. Indexes are
//! derived views: the store rebuilds them on load and maintains them
//! incrementally on every mutation. They never own the canonical entity
//! data — that lives in the store's cache — they only index names and
//! pre-lowercased copies of searchable fields.

mod lowercase_cache;
mod observation_index;
mod relation_index;

pub use lowercase_cache::LowercaseFields;
pub use observation_index::ObservationIndex;
pub use relation_index::RelationIndex;

use std::collections::{HashMap, HashSet};

use crate::entity::{Entity, RelationRecord};

/// All derived indexes over one graph
#[derive(Debug, Default)]
pub struct Indexes {
    /// lowercased entity_type -> names
    type_index: HashMap<String, HashSet<String>>,
    /// name -> pre-lowercased searchable fields
    lowercase_cache: HashMap<String, LowercaseFields>,
    relation_index: RelationIndex,
    observation_index: ObservationIndex,
}

impl Indexes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild every index from scratch. Called after a full load.
    pub fn rebuild(&mut self, entities: &[Entity], relations: &[RelationRecord]) {
        self.type_index.clear();
        self.lowercase_cache.clear();
        self.relation_index.clear();
        self.observation_index.clear();

        for entity in entities {
            self.index_entity(entity);
        }
        for record in relations {
            self.relation_index.insert(&record.relation);
        }
    }

    fn index_entity(&mut self, entity: &Entity) {
        self.type_index
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.name.clone());
        let fields = LowercaseFields::from_entity(entity);
        self.observation_index.index(&entity.name, &fields);
        self.lowercase_cache.insert(entity.name.clone(), fields);
    }

    /// Incorporate a newly created or replaced entity
    pub fn on_entity_upserted(&mut self, previous: Option<&Entity>, entity: &Entity) {
        if let Some(prev) = previous {
            self.remove_entity_from_type_and_observation(prev);
        }
        self.index_entity(entity);
    }

    fn remove_entity_from_type_and_observation(&mut self, entity: &Entity) {
        if let Some(set) = self.type_index.get_mut(&entity.entity_type) {
            set.remove(&entity.name);
            if set.is_empty() {
                self.type_index.remove(&entity.entity_type);
            }
        }
        self.observation_index.remove(&entity.name);
    }

    /// Remove an entity entirely (deletion). Also removes relations touching it.
    pub fn on_entity_deleted(&mut self, entity: &Entity) {
        self.remove_entity_from_type_and_observation(entity);
        self.lowercase_cache.remove(&entity.name);
        self.relation_index.remove_touching(&entity.name);
    }

    pub fn on_relation_created(&mut self, record: &RelationRecord) {
        self.relation_index.insert(&record.relation);
    }

    pub fn on_relation_deleted(&mut self, record: &RelationRecord) {
        self.relation_index.remove(&record.relation);
    }

    pub fn names_of_type(&self, entity_type: &str) -> HashSet<String> {
        self.type_index
            .get(&entity_type.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn lowercase_fields(&self, name: &str) -> Option<&LowercaseFields> {
        self.lowercase_cache.get(name)
    }

    pub fn all_lowercase_fields(&self) -> impl Iterator<Item = (&String, &LowercaseFields)> {
        self.lowercase_cache.iter()
    }

    pub fn relations(&self) -> &RelationIndex {
        &self.relation_index
    }

    pub fn observations(&self) -> &ObservationIndex {
        &self.observation_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RelationRecord;

    #[test]
    fn rebuild_then_lookup_by_type() {
        let mut idx = Indexes::new();
        let entities = vec![Entity::new("Alice", "Person"), Entity::new("Acme", "Company")];
        idx.rebuild(&entities, &[]);
        assert_eq!(idx.names_of_type("person").len(), 1);
        assert!(idx.names_of_type("person").contains("Alice"));
    }

    #[test]
    fn deletion_clears_type_and_lowercase_and_relations() {
        let mut idx = Indexes::new();
        let a = Entity::new("Alice", "Person");
        let b = Entity::new("Bob", "Person");
        idx.rebuild(&[a.clone(), b.clone()], &[]);
        let rel = RelationRecord::new("Alice", "Bob", "knows");
        idx.on_relation_created(&rel);

        idx.on_entity_deleted(&a);
        assert!(idx.lowercase_fields("Alice").is_none());
        assert!(idx.names_of_type("person").contains("Bob"));
        assert!(!idx.names_of_type("person").contains("Alice"));
        assert!(idx.relations().from("Alice").is_empty());
        assert!(idx.relations().to("Alice").is_empty());
    }
}

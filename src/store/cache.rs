//! In-memory cache shared by both store backends
//!
//! The cache and its derived indexes are what readers actually see; the
//! backend-specific code below is only responsible for keeping the on-disk
//! copy consistent with it. Every mutation here happens while the caller
//! holds the store's single write mutex (see `store::mutex_guarded`).

use std::collections::HashMap;

use crate::entity::{Entity, KnowledgeGraph, Relation, RelationRecord};
use crate::index::Indexes;

/// Composite key matching the relation primary key
pub type RelationKey = (String, String, String);

pub fn relation_key(relation: &Relation) -> RelationKey {
    (relation.from.clone(), relation.to.clone(), relation.relation_type.clone())
}

#[derive(Debug, Default)]
pub struct GraphCache {
    entities: HashMap<String, Entity>,
    relations: HashMap<RelationKey, RelationRecord>,
    pub indexes: Indexes,
}

impl GraphCache {
    pub fn load_from(entities: Vec<Entity>, relations: Vec<RelationRecord>) -> Self {
        let mut cache = Self::default();
        cache.indexes.rebuild(&entities, &relations);
        cache.entities = entities.into_iter().map(|e| (e.name.clone(), e)).collect();
        cache.relations = relations
            .into_iter()
            .map(|r| (relation_key(&r.relation), r))
            .collect();
        cache
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.relations.clear();
        self.indexes = Indexes::new();
    }

    pub fn snapshot(&self) -> KnowledgeGraph {
        KnowledgeGraph {
            entities: self.entities.values().cloned().collect(),
            relations: self.relations.values().cloned().collect(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entity_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn contains_entity(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Insert or replace an entity, last-writer-wins, updating indexes.
    pub fn upsert_entity(&mut self, entity: Entity) {
        let previous = self.entities.insert(entity.name.clone(), entity.clone());
        self.indexes.on_entity_upserted(previous.as_ref(), &entity);
    }

    /// Remove an entity and cascade-delete every relation touching it
    /// (invariant 5). Returns the removed entity, if any.
    pub fn remove_entity(&mut self, name: &str) -> Option<Entity> {
        let removed = self.entities.remove(name)?;
        self.indexes.on_entity_deleted(&removed);
        let touching = self.indexes.relations().bidirectional(name);
        for relation in touching {
            self.relations.remove(&relation_key(&relation));
        }
        Some(removed)
    }

    pub fn upsert_relation(&mut self, record: RelationRecord) {
        self.indexes.on_relation_created(&record);
        self.relations.insert(relation_key(&record.relation), record);
    }

    pub fn remove_relation(&mut self, relation: &Relation) -> Option<RelationRecord> {
        let removed = self.relations.remove(&relation_key(relation))?;
        self.indexes.on_relation_deleted(&removed);
        Some(removed)
    }

    pub fn relation(&self, relation: &Relation) -> Option<&RelationRecord> {
        self.relations.get(&relation_key(relation))
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_cascades_to_relations() {
        let mut cache = GraphCache::default();
        cache.upsert_entity(Entity::new("Alice", "person"));
        cache.upsert_entity(Entity::new("Bob", "person"));
        cache.upsert_relation(RelationRecord::new("Alice", "Bob", "knows"));

        cache.remove_entity("Alice");
        assert_eq!(cache.relation_count(), 0);
        assert!(!cache.contains_entity("Alice"));
        assert!(cache.contains_entity("Bob"));
    }

    #[test]
    fn upsert_is_last_writer_wins() {
        let mut cache = GraphCache::default();
        let mut first = Entity::new("Alice", "person");
        first.add_observation("first");
        cache.upsert_entity(first);
        let mut second = Entity::new("Alice", "person");
        second.add_observation("second");
        cache.upsert_entity(second);
        assert_eq!(cache.entity("Alice").unwrap().observations, vec!["second"]);
    }
}

//! Append-only log backend
//!
//! Persists one record per line as JSON with a `type` discriminator in
//! `{entity, relation}`. `save_graph`, `delete_entity`, `delete_relation` and
//! `compact` all go through the same atomic rewrite (write-to-temp, fsync,
//! rename); `append_entity`/`append_relation`/`update_entity` just append a
//! line, leaving full rewrite to an explicit `compact()`.
//!
//! Persisted entity records strip the `is_working_memory` field since it is
//! entirely derived from `memory_type` — recomputed on load instead of
//! trusted from disk.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityPatch, KnowledgeGraph, MemoryType, Relation, RelationRecord};
use crate::error::{GraphError, Result};
use crate::event::{EventBus, GraphEvent};
use crate::index::Indexes;
use crate::store::cache::GraphCache;
use crate::store::{validate_store_path, GraphStore};

/// On-disk shape of an entity. Identical to `Entity` minus the derived
/// `is_working_memory` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntity {
    #[serde(flatten)]
    inner: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Record {
    Entity(PersistedEntity),
    Relation(RelationRecord),
}

fn to_persisted(entity: &Entity) -> Result<PersistedEntity> {
    let mut value = serde_json::to_value(entity).map_err(|e| GraphError::Corrupt(e.to_string()))?;
    if let Some(obj) = value.as_object_mut() {
        obj.remove("isWorkingMemory");
    }
    Ok(PersistedEntity { inner: value })
}

fn from_persisted(persisted: PersistedEntity) -> Result<Entity> {
    let mut entity: Entity =
        serde_json::from_value(persisted.inner).map_err(|e| GraphError::Corrupt(e.to_string()))?;
    entity.is_working_memory = matches!(entity.memory_type, Some(MemoryType::Working));
    Ok(entity)
}

struct LogState {
    cache: GraphCache,
    loaded: bool,
}

/// Append-only, newline-delimited-JSON backed store
pub struct LogStore {
    path: PathBuf,
    state: Mutex<LogState>,
    events: EventBus,
}

impl LogStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_store_path(&path)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            File::create(&path)?;
        }
        Ok(Self {
            path,
            state: Mutex::new(LogState {
                cache: GraphCache::default(),
                loaded: false,
            }),
            events: EventBus::new(),
        })
    }

    fn read_records(&self) -> Result<(Vec<Entity>, Vec<RelationRecord>)> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();
        let mut relations = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(Record::Entity(persisted)) => match from_persisted(persisted) {
                    Ok(entity) => entities.push(entity),
                    Err(e) => tracing::warn!(line = line_no, error = %e, "skipping corrupt entity record"),
                },
                Ok(Record::Relation(relation)) => relations.push(relation),
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping unreadable record");
                }
            }
        }

        Ok((entities, relations))
    }

    fn append_line(&self, record: &Record) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(|e| GraphError::Corrupt(e.to_string()))?;
        line.push('\n');
        let mut file = fs::OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Atomically rewrite the whole file from the given cache: write to a
    /// temp file, fsync, then rename over the original.
    fn persist_full(&self, cache: &GraphCache) -> Result<()> {
        let tmp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for entity in cache.entities() {
                let record = Record::Entity(to_persisted(entity)?);
                let mut line = serde_json::to_string(&record).map_err(|e| GraphError::Corrupt(e.to_string()))?;
                line.push('\n');
                tmp.write_all(line.as_bytes())?;
            }
            let snapshot = cache.snapshot();
            for relation in &snapshot.relations {
                let record = Record::Relation(relation.clone());
                let mut line = serde_json::to_string(&record).map_err(|e| GraphError::Corrupt(e.to_string()))?;
                line.push('\n');
                tmp.write_all(line.as_bytes())?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn ensure_loaded_locked(&self, state: &mut LogState) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        let (entities, relations) = self.read_records()?;
        state.cache = GraphCache::load_from(entities, relations);
        state.loaded = true;
        self.events.publish(GraphEvent::GraphLoaded);
        Ok(())
    }
}

impl GraphStore for LogStore {
    fn load_graph(&self) -> Result<KnowledgeGraph> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        Ok(state.cache.snapshot())
    }

    fn graph_for_mutation(&self) -> Result<KnowledgeGraph> {
        self.load_graph()
    }

    fn ensure_loaded(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)
    }

    fn save_graph(&self, graph: &KnowledgeGraph) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let cache = GraphCache::load_from(graph.entities.clone(), graph.relations.clone());
        self.persist_full(&cache)?;
        state.cache = cache;
        state.loaded = true;
        self.events.publish(GraphEvent::GraphSaved);
        Ok(())
    }

    fn append_entity(&self, entity: Entity) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        let record = Record::Entity(to_persisted(&entity)?);
        self.append_line(&record)?;
        let name = entity.name.clone();
        state.cache.upsert_entity(entity);
        self.events.publish(GraphEvent::EntityCreated(name));
        Ok(())
    }

    fn append_relation(&self, relation: RelationRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        let record = Record::Relation(relation.clone());
        self.append_line(&record)?;
        let rel = relation.relation.clone();
        state.cache.upsert_relation(relation);
        self.events.publish(GraphEvent::RelationCreated(rel));
        Ok(())
    }

    fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        let mut entity = state
            .cache
            .entity(name)
            .cloned()
            .ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        patch.apply_to(&mut entity);
        let record = Record::Entity(to_persisted(&entity)?);
        self.append_line(&record)?;
        state.cache.upsert_entity(entity);
        self.events.publish(GraphEvent::EntityUpdated(name.to_string()));
        Ok(())
    }

    fn delete_entity(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        let removed = state
            .cache
            .remove_entity(name)
            .ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        self.persist_full(&state.cache)?;
        self.events.publish(GraphEvent::EntityDeleted(removed.name));
        Ok(())
    }

    fn delete_relation(&self, relation: &Relation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        state
            .cache
            .remove_relation(relation)
            .ok_or_else(|| GraphError::NotFound(format!("{}->{}:{}", relation.from, relation.to, relation.relation_type)))?;
        self.persist_full(&state.cache)?;
        self.events.publish(GraphEvent::RelationDeleted(relation.clone()));
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        self.persist_full(&state.cache)
    }

    fn clear_cache(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.cache.clear();
        state.loaded = false;
        Ok(())
    }

    fn with_indexes_raw(&self, f: &mut dyn FnMut(&Indexes)) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        f(&state.cache.indexes);
        Ok(())
    }

    fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        Ok(state.cache.entity(name).cloned())
    }

    fn entity_count(&self) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        Ok(state.cache.entity_count())
    }

    fn events(&self) -> &EventBus {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        {
            let store = LogStore::new(&path).unwrap();
            store.append_entity(Entity::new("Alice", "person")).unwrap();
            store
                .append_relation(RelationRecord::new("Alice", "Bob", "knows"))
                .unwrap();
        }
        let store = LogStore::new(&path).unwrap();
        let graph = store.load_graph().unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.relations.len(), 1);
    }

    #[test]
    fn delete_cascades_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        let store = LogStore::new(&path).unwrap();
        store.append_entity(Entity::new("Alice", "person")).unwrap();
        store.append_entity(Entity::new("Bob", "person")).unwrap();
        store
            .append_relation(RelationRecord::new("Alice", "Bob", "knows"))
            .unwrap();
        store.delete_entity("Alice").unwrap();
        let graph = store.load_graph().unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert!(graph.relations.is_empty());

        drop(store);
        let reloaded = LogStore::new(&path).unwrap();
        let graph = reloaded.load_graph().unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert!(graph.relations.is_empty());
    }

    #[test]
    fn corrupt_line_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.jsonl");
        fs::write(&path, "not json at all\n").unwrap();
        let store = LogStore::new(&path).unwrap();
        let graph = store.load_graph().unwrap();
        assert!(graph.entities.is_empty());
    }

    #[test]
    fn update_requires_existing_entity() {
        let dir = tempdir().unwrap();
        let store = LogStore::new(dir.path().join("graph.jsonl")).unwrap();
        let err = store.update_entity("Ghost", EntityPatch::default()).unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }
}

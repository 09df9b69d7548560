//! Relational (SQLite) backend
//!
//! Same contract as the log backend, but records live in two tables with
//! foreign keys, a native FTS5 virtual table, and a lazily-created
//! embeddings side-table. The in-memory cache still sits in front of the
//! database for every read; SQL is only touched on writes and on the
//! initial load.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::entity::{Entity, EntityPatch, KnowledgeGraph, MemoryType, Relation, RelationRecord, Visibility};
use crate::error::{GraphError, Result};
use crate::event::{EventBus, GraphEvent};
use crate::index::Indexes;
use crate::store::cache::GraphCache;
use crate::store::migrations::apply_migrations;
use crate::store::{validate_store_path, GraphStore};

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GraphError::Corrupt(format!("invalid timestamp {s}: {e}")))
}

fn row_to_entity(row: &Row) -> rusqlite::Result<Entity> {
    let observations_json: String = row.get("observations")?;
    let tags_json: String = row.get("tags")?;
    let memory_type: Option<String> = row.get("memory_type")?;
    let visibility: String = row.get("visibility")?;
    let created_at: String = row.get("created_at")?;
    let last_modified: String = row.get("last_modified")?;
    let expires_at: Option<String> = row.get("expires_at")?;
    let last_accessed_at: Option<String> = row.get("last_accessed_at")?;
    let promoted_at: Option<String> = row.get("promoted_at")?;

    let observations: Vec<String> = serde_json::from_str(&observations_json).unwrap_or_default();
    let tags: std::collections::HashSet<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    let memory_type = memory_type.and_then(|s| s.parse::<MemoryType>().ok());
    let visibility = match visibility.as_str() {
        "shared" => Visibility::Shared,
        "public" => Visibility::Public,
        _ => Visibility::Private,
    };

    Ok(Entity {
        name: row.get("name")?,
        entity_type: row.get("entity_type")?,
        observations,
        tags,
        importance: row.get::<_, Option<i64>>("importance")?.map(|v| v as u8),
        parent_name: row.get("parent_name")?,
        created_at: parse_timestamp(&created_at).unwrap_or_else(|_| Utc::now()),
        last_modified: parse_timestamp(&last_modified).unwrap_or_else(|_| Utc::now()),
        memory_type,
        session_id: row.get("session_id")?,
        task_id: row.get("task_id")?,
        expires_at: expires_at.and_then(|s| parse_timestamp(&s).ok()),
        is_working_memory: row.get::<_, i64>("is_working_memory")? != 0,
        access_count: row.get::<_, i64>("access_count")? as u64,
        last_accessed_at: last_accessed_at.and_then(|s| parse_timestamp(&s).ok()),
        confidence: row.get("confidence")?,
        confirmation_count: row.get::<_, i64>("confirmation_count")? as u32,
        marked_for_promotion: row.get::<_, i64>("marked_for_promotion")? != 0,
        visibility,
        agent_id: row.get("agent_id")?,
        promoted_at: promoted_at.and_then(|s| parse_timestamp(&s).ok()),
        promoted_from: row.get("promoted_from")?,
    })
}

fn row_to_relation(row: &Row) -> rusqlite::Result<RelationRecord> {
    let created_at: String = row.get("created_at")?;
    let last_modified: String = row.get("last_modified")?;
    Ok(RelationRecord {
        relation: Relation {
            from: row.get("from")?,
            to: row.get("to")?,
            relation_type: row.get("relation_type")?,
        },
        created_at: parse_timestamp(&created_at).unwrap_or_else(|_| Utc::now()),
        last_modified: parse_timestamp(&last_modified).unwrap_or_else(|_| Utc::now()),
    })
}

struct State {
    cache: GraphCache,
    loaded: bool,
}

/// Relational store backed by a bundled SQLite database with FTS5
pub struct SqliteStore {
    conn: Mutex<Connection>,
    state: Mutex<State>,
    events: EventBus,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        validate_store_path(&path)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        apply_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            state: Mutex::new(State {
                cache: GraphCache::default(),
                loaded: false,
            }),
            events: EventBus::new(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            state: Mutex::new(State {
                cache: GraphCache::default(),
                loaded: false,
            }),
            events: EventBus::new(),
        })
    }

    fn load_all(conn: &Connection) -> Result<(Vec<Entity>, Vec<RelationRecord>)> {
        let mut stmt = conn.prepare("SELECT * FROM entities")?;
        let entities: Vec<Entity> = stmt
            .query_map([], row_to_entity)?
            .filter_map(|r| match r {
                Ok(e) => Some(e),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping corrupt entity row");
                    None
                }
            })
            .collect();
        drop(stmt);

        let mut stmt = conn.prepare(r#"SELECT "from", "to", relation_type, created_at, last_modified FROM relations"#)?;
        let relations: Vec<RelationRecord> = stmt
            .query_map([], row_to_relation)?
            .filter_map(|r| r.ok())
            .collect();
        Ok((entities, relations))
    }

    fn ensure_loaded_locked(&self, state: &mut State) -> Result<()> {
        if state.loaded {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        let (entities, relations) = Self::load_all(&conn)?;
        state.cache = GraphCache::load_from(entities, relations);
        state.loaded = true;
        self.events.publish(GraphEvent::GraphLoaded);
        Ok(())
    }

    fn insert_entity_stmt(conn: &Connection, entity: &Entity) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO entities (
                name, entity_type, observations, tags, importance, parent_name,
                created_at, last_modified, memory_type, session_id, task_id, expires_at,
                is_working_memory, access_count, last_accessed_at, confidence,
                confirmation_count, marked_for_promotion, visibility, agent_id,
                promoted_at, promoted_from
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)
            ON CONFLICT(name) DO UPDATE SET
                entity_type=excluded.entity_type, observations=excluded.observations,
                tags=excluded.tags, importance=excluded.importance, parent_name=excluded.parent_name,
                last_modified=excluded.last_modified, memory_type=excluded.memory_type,
                session_id=excluded.session_id, task_id=excluded.task_id, expires_at=excluded.expires_at,
                is_working_memory=excluded.is_working_memory, access_count=excluded.access_count,
                last_accessed_at=excluded.last_accessed_at, confidence=excluded.confidence,
                confirmation_count=excluded.confirmation_count, marked_for_promotion=excluded.marked_for_promotion,
                visibility=excluded.visibility, agent_id=excluded.agent_id,
                promoted_at=excluded.promoted_at, promoted_from=excluded.promoted_from",
            params![
                entity.name,
                entity.entity_type,
                serde_json::to_string(&entity.observations).unwrap_or_default(),
                serde_json::to_string(&entity.tags).unwrap_or_default(),
                entity.importance.map(|v| v as i64),
                entity.parent_name,
                entity.created_at.to_rfc3339(),
                entity.last_modified.to_rfc3339(),
                entity.memory_type.map(|m| m.to_string()),
                entity.session_id,
                entity.task_id,
                entity.expires_at.map(|t| t.to_rfc3339()),
                entity.is_working_memory as i64,
                entity.access_count as i64,
                entity.last_accessed_at.map(|t| t.to_rfc3339()),
                entity.confidence,
                entity.confirmation_count as i64,
                entity.marked_for_promotion as i64,
                match entity.visibility {
                    Visibility::Private => "private",
                    Visibility::Shared => "shared",
                    Visibility::Public => "public",
                },
                entity.agent_id,
                entity.promoted_at.map(|t| t.to_rfc3339()),
                entity.promoted_from,
            ],
        )?;
        Ok(())
    }

    fn insert_relation_stmt(conn: &Connection, record: &RelationRecord) -> rusqlite::Result<()> {
        conn.execute(
            r#"INSERT INTO relations ("from", "to", relation_type, created_at, last_modified)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT("from","to",relation_type) DO UPDATE SET last_modified=excluded.last_modified"#,
            params![
                record.relation.from,
                record.relation.to,
                record.relation.relation_type,
                record.created_at.to_rfc3339(),
                record.last_modified.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Rank entities by BM25 relevance to `query` using the FTS5 virtual
    /// table. Lower `bm25()` is more relevant, so the exposed score is the
    /// negation (higher is better), matching every other search component.
    pub fn full_text_search(&self, query: &str, limit: usize) -> Result<Vec<(String, f32)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT e.name, bm25(entities_fts) AS rank
             FROM entities_fts
             JOIN entities e ON e.rowid = entities_fts.rowid
             WHERE entities_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], |row| {
            let name: String = row.get(0)?;
            let rank: f64 = row.get(1)?;
            Ok((name, -rank as f32))
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn ensure_embeddings_table(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS embeddings (
                entity_name TEXT PRIMARY KEY REFERENCES entities(name) ON DELETE CASCADE,
                embedding BLOB NOT NULL,
                model TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                dimensions INTEGER NOT NULL
            );",
        )
    }

    /// Store a float32 embedding for an entity, creating the side-table on
    /// first use.
    pub fn store_embedding(&self, name: &str, vector: &[f32], model: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_embeddings_table(&conn)?;
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        conn.execute(
            "INSERT INTO embeddings (entity_name, embedding, model, updated_at, dimensions)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(entity_name) DO UPDATE SET
                embedding=excluded.embedding, model=excluded.model,
                updated_at=excluded.updated_at, dimensions=excluded.dimensions",
            params![name, bytes, model, Utc::now().to_rfc3339(), vector.len() as i64],
        )?;
        Ok(())
    }

    /// Fetch a previously stored embedding, if any.
    pub fn get_embedding(&self, name: &str) -> Result<Option<(Vec<f32>, String)>> {
        let conn = self.conn.lock().unwrap();
        Self::ensure_embeddings_table(&conn)?;
        let result: Option<(Vec<u8>, String)> = conn
            .query_row(
                "SELECT embedding, model FROM embeddings WHERE entity_name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(result.map(|(bytes, model)| {
            let vector = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            (vector, model)
        }))
    }
}

impl GraphStore for SqliteStore {
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
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM relations", [])?;
        tx.execute("DELETE FROM entities", [])?;
        for entity in &graph.entities {
            Self::insert_entity_stmt(&tx, entity)?;
        }
        for relation in &graph.relations {
            Self::insert_relation_stmt(&tx, relation)?;
        }
        tx.commit()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        drop(conn);

        state.cache = GraphCache::load_from(graph.entities.clone(), graph.relations.clone());
        state.loaded = true;
        self.events.publish(GraphEvent::GraphSaved);
        Ok(())
    }

    fn append_entity(&self, entity: Entity) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        {
            let conn = self.conn.lock().unwrap();
            Self::insert_entity_stmt(&conn, &entity)?;
        }
        let name = entity.name.clone();
        state.cache.upsert_entity(entity);
        self.events.publish(GraphEvent::EntityCreated(name));
        Ok(())
    }

    fn append_relation(&self, relation: RelationRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        {
            let conn = self.conn.lock().unwrap();
            Self::insert_relation_stmt(&conn, &relation)?;
        }
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
        {
            let conn = self.conn.lock().unwrap();
            Self::insert_entity_stmt(&conn, &entity)?;
        }
        state.cache.upsert_entity(entity);
        self.events.publish(GraphEvent::EntityUpdated(name.to_string()));
        Ok(())
    }

    fn delete_entity(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        if !state.cache.contains_entity(name) {
            return Err(GraphError::NotFound(name.to_string()));
        }
        {
            let conn = self.conn.lock().unwrap();
            conn.execute("DELETE FROM entities WHERE name = ?1", params![name])?;
        }
        state.cache.remove_entity(name);
        self.events.publish(GraphEvent::EntityDeleted(name.to_string()));
        Ok(())
    }

    fn delete_relation(&self, relation: &Relation) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.ensure_loaded_locked(&mut state)?;
        if state.cache.relation(relation).is_none() {
            return Err(GraphError::NotFound(format!(
                "{}->{}:{}",
                relation.from, relation.to, relation.relation_type
            )));
        }
        {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                r#"DELETE FROM relations WHERE "from" = ?1 AND "to" = ?2 AND relation_type = ?3"#,
                params![relation.from, relation.to, relation.relation_type],
            )?;
        }
        state.cache.remove_relation(relation);
        self.events.publish(GraphEvent::RelationDeleted(relation.clone()));
        Ok(())
    }

    fn compact(&self) -> Result<()> {
        // No append log to coalesce on this backend; optimize the FTS index instead.
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("INSERT INTO entities_fts(entities_fts) VALUES('optimize');")?;
        Ok(())
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

    #[test]
    fn append_and_reload_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append_entity(Entity::new("Alice", "person")).unwrap();
        store
            .append_relation(RelationRecord::new("Alice", "Bob", "knows"))
            .unwrap_err(); // Bob does not exist: FK enforced outside bulk replace
        let graph = store.load_graph().unwrap();
        assert_eq!(graph.entities.len(), 1);
    }

    #[test]
    fn bulk_replace_tolerates_dangling_relations() {
        let store = SqliteStore::open_in_memory().unwrap();
        let graph = KnowledgeGraph {
            entities: vec![Entity::new("Alice", "person")],
            relations: vec![RelationRecord::new("Alice", "Ghost", "knows")],
        };
        store.save_graph(&graph).unwrap();
        let reloaded = store.load_graph().unwrap();
        assert_eq!(reloaded.relations.len(), 1);
    }

    #[test]
    fn delete_cascades_to_relations() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append_entity(Entity::new("Alice", "person")).unwrap();
        store.append_entity(Entity::new("Bob", "person")).unwrap();
        store.append_relation(RelationRecord::new("Alice", "Bob", "knows")).unwrap();
        store.delete_entity("Alice").unwrap();
        let graph = store.load_graph().unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert!(graph.relations.is_empty());
    }

    #[test]
    fn full_text_search_finds_observation_terms() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut e = Entity::new("Alice", "person");
        e.add_observation("loves rust programming");
        store.append_entity(e).unwrap();
        let results = store.full_text_search("rust", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "Alice");
    }

    #[test]
    fn embeddings_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.append_entity(Entity::new("Alice", "person")).unwrap();
        store.store_embedding("Alice", &[1.0, 2.0, 3.0], "test-model").unwrap();
        let (vector, model) = store.get_embedding("Alice").unwrap().unwrap();
        assert_eq!(vector, vec![1.0, 2.0, 3.0]);
        assert_eq!(model, "test-model");
    }
}

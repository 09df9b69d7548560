//! Storage layer — dual backend contract
//!
//! Both backends (`log` and, behind `backend-sqlite`, `relational`) expose
//! the same trait. A single write mutex serializes every mutator and
//! surrounds both the persisted side-effect and the cache/index update, so
//! readers never observe a half-applied mutation.

pub mod cache;
pub mod log;

#[cfg(feature = "backend-sqlite")]
pub mod relational;
#[cfg(feature = "backend-sqlite")]
mod migrations;

use crate::entity::{Entity, EntityPatch, KnowledgeGraph, Relation, RelationRecord};
use crate::error::Result;
use crate::event::EventBus;
use crate::index::Indexes;

/// Shared contract between the log and relational backends
pub trait GraphStore: Send + Sync {
    /// Read-only snapshot of the current graph
    fn load_graph(&self) -> Result<KnowledgeGraph>;

    /// Deep clone suitable for a caller that intends to mutate and save back
    fn graph_for_mutation(&self) -> Result<KnowledgeGraph>;

    /// Ensure the backend has loaded its persisted state into the cache
    fn ensure_loaded(&self) -> Result<()>;

    /// Replace the entire persisted graph (bulk replace; tolerates dangling
    /// relations during the critical section on both backends)
    fn save_graph(&self, graph: &KnowledgeGraph) -> Result<()>;

    /// Append one new entity (create); fails with `Conflict` if it already
    /// exists and `strict` is requested by the caller via `update_entity`.
    fn append_entity(&self, entity: Entity) -> Result<()>;

    fn append_relation(&self, relation: RelationRecord) -> Result<()>;

    /// Apply a partial update; `NotFound` if the entity does not exist
    fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<()>;

    /// Delete an entity and cascade-delete relations touching it
    fn delete_entity(&self, name: &str) -> Result<()>;

    fn delete_relation(&self, relation: &Relation) -> Result<()>;

    /// Rewrite the persisted form to coalesce history (log backend) or is a
    /// no-op (relational backend, which has no append log to coalesce)
    fn compact(&self) -> Result<()>;

    /// Drop the in-memory cache and indexes, forcing a reload on next access
    fn clear_cache(&self) -> Result<()>;

    /// Run `f` with a read-only view of the current indexes. Object-safe
    /// building block behind [`GraphStoreExt::with_indexes`]; call that one
    /// instead unless you're implementing a new backend.
    fn with_indexes_raw(&self, f: &mut dyn FnMut(&Indexes)) -> Result<()>;

    /// Fetch a single entity by exact name
    fn get_entity(&self, name: &str) -> Result<Option<Entity>>;

    fn entity_count(&self) -> Result<usize>;

    fn events(&self) -> &EventBus;
}

/// Ergonomic wrapper over [`GraphStore::with_indexes_raw`] that lets the
/// closure return a value. Kept as an extension trait, not a trait method,
/// because a generic method would make `dyn GraphStore` impossible to form.
pub trait GraphStoreExt: GraphStore {
    fn with_indexes<R>(&self, mut f: impl FnMut(&Indexes) -> R) -> Result<R> {
        let mut out = None;
        self.with_indexes_raw(&mut |idx| out = Some(f(idx)))?;
        Ok(out.expect("with_indexes_raw must invoke its callback exactly once"))
    }
}

impl<T: GraphStore + ?Sized> GraphStoreExt for T {}

/// Validate a user-supplied path used for persistence: reject traversal and
/// empty paths. Shared by both backends' constructors.
pub fn validate_store_path(path: &std::path::Path) -> Result<()> {
    use crate::error::GraphError;

    if path.as_os_str().is_empty() {
        return Err(GraphError::PathRefused("empty path".into()));
    }
    for component in path.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err(GraphError::PathRefused(format!(
                "path traversal rejected: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_store_path(std::path::Path::new("../escape.jsonl")).is_err());
    }

    #[test]
    fn accepts_plain_relative_path() {
        assert!(validate_store_path(std::path::Path::new("data/graph.jsonl")).is_ok());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(validate_store_path(std::path::Path::new("")).is_err());
    }
}

//! Data model — entities, relations, and the agent-memory overlay
//!
//! Entities are identified by a globally unique `name`. The agent-memory
//! fields are always present on the struct (see the design notes on not
//! modelling this with runtime-shape polymorphism) but are only meaningful
//! once `memory_type` is set.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of agent memory an entity carries, if any
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// Session-scoped, TTL-bound
    Working,
    /// Timeline / event memory
    Episodic,
    /// Fact-like long-term memory
    Semantic,
    /// How-to knowledge
    Procedural,
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryType::Working => "working",
            MemoryType::Episodic => "episodic",
            MemoryType::Semantic => "semantic",
            MemoryType::Procedural => "procedural",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "working" => Ok(MemoryType::Working),
            "episodic" => Ok(MemoryType::Episodic),
            "semantic" => Ok(MemoryType::Semantic),
            "procedural" => Ok(MemoryType::Procedural),
            other => Err(format!("unknown memory type: {other}")),
        }
    }
}

/// Visibility of an agent memory
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Shared,
    Public,
}

/// A named node in the knowledge graph
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Globally unique identifier; case-sensitive for equality
    pub name: String,
    /// Free-text type, lowercased for indexing
    pub entity_type: String,
    /// Ordered, deduplicated free-text facts
    pub observations: Vec<String>,
    /// Lowercased tag set
    #[serde(default, skip_serializing_if = "HashSet::is_empty")]
    pub tags: HashSet<String>,
    /// 0-10, defaults to 5 in decay math when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importance: Option<u8>,
    /// Name of the parent entity, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,

    // ---- agent-memory overlay: meaningful only when memory_type is Some ----
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<MemoryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_working_memory: bool,
    #[serde(default)]
    pub access_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// 0-1, defaults to 0.5
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub confirmation_count: u32,
    #[serde(default)]
    pub marked_for_promotion: bool,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<String>,
}

impl Entity {
    /// Create a bare entity with the given name and type
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            entity_type: entity_type.into().to_lowercase(),
            observations: Vec::new(),
            tags: HashSet::new(),
            importance: None,
            parent_name: None,
            created_at: now,
            last_modified: now,
            memory_type: None,
            session_id: None,
            task_id: None,
            expires_at: None,
            is_working_memory: false,
            access_count: 0,
            last_accessed_at: None,
            confidence: None,
            confirmation_count: 0,
            marked_for_promotion: false,
            visibility: Visibility::Private,
            agent_id: None,
            promoted_at: None,
            promoted_from: None,
        }
    }

    /// Whether this entity carries the agent-memory overlay
    pub fn is_agent_entity(&self) -> bool {
        self.memory_type.is_some()
    }

    /// Append an observation, ignoring it if already present (invariant 3)
    pub fn add_observation(&mut self, observation: impl Into<String>) -> bool {
        let observation = observation.into();
        if self.observations.iter().any(|o| o == &observation) {
            return false;
        }
        self.observations.push(observation);
        true
    }

    /// `importance`, defaulting to 5 as the decay math expects
    pub fn importance_or_default(&self) -> u8 {
        self.importance.unwrap_or(5)
    }

    /// `confidence`, defaulting to 0.5
    pub fn confidence_or_default(&self) -> f64 {
        self.confidence.unwrap_or(0.5)
    }

    /// Timestamp the decay/access engines treat as "last seen"
    pub fn reference_timestamp(&self) -> DateTime<Utc> {
        self.last_accessed_at.unwrap_or(self.created_at)
    }
}

/// A directed, typed edge between two entities. `(from, to, relation_type)` is
/// the composite primary key.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

/// A relation paired with its timestamps, as persisted
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationRecord {
    #[serde(flatten)]
    pub relation: Relation,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl RelationRecord {
    pub fn new(from: impl Into<String>, to: impl Into<String>, relation_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            relation: Relation {
                from: from.into(),
                to: to.into(),
                relation_type: relation_type.into(),
            },
            created_at: now,
            last_modified: now,
        }
    }
}

/// A full in-memory snapshot of the graph, as returned by `load_graph`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<RelationRecord>,
}

/// A partial update to an entity; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    pub entity_type: Option<String>,
    pub tags: Option<HashSet<String>>,
    pub importance: Option<u8>,
    pub parent_name: Option<Option<String>>,
    pub memory_type: Option<MemoryType>,
    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub is_working_memory: Option<bool>,
    pub access_count: Option<u64>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub confidence: Option<f64>,
    pub confirmation_count: Option<u32>,
    pub marked_for_promotion: Option<bool>,
    pub visibility: Option<Visibility>,
    pub promoted_at: Option<Option<DateTime<Utc>>>,
    pub promoted_from: Option<Option<String>>,
}

impl EntityPatch {
    /// Apply the patch to an entity, bumping `last_modified`
    pub fn apply_to(self, entity: &mut Entity) {
        if let Some(v) = self.entity_type {
            entity.entity_type = v.to_lowercase();
        }
        if let Some(v) = self.tags {
            entity.tags = v.into_iter().map(|t| t.to_lowercase()).collect();
        }
        if let Some(v) = self.importance {
            entity.importance = Some(v);
        }
        if let Some(v) = self.parent_name {
            entity.parent_name = v;
        }
        if let Some(v) = self.memory_type {
            entity.memory_type = Some(v);
        }
        if let Some(v) = self.session_id {
            entity.session_id = Some(v);
        }
        if let Some(v) = self.task_id {
            entity.task_id = Some(v);
        }
        if let Some(v) = self.expires_at {
            entity.expires_at = v;
        }
        if let Some(v) = self.is_working_memory {
            entity.is_working_memory = v;
        }
        if let Some(v) = self.access_count {
            entity.access_count = v;
        }
        if let Some(v) = self.last_accessed_at {
            entity.last_accessed_at = Some(v);
        }
        if let Some(v) = self.confidence {
            entity.confidence = Some(v);
        }
        if let Some(v) = self.confirmation_count {
            entity.confirmation_count = v;
        }
        if let Some(v) = self.marked_for_promotion {
            entity.marked_for_promotion = v;
        }
        if let Some(v) = self.visibility {
            entity.visibility = v;
        }
        if let Some(v) = self.promoted_at {
            entity.promoted_at = v;
        }
        if let Some(v) = self.promoted_from {
            entity.promoted_from = v;
        }
        entity.last_modified = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_dedup() {
        let mut e = Entity::new("Alice", "person");
        assert!(e.add_observation("likes tea"));
        assert!(!e.add_observation("likes tea"));
        assert_eq!(e.observations.len(), 1);
    }

    #[test]
    fn importance_defaults_to_five() {
        let e = Entity::new("Alice", "person");
        assert_eq!(e.importance_or_default(), 5);
    }

    #[test]
    fn entity_type_is_lowercased() {
        let e = Entity::new("Alice", "PERSON");
        assert_eq!(e.entity_type, "person");
    }

    #[test]
    fn agent_entity_detection() {
        let mut e = Entity::new("wm_1", "memory");
        assert!(!e.is_agent_entity());
        e.memory_type = Some(MemoryType::Working);
        assert!(e.is_agent_entity());
    }
}

//! The engine facade: wires storage, derived indexes, search, graph
//! traversal, and agent memory behind one API surface.
//!
//! `RankedIndex` and `Bm25Index` are maintained here, synchronously, right
//! after each store mutation commits — not via an `EventListener` subscribed
//! to the store's bus. A listener runs inside the store's own write-mutex
//! critical section (see `event.rs`), and this store's `Mutex` is not
//! reentrant, so a listener that called back into `get_entity` while the
//! mutation that triggered it is still holding the lock would deadlock.
//! Updating the derived indexes from the facade, after the store call
//! returns, sidesteps that entirely. The boolean-search cache needs no such
//! wiring: its cache key already digests the entity set, so a stale entry
//! simply never matches again.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::entity::{Entity, EntityPatch, MemoryType, Relation, RelationRecord};
use crate::error::{GraphError, Result};
use crate::graph::centrality::{betweenness_centrality, degree_centrality, pagerank};
use crate::graph::components::{connected_components, ComponentsResult};
use crate::graph::shortest_path::{shortest_path_bfs, shortest_path_dijkstra, Path};
use crate::graph::traversal::{bfs, dfs, TraversalOptions, TraversalResult};
use crate::graph::{neighbors, Direction, EdgeFilter};
use crate::index::Indexes;
use crate::memory::access_tracker::AccessTracker;
use crate::memory::context::{retrieve_for_context, retrieve_with_budget_allocation, BudgetAllocation, ContextOptions, ContextResult};
use crate::memory::decay::{
    apply_decay, decayed_memories, effective_importance, forget_weak_memories, memories_at_risk, reinforce_memory,
    DecayConfig, DecayReport, DecayScheduler, ForgetWeakMemoriesOptions, ForgetWeakMemoriesReport,
};
use crate::memory::salience::{rank_entities_by_salience, salience, RankedEntity, SalienceContext, SalienceWeights};
use crate::memory::working::{self, PromotionCandidate, SessionIndex};
use crate::search::bm25::Bm25Index;
use crate::search::boolean::{boolean_search, BooleanSearchCache};
use crate::search::fuzzy::{fuzzy_search, FuzzySearchCache, DEFAULT_THRESHOLD};
use crate::search::hybrid::{hybrid_search, HybridResult, SemanticLane};
use crate::search::ranked::RankedIndex;
use crate::search::{basic, SearchFilter, ScoredMatch};
use crate::store::log::LogStore;
#[cfg(feature = "backend-sqlite")]
use crate::store::relational::SqliteStore;
use crate::store::{GraphStore, GraphStoreExt};

/// The public entry point: one store, one set of derived search indexes, and
/// the agent-memory subsystem built on top of them.
pub struct GraphEngine {
    store: Arc<dyn GraphStore>,
    ranked: Mutex<RankedIndex>,
    bm25: Mutex<Bm25Index>,
    boolean_cache: BooleanSearchCache,
    fuzzy_cache: FuzzySearchCache,
    access_tracker: AccessTracker,
    pub decay_config: DecayConfig,
    session_index: SessionIndex,
    scheduler: DecayScheduler,
}

impl GraphEngine {
    /// Build an engine over an already-constructed store, priming
    /// `ranked`/`bm25` from its current contents.
    pub fn from_store(store: Arc<dyn GraphStore>) -> Result<Self> {
        store.ensure_loaded()?;
        let graph = store.load_graph()?;

        let mut ranked_index = RankedIndex::new();
        ranked_index.rebuild(graph.entities.iter());

        let mut bm25_index = Bm25Index::new();
        bm25_index.rebuild(graph.entities.iter());
        bm25_index.finalize();

        Ok(Self {
            store,
            ranked: Mutex::new(ranked_index),
            bm25: Mutex::new(bm25_index),
            boolean_cache: BooleanSearchCache::new(),
            fuzzy_cache: FuzzySearchCache::new(),
            access_tracker: AccessTracker::new(),
            decay_config: DecayConfig::default(),
            session_index: SessionIndex::new(),
            scheduler: DecayScheduler::new(),
        })
    }

    /// Default append-only log backend at `path`.
    pub fn open_log(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_store(Arc::new(LogStore::new(path)?))
    }

    #[cfg(feature = "backend-sqlite")]
    pub fn open_sqlite(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::from_store(Arc::new(SqliteStore::new(path)?))
    }

    #[cfg(feature = "backend-sqlite")]
    pub fn open_sqlite_in_memory() -> Result<Self> {
        Self::from_store(Arc::new(SqliteStore::open_in_memory()?))
    }

    fn entities_snapshot(&self) -> Result<HashMap<String, Entity>> {
        Ok(self.store.load_graph()?.entities.into_iter().map(|e| (e.name.clone(), e)).collect())
    }

    fn with_indexes<R>(&self, f: &mut dyn FnMut(&Indexes) -> R) -> Result<R> {
        self.store.with_indexes(f)
    }

    fn index_upsert(&self, entity: &Entity) {
        self.ranked.lock().unwrap().update(entity);
        self.bm25.lock().unwrap().update(entity);
        self.fuzzy_cache.invalidate();
    }

    fn index_remove(&self, name: &str) {
        self.ranked.lock().unwrap().remove(name);
        self.bm25.lock().unwrap().remove(name);
        self.fuzzy_cache.invalidate();
    }

    // ---------------------------------------------------------------- CRUD

    pub fn create_entity(&self, name: &str, entity_type: &str, observations: &[String]) -> Result<Entity> {
        let mut entity = Entity::new(name, entity_type);
        for obs in observations {
            entity.add_observation(obs.clone());
        }
        self.store.append_entity(entity.clone())?;
        self.index_upsert(&entity);
        Ok(entity)
    }

    pub fn get_entity(&self, name: &str) -> Result<Option<Entity>> {
        self.store.get_entity(name)
    }

    pub fn update_entity(&self, name: &str, patch: EntityPatch) -> Result<()> {
        if let Some(parent) = &patch.parent_name {
            let entities = self.entities_snapshot()?;
            if !entities.contains_key(name) {
                return Err(GraphError::NotFound(name.to_string()));
            }
            self.check_parent_assignment(&entities, name, parent.as_deref())?;
        }
        self.store.update_entity(name, patch)?;
        if let Some(entity) = self.store.get_entity(name)? {
            self.index_upsert(&entity);
        }
        Ok(())
    }

    /// Append an observation, upserting the entity back into the store.
    /// Deduplicated per `Entity::add_observation`.
    pub fn add_observation(&self, name: &str, observation: &str) -> Result<bool> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        let added = entity.add_observation(observation);
        if added {
            entity.last_modified = Utc::now();
            self.store.append_entity(entity.clone())?;
            self.index_upsert(&entity);
        }
        Ok(added)
    }

    pub fn delete_entity(&self, name: &str) -> Result<()> {
        self.store.delete_entity(name)?;
        self.access_tracker.forget(name);
        self.index_remove(name);
        Ok(())
    }

    pub fn create_relation(&self, from: &str, to: &str, relation_type: &str) -> Result<()> {
        self.store.append_relation(RelationRecord::new(from, to, relation_type))
    }

    pub fn delete_relation(&self, relation: &Relation) -> Result<()> {
        self.store.delete_relation(relation)
    }

    pub fn entity_count(&self) -> Result<usize> {
        self.store.entity_count()
    }

    /// Record an access both in the rich in-memory tracker and as the
    /// entity's own `accessCount`/`lastAccessedAt` summary fields.
    pub fn record_access(&self, name: &str, session_id: Option<&str>) -> Result<()> {
        let now = Utc::now();
        self.access_tracker.record_access(name, session_id, now);
        let Some(entity) = self.store.get_entity(name)? else { return Ok(()) };
        self.store.update_entity(
            name,
            EntityPatch { access_count: Some(entity.access_count + 1), last_accessed_at: Some(now), ..Default::default() },
        )
    }

    // -------------------------------------------------------------- search

    pub fn search_substring(&self, query: &str, filter: &SearchFilter) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| basic::substring_search(&entities, idx, query, filter))
    }

    pub fn search_ranked(&self, query: &str, filter: &SearchFilter) -> Result<Vec<ScoredMatch>> {
        let entities = self.entities_snapshot()?;
        Ok(self.ranked.lock().unwrap().search(&entities, query, filter))
    }

    pub fn search_bm25(&self, query: &str, filter: &SearchFilter) -> Result<Vec<ScoredMatch>> {
        let entities = self.entities_snapshot()?;
        Ok(self.bm25.lock().unwrap().search(&entities, query, filter))
    }

    pub fn search_boolean(&self, query: &str, filter: &SearchFilter) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| boolean_search(&entities, idx, &self.boolean_cache, query, filter))?
    }

    pub fn search_fuzzy(&self, query: &str, threshold: Option<f64>, filter: &SearchFilter) -> Result<Vec<ScoredMatch>> {
        let entities = self.entities_snapshot()?;
        Ok(fuzzy_search(&entities, &self.fuzzy_cache, query, threshold.unwrap_or(DEFAULT_THRESHOLD), filter))
    }

    pub fn search_hybrid(&self, query: &str, semantic: Option<&dyn SemanticLane>, filter: &SearchFilter) -> Result<HybridResult> {
        let entities = self.entities_snapshot()?;
        let bm25 = self.bm25.lock().unwrap();
        self.with_indexes(&mut |idx| hybrid_search(&entities, idx, &bm25, semantic, query, filter))
    }

    // --------------------------------------------------------------- graph

    pub fn neighbors(&self, name: &str, direction: Direction, filter: &EdgeFilter) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| neighbors(idx, &entities, name, direction, filter))
    }

    pub fn bfs(&self, start: &str, options: &TraversalOptions) -> Result<TraversalResult> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| bfs(idx, &entities, start, options))
    }

    pub fn dfs(&self, start: &str, options: &TraversalOptions) -> Result<TraversalResult> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| dfs(idx, &entities, start, options))
    }

    pub fn shortest_path(&self, start: &str, goal: &str, direction: Direction, filter: &EdgeFilter) -> Result<Option<Path>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| shortest_path_bfs(idx, &entities, start, goal, direction, filter))
    }

    pub fn shortest_weighted_path(
        &self,
        start: &str,
        goal: &str,
        direction: Direction,
        filter: &EdgeFilter,
        weight: impl Fn(&str) -> f64,
    ) -> Result<Option<Path>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| shortest_path_dijkstra(idx, &entities, start, goal, direction, filter, &weight))
    }

    pub fn degree_centrality(&self, filter: &EdgeFilter) -> Result<HashMap<String, f64>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| degree_centrality(idx, &entities, filter))
    }

    pub fn betweenness_centrality(&self, filter: &EdgeFilter) -> Result<HashMap<String, f64>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| betweenness_centrality(idx, &entities, filter))
    }

    pub fn pagerank(&self, filter: &EdgeFilter) -> Result<HashMap<String, f64>> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| pagerank(idx, &entities, filter))
    }

    pub fn connected_components(&self, filter: &EdgeFilter) -> Result<ComponentsResult> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| connected_components(idx, &entities, filter))
    }

    // ----------------------------------------------------------- hierarchy

    /// Reject a parent assignment that would re-enter `name` while walking
    /// the proposed parent's own ancestor chain (invariant 4).
    fn check_parent_assignment(&self, entities: &HashMap<String, Entity>, name: &str, parent: Option<&str>) -> Result<()> {
        let Some(parent_name) = parent else { return Ok(()) };
        if !entities.contains_key(parent_name) {
            return Err(GraphError::NotFound(parent_name.to_string()));
        }
        if parent_name == name {
            return Err(GraphError::Cycle(format!("{name} cannot be its own parent")));
        }
        let mut current = Some(parent_name.to_string());
        let mut seen = HashSet::new();
        while let Some(cursor) = current {
            if cursor == name {
                return Err(GraphError::Cycle(format!(
                    "setting {name}'s parent to {parent_name} would create a cycle"
                )));
            }
            if !seen.insert(cursor.clone()) {
                break;
            }
            current = entities.get(&cursor).and_then(|e| e.parent_name.clone());
        }
        Ok(())
    }

    /// Set (or clear, with `parent: None`) `name`'s parent, rejecting any
    /// assignment that would create a cycle in the hierarchy.
    pub fn set_entity_parent(&self, name: &str, parent: Option<&str>) -> Result<()> {
        self.update_entity(name, EntityPatch { parent_name: Some(parent.map(str::to_string)), ..Default::default() })
    }

    /// Entities whose `parent_name` is exactly `name`.
    pub fn get_children(&self, name: &str) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        let mut children: Vec<String> =
            entities.values().filter(|e| e.parent_name.as_deref() == Some(name)).map(|e| e.name.clone()).collect();
        children.sort();
        Ok(children)
    }

    /// Every entity transitively reachable by following `parent_name` down
    /// from `name`, in no particular hierarchy order.
    pub fn get_descendants(&self, name: &str) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        let mut stack: Vec<String> =
            entities.values().filter(|e| e.parent_name.as_deref() == Some(name)).map(|e| e.name.clone()).collect();
        let mut seen: HashSet<String> = stack.iter().cloned().collect();
        let mut out = Vec::new();
        while let Some(current) = stack.pop() {
            out.push(current.clone());
            for child in entities.values().filter(|e| e.parent_name.as_deref() == Some(current.as_str())) {
                if seen.insert(child.name.clone()) {
                    stack.push(child.name.clone());
                }
            }
        }
        out.sort();
        Ok(out)
    }

    /// `name`'s parent, grandparent, and so on up to the root, nearest first.
    pub fn get_ancestors(&self, name: &str) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut current = entities.get(name).and_then(|e| e.parent_name.clone());
        while let Some(cursor) = current {
            if !seen.insert(cursor.clone()) {
                break;
            }
            current = entities.get(&cursor).and_then(|e| e.parent_name.clone());
            out.push(cursor);
        }
        Ok(out)
    }

    // ------------------------------------------------------------- memory

    pub fn effective_importance(&self, name: &str) -> Result<f64> {
        let entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        Ok(effective_importance(&entity, &self.decay_config, Utc::now()))
    }

    pub fn decay_report(&self, at_risk_threshold: f64) -> Result<DecayReport> {
        let entities = self.entities_snapshot()?;
        let agent_entities: Vec<&Entity> = entities.values().filter(|e| e.is_agent_entity()).collect();
        Ok(apply_decay(agent_entities.into_iter(), &self.decay_config, Utc::now(), at_risk_threshold))
    }

    pub fn decayed_memories(&self, threshold: f64) -> Result<Vec<(String, f64)>> {
        let entities = self.entities_snapshot()?;
        let agent_entities: Vec<&Entity> = entities.values().filter(|e| e.is_agent_entity()).collect();
        Ok(decayed_memories(agent_entities.into_iter(), &self.decay_config, Utc::now(), threshold))
    }

    pub fn memories_at_risk(&self, threshold: f64) -> Result<Vec<(String, f64)>> {
        let entities = self.entities_snapshot()?;
        let agent_entities: Vec<&Entity> = entities.values().filter(|e| e.is_agent_entity()).collect();
        Ok(memories_at_risk(agent_entities.into_iter(), &self.decay_config, Utc::now(), threshold))
    }

    pub fn reinforce_memory(&self, name: &str, confirmation_boost: u32, confidence_boost: Option<f64>) -> Result<()> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        reinforce_memory(&mut entity, confirmation_boost, confidence_boost, Utc::now());
        self.store.update_entity(
            name,
            EntityPatch {
                confirmation_count: Some(entity.confirmation_count),
                confidence: entity.confidence,
                access_count: Some(entity.access_count),
                last_accessed_at: entity.last_accessed_at,
                ..Default::default()
            },
        )
    }

    /// Decide which agent entities would be forgotten, and — unless
    /// `options.dry_run` — actually delete them.
    pub fn forget_weak_memories(&self, options: &ForgetWeakMemoriesOptions) -> Result<ForgetWeakMemoriesReport> {
        let entities = self.entities_snapshot()?;
        let agent_entities: Vec<&Entity> = entities.values().filter(|e| e.is_agent_entity()).collect();
        let report = forget_weak_memories(agent_entities.into_iter(), &self.decay_config, Utc::now(), options);
        if !options.dry_run {
            for name in &report.removed {
                self.delete_entity(name)?;
            }
        }
        Ok(report)
    }

    pub fn rank_by_salience(&self, weights: &SalienceWeights, ctx: &SalienceContext) -> Result<Vec<RankedEntity>> {
        let entities = self.entities_snapshot()?;
        let agent_entities: Vec<&Entity> = entities.values().filter(|e| e.is_agent_entity()).collect();
        self.with_indexes(&mut |idx| {
            rank_entities_by_salience(
                agent_entities.iter().copied(),
                idx.relations(),
                &self.access_tracker,
                &self.decay_config,
                weights,
                ctx,
                Utc::now(),
            )
        })
    }

    pub fn salience_of(&self, name: &str, weights: &SalienceWeights, ctx: &SalienceContext) -> Result<f64> {
        let entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        self.with_indexes(&mut |idx| {
            salience(&entity, idx.relations(), &self.access_tracker, &self.decay_config, weights, ctx, Utc::now()).0
        })
    }

    // ----------------------------------------------------------- working

    pub fn create_working_memory(
        &self,
        session_id: &str,
        entity_type: &str,
        content: &str,
        ttl_hours: Option<f64>,
        max_per_session: usize,
    ) -> Result<Entity> {
        let entities = self.entities_snapshot()?;
        let entity = working::create_working_memory(
            &entities,
            &self.session_index,
            session_id,
            entity_type,
            content,
            ttl_hours,
            max_per_session,
            Utc::now(),
        )?;
        self.store.append_entity(entity.clone())?;
        self.session_index.add(session_id, &entity.name);
        self.index_upsert(&entity);
        Ok(entity)
    }

    pub fn session_memories(&self, session_id: &str) -> Result<Vec<String>> {
        let entities = self.entities_snapshot()?;
        Ok(working::get_session_memories(&self.session_index, &entities, session_id))
    }

    pub fn clear_expired_working_memories(&self) -> Result<usize> {
        let entities = self.entities_snapshot()?;
        let expired = working::expired_memory_names(&entities, Utc::now());
        for name in &expired {
            if let Some(session) = entities.get(name).and_then(|e| e.session_id.as_deref()) {
                self.session_index.remove(session, name);
            }
            self.delete_entity(name)?;
        }
        Ok(expired.len())
    }

    pub fn extend_working_memory_ttl(&self, name: &str, hours: f64) -> Result<()> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        working::extend_ttl(&mut entity, hours, Utc::now())?;
        self.store.update_entity(name, EntityPatch { expires_at: Some(entity.expires_at), ..Default::default() })
    }

    pub fn mark_for_promotion(&self, name: &str, target: MemoryType) -> Result<()> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        working::mark_for_promotion(&mut entity, target)?;
        self.store.update_entity(
            name,
            EntityPatch { marked_for_promotion: Some(true), tags: Some(entity.tags), ..Default::default() },
        )
    }

    pub fn promotion_candidates(&self) -> Result<Vec<PromotionCandidate>> {
        let entities = self.entities_snapshot()?;
        Ok(working::promotion_candidates(entities.values()))
    }

    pub fn promote_memory(&self, name: &str, target: MemoryType) -> Result<()> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        let session = entity.session_id.clone();
        working::promote_memory(&mut entity, target, Utc::now())?;
        self.store.update_entity(
            name,
            EntityPatch {
                memory_type: Some(entity.memory_type.unwrap()),
                expires_at: Some(None),
                is_working_memory: Some(false),
                marked_for_promotion: Some(false),
                tags: Some(entity.tags),
                promoted_at: Some(entity.promoted_at),
                promoted_from: Some(entity.promoted_from),
                ..Default::default()
            },
        )?;
        if let Some(session_id) = session {
            self.session_index.remove(&session_id, name);
        }
        Ok(())
    }

    /// Confirm a working memory; thresholds of `(0.9 confidence, 3
    /// confirmations)` auto-promote straight to semantic memory.
    pub fn confirm_memory(&self, name: &str, confidence_boost: Option<f64>) -> Result<bool> {
        let mut entity = self.store.get_entity(name)?.ok_or_else(|| GraphError::NotFound(name.to_string()))?;
        let session = entity.session_id.clone();
        let promoted = working::confirm_memory(&mut entity, confidence_boost, Utc::now(), Some((0.9, 3)))?;
        self.store.update_entity(
            name,
            EntityPatch {
                confirmation_count: Some(entity.confirmation_count),
                confidence: entity.confidence,
                access_count: Some(entity.access_count),
                last_accessed_at: entity.last_accessed_at,
                memory_type: entity.memory_type,
                expires_at: Some(entity.expires_at),
                is_working_memory: Some(entity.is_working_memory),
                marked_for_promotion: Some(entity.marked_for_promotion),
                promoted_at: Some(entity.promoted_at),
                promoted_from: Some(entity.promoted_from),
                ..Default::default()
            },
        )?;
        if promoted {
            if let Some(session_id) = session {
                self.session_index.remove(&session_id, name);
            }
        }
        Ok(promoted)
    }

    // ----------------------------------------------------------- context

    pub fn retrieve_for_context(
        &self,
        weights: &SalienceWeights,
        salience_ctx: &SalienceContext,
        options: &ContextOptions,
    ) -> Result<ContextResult> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| {
            retrieve_for_context(
                entities.values(),
                idx.relations(),
                &self.access_tracker,
                &self.decay_config,
                weights,
                salience_ctx,
                options,
                Utc::now(),
            )
        })
    }

    pub fn retrieve_with_budget_allocation(
        &self,
        weights: &SalienceWeights,
        salience_ctx: &SalienceContext,
        options: &ContextOptions,
        allocation: &BudgetAllocation,
    ) -> Result<ContextResult> {
        let entities = self.entities_snapshot()?;
        self.with_indexes(&mut |idx| {
            retrieve_with_budget_allocation(
                entities.values(),
                idx.relations(),
                &self.access_tracker,
                &self.decay_config,
                weights,
                salience_ctx,
                options,
                allocation,
                Utc::now(),
            )
        })
    }

    // ---------------------------------------------------------- scheduler

    /// Start a background decay sweep every `interval`; logs via `tracing`
    /// on failure rather than surfacing errors, since nothing is listening.
    pub fn start_decay_scheduler(self: &Arc<Self>, interval: Duration) -> bool {
        let engine = self.clone();
        self.scheduler.start(
            interval,
            move || engine.decay_report(1.0).map(|_| ()).map_err(|e| e.to_string()),
            |err| tracing::warn!(error = %err, "decay scheduler tick failed"),
        )
    }

    pub fn stop_decay_scheduler(&self) {
        self.scheduler.stop();
    }
}

//! Working memory: session-scoped, TTL-bound entities with a promotion
//! workflow into episodic/semantic memory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::entity::{Entity, MemoryType};
use crate::error::{GraphError, Result};

pub const DEFAULT_MAX_PER_SESSION: usize = 100;
pub const DEFAULT_TTL_HOURS: f64 = 24.0;

/// FNV-1a 32-bit hash, rendered as 8 lowercase hex digits.
fn fnv1a_hex8(s: &str) -> String {
    const FNV_OFFSET: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;
    let mut hash = FNV_OFFSET;
    for byte in s.as_bytes() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:08x}")
}

fn ensure_working(entity: &Entity) -> Result<()> {
    if entity.memory_type != Some(MemoryType::Working) {
        return Err(GraphError::Validation(format!("{} is not a working memory", entity.name)));
    }
    Ok(())
}

/// Caches `session_id -> working-memory names`, rebuilt from a full scan on
/// a miss. A rebuild that finds nothing is not cached, so a genuinely empty
/// session re-scans on every query — a known, accepted cost.
#[derive(Default)]
pub struct SessionIndex {
    sessions: Mutex<HashMap<String, HashSet<String>>>,
}

impl SessionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_rebuild(&self, session_id: &str, entities: &HashMap<String, Entity>) -> HashSet<String> {
        if let Some(set) = self.sessions.lock().unwrap().get(session_id) {
            if !set.is_empty() {
                return set.clone();
            }
        }
        let rebuilt: HashSet<String> = entities
            .values()
            .filter(|e| e.is_working_memory && e.session_id.as_deref() == Some(session_id))
            .map(|e| e.name.clone())
            .collect();
        if !rebuilt.is_empty() {
            self.sessions.lock().unwrap().insert(session_id.to_string(), rebuilt.clone());
        }
        rebuilt
    }

    pub fn add(&self, session_id: &str, name: &str) {
        self.sessions.lock().unwrap().entry(session_id.to_string()).or_default().insert(name.to_string());
    }

    pub fn remove(&self, session_id: &str, name: &str) {
        if let Some(set) = self.sessions.lock().unwrap().get_mut(session_id) {
            set.remove(name);
        }
    }

    pub fn invalidate(&self, session_id: &str) {
        self.sessions.lock().unwrap().remove(session_id);
    }
}

/// Build a new working-memory entity; fails if the session is already at
/// `max_per_session`. Caller is responsible for persisting it and calling
/// `SessionIndex::add`.
pub fn create_working_memory(
    entities: &HashMap<String, Entity>,
    session_index: &SessionIndex,
    session_id: &str,
    entity_type: &str,
    content: &str,
    ttl_hours: Option<f64>,
    max_per_session: usize,
    now: DateTime<Utc>,
) -> Result<Entity> {
    let existing = session_index.get_or_rebuild(session_id, entities);
    if existing.len() >= max_per_session {
        return Err(GraphError::Validation(format!(
            "session {session_id} already has {max_per_session} working memories"
        )));
    }

    let name = format!("wm_{session_id}_{}_{}", now.timestamp_millis(), fnv1a_hex8(content));
    let mut entity = Entity::new(&name, entity_type);
    entity.add_observation(content);
    entity.memory_type = Some(MemoryType::Working);
    entity.session_id = Some(session_id.to_string());
    entity.is_working_memory = true;
    entity.created_at = now;
    entity.last_modified = now;
    entity.expires_at = Some(now + ChronoDuration::seconds((ttl_hours.unwrap_or(DEFAULT_TTL_HOURS) * 3600.0) as i64));
    Ok(entity)
}

pub fn get_session_memories(session_index: &SessionIndex, entities: &HashMap<String, Entity>, session_id: &str) -> Vec<String> {
    let mut names: Vec<String> = session_index.get_or_rebuild(session_id, entities).into_iter().collect();
    names.sort();
    names
}

/// Names of every working memory whose `expires_at` is at or before `now`.
pub fn expired_memory_names(entities: &HashMap<String, Entity>, now: DateTime<Utc>) -> Vec<String> {
    entities
        .values()
        .filter(|e| e.is_working_memory && e.expires_at.map(|exp| exp <= now).unwrap_or(false))
        .map(|e| e.name.clone())
        .collect()
}

/// Restart the TTL from `now` if already expired, otherwise extend it.
pub fn extend_ttl(entity: &mut Entity, hours: f64, now: DateTime<Utc>) -> Result<()> {
    ensure_working(entity)?;
    if hours <= 0.0 {
        return Err(GraphError::Validation("extend_ttl hours must be positive".into()));
    }
    let delta = ChronoDuration::seconds((hours * 3600.0) as i64);
    let expired = entity.expires_at.map(|exp| exp <= now).unwrap_or(true);
    entity.expires_at = Some(if expired { now + delta } else { entity.expires_at.unwrap() + delta });
    Ok(())
}

/// Mark a working memory as a candidate for promotion to `target`, tagging
/// it `promote_to_{target}`.
pub fn mark_for_promotion(entity: &mut Entity, target: MemoryType) -> Result<()> {
    ensure_working(entity)?;
    entity.tags.retain(|t| !t.starts_with("promote_to_"));
    entity.tags.insert(format!("promote_to_{target}"));
    entity.marked_for_promotion = true;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PromotionCandidate {
    pub name: String,
    pub priority: f64,
}

/// Rank working memories by promotion priority: explicitly marked entities
/// get a flat +100, plus an additive score from confidence, confirmation
/// count, and access count (both contribute — this is intentional, not a
/// bug: a marked-and-well-confirmed memory should outrank a marked-only one).
pub fn promotion_candidates<'a>(entities: impl Iterator<Item = &'a Entity>) -> Vec<PromotionCandidate> {
    let mut candidates: Vec<PromotionCandidate> = entities
        .filter(|e| e.is_working_memory)
        .map(|e| {
            let mut priority = 0.0;
            if e.marked_for_promotion {
                priority += 100.0;
            }
            priority += 50.0 * e.confidence_or_default()
                + 10.0 * e.confirmation_count as f64
                + e.access_count as f64;
            PromotionCandidate { name: e.name.clone(), priority }
        })
        .collect();
    candidates.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap().then_with(|| a.name.cmp(&b.name)));
    candidates
}

/// Promote a working memory into `target`. Caller still owns removing the
/// entity from the session index.
pub fn promote_memory(entity: &mut Entity, target: MemoryType, now: DateTime<Utc>) -> Result<()> {
    ensure_working(entity)?;
    entity.memory_type = Some(target);
    entity.expires_at = None;
    entity.is_working_memory = false;
    entity.marked_for_promotion = false;
    entity.promoted_at = Some(now);
    entity.promoted_from = Some("working".to_string());
    entity.tags.retain(|t| !t.starts_with("promote_to_"));
    entity.last_modified = now;
    Ok(())
}

/// Increment confirmation count and clamp confidence; if `auto_promote`
/// thresholds are met, promotes straight to semantic memory regardless of
/// any earlier `markForPromotion` target (an intentional simplification —
/// see design notes).
pub fn confirm_memory(
    entity: &mut Entity,
    confidence_boost: Option<f64>,
    now: DateTime<Utc>,
    auto_promote: Option<(f64, u32)>,
) -> Result<bool> {
    ensure_working(entity)?;
    entity.confirmation_count = entity.confirmation_count.saturating_add(1);
    if let Some(boost) = confidence_boost {
        entity.confidence = Some((entity.confidence_or_default() + boost).min(1.0));
    }
    entity.last_modified = now;
    entity.last_accessed_at = Some(now);
    entity.access_count += 1;

    if let Some((confidence_threshold, confirmation_threshold)) = auto_promote {
        if entity.confidence_or_default() >= confidence_threshold && entity.confirmation_count >= confirmation_threshold {
            promote_memory(entity, MemoryType::Semantic, now)?;
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_respects_session_cap() {
        let mut entities = HashMap::new();
        let index = SessionIndex::new();
        let now = Utc::now();
        for i in 0..2 {
            let entity = create_working_memory(&entities, &index, "s1", "note", &format!("hi{i}"), None, 2, now).unwrap();
            index.add("s1", &entity.name);
            entities.insert(entity.name.clone(), entity);
        }
        let err = create_working_memory(&entities, &index, "s1", "note", "hi-overflow", None, 2, now).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn expired_entity_is_detected() {
        let mut e = Entity::new("wm_s1_1_abcd1234", "note");
        e.is_working_memory = true;
        e.expires_at = Some(Utc::now() - ChronoDuration::seconds(1));
        let entities: HashMap<String, Entity> = [(e.name.clone(), e)].into_iter().collect();
        let expired = expired_memory_names(&entities, Utc::now());
        assert_eq!(expired.len(), 1);
    }

    #[test]
    fn promote_clears_working_flags() {
        let mut e = Entity::new("wm_s1_1_abcd1234", "note");
        e.memory_type = Some(MemoryType::Working);
        e.is_working_memory = true;
        e.expires_at = Some(Utc::now() + ChronoDuration::hours(1));
        promote_memory(&mut e, MemoryType::Episodic, Utc::now()).unwrap();
        assert!(!e.is_working_memory);
        assert!(e.expires_at.is_none());
        assert_eq!(e.memory_type, Some(MemoryType::Episodic));
    }

    #[test]
    fn mutators_reject_non_working_entities() {
        let mut e = Entity::new("Alice", "person");
        let err = extend_ttl(&mut e, 1.0, Utc::now()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }
}

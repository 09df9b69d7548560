//! Salience scoring: how worth keeping in an agent's active context an
//! entity is right now, combining decay-adjusted importance, recency,
//! access frequency, contextual relevance, and novelty.

use chrono::{DateTime, Utc};

use crate::entity::Entity;
use crate::index::RelationIndex;
use crate::memory::access_tracker::AccessTracker;
use crate::memory::decay::{effective_importance, DecayConfig};

pub const DEFAULT_FREQUENCY_NORM: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct SalienceWeights {
    pub importance: f64,
    pub recency: f64,
    pub frequency: f64,
    pub context: f64,
    pub novelty: f64,
}

impl Default for SalienceWeights {
    fn default() -> Self {
        Self { importance: 0.25, recency: 0.25, frequency: 0.2, context: 0.2, novelty: 0.1 }
    }
}

/// Ambient context used to score how relevant an entity is to what the
/// agent is doing right now.
#[derive(Debug, Clone, Default)]
pub struct SalienceContext {
    pub current_task: Option<String>,
    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub recent_entities: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SalienceComponents {
    pub importance: f64,
    pub recency: f64,
    pub frequency: f64,
    pub context: f64,
    pub novelty: f64,
}

#[derive(Debug, Clone)]
pub struct RankedEntity {
    pub name: String,
    pub salience_score: f64,
    pub components: SalienceComponents,
}

fn novelty(entity: &Entity, now: DateTime<Utc>) -> f64 {
    let age_days = ((now - entity.created_at).num_milliseconds() as f64 / 86_400_000.0).max(1.0);
    (1.0 / (1.0 + entity.access_count as f64 / age_days)).clamp(0.0, 1.0)
}

fn context_relevance(entity: &Entity, relations: &RelationIndex, ctx: &SalienceContext) -> f64 {
    let mut score = 0.0;

    if let Some(task) = &ctx.current_task {
        let needle = task.to_lowercase();
        let text_match = entity.name.to_lowercase().contains(&needle)
            || entity.observations.iter().any(|o| o.to_lowercase().contains(&needle));
        if text_match {
            score += 0.4;
        }
    }
    if ctx.session_id.is_some() && entity.session_id == ctx.session_id {
        score += 0.3;
    }
    if ctx.task_id.is_some() && entity.task_id == ctx.task_id {
        score += 0.3;
    }
    let co_referenced = ctx.recent_entities.iter().any(|name| {
        name == &entity.name || relations.bidirectional(&entity.name).iter().any(|r| r.from == *name || r.to == *name)
    });
    if co_referenced {
        score += 0.3;
    }

    score.clamp(0.0, 1.0)
}

fn frequency_component(access_count: u64, freq_norm: f64) -> f64 {
    if freq_norm <= 0.0 {
        return 0.0;
    }
    (((1.0 + access_count as f64).ln()) / ((1.0 + freq_norm).ln())).clamp(0.0, 1.0)
}

/// Salience of one entity at `now`, given its decay-adjusted importance,
/// access history, and ambient context.
pub fn salience(
    entity: &Entity,
    relations: &RelationIndex,
    access_tracker: &AccessTracker,
    decay_config: &DecayConfig,
    weights: &SalienceWeights,
    ctx: &SalienceContext,
    now: DateTime<Utc>,
) -> (f64, SalienceComponents) {
    let importance = (effective_importance(entity, decay_config, now) / 10.0).clamp(0.0, 1.0);
    let recency = access_tracker.recency_score(&entity.name, now);
    let frequency = frequency_component(entity.access_count, DEFAULT_FREQUENCY_NORM);
    let context = context_relevance(entity, relations, ctx);
    let nov = novelty(entity, now);

    let score = weights.importance * importance
        + weights.recency * recency
        + weights.frequency * frequency
        + weights.context * context
        + weights.novelty * nov;

    (score, SalienceComponents { importance, recency, frequency, context, novelty: nov })
}

/// Rank every entity by salience, highest first, ties broken by name.
pub fn rank_entities_by_salience<'a>(
    entities: impl Iterator<Item = &'a Entity>,
    relations: &RelationIndex,
    access_tracker: &AccessTracker,
    decay_config: &DecayConfig,
    weights: &SalienceWeights,
    ctx: &SalienceContext,
    now: DateTime<Utc>,
) -> Vec<RankedEntity> {
    let mut ranked: Vec<RankedEntity> = entities
        .map(|entity| {
            let (score, components) = salience(entity, relations, access_tracker, decay_config, weights, ctx, now);
            RankedEntity { name: entity.name.clone(), salience_score: score, components }
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.salience_score.partial_cmp(&a.salience_score).unwrap().then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_importance_and_access_count_rank_higher() {
        let relations = RelationIndex::default();
        let tracker = AccessTracker::new();
        let now = Utc::now();

        let mut hot = Entity::new("Hot", "memory");
        hot.importance = Some(9);
        hot.access_count = 50;
        tracker.record_access("Hot", None, now);

        let mut cold = Entity::new("Cold", "memory");
        cold.importance = Some(2);

        let ranked = rank_entities_by_salience(
            [hot, cold].iter(),
            &relations,
            &tracker,
            &DecayConfig::default(),
            &SalienceWeights::default(),
            &SalienceContext::default(),
            now,
        );
        assert_eq!(ranked[0].name, "Hot");
    }

    #[test]
    fn co_referenced_entity_gets_context_boost() {
        let relations = RelationIndex::default();
        let tracker = AccessTracker::new();
        let now = Utc::now();
        let entity = Entity::new("Alice", "memory");
        let ctx = SalienceContext { recent_entities: vec!["Alice".to_string()], ..Default::default() };
        let (_, components) = salience(&entity, &relations, &tracker, &DecayConfig::default(), &SalienceWeights::default(), &ctx, now);
        assert!(components.context > 0.0);
    }
}

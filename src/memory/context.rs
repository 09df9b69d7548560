//! Token-budgeted context assembly: pick which memories fit in an agent's
//! context window, ranked by salience, greedily packed to a token budget.

use chrono::{DateTime, Utc};

use crate::entity::{Entity, MemoryType};
use crate::index::RelationIndex;
use crate::memory::access_tracker::AccessTracker;
use crate::memory::decay::DecayConfig;
use crate::memory::salience::{rank_entities_by_salience, RankedEntity, SalienceContext, SalienceWeights};

pub const DEFAULT_MAX_TOKENS: usize = 4000;
pub const DEFAULT_RESERVE_BUFFER: usize = 100;
pub const DEFAULT_TOKEN_MULTIPLIER: f64 = 1.3;
pub const DEFAULT_MAX_ENTITIES_TO_CONSIDER: usize = 1000;
pub const DEFAULT_MIN_SALIENCE: f64 = 0.0;

/// Whitespace-token count times `token_multiplier`, rounded up — a cheap
/// stand-in for a real tokenizer.
pub fn estimate_tokens(text: &str, token_multiplier: f64) -> usize {
    let words = text.split_whitespace().count();
    (words as f64 * token_multiplier).ceil() as usize
}

/// Text counted toward an entity's token cost: name, type, observations, and
/// whichever agent-memory fields are set.
fn entity_text(entity: &Entity) -> String {
    let mut parts = vec![entity.name.clone(), entity.entity_type.clone()];
    if let Some(memory_type) = entity.memory_type {
        parts.push(memory_type.to_string());
    }
    if let Some(session_id) = &entity.session_id {
        parts.push(session_id.clone());
    }
    if let Some(task_id) = &entity.task_id {
        parts.push(task_id.clone());
    }
    parts.extend(entity.observations.iter().cloned());
    parts.join(" ")
}

fn entity_tokens(entity: &Entity, token_multiplier: f64) -> usize {
    estimate_tokens(&entity_text(entity), token_multiplier)
}

#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub max_tokens: usize,
    pub reserve_buffer: usize,
    pub token_multiplier: f64,
    pub max_entities_to_consider: usize,
    pub min_salience: f64,
    /// Names that must be included whenever they fit, ahead of salience ranking.
    pub must_include: Vec<String>,
}

impl ContextOptions {
    pub fn with_defaults() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            reserve_buffer: DEFAULT_RESERVE_BUFFER,
            token_multiplier: DEFAULT_TOKEN_MULTIPLIER,
            max_entities_to_consider: DEFAULT_MAX_ENTITIES_TO_CONSIDER,
            min_salience: DEFAULT_MIN_SALIENCE,
            must_include: Vec::new(),
        }
    }
}

/// Why a candidate didn't make it into the packed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Adding this entity would have exceeded the token budget.
    BudgetExceeded,
    /// Salience fell below `ContextOptions::min_salience`.
    LowSalience,
}

#[derive(Debug, Clone)]
pub struct ExcludedEntity {
    pub name: String,
    pub reason: ExclusionReason,
    pub tokens: usize,
    pub salience: f64,
}

/// Per-class token totals for whatever was actually included.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBreakdown {
    pub working: usize,
    pub episodic: usize,
    pub semantic: usize,
    pub procedural: usize,
    pub must_include: usize,
}

impl ContextBreakdown {
    fn add(&mut self, entity: &Entity, tokens: usize, is_must_include: bool) {
        if is_must_include {
            self.must_include += tokens;
            return;
        }
        match entity.memory_type {
            Some(MemoryType::Working) => self.working += tokens,
            Some(MemoryType::Episodic) => self.episodic += tokens,
            Some(MemoryType::Semantic) => self.semantic += tokens,
            Some(MemoryType::Procedural) => self.procedural += tokens,
            None => {}
        }
    }

    fn merge(&mut self, other: &ContextBreakdown) {
        self.working += other.working;
        self.episodic += other.episodic;
        self.semantic += other.semantic;
        self.procedural += other.procedural;
        self.must_include += other.must_include;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextResult {
    pub included: Vec<String>,
    pub total_tokens: usize,
    pub breakdown: ContextBreakdown,
    pub excluded: Vec<ExcludedEntity>,
    pub suggestions: Vec<String>,
}

struct Candidate<'a> {
    ranked: &'a RankedEntity,
    entity: &'a Entity,
    tokens: usize,
    ratio: f64,
}

/// Rank candidates by salience (pre-ranking only the top
/// `max_entities_to_consider` when the pool is large), then greedily pack
/// `must_include` names first, then the rest sorted by `salience / tokens`
/// descending, until the token budget runs out.
pub fn retrieve_for_context<'a>(
    entities: impl Iterator<Item = &'a Entity>,
    relations: &RelationIndex,
    access_tracker: &AccessTracker,
    decay_config: &DecayConfig,
    weights: &SalienceWeights,
    salience_ctx: &SalienceContext,
    options: &ContextOptions,
    now: DateTime<Utc>,
) -> ContextResult {
    let entities: Vec<&Entity> = entities.collect();
    let mut ranked = rank_entities_by_salience(
        entities.iter().copied(),
        relations,
        access_tracker,
        decay_config,
        weights,
        salience_ctx,
        now,
    );
    if ranked.len() > options.max_entities_to_consider {
        ranked.truncate(options.max_entities_to_consider);
    }

    let by_name = |name: &str| entities.iter().find(|e| e.name == name).copied();
    let budget = options.max_tokens.saturating_sub(options.reserve_buffer);

    let mut included = Vec::new();
    let mut breakdown = ContextBreakdown::default();
    let mut excluded = Vec::new();
    let mut used = 0usize;

    let must_include: Vec<String> =
        options.must_include.iter().filter(|name| by_name(name).is_some()).cloned().collect();

    for name in &must_include {
        let Some(entity) = by_name(name) else { continue };
        let salience_score = ranked.iter().find(|r| &r.name == name).map(|r| r.salience_score).unwrap_or(0.0);
        let tokens = entity_tokens(entity, options.token_multiplier);
        if used + tokens > budget {
            excluded.push(ExcludedEntity {
                name: name.clone(),
                reason: ExclusionReason::BudgetExceeded,
                tokens,
                salience: salience_score,
            });
            continue;
        }
        used += tokens;
        included.push(name.clone());
        breakdown.add(entity, tokens, true);
    }

    // Optional candidates are packed by salience-per-token, not raw
    // salience: a cheap, moderately salient memory should win a budget slot
    // over an expensive, slightly more salient one.
    let mut optional: Vec<Candidate> = ranked
        .iter()
        .filter(|r| !must_include.contains(&r.name))
        .filter_map(|r| {
            let entity = by_name(&r.name)?;
            let tokens = entity_tokens(entity, options.token_multiplier);
            let ratio = if tokens == 0 { 0.0 } else { r.salience_score / tokens as f64 };
            Some(Candidate { ranked: r, entity, tokens, ratio })
        })
        .collect();
    optional.sort_by(|a, b| {
        b.ratio.partial_cmp(&a.ratio).unwrap().then_with(|| b.ranked.salience_score.partial_cmp(&a.ranked.salience_score).unwrap())
    });

    for candidate in optional {
        let name = &candidate.ranked.name;
        let salience_score = candidate.ranked.salience_score;
        if salience_score < options.min_salience {
            excluded.push(ExcludedEntity {
                name: name.clone(),
                reason: ExclusionReason::LowSalience,
                tokens: candidate.tokens,
                salience: salience_score,
            });
            continue;
        }
        if used + candidate.tokens > budget {
            excluded.push(ExcludedEntity {
                name: name.clone(),
                reason: ExclusionReason::BudgetExceeded,
                tokens: candidate.tokens,
                salience: salience_score,
            });
            continue;
        }
        used += candidate.tokens;
        included.push(name.clone());
        breakdown.add(candidate.entity, candidate.tokens, false);
    }

    let mut suggestions = Vec::new();
    if !excluded.is_empty() {
        suggestions.push(format!(
            "{} memories excluded by token budget or min_salience; consider raising max_tokens or lowering min_salience",
            excluded.len()
        ));
    }

    ContextResult { included, total_tokens: used, breakdown, excluded, suggestions }
}

#[derive(Debug, Clone)]
pub struct BudgetAllocation {
    pub working: f64,
    pub episodic: f64,
    pub semantic: f64,
}

impl Default for BudgetAllocation {
    fn default() -> Self {
        Self { working: 0.3, episodic: 0.3, semantic: 0.4 }
    }
}

/// Split the token budget across memory types by percentage, then pack each
/// partition independently so a thin semantic pool never gets crowded out
/// by a deep working-memory history.
pub fn retrieve_with_budget_allocation<'a>(
    entities: impl Iterator<Item = &'a Entity>,
    relations: &RelationIndex,
    access_tracker: &AccessTracker,
    decay_config: &DecayConfig,
    weights: &SalienceWeights,
    salience_ctx: &SalienceContext,
    options: &ContextOptions,
    allocation: &BudgetAllocation,
    now: DateTime<Utc>,
) -> ContextResult {
    let all_entities: Vec<&Entity> = entities.collect();
    let budget = options.max_tokens.saturating_sub(options.reserve_buffer);

    let partitions = [
        (MemoryType::Working, allocation.working),
        (MemoryType::Episodic, allocation.episodic),
        (MemoryType::Semantic, allocation.semantic),
    ];

    let mut merged = ContextResult::default();
    for (memory_type, pct) in partitions {
        let subset: Vec<&Entity> = all_entities.iter().filter(|e| e.memory_type == Some(memory_type)).copied().collect();
        let sub_options = ContextOptions {
            max_tokens: (budget as f64 * pct).floor() as usize + options.reserve_buffer,
            reserve_buffer: options.reserve_buffer,
            token_multiplier: options.token_multiplier,
            max_entities_to_consider: options.max_entities_to_consider,
            min_salience: options.min_salience,
            must_include: options.must_include.clone(),
        };
        let partial = retrieve_for_context(
            subset.into_iter(),
            relations,
            access_tracker,
            decay_config,
            weights,
            salience_ctx,
            &sub_options,
            now,
        );
        merged.included.extend(partial.included);
        merged.total_tokens += partial.total_tokens;
        merged.breakdown.merge(&partial.breakdown);
        merged.excluded.extend(partial.excluded);
        merged.suggestions.extend(partial.suggestions);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity_with(name: &str, importance: u8, observation: &str) -> Entity {
        let mut e = Entity::new(name, "memory");
        e.memory_type = Some(crate::entity::MemoryType::Semantic);
        e.importance = Some(importance);
        e.add_observation(observation);
        e
    }

    #[test]
    fn packs_highest_salience_first_within_budget() {
        let relations = RelationIndex::default();
        let tracker = AccessTracker::new();
        let now = Utc::now();
        let hot = entity_with("Hot", 9, "short");
        let cold = entity_with("Cold", 1, "short");
        let options = ContextOptions { max_tokens: 400, reserve_buffer: 0, ..ContextOptions::with_defaults() };

        let result = retrieve_for_context(
            [hot, cold].iter(),
            &relations,
            &tracker,
            &DecayConfig::default(),
            &SalienceWeights::default(),
            &SalienceContext::default(),
            &options,
            now,
        );
        assert_eq!(result.included[0], "Hot");
    }

    #[test]
    fn tight_budget_excludes_overflow() {
        let relations = RelationIndex::default();
        let tracker = AccessTracker::new();
        let now = Utc::now();
        let a = entity_with("A", 5, "one two three four five six seven eight nine ten");
        let b = entity_with("B", 5, "one two three four five six seven eight nine ten");
        let options = ContextOptions { max_tokens: 10, reserve_buffer: 0, ..ContextOptions::with_defaults() };

        let result = retrieve_for_context(
            [a, b].iter(),
            &relations,
            &tracker,
            &DecayConfig::default(),
            &SalienceWeights::default(),
            &SalienceContext::default(),
            &options,
            now,
        );
        assert_eq!(result.included.len(), 1);
        assert_eq!(result.excluded.len(), 1);
        assert_eq!(result.excluded[0].reason, ExclusionReason::BudgetExceeded);
        assert!(!result.suggestions.is_empty());
    }

    #[test]
    fn must_include_wins_over_salience_ranking() {
        let relations = RelationIndex::default();
        let tracker = AccessTracker::new();
        let now = Utc::now();
        let low = entity_with("Low", 1, "x");
        let high = entity_with("High", 9, "x");
        let options = ContextOptions {
            max_tokens: 20,
            reserve_buffer: 0,
            must_include: vec!["Low".to_string()],
            ..ContextOptions::with_defaults()
        };

        let result = retrieve_for_context(
            [low, high].iter(),
            &relations,
            &tracker,
            &DecayConfig::default(),
            &SalienceWeights::default(),
            &SalienceContext::default(),
            &options,
            now,
        );
        assert!(result.included.contains(&"Low".to_string()));
        assert!(result.breakdown.must_include > 0);
    }

    #[test]
    fn entity_text_includes_type_and_memory_fields() {
        let mut e = Entity::new("Alice", "person");
        e.memory_type = Some(MemoryType::Episodic);
        e.session_id = Some("sess-1".to_string());
        let text = entity_text(&e);
        assert!(text.contains("person"));
        assert!(text.contains("episodic"));
        assert!(text.contains("sess-1"));
    }
}

//! Exponential importance decay for agent memories
//!
//! `effective_importance = clamp(base * decay * strength, min_importance, 10)`
//! where `decay = clamp01(exp(-ln2 * age_hours / half_life_hours))`. Every
//! function here is a pure read over borrowed entities; actual removal in
//! `forget_weak_memories` is reported but not applied — the facade is the
//! one holding the store's write mutex, so it performs the `save_graph`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::entity::Entity;

#[derive(Debug, Clone)]
pub struct DecayConfig {
    pub half_life_hours: f64,
    pub importance_modulation: bool,
    pub access_modulation: bool,
    pub min_importance: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 168.0,
            importance_modulation: true,
            access_modulation: true,
            min_importance: 1.0,
        }
    }
}

/// `effective_importance` for one entity at `now`.
pub fn effective_importance(entity: &Entity, config: &DecayConfig, now: DateTime<Utc>) -> f64 {
    let base = entity.importance_or_default() as f64;
    let half_life_eff = if config.importance_modulation {
        config.half_life_hours * (1.0 + base / 10.0)
    } else {
        config.half_life_hours
    };
    let reference = entity.last_accessed_at.unwrap_or(entity.created_at);
    let age_hours = (now - reference).num_milliseconds() as f64 / 3_600_000.0;
    let decay = (-std::f64::consts::LN_2 * age_hours.max(0.0) / half_life_eff).exp().clamp(0.0, 1.0);
    let strength = if config.access_modulation {
        1.0 + 0.1 * entity.confirmation_count as f64 + 0.01 * entity.access_count as f64
    } else {
        1.0
    };
    (base * decay * strength).clamp(config.min_importance, 10.0)
}

#[derive(Debug, Clone)]
pub struct DecayReport {
    pub entities_processed: usize,
    pub average_decay: f64,
    pub memories_at_risk: usize,
    pub processing_time_ms: u64,
}

/// Read-only sweep: reports average decay factor and how many entities are
/// below `at_risk_threshold`, without mutating anything.
pub fn apply_decay<'a>(
    agent_entities: impl Iterator<Item = &'a Entity>,
    config: &DecayConfig,
    now: DateTime<Utc>,
    at_risk_threshold: f64,
) -> DecayReport {
    let started = Instant::now();
    let mut count = 0usize;
    let mut total_decay = 0.0;
    let mut at_risk = 0usize;

    for entity in agent_entities {
        count += 1;
        let base = entity.importance_or_default() as f64;
        let half_life_eff = if config.importance_modulation {
            config.half_life_hours * (1.0 + base / 10.0)
        } else {
            config.half_life_hours
        };
        let reference = entity.last_accessed_at.unwrap_or(entity.created_at);
        let age_hours = (now - reference).num_milliseconds() as f64 / 3_600_000.0;
        let decay = (-std::f64::consts::LN_2 * age_hours.max(0.0) / half_life_eff).exp().clamp(0.0, 1.0);
        total_decay += decay;

        if effective_importance(entity, config, now) < at_risk_threshold {
            at_risk += 1;
        }
    }

    DecayReport {
        entities_processed: count,
        average_decay: if count > 0 { total_decay / count as f64 } else { 0.0 },
        memories_at_risk: at_risk,
        processing_time_ms: started.elapsed().as_millis() as u64,
    }
}

/// Entities whose effective importance is below `threshold`, ascending.
pub fn decayed_memories<'a>(
    agent_entities: impl Iterator<Item = &'a Entity>,
    config: &DecayConfig,
    now: DateTime<Utc>,
    threshold: f64,
) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = agent_entities
        .filter_map(|e| {
            let eff = effective_importance(e, config, now);
            (eff < threshold).then(|| (e.name.clone(), eff))
        })
        .collect();
    out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    out
}

/// Entities in `[min_importance, threshold)`, ascending. Default threshold 1.0.
pub fn memories_at_risk<'a>(
    agent_entities: impl Iterator<Item = &'a Entity>,
    config: &DecayConfig,
    now: DateTime<Utc>,
    threshold: f64,
) -> Vec<(String, f64)> {
    let mut out: Vec<(String, f64)> = agent_entities
        .filter_map(|e| {
            let eff = effective_importance(e, config, now);
            (eff >= config.min_importance && eff < threshold).then(|| (e.name.clone(), eff))
        })
        .collect();
    out.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    out
}

/// Bump confirmation count, clamp confidence to 1, refresh timestamps, and
/// record one access — reinforcement counts as a use.
pub fn reinforce_memory(entity: &mut Entity, confirmation_boost: u32, confidence_boost: Option<f64>, now: DateTime<Utc>) {
    entity.confirmation_count = entity.confirmation_count.saturating_add(confirmation_boost);
    entity.last_modified = now;
    entity.last_accessed_at = Some(now);
    entity.access_count += 1;
    if let Some(boost) = confidence_boost {
        entity.confidence = Some((entity.confidence_or_default() + boost).min(1.0));
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForgetWeakMemoriesOptions {
    pub effective_importance_threshold: f64,
    pub older_than_hours: Option<f64>,
    pub exclude_tags: Vec<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ForgetWeakMemoriesReport {
    pub removed: Vec<String>,
    pub memories_too_young: usize,
    pub memories_protected: usize,
    pub dry_run: bool,
}

/// Decide which entities would be forgotten; never mutates. The facade
/// performs the actual removal (+ cascading relations) in one `save_graph`
/// when `options.dry_run` is false.
pub fn forget_weak_memories<'a>(
    agent_entities: impl Iterator<Item = &'a Entity>,
    config: &DecayConfig,
    now: DateTime<Utc>,
    options: &ForgetWeakMemoriesOptions,
) -> ForgetWeakMemoriesReport {
    let mut removed = Vec::new();
    let mut memories_too_young = 0;
    let mut memories_protected = 0;

    for entity in agent_entities {
        let effective = effective_importance(entity, config, now);
        if effective >= options.effective_importance_threshold {
            continue;
        }
        if let Some(min_age) = options.older_than_hours {
            let age_hours = (now - entity.created_at).num_milliseconds() as f64 / 3_600_000.0;
            if age_hours < min_age {
                memories_too_young += 1;
                continue;
            }
        }
        if options.exclude_tags.iter().any(|tag| entity.tags.contains(tag)) {
            memories_protected += 1;
            continue;
        }
        removed.push(entity.name.clone());
    }

    ForgetWeakMemoriesReport { removed, memories_too_young, memories_protected, dry_run: options.dry_run }
}

/// Runs a tick callback immediately then on a fixed interval, on a
/// dedicated background thread owning its own single-threaded tokio
/// runtime. `start` is idempotent; `stop` blocks until the thread exits.
pub struct DecayScheduler {
    running: Arc<AtomicBool>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl Default for DecayScheduler {
    fn default() -> Self {
        Self { running: Arc::new(AtomicBool::new(false)), thread: Mutex::new(None) }
    }
}

impl DecayScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the loop; returns `false` without doing anything if already running.
    pub fn start<F, E>(&self, interval: Duration, mut tick: F, on_error: E) -> bool
    where
        F: FnMut() -> std::result::Result<(), String> + Send + 'static,
        E: Fn(String) + Send + Sync + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let running = self.running.clone();
        let handle = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("failed to build decay scheduler runtime");
            rt.block_on(async move {
                while running.load(Ordering::SeqCst) {
                    if let Err(e) = tick() {
                        on_error(e);
                    }
                    tokio::time::sleep(interval).await;
                }
            });
        });
        *self.thread.lock().unwrap() = Some(handle);
        true
    }

    /// Signal the loop to stop and wait for the thread to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Run one decay pass immediately, independent of any running scheduler.
pub fn run_now(tick: impl FnOnce()) {
    tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn entity_with_importance(importance: u8, age_hours: i64) -> Entity {
        let mut e = Entity::new("Alice", "memory");
        e.importance = Some(importance);
        e.created_at = Utc::now() - ChronoDuration::hours(age_hours);
        e.last_accessed_at = None;
        e
    }

    #[test]
    fn decay_is_one_at_zero_age() {
        let config = DecayConfig::default();
        let entity = entity_with_importance(8, 0);
        let now = entity.created_at;
        let effective = effective_importance(&entity, &config, now);
        assert!((effective - 8.0).abs() < 1e-6);
    }

    #[test]
    fn decay_is_half_at_half_life_without_modulation() {
        let config = DecayConfig { importance_modulation: false, access_modulation: false, ..DecayConfig::default() };
        let entity = entity_with_importance(8, 168);
        let now = Utc::now();
        let effective = effective_importance(&entity, &config, now);
        assert!((effective - 4.0).abs() < 1e-6);
    }

    #[test]
    fn effective_importance_never_drops_below_min() {
        let config = DecayConfig { half_life_hours: 1.0, ..DecayConfig::default() };
        let entity = entity_with_importance(5, 10_000);
        let now = Utc::now();
        let effective = effective_importance(&entity, &config, now);
        assert!(effective >= config.min_importance);
    }

    #[test]
    fn forget_weak_memories_dry_run_does_not_mutate_and_matches_counts() {
        let config = DecayConfig::default();
        let weak = entity_with_importance(1, 10_000);
        let now = Utc::now();
        let options = ForgetWeakMemoriesOptions {
            effective_importance_threshold: 5.0,
            dry_run: true,
            ..Default::default()
        };
        let report = forget_weak_memories(std::iter::once(&weak), &config, now, &options);
        assert_eq!(report.removed, vec!["Alice".to_string()]);
        assert!(report.dry_run);
    }
}

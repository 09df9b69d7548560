//! Per-entity access tracking
//!
//! Tracks how often and how recently each agent entity has been touched,
//! independent of the store's own `access_count`/`last_accessed_at`
//! columns (the tracker keeps the richer, in-memory-only history; the
//! facade is responsible for also persisting the two summary fields back
//! onto the entity on every `record_access`).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const RING_BUFFER_CAPACITY: usize = 100;
pub const DEFAULT_RECENCY_HALF_LIFE_HOURS: f64 = 24.0;
pub const DEFAULT_FREQUENT_THRESHOLD: f64 = 3.0;
pub const DEFAULT_OCCASIONAL_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Default)]
struct AccessRecord {
    total_accesses: u64,
    last_accessed_at: Option<DateTime<Utc>>,
    accesses_by_session: HashMap<String, u64>,
    recent_timestamps: VecDeque<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPattern {
    Frequent,
    Occasional,
    Rare,
}

#[derive(Debug, Clone)]
pub struct AccessSummary {
    pub total_accesses: u64,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub accesses_by_session: HashMap<String, u64>,
    pub average_interval_seconds: f64,
    pub recency_score: f64,
    pub pattern: AccessPattern,
}

pub struct AccessTracker {
    records: Mutex<HashMap<String, AccessRecord>>,
    recency_half_life_hours: f64,
    frequent_threshold: f64,
    occasional_threshold: f64,
}

impl Default for AccessTracker {
    fn default() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            recency_half_life_hours: DEFAULT_RECENCY_HALF_LIFE_HOURS,
            frequent_threshold: DEFAULT_FREQUENT_THRESHOLD,
            occasional_threshold: DEFAULT_OCCASIONAL_THRESHOLD,
        }
    }
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one access to `name`, optionally attributed to `session_id`.
    pub fn record_access(&self, name: &str, session_id: Option<&str>, at: DateTime<Utc>) {
        let mut records = self.records.lock().unwrap();
        let record = records.entry(name.to_string()).or_default();
        record.total_accesses += 1;
        record.last_accessed_at = Some(at);
        if let Some(session) = session_id {
            *record.accesses_by_session.entry(session.to_string()).or_insert(0) += 1;
        }
        record.recent_timestamps.push_back(at);
        if record.recent_timestamps.len() > RING_BUFFER_CAPACITY {
            record.recent_timestamps.pop_front();
        }
    }

    pub fn forget(&self, name: &str) {
        self.records.lock().unwrap().remove(name);
    }

    fn average_interval_seconds(recent: &VecDeque<DateTime<Utc>>) -> f64 {
        if recent.len() < 2 {
            return f64::INFINITY;
        }
        let mut deltas = Vec::with_capacity(recent.len() - 1);
        for window in recent.iter().collect::<Vec<_>>().windows(2) {
            deltas.push((*window[1] - *window[0]).num_milliseconds() as f64 / 1000.0);
        }
        deltas.iter().sum::<f64>() / deltas.len() as f64
    }

    /// `exp(-ln2 * age_hours / half_life_hours)`, 0 when there is no access yet.
    pub fn recency_score(&self, name: &str, now: DateTime<Utc>) -> f64 {
        let records = self.records.lock().unwrap();
        let Some(record) = records.get(name) else { return 0.0 };
        let Some(last) = record.last_accessed_at else { return 0.0 };
        let age_hours = (now - last).num_milliseconds() as f64 / 3_600_000.0;
        (-std::f64::consts::LN_2 * age_hours.max(0.0) / self.recency_half_life_hours).exp()
    }

    fn classify(&self, accesses_per_day: f64) -> AccessPattern {
        if accesses_per_day >= self.frequent_threshold {
            AccessPattern::Frequent
        } else if accesses_per_day >= self.occasional_threshold {
            AccessPattern::Occasional
        } else {
            AccessPattern::Rare
        }
    }

    /// Full summary for `name`, given the entity's creation time (used to
    /// derive accesses-per-day for pattern classification).
    pub fn summary(&self, name: &str, created_at: DateTime<Utc>, now: DateTime<Utc>) -> AccessSummary {
        let records = self.records.lock().unwrap();
        let record = records.get(name).cloned().unwrap_or_default();
        drop(records);

        let age_days = ((now - created_at).num_milliseconds() as f64 / 86_400_000.0).max(1.0 / 24.0);
        let accesses_per_day = record.total_accesses as f64 / age_days;

        AccessSummary {
            total_accesses: record.total_accesses,
            last_accessed_at: record.last_accessed_at,
            accesses_by_session: record.accesses_by_session.clone(),
            average_interval_seconds: Self::average_interval_seconds(&record.recent_timestamps),
            recency_score: self.recency_score(name, now),
            pattern: self.classify(accesses_per_day),
        }
    }
}

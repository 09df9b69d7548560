//! Multi-modal text search over the entity cache
//!
//! Every search mode shares the same filter/pagination contract and reads
//! from the same `Indexes`/`GraphCache`; they differ only in how they score
//! and rank matches.

pub mod basic;
pub mod bm25;
pub mod boolean;
pub mod fuzzy;
pub mod hybrid;
pub mod ranked;

use crate::entity::Entity;

/// Post-match filter applied uniformly across every search mode
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub tags: Vec<String>,
    pub min_importance: Option<u8>,
    pub max_importance: Option<u8>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl SearchFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.tags.is_empty() {
            let tags_lc: std::collections::HashSet<String> =
                entity.tags.iter().map(|t| t.to_lowercase()).collect();
            if !self.tags.iter().all(|t| tags_lc.contains(&t.to_lowercase())) {
                return false;
            }
        }
        let importance = entity.importance_or_default();
        if let Some(min) = self.min_importance {
            if importance < min {
                return false;
            }
        }
        if let Some(max) = self.max_importance {
            if importance > max {
                return false;
            }
        }
        true
    }

    /// Apply offset/limit pagination to an already-ranked list of names
    pub fn paginate(&self, names: Vec<String>) -> Vec<String> {
        let mut iter = names.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.by_ref().take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// One scored match, independent of which search mode produced it
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub name: String,
    pub score: f64,
}

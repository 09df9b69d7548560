//! TF-IDF ranked search
//!
//! Maintains one document (name + type + observations, tokenized) per
//! entity and re-derives idf from the current corpus on every query. The
//! doc-token map is updated incrementally on `update`/`remove` rather than
//! retokenizing the whole corpus per query.

use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::search::{ScoredMatch, SearchFilter};
use crate::text::{idf_from_sets, tf, tokenize};

#[derive(Debug, Default)]
pub struct RankedIndex {
    doc_tokens: HashMap<String, Vec<String>>,
}

fn document_text(entity: &Entity) -> String {
    let mut text = String::new();
    text.push_str(&entity.name);
    text.push(' ');
    text.push_str(&entity.entity_type);
    for obs in &entity.observations {
        text.push(' ');
        text.push_str(obs);
    }
    text
}

impl RankedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild<'a>(&mut self, entities: impl Iterator<Item = &'a Entity>) {
        self.doc_tokens.clear();
        for entity in entities {
            self.update(entity);
        }
    }

    pub fn update(&mut self, entity: &Entity) {
        self.doc_tokens.insert(entity.name.clone(), tokenize(&document_text(entity)));
    }

    pub fn remove(&mut self, name: &str) {
        self.doc_tokens.remove(name);
    }

    /// Score every document against `query` as the sum of per-term TF-IDF,
    /// highest first, ties broken by name.
    pub fn search(
        &self,
        entities: &HashMap<String, Entity>,
        query: &str,
        filter: &SearchFilter,
    ) -> Vec<ScoredMatch> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() || self.doc_tokens.is_empty() {
            return Vec::new();
        }

        let doc_sets: Vec<HashSet<String>> = self
            .doc_tokens
            .values()
            .map(|tokens| tokens.iter().cloned().collect())
            .collect();

        let mut scored: Vec<ScoredMatch> = self
            .doc_tokens
            .iter()
            .filter_map(|(name, tokens)| {
                let entity = entities.get(name)?;
                if !filter.matches(entity) {
                    return None;
                }
                let score: f64 = query_terms
                    .iter()
                    .map(|term| tf(term, tokens) * idf_from_sets(term, &doc_sets))
                    .sum();
                if score <= 0.0 {
                    None
                } else {
                    Some(ScoredMatch { name: name.clone(), score })
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap().then_with(|| a.name.cmp(&b.name)));
        let names: Vec<String> = scored.iter().map(|m| m.name.clone()).collect();
        let kept: HashSet<String> = filter.paginate(names).into_iter().collect();
        scored.retain(|m| kept.contains(&m.name));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_documents_with_more_term_overlap_higher() {
        let mut e1 = Entity::new("E1", "doc");
        e1.add_observation("machine learning is a field of study");
        let mut e2 = Entity::new("E2", "doc");
        e2.add_observation("machine shops repair cars");
        let mut e3 = Entity::new("E3", "doc");
        e3.add_observation("cooking recipes and food");

        let entities: HashMap<String, Entity> =
            [e1.clone(), e2.clone(), e3.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();

        let mut index = RankedIndex::new();
        index.rebuild(entities.values());

        let results = index.search(&entities, "machine learning", &SearchFilter::default());
        assert_eq!(results[0].name, "E1");
        assert!(results[0].score > results[1].score);
        assert!(results.iter().all(|m| m.name != "E3"));
    }

    #[test]
    fn zero_idf_means_zero_score() {
        let mut e1 = Entity::new("E1", "doc");
        e1.add_observation("shared shared shared");
        let mut e2 = Entity::new("E2", "doc");
        e2.add_observation("shared shared shared");
        let entities: HashMap<String, Entity> =
            [e1.clone(), e2.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut index = RankedIndex::new();
        index.rebuild(entities.values());
        let results = index.search(&entities, "shared", &SearchFilter::default());
        assert!(results.is_empty());
    }
}

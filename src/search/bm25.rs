//! BM25 ranked search over an optimized inverted index
//!
//! The inverted index has two representations: `Mutable`, a plain
//! `term -> set<name>` map used while documents are still being added or
//! removed, and `Finalized`, a packed `term -> sorted<u32 id>` representation
//! built once searches start dominating over writes, enabling a sorted-merge
//! `intersect`/`union` instead of hashing on every lookup. Any further
//! removal reverts the whole index to `Mutable`.

use std::collections::{HashMap, HashSet};

use crate::entity::Entity;
use crate::search::{ScoredMatch, SearchFilter};
use crate::text::{bm25_score, idf, tokenize, BM25_B, BM25_K1};

enum Mode {
    Mutable(HashMap<String, HashSet<String>>),
    Finalized {
        name_to_id: HashMap<String, u32>,
        id_to_name: Vec<String>,
        postings: HashMap<String, Vec<u32>>,
    },
}

/// Term postings supporting sorted-merge set operations once finalized
pub struct OptimizedInvertedIndex {
    mode: Mode,
}

impl Default for OptimizedInvertedIndex {
    fn default() -> Self {
        Self { mode: Mode::Mutable(HashMap::new()) }
    }
}

impl OptimizedInvertedIndex {
    fn as_mutable(&mut self) -> &mut HashMap<String, HashSet<String>> {
        if let Mode::Finalized { name_to_id, postings, .. } = &self.mode {
            let mut mutable: HashMap<String, HashSet<String>> = HashMap::new();
            let id_to_name: Vec<String> = {
                let mut names = vec![String::new(); name_to_id.len()];
                for (name, id) in name_to_id {
                    names[*id as usize] = name.clone();
                }
                names
            };
            for (term, ids) in postings {
                let names: HashSet<String> = ids.iter().map(|id| id_to_name[*id as usize].clone()).collect();
                mutable.insert(term.clone(), names);
            }
            self.mode = Mode::Mutable(mutable);
        }
        match &mut self.mode {
            Mode::Mutable(map) => map,
            Mode::Finalized { .. } => unreachable!(),
        }
    }

    pub fn add_document(&mut self, name: &str, terms: &HashSet<String>) {
        let map = self.as_mutable();
        for term in terms {
            map.entry(term.clone()).or_default().insert(name.to_string());
        }
    }

    /// Revert to mutable mode (if finalized) and drop every posting for `name`.
    pub fn remove_document(&mut self, name: &str) {
        let map = self.as_mutable();
        map.retain(|_, names| {
            names.remove(name);
            !names.is_empty()
        });
    }

    /// Pack the current postings into sorted `u32` id lists for fast set ops.
    pub fn finalize(&mut self) {
        if matches!(self.mode, Mode::Finalized { .. }) {
            return;
        }
        let map = self.as_mutable();
        let mut names: Vec<String> = map.values().flatten().cloned().collect();
        names.sort();
        names.dedup();
        let name_to_id: HashMap<String, u32> =
            names.iter().enumerate().map(|(id, name)| (name.clone(), id as u32)).collect();
        let mut postings: HashMap<String, Vec<u32>> = HashMap::new();
        for (term, doc_names) in map.iter() {
            let mut ids: Vec<u32> = doc_names.iter().map(|n| name_to_id[n]).collect();
            ids.sort_unstable();
            postings.insert(term.clone(), ids);
        }
        self.mode = Mode::Finalized { name_to_id, id_to_name: names, postings };
    }

    fn postings_for(&self, term: &str) -> Vec<String> {
        match &self.mode {
            Mode::Mutable(map) => map.get(term).map(|s| s.iter().cloned().collect()).unwrap_or_default(),
            Mode::Finalized { postings, id_to_name, .. } => postings
                .get(term)
                .map(|ids| ids.iter().map(|id| id_to_name[*id as usize].clone()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn document_frequency(&self, term: &str) -> usize {
        match &self.mode {
            Mode::Mutable(map) => map.get(term).map(|s| s.len()).unwrap_or(0),
            Mode::Finalized { postings, .. } => postings.get(term).map(|v| v.len()).unwrap_or(0),
        }
    }

    /// Sorted-merge intersection of the postings for every term.
    pub fn intersect(&self, terms: &[String]) -> HashSet<String> {
        let mut lists: Vec<Vec<String>> = terms.iter().map(|t| {
            let mut p = self.postings_for(t);
            p.sort();
            p
        }).collect();
        lists.sort_by_key(|l| l.len());
        let mut iter = lists.into_iter();
        let Some(first) = iter.next() else { return HashSet::new() };
        let mut result: HashSet<String> = first.into_iter().collect();
        for list in iter {
            let set: HashSet<String> = list.into_iter().collect();
            result.retain(|n| set.contains(n));
            if result.is_empty() {
                break;
            }
        }
        result
    }

    pub fn union(&self, terms: &[String]) -> HashSet<String> {
        let mut result = HashSet::new();
        for term in terms {
            result.extend(self.postings_for(term));
        }
        result
    }
}

/// BM25-ranked search index: tracks per-document token lists, document
/// lengths, and an inverted index finalized lazily by the caller.
#[derive(Default)]
pub struct Bm25Index {
    inverted: OptimizedInvertedIndex,
    doc_tokens: HashMap<String, Vec<String>>,
    doc_len: HashMap<String, usize>,
    total_len: usize,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rebuild<'a>(&mut self, entities: impl Iterator<Item = &'a Entity>) {
        *self = Self::default();
        for entity in entities {
            self.update(entity);
        }
    }

    pub fn update(&mut self, entity: &Entity) {
        self.remove(&entity.name);
        let mut text = String::new();
        text.push_str(&entity.name);
        text.push(' ');
        text.push_str(&entity.entity_type);
        for obs in &entity.observations {
            text.push(' ');
            text.push_str(obs);
        }
        let tokens = tokenize(&text);
        let term_set: HashSet<String> = tokens.iter().cloned().collect();
        self.total_len += tokens.len();
        self.doc_len.insert(entity.name.clone(), tokens.len());
        self.inverted.add_document(&entity.name, &term_set);
        self.doc_tokens.insert(entity.name.clone(), tokens);
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(len) = self.doc_len.remove(name) {
            self.total_len = self.total_len.saturating_sub(len);
        }
        self.doc_tokens.remove(name);
        self.inverted.remove_document(name);
    }

    pub fn finalize(&mut self) {
        self.inverted.finalize();
    }

    fn avg_doc_len(&self) -> f64 {
        if self.doc_len.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.doc_len.len() as f64
        }
    }

    pub fn search(
        &self,
        entities: &HashMap<String, Entity>,
        query: &str,
        filter: &SearchFilter,
    ) -> Vec<ScoredMatch> {
        let terms = tokenize(query);
        if terms.is_empty() || self.doc_tokens.is_empty() {
            return Vec::new();
        }
        let total_docs = self.doc_tokens.len();
        let avg_len = self.avg_doc_len();

        let mut candidates: HashSet<String> = HashSet::new();
        for term in &terms {
            candidates.extend(self.inverted.union(std::slice::from_ref(term)));
        }

        let mut scored: Vec<ScoredMatch> = candidates
            .into_iter()
            .filter_map(|name| {
                let entity = entities.get(&name)?;
                if !filter.matches(entity) {
                    return None;
                }
                let tokens = self.doc_tokens.get(&name)?;
                let doc_len = *self.doc_len.get(&name).unwrap_or(&0) as f64;
                let score: f64 = terms
                    .iter()
                    .map(|term| {
                        let df = self.inverted.document_frequency(term);
                        let term_idf = idf(total_docs, df);
                        let term_freq = tokens.iter().filter(|t| *t == term).count() as f64;
                        bm25_score(term_idf, term_freq, doc_len, avg_len, BM25_K1, BM25_B)
                    })
                    .sum();
                if score <= 0.0 {
                    None
                } else {
                    Some(ScoredMatch { name, score })
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
    fn finalize_then_remove_reverts_to_mutable() {
        let mut idx = OptimizedInvertedIndex::default();
        idx.add_document("A", &HashSet::from(["x".to_string()]));
        idx.add_document("B", &HashSet::from(["x".to_string()]));
        idx.finalize();
        assert!(matches!(idx.mode, Mode::Finalized { .. }));
        idx.remove_document("A");
        assert!(matches!(idx.mode, Mode::Mutable(_)));
        assert_eq!(idx.postings_for("x"), vec!["B".to_string()]);
    }

    #[test]
    fn intersect_and_union() {
        let mut idx = OptimizedInvertedIndex::default();
        idx.add_document("A", &HashSet::from(["x".to_string(), "y".to_string()]));
        idx.add_document("B", &HashSet::from(["x".to_string()]));
        assert_eq!(idx.intersect(&["x".to_string(), "y".to_string()]), HashSet::from(["A".to_string()]));
        assert_eq!(idx.union(&["y".to_string()]), HashSet::from(["A".to_string()]));
    }

    #[test]
    fn ranks_by_bm25_relevance() {
        let mut e1 = Entity::new("E1", "doc");
        e1.add_observation("machine learning machine learning");
        let mut e2 = Entity::new("E2", "doc");
        e2.add_observation("machine learning is one topic among many others discussed here");
        let entities: HashMap<String, Entity> =
            [e1.clone(), e2.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Bm25Index::new();
        idx.rebuild(entities.values());
        let results = idx.search(&entities, "machine learning", &SearchFilter::default());
        assert_eq!(results[0].name, "E1");
    }
}

//! Inverted index over observation (and name/type) tokens
//!
//! Maps `word -> set<entity_name>` for words of length >= 2 that are
//! alphanumeric once lowercased, with a companion `name -> set<word>` map so
//! removals don't require rescanning every posting list.

use std::collections::{HashMap, HashSet};

use crate::index::lowercase_cache::LowercaseFields;
use crate::text::tokenize;

#[derive(Debug, Clone, Default)]
pub struct ObservationIndex {
    postings: HashMap<String, HashSet<String>>,
    words_by_name: HashMap<String, HashSet<String>>,
}

impl ObservationIndex {
    pub fn clear(&mut self) {
        self.postings.clear();
        self.words_by_name.clear();
    }

    pub fn index(&mut self, name: &str, fields: &LowercaseFields) {
        self.remove(name);
        let mut words = HashSet::new();
        let mut text = fields.name_lc.clone();
        text.push(' ');
        text.push_str(&fields.type_lc);
        for obs in &fields.observations_lc {
            text.push(' ');
            text.push_str(obs);
        }
        for token in tokenize(&text) {
            if token.len() >= 2 {
                words.insert(token);
            }
        }
        for word in &words {
            self.postings.entry(word.clone()).or_default().insert(name.to_string());
        }
        self.words_by_name.insert(name.to_string(), words);
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(words) = self.words_by_name.remove(name) {
            for word in words {
                if let Some(set) = self.postings.get_mut(&word) {
                    set.remove(name);
                    if set.is_empty() {
                        self.postings.remove(&word);
                    }
                }
            }
        }
    }

    pub fn names_for(&self, word: &str) -> HashSet<String> {
        self.postings.get(&word.to_lowercase()).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    #[test]
    fn indexes_and_removes_words() {
        let mut idx = ObservationIndex::default();
        let mut e = Entity::new("Alice", "person");
        e.add_observation("likes green tea");
        let fields = LowercaseFields::from_entity(&e);
        idx.index("Alice", &fields);
        assert!(idx.names_for("tea").contains("Alice"));
        assert!(idx.names_for("green").contains("Alice"));
        // single-char tokens are dropped
        idx.remove("Alice");
        assert!(idx.names_for("tea").is_empty());
    }
}

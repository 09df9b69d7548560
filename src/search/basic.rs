//! Substring search
//!
//! The simplest mode: a case-insensitive substring match against name,
//! type, and observations (tags included only via `contains_text_or_tag`
//! callers that need it), filtered and paginated like every other mode.

use crate::entity::Entity;
use crate::index::Indexes;
use crate::search::SearchFilter;

/// Find every entity whose name, type, or an observation contains `query`
/// (case-insensitive), honoring `filter`.
pub fn substring_search(
    entities: &std::collections::HashMap<String, Entity>,
    indexes: &Indexes,
    query: &str,
    filter: &SearchFilter,
) -> Vec<String> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let mut matches: Vec<String> = indexes
        .all_lowercase_fields()
        .filter(|(_, fields)| fields.contains_text(&needle))
        .filter_map(|(name, _)| entities.get(name))
        .filter(|entity| filter.matches(entity))
        .map(|entity| entity.name.clone())
        .collect();
    matches.sort();
    filter.paginate(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn index_of(entities: &[Entity]) -> Indexes {
        let mut idx = Indexes::new();
        idx.rebuild(entities, &[]);
        idx
    }

    #[test]
    fn finds_match_in_observation() {
        let mut alice = Entity::new("Alice", "person");
        alice.add_observation("loves green tea");
        let bob = Entity::new("Bob", "person");
        let entities: std::collections::HashMap<String, Entity> =
            [alice.clone(), bob.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let idx = index_of(&[alice, bob]);

        let results = substring_search(&entities, &idx, "tea", &SearchFilter::default());
        assert_eq!(results, vec!["Alice".to_string()]);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let entities = std::collections::HashMap::new();
        let idx = Indexes::new();
        assert!(substring_search(&entities, &idx, "", &SearchFilter::default()).is_empty());
    }
}

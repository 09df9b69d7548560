//! Pre-lowercased field cache
//!
//! Substring, boolean, and fuzzy search all need case-insensitive matches
//! against name/type/observations/tags. Lowercasing on every query would be
//! wasteful, so each entity's searchable text is lowercased once here and
//! kept consistent with the entity whenever it is reachable from an index
//! (invariant 6).

use crate::entity::Entity;

/// Lowercased copy of an entity's searchable text
#[derive(Debug, Clone, Default)]
pub struct LowercaseFields {
    pub name_lc: String,
    pub type_lc: String,
    pub observations_lc: Vec<String>,
    pub tags_lc: Vec<String>,
}

impl LowercaseFields {
    pub fn from_entity(entity: &Entity) -> Self {
        Self {
            name_lc: entity.name.to_lowercase(),
            type_lc: entity.entity_type.to_lowercase(),
            observations_lc: entity.observations.iter().map(|o| o.to_lowercase()).collect(),
            tags_lc: entity.tags.iter().cloned().collect(),
        }
    }

    /// True when `needle` (already lowercased) is a substring of name, type,
    /// or any observation.
    pub fn contains_text(&self, needle: &str) -> bool {
        self.name_lc.contains(needle)
            || self.type_lc.contains(needle)
            || self.observations_lc.iter().any(|o| o.contains(needle))
    }

    /// True when `needle` is a substring of name, type, any observation, or
    /// any tag — used by field-less boolean TERM atoms.
    pub fn contains_text_or_tag(&self, needle: &str) -> bool {
        self.contains_text(needle) || self.tags_lc.iter().any(|t| t.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_all_fields() {
        let mut e = Entity::new("Alice", "PERSON");
        e.add_observation("Likes TEA");
        e.tags.insert("vip".into());
        let fields = LowercaseFields::from_entity(&e);
        assert_eq!(fields.name_lc, "alice");
        assert_eq!(fields.type_lc, "person");
        assert_eq!(fields.observations_lc[0], "likes tea");
        assert!(fields.contains_text("tea"));
        assert!(!fields.contains_text("coffee"));
        assert!(fields.contains_text_or_tag("vip"));
    }
}

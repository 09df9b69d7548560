//! Boolean query search
//!
//! Grammar (highest to lowest precedence): `NOT` binds tighter than `AND`,
//! which binds tighter than `OR`; parentheses override both. Atoms are
//! either `field:term` (`field` one of `name|type|tag|observation`) or a
//! bare `term`, which matches name, type, any observation, or any tag.
//! Implicit `AND` (two atoms with nothing between them) is a syntax error —
//! the grammar requires an explicit operator between any two atoms.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::entity::Entity;
use crate::error::{GraphError, Result};
use crate::index::{Indexes, LowercaseFields};
use crate::search::SearchFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    LParen,
    RParen,
    Field(FieldKind, String),
    Term(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Name,
    Type,
    Tag,
    Observation,
}

impl FieldKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "name" => Some(Self::Name),
            "type" => Some(Self::Type),
            "tag" => Some(Self::Tag),
            "observation" => Some(Self::Observation),
            _ => None,
        }
    }
}

fn tokenize(query: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    for raw in split_preserving_parens(query) {
        match raw.as_str() {
            "(" => tokens.push(Token::LParen),
            ")" => tokens.push(Token::RParen),
            "" => {}
            word => match word.to_uppercase().as_str() {
                "AND" => tokens.push(Token::And),
                "OR" => tokens.push(Token::Or),
                "NOT" => tokens.push(Token::Not),
                _ => {
                    if let Some((field, term)) = word.split_once(':') {
                        let kind = FieldKind::parse(field)
                            .ok_or_else(|| GraphError::Validation(format!("unknown field: {field}")))?;
                        if term.is_empty() {
                            return Err(GraphError::Validation("empty field term".into()));
                        }
                        tokens.push(Token::Field(kind, term.to_lowercase()));
                    } else {
                        tokens.push(Token::Term(word.to_lowercase()));
                    }
                }
            },
        }
    }
    Ok(tokens)
}

fn split_preserving_parens(query: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in query.chars() {
        if c == '(' || c == ')' {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(c.to_string());
        } else if c.is_whitespace() {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[derive(Debug, Clone)]
enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Field(FieldKind, String),
    Term(String),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if matches!(self.peek(), Some(Token::Not)) {
            self.next();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(GraphError::Validation("unmatched '('".into())),
                }
            }
            Some(Token::Field(kind, term)) => Ok(Expr::Field(kind, term)),
            Some(Token::Term(term)) => Ok(Expr::Term(term)),
            other => Err(GraphError::Validation(format!("unexpected token: {other:?}"))),
        }
    }
}

fn parse(query: &str) -> Result<Expr> {
    let tokens = tokenize(query)?;
    if tokens.is_empty() {
        return Err(GraphError::Validation("empty boolean query".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(GraphError::Validation(
            "trailing tokens after expression (missing operator?)".into(),
        ));
    }
    Ok(expr)
}

fn to_canonical_string(expr: &Expr) -> String {
    match expr {
        Expr::And(l, r) => format!("(AND {} {})", to_canonical_string(l), to_canonical_string(r)),
        Expr::Or(l, r) => format!("(OR {} {})", to_canonical_string(l), to_canonical_string(r)),
        Expr::Not(e) => format!("(NOT {})", to_canonical_string(e)),
        Expr::Field(kind, term) => format!("{kind:?}:{term}"),
        Expr::Term(term) => format!("TERM:{term}"),
    }
}

fn evaluate(expr: &Expr, fields: &LowercaseFields) -> bool {
    match expr {
        Expr::And(l, r) => evaluate(l, fields) && evaluate(r, fields),
        Expr::Or(l, r) => evaluate(l, fields) || evaluate(r, fields),
        Expr::Not(e) => !evaluate(e, fields),
        Expr::Field(FieldKind::Name, term) => fields.name_lc.contains(term.as_str()),
        Expr::Field(FieldKind::Type, term) => fields.type_lc.contains(term.as_str()),
        Expr::Field(FieldKind::Tag, term) => fields.tags_lc.iter().any(|t| t.contains(term.as_str())),
        Expr::Field(FieldKind::Observation, term) => {
            fields.observations_lc.iter().any(|o| o.contains(term.as_str()))
        }
        Expr::Term(term) => fields.contains_text_or_tag(term),
    }
}

/// Stable, order-independent digest of the entity set a cached result was
/// computed against, so a boolean-query cache entry is invalidated the
/// moment any entity's searchable fields change.
fn entity_set_digest(indexes: &Indexes) -> u64 {
    let mut total: u64 = 0;
    for (name, fields) in indexes.all_lowercase_fields() {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        name.hash(&mut hasher);
        fields.name_lc.hash(&mut hasher);
        fields.type_lc.hash(&mut hasher);
        fields.observations_lc.hash(&mut hasher);
        let mut tags = fields.tags_lc.clone();
        tags.sort();
        tags.hash(&mut hasher);
        total = total.wrapping_add(hasher.finish());
    }
    total
}

#[derive(Default)]
pub struct BooleanSearchCache {
    entries: Mutex<HashMap<(String, u64), Vec<String>>>,
}

impl BooleanSearchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&self) {
        self.entries.lock().unwrap().clear();
    }
}

/// Evaluate a boolean query against every entity, returning matching names
/// (unordered aside from name for determinism), filtered and paginated.
pub fn boolean_search(
    entities: &HashMap<String, Entity>,
    indexes: &Indexes,
    cache: &BooleanSearchCache,
    query: &str,
    filter: &SearchFilter,
) -> Result<Vec<String>> {
    let expr = parse(query)?;
    let ast_key = to_canonical_string(&expr);
    let digest = entity_set_digest(indexes);
    let cache_key = (ast_key, digest);

    let mut matches = {
        let cached = cache.entries.lock().unwrap();
        cached.get(&cache_key).cloned()
    };

    if matches.is_none() {
        let computed: Vec<String> = indexes
            .all_lowercase_fields()
            .filter(|(_, fields)| evaluate(&expr, fields))
            .map(|(name, _)| name.clone())
            .collect();
        cache.entries.lock().unwrap().insert(cache_key, computed.clone());
        matches = Some(computed);
    }

    let mut names: Vec<String> = matches
        .unwrap()
        .into_iter()
        .filter(|name| entities.get(name).map(|e| filter.matches(e)).unwrap_or(false))
        .collect();
    names.sort();
    Ok(filter.paginate(names))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (HashMap<String, Entity>, Indexes) {
        let mut alice = Entity::new("Alice", "person");
        alice.add_observation("engineer at Acme");
        let bob = Entity::new("Bob", "person");
        let entities: HashMap<String, Entity> =
            [alice.clone(), bob.clone()].into_iter().map(|e| (e.name.clone(), e)).collect();
        let mut idx = Indexes::new();
        idx.rebuild(&[alice, bob], &[]);
        (entities, idx)
    }

    #[test]
    fn field_and_parenthesized_or() {
        let (entities, idx) = setup();
        let cache = BooleanSearchCache::new();
        let results = boolean_search(
            &entities,
            &idx,
            &cache,
            "name:Alice AND (type:person OR observation:engineer)",
            &SearchFilter::default(),
        )
        .unwrap();
        assert_eq!(results, vec!["Alice".to_string()]);
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let (entities, idx) = setup();
        let cache = BooleanSearchCache::new();
        let results = boolean_search(&entities, &idx, &cache, "NOT name:Alice AND type:person", &SearchFilter::default()).unwrap();
        assert_eq!(results, vec!["Bob".to_string()]);
    }

    #[test]
    fn implicit_and_is_rejected() {
        let (entities, idx) = setup();
        let cache = BooleanSearchCache::new();
        let err = boolean_search(&entities, &idx, &cache, "name:Alice type:person", &SearchFilter::default()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn unknown_field_errors() {
        let (entities, idx) = setup();
        let cache = BooleanSearchCache::new();
        let err = boolean_search(&entities, &idx, &cache, "bogus:Alice", &SearchFilter::default()).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }
}

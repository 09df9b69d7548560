//! TF/IDF primitives
//!
//! `tf` operates on a pre-tokenized document; `idf`/`idf_from_sets` both
//! accept document frequency directly or a slice of pre-tokenized token
//! sets, to avoid re-tokenizing documents on every query.

use std::collections::HashSet;

/// `count(term) / len(doc_tokens)`
pub fn tf(term: &str, doc_tokens: &[String]) -> f64 {
    if doc_tokens.is_empty() {
        return 0.0;
    }
    let count = doc_tokens.iter().filter(|t| t.as_str() == term).count();
    count as f64 / doc_tokens.len() as f64
}

/// `log(N / df)` given document count and document frequency directly
pub fn idf(total_docs: usize, doc_frequency: usize) -> f64 {
    if doc_frequency == 0 || total_docs == 0 {
        return 0.0;
    }
    (total_docs as f64 / doc_frequency as f64).ln()
}

/// Same as `idf`, but computes document frequency from a slice of
/// pre-tokenized document token sets, so callers that already tokenized
/// once don't need to re-tokenize to count document frequency.
pub fn idf_from_sets(term: &str, doc_token_sets: &[HashSet<String>]) -> f64 {
    let df = doc_token_sets.iter().filter(|set| set.contains(term)).count();
    idf(doc_token_sets.len(), df)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tf_counts_occurrences_over_length() {
        let doc = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert!((tf("a", &doc) - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(tf("c", &doc), 0.0);
    }

    #[test]
    fn idf_is_zero_when_term_is_in_every_document() {
        assert_eq!(idf(5, 5), 0.0);
    }

    #[test]
    fn idf_is_zero_when_term_in_no_document() {
        assert_eq!(idf(5, 0), 0.0);
    }

    #[test]
    fn idf_from_sets_matches_manual_count() {
        let sets = vec![
            HashSet::from(["a".to_string()]),
            HashSet::from(["b".to_string()]),
        ];
        assert_eq!(idf_from_sets("a", &sets), idf(2, 1));
    }
}

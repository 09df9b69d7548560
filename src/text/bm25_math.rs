//! BM25 scoring primitive
//!
//! `score = sum_t idf(t) * ((k1+1)*tf) / (tf + k1*(1 - b + b*dl/avgdl))`

/// Default `k1` term-frequency saturation parameter
pub const BM25_K1: f64 = 1.2;
/// Default `b` length-normalization parameter
pub const BM25_B: f64 = 0.75;

/// BM25 contribution of a single term given its idf, term frequency in the
/// document, document length, and average document length.
pub fn bm25_score(term_idf: f64, term_freq: f64, doc_len: f64, avg_doc_len: f64, k1: f64, b: f64) -> f64 {
    if term_freq <= 0.0 {
        return 0.0;
    }
    let avg = if avg_doc_len <= 0.0 { doc_len.max(1.0) } else { avg_doc_len };
    let numerator = term_idf * (k1 + 1.0) * term_freq;
    let denominator = term_freq + k1 * (1.0 - b + b * (doc_len / avg));
    numerator / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_normalization_is_one_at_average_length() {
        // doc_len == avg_doc_len -> denominator term b*dl/avgdl == b
        let score = bm25_score(1.0, 1.0, 10.0, 10.0, BM25_K1, BM25_B);
        let expected = (BM25_K1 + 1.0) / (1.0 + BM25_K1);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn zero_term_frequency_scores_zero() {
        assert_eq!(bm25_score(2.0, 0.0, 10.0, 10.0, BM25_K1, BM25_B), 0.0);
    }

    #[test]
    fn longer_documents_are_penalized() {
        let short = bm25_score(1.0, 1.0, 5.0, 10.0, BM25_K1, BM25_B);
        let long = bm25_score(1.0, 1.0, 20.0, 10.0, BM25_K1, BM25_B);
        assert!(short > long);
    }
}

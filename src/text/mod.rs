//! Text algorithm primitives: tokenization, edit distance, TF/IDF, BM25
//!
//! These are pure functions shared by every search component so the scoring
//! math only has to be gotten right once.

mod bm25_math;
mod edit_distance;
mod tfidf;
mod tokenizer;

pub use bm25_math::{bm25_score, BM25_B, BM25_K1};
pub use edit_distance::edit_distance;
pub use tfidf::{idf, idf_from_sets, tf};
pub use tokenizer::tokenize;

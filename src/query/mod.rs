//! Query evaluation and ranking
//!
//! Supported modes:
//! - Intersection: documents containing every term
//! - Phrase: documents containing the terms at consecutive positions
//! - Ranked: TF-IDF, PageRank, or a fixed blend of both
//!
//! Relevance feedback rewrites a query from judged results.

pub mod evaluator;
pub mod feedback;
pub mod scoring;

pub use evaluator::{intersect, phrase_intersect, union, QueryEvaluator};
pub use feedback::{relevance_feedback, FeedbackParams};

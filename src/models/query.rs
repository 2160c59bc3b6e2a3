use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default weight of a query term
pub const DEFAULT_TERM_WEIGHT: f64 = 1.0;

/// A search query: terms in the order given plus a per-term weight
///
/// Duplicated terms are kept. Rewrites (relevance feedback) build a new
/// query from a clone rather than editing the caller's query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    terms: Vec<String>,
    weights: HashMap<String, f64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a query string on whitespace, giving every term weight 1.0
    pub fn parse(query: &str) -> Self {
        let mut q = Query::new();
        for term in query.split_whitespace() {
            q.push_term(term);
        }
        q
    }

    /// Build a query from already-normalized terms
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut q = Query::new();
        for term in terms {
            q.push_term(term);
        }
        q
    }

    /// Append a term with the default weight (an existing weight is kept)
    pub fn push_term(&mut self, term: impl Into<String>) {
        let term = term.into();
        self.weights.entry(term.clone()).or_insert(DEFAULT_TERM_WEIGHT);
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.weights.contains_key(term)
    }

    /// Weight of `term`, 1.0 if it was never set
    pub fn weight(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(DEFAULT_TERM_WEIGHT)
    }

    pub fn set_weight(&mut self, term: &str, weight: f64) {
        self.weights.insert(term.to_string(), weight);
    }

    pub fn with_weight(mut self, term: &str, weight: f64) -> Self {
        self.set_weight(term, weight);
        self
    }
}

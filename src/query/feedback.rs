//! Rocchio relevance feedback
//!
//! Rewrites a query from the user's judgement of a result list. Only
//! documents marked relevant contribute; non-relevant documents carry no
//! weight.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::IndexStore;
use crate::models::{Query, RankedHit};

/// Rocchio coefficients
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackParams {
    /// Weight of the original query
    pub alpha: f64,
    /// Weight of the relevant-document centroid
    pub beta: f64,
    /// Weight of the non-relevant centroid (unused when 0)
    pub gamma: f64,
}

impl Default for FeedbackParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.75,
            gamma: 0.0,
        }
    }
}

/// Build an expanded query from relevance judgements.
///
/// `relevant[i]` judges `hits[i]`; extra judgements or hits are ignored.
/// `document_terms` returns a document's term frequencies given its path.
///
/// Original terms start at `alpha / |terms|`. Each relevant document adds
/// `beta / |relevant| * tf / docLength` to each of its terms. Terms not in
/// the query are appended in ascending order. `query` itself is unchanged.
pub fn relevance_feedback<F>(
    query: &Query,
    hits: &[RankedHit],
    relevant: &[bool],
    index: &IndexStore,
    mut document_terms: F,
    params: &FeedbackParams,
) -> Result<Query>
where
    F: FnMut(&Path) -> Result<HashMap<String, u32>>,
{
    let mut expanded = query.clone();
    if !query.is_empty() {
        let base = params.alpha / query.len() as f64;
        for term in query.terms() {
            expanded.set_weight(term, base);
        }
    }

    let judged: Vec<&RankedHit> = hits
        .iter()
        .zip(relevant)
        .filter(|(_, is_relevant)| **is_relevant)
        .map(|(hit, _)| hit)
        .collect();
    if judged.is_empty() {
        return Ok(expanded);
    }

    let share = params.beta / judged.len() as f64;
    for hit in judged {
        let Some(path) = index.document_path(hit.doc_id) else {
            continue;
        };
        let length = index.document_length(hit.doc_id);
        if length == 0 {
            warn!(doc = %hit.doc_id, "skipping relevant document without a length");
            continue;
        }

        let terms: BTreeMap<String, u32> = document_terms(path)?.into_iter().collect();
        for (term, tf) in terms {
            if !expanded.contains(&term) {
                expanded.push_term(term.clone());
                expanded.set_weight(&term, 0.0);
            }
            let weight = expanded.weight(&term) + share * tf as f64 / length as f64;
            expanded.set_weight(&term, weight);
        }
    }

    debug!(
        original = query.len(),
        expanded = expanded.len(),
        "relevance feedback applied"
    );
    Ok(expanded)
}

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

use super::postings::{DocId, PostingsList};

/// Retrieval mode for a query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryType {
    /// Documents containing every query term
    Intersection,
    /// Documents containing the query terms at adjacent positions
    Phrase,
    /// All documents matching any term, ordered by score
    Ranked(RankingType),
}

/// Scoring used for ranked retrieval
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingType {
    /// TF-IDF dot product normalized by document length
    TfIdf,
    /// Precomputed PageRank authority only
    PageRank,
    /// Fixed blend of TF-IDF and PageRank
    Combination,
}

/// A scored document from ranked retrieval
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedHit {
    pub doc_id: DocId,
    pub score: f64,
}

impl RankedHit {
    pub fn new(doc_id: DocId, score: f64) -> Self {
        Self { doc_id, score }
    }
}

/// Sort hits by descending score, ties by ascending docID
pub fn sort_by_score(hits: &mut [RankedHit]) {
    hits.sort_by_key(|h| (Reverse(OrderedFloat(h.score)), h.doc_id));
}

/// What a query evaluation produced
#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    /// No document satisfies the query
    NoMatches,
    /// Boolean or phrase result, sorted by docID
    Postings(PostingsList),
    /// Ranked result, sorted by descending score
    Ranked(Vec<RankedHit>),
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        match self {
            SearchOutcome::NoMatches => true,
            SearchOutcome::Postings(list) => list.is_empty(),
            SearchOutcome::Ranked(hits) => hits.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchOutcome::NoMatches => 0,
            SearchOutcome::Postings(list) => list.len(),
            SearchOutcome::Ranked(hits) => hits.len(),
        }
    }

    /// Matching docIDs in result order
    pub fn doc_ids(&self) -> Vec<DocId> {
        match self {
            SearchOutcome::NoMatches => Vec::new(),
            SearchOutcome::Postings(list) => list.doc_ids().collect(),
            SearchOutcome::Ranked(hits) => hits.iter().map(|h| h.doc_id).collect(),
        }
    }

    /// Ranked hits, or unscored hits in docID order for boolean results
    pub fn hits(&self) -> Vec<RankedHit> {
        match self {
            SearchOutcome::NoMatches => Vec::new(),
            SearchOutcome::Postings(list) => list.doc_ids().map(|d| RankedHit::new(d, 0.0)).collect(),
            SearchOutcome::Ranked(hits) => hits.clone(),
        }
    }
}

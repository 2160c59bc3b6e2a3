//! Query evaluation against an [`IndexStore`]
//!
//! Boolean and phrase modes work on docID-sorted postings lists with
//! two-cursor merge joins. Ranked modes accumulate per-document scores and
//! return [`RankedHit`]s sorted by descending score.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, warn};

use super::scoring::{
    combined_score, document_term_weight, idf, length_normalize, query_term_weight,
};
use crate::error::Result;
use crate::index::IndexStore;
use crate::models::{
    sort_by_score, DocId, PostingsEntry, PostingsList, Query, QueryType, RankedHit, RankingType,
    SearchOutcome,
};

/// Evaluates queries against a built index
pub struct QueryEvaluator<'a> {
    index: &'a IndexStore,
}

impl<'a> QueryEvaluator<'a> {
    pub fn new(index: &'a IndexStore) -> Self {
        Self { index }
    }

    /// Evaluate `query` in the given mode.
    ///
    /// Terms without postings are dropped before evaluation. An empty result
    /// is reported as [`SearchOutcome::NoMatches`], never as an error; errors
    /// only come from reading the index.
    pub fn search(&self, query: &Query, query_type: QueryType) -> Result<SearchOutcome> {
        let resolved = self.resolve(query)?;
        if resolved.iter().all(Option::is_none) {
            debug!(terms = query.len(), "no query term is indexed");
            return Ok(SearchOutcome::NoMatches);
        }

        let outcome = match query_type {
            QueryType::Intersection => self.intersection_query(resolved),
            QueryType::Phrase => self.phrase_query(resolved),
            QueryType::Ranked(RankingType::TfIdf) => {
                SearchOutcome::Ranked(self.cosine_scores(query, &resolved))
            }
            QueryType::Ranked(RankingType::PageRank) => {
                SearchOutcome::Ranked(self.pagerank_scores(&resolved))
            }
            QueryType::Ranked(RankingType::Combination) => {
                SearchOutcome::Ranked(self.combined_scores(query, &resolved))
            }
        };

        Ok(if outcome.is_empty() {
            SearchOutcome::NoMatches
        } else {
            outcome
        })
    }

    /// Postings for every query term in query order, `None` for unindexed terms.
    ///
    /// Repeated terms are read once.
    fn resolve(&self, query: &Query) -> Result<Vec<Option<PostingsList>>> {
        let mut cache: HashMap<&str, Option<PostingsList>> = HashMap::new();
        let mut resolved = Vec::with_capacity(query.len());

        for term in query.terms() {
            let postings = match cache.get(term.as_str()) {
                Some(postings) => postings.clone(),
                None => {
                    let postings = self.index.lookup(term)?;
                    cache.insert(term.as_str(), postings.clone());
                    postings
                }
            };
            resolved.push(postings);
        }
        Ok(resolved)
    }

    fn intersection_query(&self, resolved: Vec<Option<PostingsList>>) -> SearchOutcome {
        // Every term must be indexed
        let Some(mut lists) = resolved.into_iter().collect::<Option<Vec<_>>>() else {
            return SearchOutcome::NoMatches;
        };

        lists.sort_by_key(PostingsList::len);
        let mut lists = lists.into_iter();
        let Some(first) = lists.next() else {
            return SearchOutcome::NoMatches;
        };
        let result = lists.fold(first, |acc, list| intersect(&acc, &list));
        SearchOutcome::Postings(result)
    }

    fn phrase_query(&self, resolved: Vec<Option<PostingsList>>) -> SearchOutcome {
        let Some(lists) = resolved.into_iter().collect::<Option<Vec<_>>>() else {
            return SearchOutcome::NoMatches;
        };

        let mut lists = lists.into_iter();
        let Some(first) = lists.next() else {
            return SearchOutcome::NoMatches;
        };
        let result = lists.fold(first, |acc, list| phrase_intersect(&acc, &list));
        SearchOutcome::Postings(result)
    }

    /// TF-IDF dot product per document, divided by document length.
    ///
    /// Every query term occurrence contributes, so a repeated term counts
    /// once per repetition.
    fn cosine_scores(&self, query: &Query, resolved: &[Option<PostingsList>]) -> Vec<RankedHit> {
        let total_docs = self.index.doc_count();
        let mut scores: HashMap<DocId, f64> = HashMap::new();

        for (term, postings) in query.terms().iter().zip(resolved) {
            let Some(postings) = postings else {
                continue;
            };
            let idf = idf(total_docs, postings.len());
            let wq = query_term_weight(idf, query.weight(term));

            for entry in postings {
                let wd = document_term_weight(entry.term_frequency(), idf);
                *scores.entry(entry.doc_id).or_insert(0.0) += wq * wd;
            }
        }

        let mut hits: Vec<RankedHit> = scores
            .into_iter()
            .map(|(doc_id, dot)| {
                let length = self.index.document_length(doc_id);
                if length == 0 {
                    warn!(doc = %doc_id, "document length unavailable, score left unnormalized");
                }
                RankedHit::new(doc_id, length_normalize(dot, length))
            })
            .collect();
        sort_by_score(&mut hits);
        hits
    }

    fn pagerank_scores(&self, resolved: &[Option<PostingsList>]) -> Vec<RankedHit> {
        let lists: Vec<&PostingsList> = resolved.iter().flatten().collect();
        let mut hits: Vec<RankedHit> = union(&lists)
            .doc_ids()
            .map(|doc_id| RankedHit::new(doc_id, self.index.pagerank_score(doc_id)))
            .collect();
        sort_by_score(&mut hits);
        hits
    }

    fn combined_scores(&self, query: &Query, resolved: &[Option<PostingsList>]) -> Vec<RankedHit> {
        let mut hits = self.cosine_scores(query, resolved);
        for hit in &mut hits {
            hit.score = combined_score(hit.score, self.index.pagerank_score(hit.doc_id));
        }
        sort_by_score(&mut hits);
        hits
    }
}

/// Documents present in both lists, keeping the left list's entries
pub fn intersect(left: &PostingsList, right: &PostingsList) -> PostingsList {
    let mut result = PostingsList::new();
    let (mut i, mut j) = (0, 0);
    let (a, b) = (left.entries(), right.entries());

    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    result
}

/// Positions in `right` that directly follow a position in `left`.
///
/// The result holds, per shared document, the right-hand offsets that
/// complete the phrase, so it can be chained with the next term.
pub fn phrase_intersect(left: &PostingsList, right: &PostingsList) -> PostingsList {
    let mut result = PostingsList::new();
    let (mut i, mut j) = (0, 0);
    let (a, b) = (left.entries(), right.entries());

    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            Ordering::Equal => {
                let doc_id = a[i].doc_id;
                for &o1 in &a[i].offsets {
                    for &o2 in &b[j].offsets {
                        if o2 == o1 + 1 {
                            result.append(doc_id, o2);
                        } else if o2 > o1 {
                            break;
                        }
                    }
                }
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }
    result
}

/// Every document present in at least one list, without offsets
pub fn union(lists: &[&PostingsList]) -> PostingsList {
    lists.iter().fold(PostingsList::new(), |acc, list| union_pair(&acc, list))
}

fn union_pair(left: &PostingsList, right: &PostingsList) -> PostingsList {
    let mut result = PostingsList::with_capacity(left.len().max(right.len()));
    let (mut i, mut j) = (0, 0);
    let (a, b) = (left.entries(), right.entries());

    while i < a.len() && j < b.len() {
        match a[i].doc_id.cmp(&b[j].doc_id) {
            Ordering::Less => {
                result.push(PostingsEntry::new(a[i].doc_id));
                i += 1;
            }
            Ordering::Equal => {
                result.push(PostingsEntry::new(a[i].doc_id));
                i += 1;
                j += 1;
            }
            Ordering::Greater => {
                result.push(PostingsEntry::new(b[j].doc_id));
                j += 1;
            }
        }
    }
    for entry in a[i..].iter().chain(&b[j..]) {
        result.push(PostingsEntry::new(entry.doc_id));
    }
    result
}

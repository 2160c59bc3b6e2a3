//! Scoring functions for ranked retrieval

/// Weight of the TF-IDF score in combined ranking
pub const COSINE_WEIGHT: f64 = 1.0;

/// Weight of the PageRank score in combined ranking
pub const PAGERANK_WEIGHT: f64 = 100.0;

/// Inverse document frequency, `log10(N / df)`
///
/// # Arguments
/// * `total_docs` - Number of documents in the index
/// * `df` - Number of documents containing the term
///
/// # Returns
/// 0.0 when either count is zero
pub fn idf(total_docs: usize, df: usize) -> f64 {
    if total_docs == 0 || df == 0 {
        return 0.0;
    }
    (total_docs as f64 / df as f64).log10()
}

/// Query-side weight of a term
pub fn query_term_weight(idf: f64, query_weight: f64) -> f64 {
    idf * query_weight
}

/// Document-side weight of a term
///
/// # Arguments
/// * `tf` - Occurrences of the term in the document
/// * `idf` - Inverse document frequency of the term
pub fn document_term_weight(tf: usize, idf: f64) -> f64 {
    tf as f64 * idf
}

/// Normalize an accumulated dot product by document length.
///
/// This approximates cosine normalization using only the document's token
/// count. A zero length leaves the sum unnormalized.
pub fn length_normalize(dot: f64, doc_length: u32) -> f64 {
    if doc_length == 0 {
        dot
    } else {
        dot / doc_length as f64
    }
}

/// Fixed blend of TF-IDF and PageRank
pub fn combined_score(cosine: f64, pagerank: f64) -> f64 {
    COSINE_WEIGHT * cosine + PAGERANK_WEIGHT * pagerank
}

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet};
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;
use crate::models::Query;

/// Text tokenizer with optional stemming and stopword removal
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Lazily produce normalized tokens in document order.
    ///
    /// Positions are not attached here: the indexer numbers emitted tokens
    /// itself, starting at 0, so filtered words never leave gaps.
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.unicode_words().filter_map(move |word| self.normalize(word))
    }

    /// Tokenize text into a vector of terms
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.tokens(text).collect()
    }

    /// Normalize a single word the way indexed text is normalized.
    ///
    /// Returns `None` when the word is filtered out (length bounds, stopword).
    pub fn normalize(&self, word: &str) -> Option<String> {
        let mut token = word.to_string();

        if self.config.lowercase {
            token = token.to_lowercase();
        }

        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return None;
        }

        if self.stopwords.contains(&token) {
            return None;
        }

        if let Some(stemmer) = &self.stemmer {
            token = stemmer.stem(&token).to_string();
        }

        Some(token)
    }

    /// Build a query from raw query text.
    ///
    /// The text is segmented and normalized exactly like indexed text, so
    /// punctuation and hyphens split terms instead of being kept in them.
    pub fn query(&self, text: &str) -> Query {
        Query::from_terms(self.tokens(text))
    }

    /// Compute term frequencies for a document
    pub fn term_frequencies(&self, text: &str) -> HashMap<String, u32> {
        let mut freq = HashMap::new();
        for token in self.tokens(text) {
            *freq.entry(token).or_insert(0) += 1;
        }
        freq
    }
}

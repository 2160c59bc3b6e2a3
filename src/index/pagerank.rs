//! PageRank score tables
//!
//! Scores are computed from a link graph (see [`super::link_graph`]) and are
//! keyed by the document's short name: the file name without its extension.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use ordered_float::OrderedFloat;

use crate::error::{IndexError, Result};

/// Source of per-document authority scores
pub trait AuthorityScores: Send + Sync {
    /// Score for a document short name, `None` if the document is unknown
    fn score(&self, short_name: &str) -> Option<f64>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// PageRank scores loaded from a `shortName score` file
#[derive(Clone, Debug, Default)]
pub struct PageRankScores {
    scores: HashMap<String, f64>,
}

impl PageRankScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, short_name: impl Into<String>, score: f64) {
        self.scores.insert(short_name.into(), score);
    }

    pub fn with_score(mut self, short_name: impl Into<String>, score: f64) -> Self {
        self.insert(short_name, score);
        self
    }

    pub fn load(path: &Path) -> Result<Self> {
        let context = path.display().to_string();
        let reader = BufReader::new(File::open(path)?);
        let mut scores = PageRankScores::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, score) = line
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| IndexError::corrupt(&context, format!("malformed line '{}'", line)))?;
            let score = score
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| IndexError::corrupt(&context, format!("bad score in '{}'", line)))?;
            scores.insert(name.trim(), score);
        }

        Ok(scores)
    }

    /// Write one `shortName score` line per document, names ascending.
    ///
    /// The file is written beside `path` and renamed into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            let mut names: Vec<&String> = self.scores.keys().collect();
            names.sort();
            for name in names {
                writeln!(out, "{} {}", name, self.scores[name])?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The `k` highest scores, ties by name
    pub fn top(&self, k: usize) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(name, &score)| (name.as_str(), score))
            .collect();
        ranked.sort_by_key(|&(name, score)| (Reverse(OrderedFloat(score)), name));
        ranked.truncate(k);
        ranked
    }
}

impl AuthorityScores for PageRankScores {
    fn score(&self, short_name: &str) -> Option<f64> {
        self.scores.get(short_name).copied()
    }

    fn len(&self) -> usize {
        self.scores.len()
    }
}

/// A document's short name: its file name without the extension
pub fn short_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

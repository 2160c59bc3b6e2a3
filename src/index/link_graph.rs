//! Link graph and PageRank power iteration
//!
//! The links file has one line per page, `title;target,target,...`, where a
//! page with nothing after the `;` has no outlinks. An optional names file,
//! `title;fileName`, maps graph titles to document files so scores can be
//! keyed by the short names the index resolves documents with.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use super::pagerank::{short_name, PageRankScores};
use crate::config::PageRankConfig;
use crate::error::{IndexError, Result};

/// Directed graph of page titles
#[derive(Debug, Default)]
pub struct LinkGraph {
    titles: Vec<String>,
    ids: HashMap<String, usize>,
    links: Vec<BTreeSet<usize>>,
}

impl LinkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a links file
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let graph = Self::read(reader, &path.display().to_string())?;
        info!(
            pages = graph.len(),
            sinks = graph.sink_count(),
            "read link graph from {}",
            path.display()
        );
        Ok(graph)
    }

    /// Parse `title;target,...` lines. Blank lines are skipped.
    pub fn read(reader: impl BufRead, context: &str) -> Result<Self> {
        let mut graph = LinkGraph::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (from, targets) = line.split_once(';').ok_or_else(|| {
                IndexError::corrupt(context, format!("line {}: no ';' in '{}'", number + 1, line))
            })?;
            let from = from.trim();
            if from.is_empty() {
                return Err(IndexError::corrupt(
                    context,
                    format!("line {}: empty page title", number + 1),
                ));
            }
            graph.add_links(
                from,
                targets.split(',').map(str::trim).filter(|t| !t.is_empty()),
            );
        }
        Ok(graph)
    }

    /// Add a page and its outlinks. A repeated link counts once.
    pub fn add_links<'a>(&mut self, from: &str, targets: impl IntoIterator<Item = &'a str>) {
        let from = self.node(from);
        for target in targets {
            let to = self.node(target);
            self.links[from].insert(to);
        }
    }

    fn node(&mut self, title: &str) -> usize {
        if let Some(&id) = self.ids.get(title) {
            return id;
        }
        let id = self.titles.len();
        self.titles.push(title.to_string());
        self.ids.insert(title.to_string(), id);
        self.links.push(BTreeSet::new());
        id
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Number of distinct outlinks of a page
    pub fn out_degree(&self, title: &str) -> Option<usize> {
        self.ids.get(title).map(|&id| self.links[id].len())
    }

    /// Pages without outlinks
    pub fn sink_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_empty()).count()
    }

    /// Stationary distribution of the random surfer, in page insertion order.
    ///
    /// With probability `jump_probability` the surfer jumps to any page.
    /// Otherwise it follows a random outlink, or from a sink, moves to any
    /// other page. Iteration stops when the Euclidean distance between
    /// successive vectors drops below `epsilon` or after `max_iterations`.
    /// The returned scores sum to 1.
    pub fn pagerank(&self, config: &PageRankConfig) -> Vec<f64> {
        let n = self.len();
        if n <= 1 {
            return vec![1.0; n];
        }

        let follow = 1.0 - config.jump_probability;
        let jump = config.jump_probability / n as f64;
        let mut x = vec![1.0 / n as f64; n];

        for iteration in 1..=config.max_iterations {
            let mut next = vec![jump; n];
            let mut sink_mass = 0.0;
            for (from, targets) in self.links.iter().enumerate() {
                if targets.is_empty() {
                    sink_mass += follow * x[from] / (n - 1) as f64;
                } else {
                    let share = follow * x[from] / targets.len() as f64;
                    for &to in targets {
                        next[to] += share;
                    }
                }
            }
            // A sink spreads over every page except itself
            for (page, score) in next.iter_mut().enumerate() {
                *score += sink_mass;
                if self.links[page].is_empty() {
                    *score -= follow * x[page] / (n - 1) as f64;
                }
            }

            let distance = euclidean_distance(&x, &next);
            x = next;
            if distance < config.epsilon {
                debug!(iteration, distance, "PageRank converged");
                return x;
            }
        }

        warn!(
            iterations = config.max_iterations,
            "PageRank stopped before converging"
        );
        x
    }

    /// PageRank keyed by document short name.
    ///
    /// Titles found in `names` take the short name of the mapped file; other
    /// titles are used as they are.
    pub fn scores(
        &self,
        config: &PageRankConfig,
        names: &HashMap<String, String>,
    ) -> PageRankScores {
        let mut scores = PageRankScores::new();
        let mut unnamed = 0usize;
        for (title, score) in self.titles.iter().zip(self.pagerank(config)) {
            match names.get(title) {
                Some(name) => scores.insert(name.clone(), score),
                None => {
                    unnamed += 1;
                    scores.insert(title.clone(), score);
                }
            }
        }
        if !names.is_empty() && unnamed > 0 {
            warn!(unnamed, "pages without an entry in the names file keep their title");
        }
        scores
    }
}

/// Read a `title;fileName` names file into title to short name
pub fn load_names(path: &Path) -> Result<HashMap<String, String>> {
    let context = path.display().to_string();
    let reader = BufReader::new(File::open(path)?);
    let mut names = HashMap::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (title, short) = line
            .split_once(';')
            .and_then(|(title, file)| {
                let short = short_name(Path::new(file.trim()))?;
                (!title.trim().is_empty() && !short.is_empty())
                    .then(|| (title.trim().to_string(), short))
            })
            .ok_or_else(|| {
                IndexError::corrupt(&context, format!("line {}: malformed '{}'", number + 1, line))
            })?;
        names.insert(title, short);
    }

    Ok(names)
}

fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

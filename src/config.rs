use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};

const INDEX_FILE: &str = "full-index";
const TERM_DIRECTORY_FILE: &str = "term-index";
const DOC_PATHS_FILE: &str = "docpath-index";
const DOC_LENGTHS_FILE: &str = "doclength-index";
const PAGERANK_FILE: &str = "pagerank-scores";

/// Default spill threshold, in token insertions
pub const DEFAULT_MEMORY_BUDGET: usize = 500_000;

/// Where postings live once the index is built
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// Postings stay in a hash map; nothing is spilled or merged
    Memory,
    /// SPIMI partitions merged into one seekable index file
    Disk,
}

/// Index build and lookup configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub root_dir: PathBuf,
    pub memory_budget: usize,
    pub backend: IndexBackend,
    pub tokenizer: TokenizerConfig,
    pub pagerank: PageRankConfig,
    pub pagerank_file: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./index"),
            memory_budget: DEFAULT_MEMORY_BUDGET,
            backend: IndexBackend::Disk,
            tokenizer: TokenizerConfig::default(),
            pagerank: PageRankConfig::default(),
            pagerank_file: None,
        }
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub remove_stopwords: bool,
    pub stem: bool,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_stopwords: false,
            stem: false,
            min_token_length: 1,
            max_token_length: 64,
        }
    }
}

/// Power-iteration settings for computing PageRank from a link graph
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRankConfig {
    /// Probability of jumping to a random page instead of following a link
    pub jump_probability: f64,
    /// Iteration stops once successive score vectors are closer than this
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            jump_probability: 0.15,
            epsilon: 1e-4,
            max_iterations: 1000,
        }
    }
}

impl IndexConfig {
    /// Create a configuration rooted at `root_dir`
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_memory_budget(mut self, budget: usize) -> Self {
        self.memory_budget = budget;
        self
    }

    pub fn with_backend(mut self, backend: IndexBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_pagerank_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pagerank_file = Some(path.into());
        self
    }

    /// Reject configurations the builder cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memory_budget == 0 {
            return Err(IndexError::Config(
                "memory_budget must be at least one token".to_string(),
            ));
        }
        if self.tokenizer.min_token_length > self.tokenizer.max_token_length {
            return Err(IndexError::Config(format!(
                "min_token_length {} exceeds max_token_length {}",
                self.tokenizer.min_token_length, self.tokenizer.max_token_length
            )));
        }
        let pagerank = &self.pagerank;
        if !(0.0..=1.0).contains(&pagerank.jump_probability) || pagerank.jump_probability == 0.0 {
            return Err(IndexError::Config(format!(
                "jump_probability {} is outside (0, 1]",
                pagerank.jump_probability
            )));
        }
        if pagerank.epsilon.is_nan() || pagerank.epsilon <= 0.0 || pagerank.max_iterations == 0 {
            return Err(IndexError::Config(
                "PageRank needs a positive epsilon and at least one iteration".to_string(),
            ));
        }
        Ok(())
    }

    /// Create the index root directory if it does not exist yet
    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.root_dir)?;
        Ok(())
    }

    pub fn index_file(&self) -> PathBuf {
        self.root_dir.join(INDEX_FILE)
    }

    pub fn term_directory_file(&self) -> PathBuf {
        self.root_dir.join(TERM_DIRECTORY_FILE)
    }

    pub fn doc_paths_file(&self) -> PathBuf {
        self.root_dir.join(DOC_PATHS_FILE)
    }

    pub fn doc_lengths_file(&self) -> PathBuf {
        self.root_dir.join(DOC_LENGTHS_FILE)
    }

    pub fn pagerank_file(&self) -> PathBuf {
        self.pagerank_file
            .clone()
            .unwrap_or_else(|| self.root_dir.join(PAGERANK_FILE))
    }

    pub fn partition_file(&self, id: u64) -> PathBuf {
        self.root_dir.join(format!("partition-{}", id))
    }

    /// A disk index counts as present only when every committed file exists
    pub fn index_exists(&self) -> bool {
        self.index_file().exists()
            && self.term_directory_file().exists()
            && self.doc_paths_file().exists()
            && self.doc_lengths_file().exists()
    }
}

pub mod config;
pub mod error;
pub mod index;
pub mod models;
pub mod query;
pub mod tokenizer;

pub use config::{IndexBackend, IndexConfig, PageRankConfig, TokenizerConfig};
pub use error::{IndexError, Result};
pub use index::{IndexStore, Indexer};
pub use models::*;
pub use query::{relevance_feedback, FeedbackParams, QueryEvaluator};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

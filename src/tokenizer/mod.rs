//! Text normalization used at ingestion and query time

#[allow(clippy::module_inception)]
mod tokenizer;

pub use tokenizer::Tokenizer;

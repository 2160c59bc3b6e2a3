//! Index construction and storage
//!
//! SPIMI ingestion spills sorted partition runs, which are merged into a
//! single line-per-term index file addressed through an FST term directory.

pub mod builder;
pub mod extract;
pub mod link_graph;
pub mod merge;
pub mod metadata;
pub mod pagerank;
pub mod partition;
pub mod store;
pub mod term_dict;

pub use builder::Indexer;
pub use extract::{ContentExtractor, PlainTextExtractor};
pub use link_graph::{load_names, LinkGraph};
pub use merge::{MergeEngine, MergeOutput};
pub use metadata::DocumentMetadata;
pub use pagerank::{short_name, AuthorityScores, PageRankScores};
pub use partition::{PartitionMeta, PartitionReader, PartitionRecord, PartitionWriter};
pub use store::{DiskIndex, IndexStore, MemoryIndex, PostingsSource};
pub use term_dict::{TermDirectory, TermDirectoryBuilder};

//! SPIMI index construction
//!
//! Documents are tokenized one at a time into an in-memory
//! `term -> postings` buffer. Each token insertion counts against the memory
//! budget; once the budget is reached the buffer is spilled as a sorted
//! partition run and cleared. `finish` spills the remainder, merges every
//! partition into the final index file and commits the term directory last.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::extract::{ContentExtractor, PlainTextExtractor};
use super::merge::MergeEngine;
use super::metadata::DocumentMetadata;
use super::pagerank::PageRankScores;
use super::partition::{PartitionMeta, PartitionWriter};
use super::store::{DiskIndex, IndexStore, MemoryIndex};
use crate::config::{IndexBackend, IndexConfig};
use crate::error::{IndexError, Result};
use crate::models::{DocId, PostingsList};
use crate::tokenizer::Tokenizer;

/// The in-memory postings buffer and the partitions it has spilled
struct SpillBuffer {
    postings: HashMap<String, PostingsList>,
    insertions: usize,
    budget: usize,
    spill_enabled: bool,
    partitions: Vec<PartitionMeta>,
}

impl SpillBuffer {
    fn new(budget: usize, spill_enabled: bool) -> Self {
        Self {
            postings: HashMap::new(),
            insertions: 0,
            budget,
            spill_enabled,
            partitions: Vec::new(),
        }
    }

    /// Record one token occurrence, spilling once the budget is reached.
    ///
    /// The occurrence that reaches the budget is part of the spilled run.
    fn insert(&mut self, config: &IndexConfig, term: String, doc_id: DocId, offset: u32) -> Result<()> {
        self.postings.entry(term).or_default().append(doc_id, offset);
        self.insertions += 1;

        if self.spill_enabled && self.insertions >= self.budget {
            self.spill(config)?;
        }
        Ok(())
    }

    fn spill(&mut self, config: &IndexConfig) -> Result<()> {
        if self.postings.is_empty() {
            return Ok(());
        }

        let seq = self.partitions.len() as u64;
        let meta = PartitionWriter::new(seq, config.partition_file(seq)).write(&self.postings)?;
        info!(
            partition = seq,
            terms = meta.term_count,
            tokens = self.insertions,
            "spilled postings buffer"
        );

        self.partitions.push(meta);
        self.postings.clear();
        self.insertions = 0;
        Ok(())
    }
}

/// Builds an index from documents
pub struct Indexer {
    config: IndexConfig,
    tokenizer: Tokenizer,
    extractor: Box<dyn ContentExtractor>,
    buffer: SpillBuffer,
    metadata: DocumentMetadata,
    next_doc_id: DocId,
}

impl Indexer {
    /// Create an indexer and its root directory.
    ///
    /// For a disk build, any previously committed term directory is removed
    /// so the old index stops counting as present while this one is built.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        config.ensure_dirs()?;

        if config.backend == IndexBackend::Disk {
            match fs::remove_file(config.term_directory_file()) {
                Ok(()) => info!("removed previous term directory from {}", config.root_dir.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Self {
            tokenizer: Tokenizer::new(&config.tokenizer),
            extractor: Box::new(PlainTextExtractor),
            buffer: SpillBuffer::new(config.memory_budget, config.backend == IndexBackend::Disk),
            metadata: DocumentMetadata::new(),
            next_doc_id: DocId(0),
            config,
        })
    }

    /// Replace the content extractor
    pub fn with_extractor(mut self, extractor: impl ContentExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Documents indexed so far
    pub fn doc_count(&self) -> usize {
        self.metadata.doc_count()
    }

    /// Partitions spilled so far
    pub fn partition_count(&self) -> usize {
        self.buffer.partitions.len()
    }

    /// Index every regular file under `root`, in file-name order.
    ///
    /// Returns the number of documents indexed. Entries that cannot be read
    /// are skipped with a warning.
    pub fn index_directory(&mut self, root: &Path) -> Result<usize> {
        if !root.exists() {
            return Err(IndexError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("document root {} does not exist", root.display()),
            )));
        }

        info!("indexing documents under {}", root.display());
        let mut indexed = 0;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if self.index_file(entry.path())?.is_some() {
                indexed += 1;
            }
        }

        info!(
            documents = indexed,
            partitions = self.partition_count(),
            "finished reading documents"
        );
        Ok(indexed)
    }

    /// Index one file, returning its docID.
    ///
    /// Files the extractor cannot read or declines are skipped and do not
    /// consume a docID.
    pub fn index_file(&mut self, path: &Path) -> Result<Option<DocId>> {
        let text = match self.extractor.extract(path) {
            Ok(Some(text)) => text,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("skipping {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        self.index_text(path, &text).map(Some)
    }

    /// Index in-memory text recorded under `path`
    pub fn index_text(&mut self, path: impl AsRef<Path>, text: &str) -> Result<DocId> {
        let doc_id = self.next_doc_id;
        let mut offset: u32 = 0;

        for token in self.tokenizer.tokens(text) {
            self.buffer.insert(&self.config, token, doc_id, offset)?;
            offset += 1;
        }

        self.metadata.insert(doc_id, path.as_ref(), offset);
        self.next_doc_id = doc_id.next();
        debug!(doc = %doc_id, tokens = offset, "indexed {}", path.as_ref().display());
        Ok(doc_id)
    }

    /// Term frequencies of a document, re-read from disk
    pub fn terms_in_document(&self, path: &Path) -> Result<HashMap<String, u32>> {
        match self.extractor.extract(path)? {
            Some(text) => Ok(self.tokenizer.term_frequencies(&text)),
            None => Ok(HashMap::new()),
        }
    }

    /// Complete the build and return a queryable store.
    ///
    /// A disk build writes the index file, then the document metadata, and
    /// commits the term directory last.
    pub fn finish(self) -> Result<IndexStore> {
        let Indexer {
            config,
            mut buffer,
            metadata,
            ..
        } = self;

        let store = match config.backend {
            IndexBackend::Memory => {
                info!(
                    terms = buffer.postings.len(),
                    documents = metadata.doc_count(),
                    "built in-memory index"
                );
                IndexStore::new(Box::new(MemoryIndex::new(buffer.postings)), metadata)
            }
            IndexBackend::Disk => {
                buffer.spill(&config)?;

                let merged = MergeEngine::new(config.index_file()).merge(&buffer.partitions)?;
                metadata.save(&config.doc_paths_file(), &config.doc_lengths_file())?;
                merged.directory.save(&config.term_directory_file())?;

                info!(
                    terms = merged.term_count,
                    documents = metadata.doc_count(),
                    "committed index at {}",
                    config.root_dir.display()
                );
                IndexStore::new(
                    Box::new(DiskIndex::new(config.index_file(), merged.directory)),
                    metadata,
                )
            }
        };

        let pagerank_file = config.pagerank_file();
        if pagerank_file.exists() {
            return Ok(store.with_authority(PageRankScores::load(&pagerank_file)?));
        }
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn disk_config(dir: &Path, budget: usize) -> IndexConfig {
        IndexConfig::new(dir.join("index")).with_memory_budget(budget)
    }

    #[test]
    fn test_offsets_are_dense_per_document() {
        let tmp = TempDir::new().unwrap();
        let config = IndexConfig::new(tmp.path()).with_backend(IndexBackend::Memory);
        let mut indexer = Indexer::new(config).unwrap();
        indexer.index_text("a.txt", "the cat saw the dog").unwrap();
        let store = indexer.finish().unwrap();

        let the = store.lookup("the").unwrap().unwrap();
        assert_eq!(the.entries()[0].offsets, vec![0, 3]);
        assert_eq!(store.document_length(DocId(0)), 5);
    }

    #[test]
    fn test_spill_at_budget_keeps_triggering_token() {
        let tmp = TempDir::new().unwrap();
        let mut indexer = Indexer::new(disk_config(tmp.path(), 3)).unwrap();
        indexer.index_text("a.txt", "one two three four").unwrap();

        assert_eq!(indexer.partition_count(), 1);
        let partition = fs::read_to_string(indexer.config().partition_file(0)).unwrap();
        assert!(partition.contains("three 1\n0 2\n"));
        assert_eq!(indexer.buffer.insertions, 1);
    }

    #[test]
    fn test_doc_ids_sequential_and_skips_do_not_consume() {
        let tmp = TempDir::new().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(docs.join("sub")).unwrap();
        fs::write(docs.join("b.txt"), "bravo").unwrap();
        fs::write(docs.join("a.txt"), "alpha").unwrap();
        fs::write(docs.join("paper.pdf"), b"%PDF-1.7").unwrap();
        fs::write(docs.join("sub").join("c.txt"), "charlie").unwrap();

        let mut indexer = Indexer::new(disk_config(tmp.path(), 100)).unwrap();
        assert_eq!(indexer.index_directory(&docs).unwrap(), 3);
        let store = indexer.finish().unwrap();

        assert_eq!(store.doc_count(), 3);
        assert_eq!(store.document_path(DocId(0)), Some(docs.join("a.txt").as_path()));
        assert_eq!(store.document_path(DocId(1)), Some(docs.join("b.txt").as_path()));
        assert_eq!(
            store.document_path(DocId(2)),
            Some(docs.join("sub").join("c.txt").as_path())
        );
    }

    #[test]
    fn test_finish_commits_every_file() {
        let tmp = TempDir::new().unwrap();
        let config = disk_config(tmp.path(), 2);
        let mut indexer = Indexer::new(config.clone()).unwrap();
        indexer.index_text("a.txt", "red green blue").unwrap();
        indexer.index_text("b.txt", "green").unwrap();
        indexer.finish().unwrap();

        assert!(config.index_exists());
        assert!(!config.partition_file(0).exists());
        assert_eq!(
            fs::read_to_string(config.term_directory_file()).unwrap(),
            "blue 0\ngreen 4\nred 12\n"
        );
        assert_eq!(
            fs::read_to_string(config.index_file()).unwrap(),
            "0 2\n0 1,1 0\n0 0\n"
        );
    }

    #[test]
    fn test_rebuild_invalidates_previous_index_until_finished() {
        let tmp = TempDir::new().unwrap();
        let config = disk_config(tmp.path(), 10);
        let mut indexer = Indexer::new(config.clone()).unwrap();
        indexer.index_text("a.txt", "word").unwrap();
        indexer.finish().unwrap();
        assert!(config.index_exists());

        let _rebuild = Indexer::new(config.clone()).unwrap();
        assert!(!config.index_exists());
    }

    #[test]
    fn test_terms_in_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("doc.txt");
        fs::write(&path, "to be or not to be").unwrap();

        let indexer = Indexer::new(disk_config(tmp.path(), 10)).unwrap();
        let terms = indexer.terms_in_document(&path).unwrap();
        assert_eq!(terms["to"], 2);
        assert_eq!(terms["not"], 1);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Indexer::new(disk_config(tmp.path(), 0)),
            Err(IndexError::Config(_))
        ));
    }
}

//! Read side of a built index
//!
//! Postings come from a [`PostingsSource`]: either the in-memory buffer kept
//! by a memory-backend build or the merged index file on disk. Document
//! metadata and PageRank scores are held alongside and are read-only once the
//! store exists, so a store can be shared across threads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::metadata::DocumentMetadata;
use super::pagerank::{short_name, AuthorityScores, PageRankScores};
use super::term_dict::TermDirectory;
use crate::config::IndexConfig;
use crate::error::{IndexError, Result};
use crate::models::{DocId, PostingsList};

/// Resolves terms to postings lists
pub trait PostingsSource: Send + Sync {
    /// Postings for `term`, `None` if the term is not indexed
    fn postings(&self, term: &str) -> Result<Option<PostingsList>>;

    /// All indexed terms in ascending order
    fn terms(&self) -> Vec<String>;

    fn term_count(&self) -> usize;
}

/// Postings held in a hash map
#[derive(Debug, Default)]
pub struct MemoryIndex {
    postings: HashMap<String, PostingsList>,
}

impl MemoryIndex {
    pub fn new(postings: HashMap<String, PostingsList>) -> Self {
        Self { postings }
    }
}

impl PostingsSource for MemoryIndex {
    fn postings(&self, term: &str) -> Result<Option<PostingsList>> {
        Ok(self.postings.get(term).cloned())
    }

    fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self.postings.keys().cloned().collect();
        terms.sort();
        terms
    }

    fn term_count(&self) -> usize {
        self.postings.len()
    }
}

/// Postings read from the merged index file.
///
/// Every lookup opens the file, seeks to the term's record and reads one
/// line. No handle is kept between lookups.
pub struct DiskIndex {
    index_file: PathBuf,
    directory: TermDirectory,
}

impl DiskIndex {
    pub fn new(index_file: impl Into<PathBuf>, directory: TermDirectory) -> Self {
        Self {
            index_file: index_file.into(),
            directory,
        }
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }

    pub fn directory(&self) -> &TermDirectory {
        &self.directory
    }

    fn read_record(&self, term: &str, offset: u64) -> Result<PostingsList> {
        let context = format!("{} (term '{}')", self.index_file.display(), term);

        let mut file = File::open(&self.index_file)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        if reader.read_until(b'\n', &mut bytes)? == 0 {
            return Err(IndexError::corrupt(
                context,
                format!("no record at offset {}", offset),
            ));
        }
        let line = match std::str::from_utf8(&bytes) {
            Ok(line) => line,
            Err(e) => {
                return Err(IndexError::corrupt(
                    context,
                    format!("record is not UTF-8: {}", e),
                ))
            }
        };

        PostingsList::from_record(line).map_err(|e| match e {
            IndexError::CorruptRecord { reason, .. } => IndexError::corrupt(context, reason),
            other => other,
        })
    }
}

impl PostingsSource for DiskIndex {
    fn postings(&self, term: &str) -> Result<Option<PostingsList>> {
        match self.directory.get(term) {
            Some(offset) => self.read_record(term, offset).map(Some),
            None => Ok(None),
        }
    }

    fn terms(&self) -> Vec<String> {
        self.directory
            .iter_terms()
            .into_iter()
            .map(|(term, _)| term)
            .collect()
    }

    fn term_count(&self) -> usize {
        self.directory.len()
    }
}

/// A queryable index: postings, document metadata and authority scores
pub struct IndexStore {
    source: Box<dyn PostingsSource>,
    metadata: DocumentMetadata,
    authority: Box<dyn AuthorityScores>,
}

impl IndexStore {
    pub fn new(source: Box<dyn PostingsSource>, metadata: DocumentMetadata) -> Self {
        Self {
            source,
            metadata,
            authority: Box::new(PageRankScores::new()),
        }
    }

    /// Replace the PageRank provider
    pub fn with_authority(mut self, scores: impl AuthorityScores + 'static) -> Self {
        self.authority = Box::new(scores);
        self
    }

    /// Load a committed disk index.
    ///
    /// The PageRank file is optional; when it is absent every document
    /// scores 0.0.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        if !config.index_exists() {
            return Err(IndexError::IndexNotFound(config.root_dir.clone()));
        }

        let directory = TermDirectory::load(&config.term_directory_file())?;
        let metadata =
            DocumentMetadata::load(&config.doc_paths_file(), &config.doc_lengths_file())?;
        let mut store = IndexStore::new(
            Box::new(DiskIndex::new(config.index_file(), directory)),
            metadata,
        );

        let pagerank_file = config.pagerank_file();
        if pagerank_file.exists() {
            store = store.with_authority(PageRankScores::load(&pagerank_file)?);
        } else {
            debug!("no PageRank file at {}", pagerank_file.display());
        }

        info!(
            terms = store.source.term_count(),
            documents = store.doc_count(),
            "opened index at {}",
            config.root_dir.display()
        );
        Ok(store)
    }

    /// Postings for `term`, `None` if it was never indexed
    pub fn lookup(&self, term: &str) -> Result<Option<PostingsList>> {
        self.source.postings(term)
    }

    /// Token count of a document; 0 with a warning if unknown
    pub fn document_length(&self, doc_id: DocId) -> u32 {
        match self.metadata.length(doc_id) {
            Some(length) => length,
            None => {
                warn!(doc = %doc_id, "no length recorded for document");
                0
            }
        }
    }

    /// Path of a document; `None` with a warning if unknown
    pub fn document_path(&self, doc_id: DocId) -> Option<&Path> {
        let path = self.metadata.path(doc_id);
        if path.is_none() {
            warn!(doc = %doc_id, "no path recorded for document");
        }
        path
    }

    /// PageRank of a document, looked up by its short name.
    ///
    /// Documents outside the link graph score 0.0.
    pub fn pagerank_score(&self, doc_id: DocId) -> f64 {
        let Some(name) = self.document_path(doc_id).and_then(short_name) else {
            return 0.0;
        };
        match self.authority.score(&name) {
            Some(score) => score,
            None => {
                warn!(doc = %doc_id, name = %name, "no PageRank score for document");
                0.0
            }
        }
    }

    /// Number of documents with a recorded path
    pub fn doc_count(&self) -> usize {
        self.metadata.doc_count()
    }

    pub fn term_count(&self) -> usize {
        self.source.term_count()
    }

    /// Indexed terms in ascending order
    pub fn terms(&self) -> Vec<String> {
        self.source.terms()
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::term_dict::TermDirectoryBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn list(groups: &[(u32, &[u32])]) -> PostingsList {
        let mut postings = PostingsList::new();
        for &(doc, offsets) in groups {
            for &o in offsets {
                postings.append(DocId(doc), o);
            }
        }
        postings
    }

    fn metadata() -> DocumentMetadata {
        let mut metadata = DocumentMetadata::new();
        metadata.insert(DocId(0), "/corpus/Alpha.f", 4);
        metadata.insert(DocId(1), "/corpus/Beta.f", 2);
        metadata
    }

    #[test]
    fn test_memory_lookup() {
        let mut postings = HashMap::new();
        postings.insert("cat".to_string(), list(&[(0, &[1]), (1, &[0])]));
        let store = IndexStore::new(Box::new(MemoryIndex::new(postings)), metadata());

        assert_eq!(store.lookup("cat").unwrap().unwrap().len(), 2);
        assert!(store.lookup("dog").unwrap().is_none());
        assert_eq!(store.terms(), vec!["cat"]);
        assert_eq!(store.doc_count(), 2);
    }

    #[test]
    fn test_disk_lookup_reads_one_line() {
        let tmp = TempDir::new().unwrap();
        let index = tmp.path().join("full-index");
        fs::write(&index, "0 0 2,1 1\n1 0\n").unwrap();

        let mut builder = TermDirectoryBuilder::new();
        builder.add("cat".to_string(), 0);
        builder.add("dog".to_string(), 10);
        let disk = DiskIndex::new(&index, builder.build().unwrap());

        assert_eq!(
            disk.postings("cat").unwrap(),
            Some(list(&[(0, &[0, 2]), (1, &[1])]))
        );
        assert_eq!(disk.postings("dog").unwrap(), Some(list(&[(1, &[0])])));
        assert_eq!(disk.postings("emu").unwrap(), None);
    }

    #[test]
    fn test_disk_lookup_past_end_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let index = tmp.path().join("full-index");
        fs::write(&index, "0 0\n").unwrap();

        let mut builder = TermDirectoryBuilder::new();
        builder.add("ghost".to_string(), 400);
        let disk = DiskIndex::new(&index, builder.build().unwrap());

        assert!(matches!(
            disk.postings("ghost"),
            Err(IndexError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_disk_lookup_of_non_utf8_record_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let index = tmp.path().join("full-index");
        fs::write(&index, b"0 0\n1 \xff\xfe\n").unwrap();

        let mut builder = TermDirectoryBuilder::new();
        builder.add("bad".to_string(), 4);
        let disk = DiskIndex::new(&index, builder.build().unwrap());

        assert!(matches!(
            disk.postings("bad"),
            Err(IndexError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_missing_metadata_defaults() {
        let store = IndexStore::new(Box::new(MemoryIndex::default()), metadata());
        assert_eq!(store.document_length(DocId(0)), 4);
        assert_eq!(store.document_length(DocId(9)), 0);
        assert_eq!(store.document_path(DocId(9)), None);
    }

    #[test]
    fn test_pagerank_by_short_name() {
        let store = IndexStore::new(Box::new(MemoryIndex::default()), metadata())
            .with_authority(PageRankScores::new().with_score("Alpha", 0.4));

        assert_eq!(store.pagerank_score(DocId(0)), 0.4);
        assert_eq!(store.pagerank_score(DocId(1)), 0.0);
        assert_eq!(store.pagerank_score(DocId(7)), 0.0);
    }

    #[test]
    fn test_open_requires_committed_files() {
        let tmp = TempDir::new().unwrap();
        let config = IndexConfig::new(tmp.path());
        fs::write(config.index_file(), "0 0\n").unwrap();

        assert!(matches!(
            IndexStore::open(&config),
            Err(IndexError::IndexNotFound(_))
        ));
    }

    #[test]
    fn test_store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IndexStore>();
    }
}

//! Per-document metadata assigned at ingestion
//!
//! Persisted as two line files: `docID path` and `docID tokenCount`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::models::DocId;

/// Document paths and token counts, keyed by docID
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    paths: BTreeMap<DocId, PathBuf>,
    lengths: BTreeMap<DocId, u32>,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: DocId, path: impl Into<PathBuf>, length: u32) {
        self.paths.insert(doc_id, path.into());
        self.lengths.insert(doc_id, length);
    }

    pub fn path(&self, doc_id: DocId) -> Option<&Path> {
        self.paths.get(&doc_id).map(PathBuf::as_path)
    }

    pub fn length(&self, doc_id: DocId) -> Option<u32> {
        self.lengths.get(&doc_id).copied()
    }

    /// Number of documents with a recorded path
    pub fn doc_count(&self) -> usize {
        self.paths.len()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.paths.keys().copied()
    }

    /// Write both metadata files in docID order
    pub fn save(&self, paths_file: &Path, lengths_file: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(paths_file)?);
        for (doc_id, path) in &self.paths {
            writeln!(out, "{} {}", doc_id, path.display())?;
        }
        out.flush()?;

        let mut out = BufWriter::new(File::create(lengths_file)?);
        for (doc_id, length) in &self.lengths {
            writeln!(out, "{} {}", doc_id, length)?;
        }
        out.flush()?;
        Ok(())
    }

    pub fn load(paths_file: &Path, lengths_file: &Path) -> Result<Self> {
        let mut metadata = DocumentMetadata::new();

        for (doc_id, path) in read_pairs(paths_file)? {
            metadata.paths.insert(doc_id, PathBuf::from(path));
        }
        for (doc_id, raw) in read_pairs(lengths_file)? {
            let length = raw.parse::<u32>().map_err(|_| {
                IndexError::corrupt(
                    lengths_file.display().to_string(),
                    format!("bad token count '{}' for docID {}", raw, doc_id),
                )
            })?;
            metadata.lengths.insert(doc_id, length);
        }

        Ok(metadata)
    }
}

/// Read `docID rest-of-line` pairs; the remainder may contain spaces
fn read_pairs(path: &Path) -> Result<Vec<(DocId, String)>> {
    let context = path.display().to_string();
    let reader = BufReader::new(File::open(path)?);
    let mut pairs = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (id, rest) = line
            .split_once(' ')
            .ok_or_else(|| IndexError::corrupt(&context, format!("malformed line '{}'", line)))?;
        let id = id
            .parse::<u32>()
            .map_err(|_| IndexError::corrupt(&context, format!("bad docID '{}'", id)))?;
        pairs.push((DocId(id), rest.to_string()));
    }

    Ok(pairs)
}

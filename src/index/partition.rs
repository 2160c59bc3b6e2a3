//! Partition runs produced by SPIMI spills
//!
//! A partition is a sorted, write-once/read-once run file:
//!
//! ```text
//! <term> <numEntries>
//! <docID> <offset> <offset> ...
//! ...
//! ```
//!
//! Terms appear in ascending byte order, so partitions can be merged with a
//! single sequential reader each.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{IndexError, Result};
use crate::models::postings::{parse_group, parse_number};
use crate::models::PostingsList;

/// Summary of a written partition
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionMeta {
    /// Spill sequence number (also the merge tie-break)
    pub seq: u64,
    pub path: PathBuf,
    pub term_count: usize,
    pub entry_count: usize,
}

/// Writer for one partition run
pub struct PartitionWriter {
    seq: u64,
    path: PathBuf,
}

impl PartitionWriter {
    pub fn new(seq: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            seq,
            path: path.into(),
        }
    }

    /// Write every term of `buffer` in sorted order and return the run's metadata.
    pub fn write(&self, buffer: &HashMap<String, PostingsList>) -> Result<PartitionMeta> {
        let mut terms: Vec<&String> = buffer.keys().collect();
        terms.sort();

        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);
        let mut entry_count = 0;

        for term in &terms {
            let postings = &buffer[*term];
            writeln!(out, "{} {}", term, postings.len())?;
            for entry in postings {
                entry.write_group(&mut out)?;
                out.write_all(b"\n")?;
            }
            entry_count += postings.len();
        }

        out.flush()?;
        out.into_inner()
            .map_err(|e| IndexError::Io(e.into_error()))?
            .sync_all()?;

        debug!(
            partition = self.seq,
            terms = terms.len(),
            entries = entry_count,
            "wrote partition {}",
            self.path.display()
        );

        Ok(PartitionMeta {
            seq: self.seq,
            path: self.path.clone(),
            term_count: terms.len(),
            entry_count,
        })
    }
}

/// One `(term, postings)` run record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionRecord {
    pub term: String,
    pub postings: PostingsList,
}

/// Sequential reader over a partition run
pub struct PartitionReader {
    seq: u64,
    path: PathBuf,
    reader: BufReader<File>,
    line: String,
}

impl PartitionReader {
    pub fn open(seq: u64, path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            seq,
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line: String::new(),
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn context(&self) -> String {
        self.path.display().to_string()
    }

    fn read_line(&mut self) -> Result<bool> {
        self.line.clear();
        Ok(self.reader.read_line(&mut self.line)? > 0)
    }

    /// Read the next record, `None` at end of file
    pub fn next_record(&mut self) -> Result<Option<PartitionRecord>> {
        if !self.read_line()? {
            return Ok(None);
        }

        let (term, count) = {
            let mut header = self.line.split_whitespace();
            let term = header
                .next()
                .ok_or_else(|| IndexError::corrupt(self.context(), "empty term header"))?
                .to_string();
            let count = header
                .next()
                .ok_or_else(|| {
                    IndexError::corrupt(self.context(), format!("missing entry count for '{}'", term))
                })
                .and_then(|tok| parse_number(tok, "entry count"))?;
            if let Some(extra) = header.next() {
                return Err(IndexError::corrupt(
                    self.context(),
                    format!("unexpected token '{}' in header of '{}'", extra, term),
                ));
            }
            (term, count as usize)
        };
        if count == 0 {
            return Err(IndexError::corrupt(
                self.context(),
                format!("term '{}' has no entries", term),
            ));
        }

        let mut postings = PostingsList::with_capacity(count);
        for _ in 0..count {
            if !self.read_line()? {
                return Err(IndexError::corrupt(
                    self.context(),
                    format!("truncated run for term '{}'", term),
                ));
            }
            let context = self.context();
            let entry = parse_group(&self.line, postings.last_doc_id(), &context)
                .map_err(|e| match e {
                    IndexError::CorruptRecord { reason, .. } => {
                        IndexError::corrupt(context, format!("{} (term '{}')", reason, term))
                    }
                    other => other,
                })?;
            postings.push(entry);
        }

        Ok(Some(PartitionRecord { term, postings }))
    }
}

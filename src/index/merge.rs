//! External k-way merge of partition runs
//!
//! Every partition is read sequentially; a min-heap holds at most one
//! pending record per open reader. Records are ordered by
//! `(term, first docID, partition sequence)`. Partitions are spilled in docID
//! order, so for a shared term the earlier partition always comes first, and
//! when a document's postings were split across two partitions (equal
//! adjoining docIDs) the spill order decides. The merge is deterministic for a
//! given set of partitions.
//!
//! Records for the same term are concatenated into one output line. When the
//! previous run for the term ended with the document the next run starts with,
//! the offsets are appended to that group instead of opening a new one.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::partition::{PartitionMeta, PartitionReader, PartitionRecord};
use super::term_dict::{TermDirectory, TermDirectoryBuilder};
use crate::error::{IndexError, Result};
use crate::models::DocId;

/// A pending record and the reader it came from
struct MergeCandidate {
    record: PartitionRecord,
    seq: u64,
    reader: usize,
}

impl MergeCandidate {
    fn first_doc_id(&self) -> Option<DocId> {
        self.record.postings.first_doc_id()
    }
}

impl PartialEq for MergeCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeCandidate {}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record
            .term
            .cmp(&other.record.term)
            .then_with(|| self.first_doc_id().cmp(&other.first_doc_id()))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Writer that tracks how many bytes have been handed to it
struct OffsetWriter<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> OffsetWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    fn position(&self) -> u64 {
        self.position
    }
}

impl<W: Write> Write for OffsetWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// The term and final docID of the most recently written run
struct LastWritten {
    term: String,
    last_doc_id: Option<DocId>,
}

/// Result of a completed merge
pub struct MergeOutput {
    pub directory: TermDirectory,
    pub term_count: usize,
    pub bytes_written: u64,
}

/// Merges partition runs into the final index file
pub struct MergeEngine {
    output: PathBuf,
}

impl MergeEngine {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Merge `partitions` into the output file and build the term directory.
    ///
    /// Partition files are deleted only after the output is fully written.
    /// On failure the partial output file is removed and no directory is
    /// returned.
    pub fn merge(&self, partitions: &[PartitionMeta]) -> Result<MergeOutput> {
        info!(
            partitions = partitions.len(),
            "merging partition files into {}",
            self.output.display()
        );

        let output = match self.merge_into_output(partitions) {
            Ok(output) => output,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&self.output) {
                    if rm.kind() != io::ErrorKind::NotFound {
                        warn!("failed to remove partial index file: {}", rm);
                    }
                }
                return Err(e);
            }
        };

        for partition in partitions {
            if let Err(e) = fs::remove_file(&partition.path) {
                warn!("failed to delete partition {}: {}", partition.path.display(), e);
            }
        }

        info!(
            terms = output.term_count,
            bytes = output.bytes_written,
            "index file created"
        );
        Ok(output)
    }

    fn merge_into_output(&self, partitions: &[PartitionMeta]) -> Result<MergeOutput> {
        let mut readers = Vec::with_capacity(partitions.len());
        for partition in partitions {
            readers.push(Some(PartitionReader::open(partition.seq, &partition.path)?));
        }

        let file = File::create(&self.output)?;
        let mut out = OffsetWriter::new(BufWriter::new(file));
        let mut directory = TermDirectoryBuilder::new();
        let mut heap: BinaryHeap<Reverse<MergeCandidate>> = BinaryHeap::with_capacity(readers.len());
        let mut last: Option<LastWritten> = None;

        for idx in 0..readers.len() {
            Self::refill(&mut readers, idx, &mut heap)?;
        }

        while let Some(Reverse(candidate)) = heap.pop() {
            let reader = candidate.reader;
            Self::write_candidate(&mut out, &mut directory, &mut last, candidate.record)?;
            Self::refill(&mut readers, reader, &mut heap)?;
        }

        if last.is_some() {
            out.write_all(b"\n")?;
        }
        out.flush()?;
        let bytes_written = out.position();
        out.inner
            .into_inner()
            .map_err(|e| IndexError::Io(e.into_error()))?
            .sync_all()?;

        let term_count = directory.len();
        Ok(MergeOutput {
            directory: directory.build()?,
            term_count,
            bytes_written,
        })
    }

    /// Pull the next record from reader `idx`; an exhausted reader is closed.
    fn refill(
        readers: &mut [Option<PartitionReader>],
        idx: usize,
        heap: &mut BinaryHeap<Reverse<MergeCandidate>>,
    ) -> Result<()> {
        let next = match readers[idx].as_mut() {
            Some(reader) => reader.next_record()?.map(|record| (record, reader.seq())),
            None => return Ok(()),
        };
        match next {
            Some((record, seq)) => heap.push(Reverse(MergeCandidate {
                record,
                seq,
                reader: idx,
            })),
            None => readers[idx] = None,
        }
        Ok(())
    }

    fn write_candidate<W: Write>(
        out: &mut OffsetWriter<W>,
        directory: &mut TermDirectoryBuilder,
        last: &mut Option<LastWritten>,
        record: PartitionRecord,
    ) -> Result<()> {
        let PartitionRecord { term, postings } = record;

        match last.as_ref() {
            Some(prev) if prev.term == term => {
                let entries = postings.entries();
                let mut rest = entries;
                if let Some(first) = entries.first() {
                    if prev.last_doc_id == Some(first.doc_id) {
                        // Same document split across partitions: extend its group
                        first.write_offsets(out)?;
                        rest = &entries[1..];
                    }
                }
                for entry in rest {
                    out.write_all(b",")?;
                    entry.write_group(out)?;
                }
            }
            Some(_) => {
                out.write_all(b"\n")?;
                directory.add(term.clone(), out.position());
                postings.write_record(out)?;
            }
            None => {
                directory.add(term.clone(), out.position());
                postings.write_record(out)?;
            }
        }

        *last = Some(LastWritten {
            term,
            last_doc_id: postings.last_doc_id(),
        });
        Ok(())
    }
}

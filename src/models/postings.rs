//! Postings entries and lists
//!
//! A postings list is kept sorted by docID with one entry per document.
//! Lists are built either by streaming `append` during tokenization (which
//! relies on documents arriving in increasing docID order) or in bulk during
//! merge and deserialization, where order is preserved by construction.
//!
//! # Record format
//!
//! ```text
//! docID o1 o2 ...,docID o1 o2 ...
//! ```
//!
//! Per-document groups are comma separated, each group is the docID followed
//! by its offsets, space separated. No trailing delimiter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};

use crate::error::{IndexError, Result};

/// Document identifier, assigned sequentially at ingestion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocId(pub u32);

impl DocId {
    pub fn new(n: u32) -> Self {
        Self(n)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One document's occurrences of one term
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingsEntry {
    pub doc_id: DocId,
    /// Token positions, strictly increasing
    pub offsets: Vec<u32>,
}

impl PostingsEntry {
    pub fn new(doc_id: DocId) -> Self {
        Self {
            doc_id,
            offsets: Vec::new(),
        }
    }

    pub fn with_offsets(doc_id: DocId, offsets: Vec<u32>) -> Self {
        Self { doc_id, offsets }
    }

    /// Term frequency in this document
    pub fn term_frequency(&self) -> usize {
        self.offsets.len()
    }

    /// Write ` o1 o2 ...` (each offset preceded by a space)
    pub fn write_offsets<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for offset in &self.offsets {
            write!(out, " {}", offset)?;
        }
        Ok(())
    }

    /// Write `docID o1 o2 ...`
    pub fn write_group<W: Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{}", self.doc_id)?;
        self.write_offsets(out)
    }
}

/// Postings for one term, sorted ascending by docID
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingsList {
    entries: Vec<PostingsEntry>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Record an occurrence of the term at `offset` in `doc_id`.
    ///
    /// Extends the last entry when it belongs to the same document, otherwise
    /// starts a new entry. Callers must append in non-decreasing docID order.
    pub fn append(&mut self, doc_id: DocId, offset: u32) {
        match self.entries.last_mut() {
            Some(last) if last.doc_id == doc_id => last.offsets.push(offset),
            _ => self.entries.push(PostingsEntry::with_offsets(doc_id, vec![offset])),
        }
    }

    /// Push a complete entry (bulk construction)
    pub fn push(&mut self, entry: PostingsEntry) {
        debug_assert!(
            self.entries
                .last()
                .map(|last| last.doc_id < entry.doc_id)
                .unwrap_or(true),
            "postings must be pushed in increasing docID order"
        );
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PostingsEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PostingsEntry> {
        self.entries.iter()
    }

    pub fn get(&self, i: usize) -> Option<&PostingsEntry> {
        self.entries.get(i)
    }

    pub fn first_doc_id(&self) -> Option<DocId> {
        self.entries.first().map(|e| e.doc_id)
    }

    pub fn last_doc_id(&self) -> Option<DocId> {
        self.entries.last().map(|e| e.doc_id)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.entries.iter().map(|e| e.doc_id)
    }

    pub fn sort_by_doc_id(&mut self) {
        self.entries.sort_by_key(|e| e.doc_id);
    }

    /// Whether docIDs are strictly increasing and every entry's offsets are too
    pub fn is_well_formed(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].doc_id < w[1].doc_id)
            && self
                .entries
                .iter()
                .all(|e| !e.offsets.is_empty() && e.offsets.windows(2).all(|w| w[0] < w[1]))
    }

    /// Write the single-line record form (no line terminator)
    pub fn write_record<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.write_all(b",")?;
            }
            entry.write_group(out)?;
        }
        Ok(())
    }

    /// Serialize to the single-line record form
    pub fn to_record(&self) -> String {
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&entry.doc_id.to_string());
            for offset in &entry.offsets {
                out.push(' ');
                out.push_str(&offset.to_string());
            }
        }
        out
    }

    /// Parse a record produced by [`PostingsList::to_record`].
    ///
    /// Malformed input is rejected with `CorruptRecord`: empty groups, groups
    /// without offsets, non-numeric tokens, and docIDs or offsets that do not
    /// strictly increase.
    pub fn from_record(record: &str) -> Result<Self> {
        let record = record.trim_end_matches(['\n', '\r']);
        if record.is_empty() {
            return Err(IndexError::corrupt("postings record", "empty record"));
        }

        let mut list = PostingsList::new();
        for group in record.split(',') {
            let entry = parse_group(group, list.last_doc_id(), "postings record")?;
            list.entries.push(entry);
        }

        Ok(list)
    }
}

impl FromIterator<PostingsEntry> for PostingsList {
    fn from_iter<I: IntoIterator<Item = PostingsEntry>>(iter: I) -> Self {
        let mut list = PostingsList::new();
        for entry in iter {
            list.push(entry);
        }
        list
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a PostingsEntry;
    type IntoIter = std::slice::Iter<'a, PostingsEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl IntoIterator for PostingsList {
    type Item = PostingsEntry;
    type IntoIter = std::vec::IntoIter<PostingsEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Parse one `docID o1 o2 ...` group.
///
/// The docID must exceed `previous` and the offsets must be present and
/// strictly increasing.
pub(crate) fn parse_group(
    group: &str,
    previous: Option<DocId>,
    context: &str,
) -> Result<PostingsEntry> {
    let mut tokens = group.split_whitespace();
    let doc_id = match tokens.next() {
        Some(tok) => DocId(parse_number(tok, "docID")?),
        None => return Err(IndexError::corrupt(context, "empty document group")),
    };

    if let Some(last) = previous {
        if doc_id <= last {
            return Err(IndexError::corrupt(
                context,
                format!("docID {} does not follow {}", doc_id, last),
            ));
        }
    }

    let mut offsets = Vec::new();
    for tok in tokens {
        let offset = parse_number(tok, "offset")?;
        if offsets.last().map(|&prev| offset <= prev).unwrap_or(false) {
            return Err(IndexError::corrupt(
                context,
                format!("offsets of docID {} are not increasing", doc_id),
            ));
        }
        offsets.push(offset);
    }
    if offsets.is_empty() {
        return Err(IndexError::corrupt(
            context,
            format!("docID {} has no offsets", doc_id),
        ));
    }

    Ok(PostingsEntry::with_offsets(doc_id, offsets))
}

pub(crate) fn parse_number(token: &str, what: &str) -> Result<u32> {
    token
        .parse::<u32>()
        .map_err(|_| IndexError::corrupt("postings record", format!("non-numeric {} '{}'", what, token)))
}

//! Term directory using FST (Finite State Transducer)
//!
//! Maps every indexed term to the byte offset of its record in the final
//! index file. Persisted as plain `term byteOffset` lines, rebuilt into an
//! FST on load.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use fst::{Map, MapBuilder, Streamer};

use crate::error::{IndexError, Result};

/// Immutable term -> byte offset directory
pub struct TermDirectory {
    fst: Map<Vec<u8>>,
}

impl TermDirectory {
    /// Look up the byte offset of a term's record
    pub fn get(&self, term: &str) -> Option<u64> {
        self.fst.get(term.as_bytes())
    }

    pub fn contains(&self, term: &str) -> bool {
        self.fst.contains_key(term.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.fst.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fst.is_empty()
    }

    /// All `(term, offset)` pairs in ascending term order
    pub fn iter_terms(&self) -> Vec<(String, u64)> {
        let mut results = Vec::with_capacity(self.len());
        let mut stream = self.fst.stream();
        while let Some((key, offset)) = stream.next() {
            if let Ok(term) = std::str::from_utf8(key) {
                results.push((term.to_string(), offset));
            }
        }
        results
    }

    /// Persist as `term offset` lines.
    ///
    /// Written to a temporary file then renamed, so the directory file only
    /// appears once it is complete.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            let mut stream = self.fst.stream();
            while let Some((key, offset)) = stream.next() {
                out.write_all(key)?;
                writeln!(out, " {}", offset)?;
            }
            out.flush()?;
            out.into_inner()
                .map_err(|e| IndexError::Io(e.into_error()))?
                .sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a persisted directory
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let context = path.display().to_string();
        let mut builder = TermDirectoryBuilder::new();

        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let (term, offset) = line
                .rsplit_once(' ')
                .ok_or_else(|| IndexError::corrupt(&context, format!("malformed line '{}'", line)))?;
            let offset = offset
                .parse::<u64>()
                .map_err(|_| IndexError::corrupt(&context, format!("bad offset in '{}'", line)))?;
            builder.add(term.to_string(), offset);
        }

        builder.build()
    }
}

/// Builder for term directories
#[derive(Default)]
pub struct TermDirectoryBuilder {
    terms: Vec<(String, u64)>,
}

impl TermDirectoryBuilder {
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    pub fn add(&mut self, term: String, offset: u64) {
        self.terms.push((term, offset));
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Build the directory. Duplicate terms are a corrupt directory.
    pub fn build(mut self) -> Result<TermDirectory> {
        // FST requires sorted input
        self.terms.sort_by(|a, b| a.0.cmp(&b.0));

        let mut builder = MapBuilder::memory();
        for (term, offset) in &self.terms {
            builder
                .insert(term.as_bytes(), *offset)
                .map_err(|e| IndexError::corrupt("term directory", e.to_string()))?;
        }
        let data = builder
            .into_inner()
            .map_err(|e| IndexError::corrupt("term directory", e.to_string()))?;
        let fst = Map::new(data).map_err(|e| IndexError::corrupt("term directory", e.to_string()))?;

        Ok(TermDirectory { fst })
    }
}

//! Document content extraction
//!
//! Decides how a file is turned into text before tokenization.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

const PDF_MAGIC: &[u8] = b"%PDF";

/// Turns a file into indexable text
pub trait ContentExtractor: Send + Sync {
    /// Extract text from `path`; `Ok(None)` means the file is not indexable
    fn extract(&self, path: &Path) -> Result<Option<String>>;
}

/// Reads files as UTF-8 text, declining PDF content
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn looks_like_pdf(bytes: &[u8]) -> bool {
        bytes.starts_with(PDF_MAGIC)
    }
}

impl ContentExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> Result<Option<String>> {
        let bytes = fs::read(path)?;
        if Self::looks_like_pdf(&bytes) {
            warn!("skipping PDF document without a PDF extractor: {}", path.display());
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

//! Legacy Word (.doc) text extraction
//!
//! Word 97-2003 files are OLE compound documents; litchi reads the piece
//! table and hands back the main-document text. Word's paragraph and cell
//! marks are mapped to plain newlines and tabs before watermark removal.

use std::panic;
use std::path::Path;

use litchi::ole::doc::Package;
use tracing::debug;

use super::FormatExtractor;
use crate::error::ExtractionError;

/// Reads main-document text from Word 97-2003 files and strips watermark lines
#[derive(Debug, Clone, Default)]
pub struct DocExtractor {
    watermarks: Vec<String>,
}

impl DocExtractor {
    pub fn new(watermarks: Vec<String>) -> Self {
        Self { watermarks }
    }

    /// Remove every configured watermark string from `text`
    pub fn strip_watermarks(&self, text: &str) -> String {
        self.watermarks
            .iter()
            .filter(|w| !w.is_empty())
            .fold(text.to_string(), |acc, w| acc.replace(w.as_str(), ""))
    }
}

impl FormatExtractor for DocExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        if !path.is_file() {
            return Err(ExtractionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }

        let raw = panic::catch_unwind(|| read_main_text(path)).map_err(|_| {
            ExtractionError::Malformed("DOC decoder panicked".to_string())
        })??;

        debug!("Read {} chars from {}", raw.len(), path.display());
        Ok(self.strip_watermarks(&clean_control_chars(&raw)))
    }
}

fn read_main_text(path: &Path) -> Result<String, ExtractionError> {
    let mut package = Package::open(path).map_err(|e| {
        ExtractionError::Open(format!("Failed to parse as OLE compound document: {}", e))
    })?;
    let document = package
        .document()
        .map_err(|e| ExtractionError::Malformed(format!("Failed to read Word document: {}", e)))?;
    if document.fib().is_encrypted() {
        return Err(ExtractionError::Encrypted);
    }
    document
        .text()
        .map_err(|e| ExtractionError::Malformed(format!("Failed to read document text: {}", e)))
}

/// Map Word's in-text marks to plain text and drop the remaining controls
fn clean_control_chars(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| match c {
            '\r' | '\u{0B}' | '\u{0C}' => Some('\n'),
            '\u{07}' => Some('\t'),
            '\n' | '\t' => Some(c),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

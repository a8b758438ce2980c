//! PDF text extraction

use std::panic;
use std::path::Path;

use tracing::debug;

use super::FormatExtractor;
use crate::error::ExtractionError;

/// Extracts text page by page using pdf-extract
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        let bytes = std::fs::read(path)?;

        // pdf-extract panics on some malformed inputs instead of returning an error
        let pages = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .map_err(|payload| {
                ExtractionError::Malformed(format!("PDF decoder panicked: {}", panic_message(&*payload)))
            })?
            .map_err(|e| ExtractionError::Open(format!("Failed to extract PDF text: {}", e)))?;

        debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(join_pages(pages))
    }
}

/// Concatenate page texts in page order
fn join_pages(pages: Vec<String>) -> String {
    pages.concat()
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

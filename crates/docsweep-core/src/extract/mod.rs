//! Text extraction backends
//!
//! Dispatch is by file extension only. A file whose content does not match
//! its extension is handed to that extension's extractor anyway and simply
//! fails there, which the walker turns into an empty-text record.

mod doc;
mod docx;
mod pdf;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::ExtractionError;

pub use doc::DocExtractor;
pub use docx::DocxExtractor;
pub use pdf::PdfExtractor;

/// Document kinds the pipeline knows how to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort plain text from one document format.
///
/// Implementations are called from the blocking pool and must not share
/// mutable state between calls.
pub trait FormatExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Maps each document kind to its extractor
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentKind, Arc<dyn FormatExtractor>>,
}

impl ExtractorRegistry {
    /// Registry with no extractors
    pub fn empty() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with the built-in PDF, DOC and DOCX extractors
    pub fn with_defaults(config: &PipelineConfig) -> Self {
        Self::empty()
            .with(DocumentKind::Pdf, PdfExtractor)
            .with(DocumentKind::Docx, DocxExtractor)
            .with(DocumentKind::Doc, DocExtractor::new(config.watermarks.clone()))
    }

    /// Register (or replace) the extractor for `kind`
    pub fn with(mut self, kind: DocumentKind, extractor: impl FormatExtractor + 'static) -> Self {
        self.register(kind, Arc::new(extractor));
        self
    }

    pub fn register(&mut self, kind: DocumentKind, extractor: Arc<dyn FormatExtractor>) {
        self.extractors.insert(kind, extractor);
    }

    /// Whether an extractor is registered for `kind`
    pub fn supports(&self, kind: DocumentKind) -> bool {
        self.extractors.contains_key(&kind)
    }

    /// Extract text from `path` with the extractor registered for `kind`
    pub fn extract(&self, kind: DocumentKind, path: &Path) -> Result<String, ExtractionError> {
        let extractor = self
            .extractors
            .get(&kind)
            .ok_or_else(|| ExtractionError::Unregistered(kind.to_string()))?;
        extractor.extract(path)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults(&PipelineConfig::default())
    }
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.extractors.keys().map(|k| k.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("ExtractorRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl FormatExtractor for Fixed {
        fn extract(&self, _path: &Path) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_kind_from_extension_is_case_insensitive() {
        assert_eq!(DocumentKind::from_extension("PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_extension("Docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_extension("doc"), Some(DocumentKind::Doc));
        assert_eq!(DocumentKind::from_extension("txt"), None);
    }

    #[test]
    fn test_kind_from_path() {
        assert_eq!(
            DocumentKind::from_path(Path::new("cv/Resume.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_path(Path::new("notes.txt")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn test_registry_override() {
        let registry = ExtractorRegistry::default().with(DocumentKind::Pdf, Fixed("stub"));
        assert_eq!(
            registry
                .extract(DocumentKind::Pdf, Path::new("missing.pdf"))
                .unwrap(),
            "stub"
        );
        assert!(registry.supports(DocumentKind::Doc));
    }

    #[test]
    fn test_unregistered_kind() {
        let registry = ExtractorRegistry::empty().with(DocumentKind::Docx, Fixed("x"));
        assert!(!registry.supports(DocumentKind::Doc));
        let err = registry
            .extract(DocumentKind::Doc, Path::new("a.doc"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Unregistered(_)));
        assert_eq!(format!("{:?}", registry), "ExtractorRegistry { kinds: [\"docx\"] }");
    }
}

//! Error types for docsweep core

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the pipeline error
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Fatal errors that abort a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No input provided: {0}")]
    NoInput(String),

    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("Archive entry '{entry}' resolves outside the working directory ({resolved})")]
    PathTraversal { entry: String, resolved: PathBuf },

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build result table: {0}")]
    Table(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Boundary classification of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NoInput(_) => FailureKind::NoInput,
            Self::CorruptArchive(_) => FailureKind::CorruptArchive,
            Self::PathTraversal { .. } => FailureKind::PathTraversal,
            Self::Storage { .. } => FailureKind::Storage,
            Self::TimedOut(_) => FailureKind::TimedOut,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Table(_) | Self::Config(_) | Self::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Failure categories surfaced to the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NoInput,
    CorruptArchive,
    PathTraversal,
    Storage,
    TimedOut,
    Cancelled,
    Internal,
}

impl FailureKind {
    /// HTTP-style status the transport should answer with
    pub fn client_status(self) -> u16 {
        match self {
            Self::NoInput => 400,
            Self::CorruptArchive | Self::PathTraversal => 422,
            Self::Storage | Self::Internal => 500,
            Self::TimedOut => 504,
            Self::Cancelled => 499,
        }
    }

    /// Single user-facing message for this failure
    pub fn user_message(self) -> &'static str {
        match self {
            Self::NoInput => "No file selected for uploading.",
            Self::CorruptArchive => "The uploaded file is not a readable zip archive.",
            Self::PathTraversal => "The archive contains entries that point outside the extraction folder.",
            Self::Storage => "The server could not store the uploaded files.",
            Self::TimedOut => "Processing the archive took too long.",
            Self::Cancelled => "Processing was cancelled.",
            Self::Internal => "The spreadsheet could not be produced.",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoInput => "no input provided",
            Self::CorruptArchive => "corrupt archive",
            Self::PathTraversal => "path traversal rejected",
            Self::Storage => "storage failure",
            Self::TimedOut => "timed out",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// Per-file extraction failures; never fatal to a run
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document is encrypted")]
    Encrypted,

    #[error("No extractor registered for {0}")]
    Unregistered(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(PipelineError::NoInput("x".into()).kind(), FailureKind::NoInput);
        assert_eq!(
            PipelineError::PathTraversal {
                entry: "../evil.txt".into(),
                resolved: PathBuf::from("/evil.txt"),
            }
            .kind(),
            FailureKind::PathTraversal
        );
        assert_eq!(PipelineError::Table("x".into()).kind(), FailureKind::Internal);
    }

    #[test]
    fn test_client_status() {
        assert_eq!(FailureKind::NoInput.client_status(), 400);
        assert_eq!(FailureKind::CorruptArchive.client_status(), 422);
        assert_eq!(FailureKind::Storage.client_status(), 500);
    }

    #[test]
    fn test_storage_error_message() {
        let err = PipelineError::storage(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x"));
        assert_eq!(err.kind(), FailureKind::Storage);
    }
}

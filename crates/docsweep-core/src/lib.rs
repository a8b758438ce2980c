//! Docsweep Core - Turn a zip of office documents into a contact spreadsheet
//!
//! This crate provides every stage of the pipeline:
//! - Safe archive expansion with traversal and size checks
//! - Post-order traversal that extracts and deletes as it goes
//! - PDF, DOC and DOCX text extraction behind a pluggable registry
//! - Email and phone mining
//! - xlsx output

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod miner;
pub mod paths;
pub mod pipeline;
pub mod table;
pub mod walker;
pub mod workspace;

pub use archive::{ArchiveExpander, ExpansionReport};
pub use config::{ArchiveLimits, ConfigManager, PipelineConfig, SPIRE_EVALUATION_WARNING};
pub use error::{ExtractionError, FailureKind, PipelineError, Result};
pub use extract::{DocumentKind, ExtractorRegistry, FormatExtractor};
pub use miner::{Identifiers, mine};
pub use pipeline::{ArchiveUpload, OutputDocument, Pipeline, RunOutcome};
pub use table::{ExtractionRecord, ResultTable};
pub use walker::{TreeWalker, WalkReport};
pub use workspace::WorkingDir;

// Re-exported so callers can cancel runs without a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;

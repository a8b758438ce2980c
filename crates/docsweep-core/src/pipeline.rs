//! End-to-end run: archive bytes in, spreadsheet bytes out
//!
//! A run owns its working directory through a [`WorkingDir`] guard, so the
//! directory is gone after the run returns no matter how it ended.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::archive::{ArchiveExpander, ExpansionReport};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extract::ExtractorRegistry;
use crate::table::{ExtractionRecord, OUTPUT_FILE_NAME, ResultTable, XLSX_MIME_TYPE};
use crate::walker::{TreeWalker, WalkReport};
use crate::workspace::WorkingDir;

/// An archive as handed over by the transport
#[derive(Debug, Clone)]
pub struct ArchiveUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read an upload from disk, keeping only the file name
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::storage(path, e))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { file_name, bytes })
    }
}

/// The produced spreadsheet
#[derive(Debug, Clone)]
pub struct OutputDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl OutputDocument {
    fn xlsx(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: OUTPUT_FILE_NAME.to_string(),
            mime_type: XLSX_MIME_TYPE.to_string(),
        }
    }
}

/// Everything a successful run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub document: OutputDocument,
    pub records: Vec<ExtractionRecord>,
    pub walk: WalkReport,
    pub expansion: ExpansionReport,
}

/// Expand, walk, tabulate and clean up
pub struct Pipeline {
    config: PipelineConfig,
    registry: ExtractorRegistry,
    expansion_timeout: Duration,
}

impl Pipeline {
    /// Pipeline with the built-in extractors
    pub fn new(config: PipelineConfig) -> Self {
        let registry = ExtractorRegistry::with_defaults(&config);
        Self::with_registry(config, registry)
    }

    /// Pipeline with a caller-supplied extractor registry
    pub fn with_registry(config: PipelineConfig, registry: ExtractorRegistry) -> Self {
        let expansion_timeout = config.expansion_timeout();
        Self {
            config,
            registry,
            expansion_timeout,
        }
    }

    /// Override the expansion limit with a finer grain than whole seconds
    pub fn with_expansion_timeout(mut self, limit: Duration) -> Self {
        self.expansion_timeout = limit;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run in a fresh `run-<uuid>` directory under `scratch_parent`
    pub async fn run_in(
        &self,
        upload: ArchiveUpload,
        scratch_parent: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        self.run(upload, WorkingDir::unique_in(scratch_parent), cancel)
            .await
    }

    /// Process one upload inside `work_dir`.
    ///
    /// Anything already at `work_dir` is removed first, and the directory
    /// is removed again before this returns.
    pub async fn run(
        &self,
        upload: ArchiveUpload,
        work_dir: WorkingDir,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        if upload.file_name.trim().is_empty() {
            return Err(PipelineError::NoInput("upload has no file name".to_string()));
        }
        if upload.bytes.is_empty() {
            return Err(PipelineError::NoInput(format!(
                "'{}' is empty",
                upload.file_name
            )));
        }

        info!(
            "Processing {} ({} bytes) in {}",
            upload.file_name,
            upload.bytes.len(),
            work_dir.path().display()
        );

        let result = self.process(upload, &work_dir, cancel).await;
        let cleanup = work_dir.remove();

        match (result, cleanup) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!("Cleanup after failed run also failed: {}", cleanup_err);
                }
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        upload: ArchiveUpload,
        work_dir: &WorkingDir,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        work_dir.clear()?;

        let expansion = self.expand(upload.bytes, work_dir.path(), cancel).await?;

        let walker = TreeWalker::new(self.registry.clone(), &self.config);
        let (records, walk) = walker.walk(work_dir.path(), cancel).await?;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let table = ResultTable::build(records.clone());
        let bytes = tokio::task::spawn_blocking(move || table.serialize())
            .await
            .map_err(|e| PipelineError::Internal(format!("Table task failed: {}", e)))??;

        info!("Produced {} with {} rows", OUTPUT_FILE_NAME, records.len());

        Ok(RunOutcome {
            document: OutputDocument::xlsx(bytes),
            records,
            walk,
            expansion,
        })
    }

    /// Expand on the blocking pool, bounded by the expansion timeout
    async fn expand(
        &self,
        bytes: Vec<u8>,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExpansionReport> {
        let expander = ArchiveExpander::new(self.config.limits.clone());
        let root = root.to_path_buf();
        let token = cancel.child_token();
        let worker_token = token.clone();

        let mut task = tokio::task::spawn_blocking(move || {
            expander.expand_cancellable(&bytes, &root, &worker_token)
        });

        match tokio::time::timeout(self.expansion_timeout, &mut task).await {
            Ok(joined) => joined
                .map_err(|e| PipelineError::Internal(format!("Expansion task failed: {}", e)))?,
            Err(_) => {
                // Wait for the writer to stop so cleanup does not race it
                token.cancel();
                let _ = task.await;
                warn!("Expansion did not finish within {:?}", self.expansion_timeout);
                Err(PipelineError::TimedOut(self.expansion_timeout.as_secs()))
            }
        }
    }
}

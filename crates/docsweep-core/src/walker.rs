//! Post-order traversal of the expanded archive
//!
//! The walker visits every node under the root with an explicit stack. Each
//! directory's documents are extracted concurrently on the blocking pool,
//! every visited file is deleted once handled, and a directory is removed
//! only after everything beneath it has settled.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::extract::{DocumentKind, ExtractorRegistry};
use crate::miner::mine;
use crate::paths::path_to_display;
use crate::table::ExtractionRecord;

/// Counters collected during one walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalkReport {
    pub files_visited: usize,
    pub records: usize,
    pub unsupported: usize,
    pub extraction_failures: usize,
    pub timeouts: usize,
    pub directories_removed: usize,
}

enum Frame {
    Enter { dir: PathBuf },
    Leave { dir: PathBuf },
}

/// A recognised file waiting for extraction
struct Document {
    path: PathBuf,
    file_name: String,
    kind: DocumentKind,
}

#[derive(Default)]
struct Listing {
    documents: Vec<Document>,
    subdirs: Vec<PathBuf>,
}

enum Extracted {
    Text(String),
    Failed(String),
    TimedOut,
}

/// Walks a directory tree turning recognised documents into records
pub struct TreeWalker {
    registry: Arc<ExtractorRegistry>,
    delete_after_process: bool,
    max_concurrency: usize,
    extraction_timeout: Duration,
}

impl TreeWalker {
    pub fn new(registry: ExtractorRegistry, config: &PipelineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            delete_after_process: config.delete_after_process,
            max_concurrency: config.max_concurrency.max(1),
            extraction_timeout: config.extraction_timeout(),
        }
    }

    /// Process every file under `root`, deleting as it goes.
    ///
    /// `root` itself is left in place. Per-file extraction problems become
    /// empty-text records; only filesystem failures and cancellation end
    /// the walk early.
    pub async fn walk(
        &self,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<(Vec<ExtractionRecord>, WalkReport)> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut records = Vec::new();
        let mut report = WalkReport::default();
        let mut stack = vec![Frame::Enter {
            dir: root.to_path_buf(),
        }];

        while let Some(frame) = stack.pop() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            match frame {
                Frame::Enter { dir } => {
                    let listing = self.list(&dir, &mut report).await?;

                    // Pushed first so it pops after every child frame
                    if dir != root {
                        stack.push(Frame::Leave { dir });
                    }
                    stack.extend(listing.subdirs.into_iter().map(|dir| Frame::Enter { dir }));

                    let batch = self
                        .process_documents(listing.documents, &semaphore, cancel, &mut report)
                        .await?;
                    records.extend(batch);
                }
                Frame::Leave { dir } => self.remove_dir(&dir, &mut report).await?,
            }
        }

        info!(
            "Walk finished: {} records from {} files ({} unsupported, {} failed, {} timed out)",
            report.records,
            report.files_visited,
            report.unsupported,
            report.extraction_failures,
            report.timeouts
        );

        Ok((records, report))
    }

    /// Read one directory, discarding unsupported files
    async fn list(&self, dir: &Path, report: &mut WalkReport) -> Result<Listing> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| PipelineError::storage(dir, e))?;

        let mut listing = Listing::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PipelineError::storage(dir, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| PipelineError::storage(&path, e))?;

            if file_type.is_dir() {
                listing.subdirs.push(path);
                continue;
            }

            report.files_visited += 1;
            let recognised = if file_type.is_file() {
                DocumentKind::from_path(&path)
                    .filter(|kind| self.registry.supports(*kind))
            } else {
                None
            };

            match recognised {
                Some(kind) => listing.documents.push(Document {
                    file_name: entry.file_name().to_string_lossy().into_owned(),
                    path,
                    kind,
                }),
                None => {
                    info!("Skipping unsupported file {}", path_to_display(&path));
                    self.delete_file(&path).await?;
                    report.unsupported += 1;
                }
            }
        }

        // Stable batch order regardless of directory listing order
        listing.documents.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listing)
    }

    /// Extract one directory's documents concurrently and turn them into records
    async fn process_documents(
        &self,
        documents: Vec<Document>,
        semaphore: &Arc<Semaphore>,
        cancel: &CancellationToken,
        report: &mut WalkReport,
    ) -> Result<Vec<ExtractionRecord>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut slots: Vec<Option<ExtractionRecord>> = vec![None; documents.len()];
        let mut tasks = JoinSet::new();
        for (idx, doc) in documents.into_iter().enumerate() {
            let semaphore = Arc::clone(semaphore);
            let registry = Arc::clone(&self.registry);
            let limit = self.extraction_timeout;
            tasks.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        extract_with_timeout(registry, doc.kind, doc.path.clone(), limit, permit).await
                    }
                    Err(e) => Extracted::Failed(e.to_string()),
                };
                (idx, doc, outcome)
            });
        }

        loop {
            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    return Err(PipelineError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };
            let (idx, doc, outcome) = joined
                .map_err(|e| PipelineError::Internal(format!("Extraction task failed: {}", e)))?;

            let shown = path_to_display(&doc.path);
            let text = match outcome {
                Extracted::Text(text) => {
                    debug!("Extracted {} chars from {} ({})", text.len(), shown, doc.kind);
                    text
                }
                Extracted::Failed(reason) => {
                    warn!("Failed to extract {}: {}", shown, reason);
                    report.extraction_failures += 1;
                    String::new()
                }
                Extracted::TimedOut => {
                    warn!(
                        "Extraction of {} timed out after {}s",
                        shown,
                        self.extraction_timeout.as_secs()
                    );
                    report.timeouts += 1;
                    String::new()
                }
            };

            let ids = mine(&text);
            self.delete_file(&doc.path).await?;
            slots[idx] = Some(ExtractionRecord {
                file_name: doc.file_name,
                email: ids.email,
                contact: ids.contact,
                text,
            });
            report.records += 1;
        }

        Ok(slots.into_iter().flatten().collect())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        if !self.delete_after_process {
            return Ok(());
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::storage(path, e)),
        }
    }

    async fn remove_dir(&self, dir: &Path, report: &mut WalkReport) -> Result<()> {
        if !self.delete_after_process {
            return Ok(());
        }
        tokio::fs::remove_dir(dir)
            .await
            .map_err(|e| PipelineError::storage(dir, e))?;
        debug!("Removed directory {}", path_to_display(dir));
        report.directories_removed += 1;
        Ok(())
    }
}

/// Run the extractor for `kind` on the blocking pool, bounded by `limit`.
///
/// A timed-out extractor keeps its blocking thread until it returns; its
/// result is dropped. The concurrency permit travels with the thread, so a
/// slot frees up only when the decoder actually finishes.
async fn extract_with_timeout(
    registry: Arc<ExtractorRegistry>,
    kind: DocumentKind,
    path: PathBuf,
    limit: Duration,
    permit: OwnedSemaphorePermit,
) -> Extracted {
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        registry.extract(kind, &path)
    });
    match tokio::time::timeout(limit, task).await {
        Err(_) => Extracted::TimedOut,
        Ok(Err(join)) if join.is_panic() => Extracted::Failed("extractor panicked".to_string()),
        Ok(Err(join)) => Extracted::Failed(join.to_string()),
        Ok(Ok(Err(e))) => Extracted::Failed(e.to_string()),
        Ok(Ok(Ok(text))) => Extracted::Text(text),
    }
}

//! Archive expansion
//!
//! Materializes an uploaded zip into a dedicated working directory. Every
//! entry name is checked before anything is written, so a single hostile
//! entry rejects the whole archive and leaves the disk untouched.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::config::ArchiveLimits;
use crate::error::{PipelineError, Result};
use crate::paths::resolve_within;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Summary of a completed expansion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionReport {
    pub files_written: usize,
    pub directories_created: usize,
    pub bytes_written: u64,
}

/// An entry that passed validation and will be written
#[derive(Debug)]
struct PlannedEntry {
    index: usize,
    name: String,
    target: PathBuf,
    is_dir: bool,
}

/// Expands zip archives with zip-slip and size checks
#[derive(Debug, Clone, Default)]
pub struct ArchiveExpander {
    limits: ArchiveLimits,
}

impl ArchiveExpander {
    pub fn new(limits: ArchiveLimits) -> Self {
        Self { limits }
    }

    /// Expand `archive_bytes` under `dest_root`.
    ///
    /// # Errors
    ///
    /// - `CorruptArchive` if the bytes are not a zip, an entry is encrypted,
    ///   or a size limit is exceeded
    /// - `PathTraversal` if any entry resolves outside `dest_root`
    /// - `Storage` if the destination cannot be written
    pub fn expand(&self, archive_bytes: &[u8], dest_root: &Path) -> Result<ExpansionReport> {
        self.expand_cancellable(archive_bytes, dest_root, &CancellationToken::new())
    }

    /// Like [`expand`](Self::expand), stopping with `Cancelled` between
    /// entries (or buffer copies) once `cancel` fires.
    pub fn expand_cancellable(
        &self,
        archive_bytes: &[u8],
        dest_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ExpansionReport> {
        let root = std::path::absolute(dest_root)
            .map_err(|e| PipelineError::storage(dest_root, e))?;

        let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
            .map_err(|e| PipelineError::CorruptArchive(format!("Not a valid zip file: {}", e)))?;

        let plan = self.plan(&mut archive, &root)?;
        debug!("Validated {} archive entries for {}", plan.len(), root.display());

        fs::create_dir_all(&root).map_err(|e| PipelineError::storage(&root, e))?;

        let mut report = ExpansionReport::default();
        for entry in &plan {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if entry.is_dir {
                fs::create_dir_all(&entry.target)
                    .map_err(|e| PipelineError::storage(&entry.target, e))?;
                report.directories_created += 1;
                continue;
            }

            if let Some(parent) = entry.target.parent() {
                fs::create_dir_all(parent).map_err(|e| PipelineError::storage(parent, e))?;
            }

            let mut file = archive.by_index(entry.index).map_err(corrupt)?;
            let written = self.copy_entry(&mut file, entry, report.bytes_written, cancel)?;
            report.bytes_written += written;
            report.files_written += 1;

            debug!("Extracted: {} ({} bytes)", entry.target.display(), written);
        }

        info!(
            "Expanded {} files and {} directories ({} bytes) into {}",
            report.files_written,
            report.directories_created,
            report.bytes_written,
            root.display()
        );

        Ok(report)
    }

    /// Validate every entry name and declared size before touching the disk
    fn plan<R: Read + std::io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        root: &Path,
    ) -> Result<Vec<PlannedEntry>> {
        if archive.len() > self.limits.max_entries {
            return Err(PipelineError::CorruptArchive(format!(
                "Archive has {} entries (max {})",
                archive.len(),
                self.limits.max_entries
            )));
        }

        let mut plan = Vec::with_capacity(archive.len());
        let mut declared_total: u64 = 0;

        for index in 0..archive.len() {
            let entry = archive.by_index_raw(index).map_err(corrupt)?;
            let name = entry.name().to_string();

            let target = resolve_within(root, &name).map_err(|resolved| {
                PipelineError::PathTraversal {
                    entry: name.clone(),
                    resolved,
                }
            })?;

            if entry.encrypted() {
                return Err(PipelineError::CorruptArchive(format!(
                    "Entry '{}' is password-protected",
                    name
                )));
            }

            let size = entry.size();
            if size > self.limits.max_entry_bytes {
                return Err(PipelineError::CorruptArchive(format!(
                    "Entry '{}' is too large ({} bytes, max {})",
                    name, size, self.limits.max_entry_bytes
                )));
            }
            declared_total = declared_total.saturating_add(size);
            if declared_total > self.limits.max_total_bytes {
                return Err(PipelineError::CorruptArchive(format!(
                    "Archive expands beyond {} bytes",
                    self.limits.max_total_bytes
                )));
            }

            // "./" and similar entries name the root itself
            if target == root {
                continue;
            }

            plan.push(PlannedEntry {
                index,
                is_dir: entry.is_dir(),
                name,
                target,
            });
        }

        Ok(plan)
    }

    /// Stream one entry to disk, enforcing limits on the actual byte count
    fn copy_entry<R: Read>(
        &self,
        reader: &mut R,
        entry: &PlannedEntry,
        written_before: u64,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let mut out =
            fs::File::create(&entry.target).map_err(|e| PipelineError::storage(&entry.target, e))?;

        let mut buf = vec![0u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let n = reader.read(&mut buf).map_err(|e| {
                PipelineError::CorruptArchive(format!("Cannot read entry '{}': {}", entry.name, e))
            })?;
            if n == 0 {
                break;
            }

            written += n as u64;
            if written > self.limits.max_entry_bytes
                || written_before + written > self.limits.max_total_bytes
            {
                return Err(PipelineError::CorruptArchive(format!(
                    "Entry '{}' inflates beyond its size limit",
                    entry.name
                )));
            }

            out.write_all(&buf[..n])
                .map_err(|e| PipelineError::storage(&entry.target, e))?;
        }

        out.flush().map_err(|e| PipelineError::storage(&entry.target, e))?;
        Ok(written)
    }
}

fn corrupt(err: ZipError) -> PipelineError {
    match err {
        ZipError::UnsupportedArchive(msg) => {
            PipelineError::CorruptArchive(format!("Unsupported archive feature: {}", msg))
        }
        other => PipelineError::CorruptArchive(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            let options = SimpleFileOptions::default();
            for (name, contents) in entries {
                if name.ends_with('/') {
                    zip.add_directory(*name, options).unwrap();
                } else {
                    zip.start_file(*name, options).unwrap();
                    zip.write_all(contents).unwrap();
                }
            }
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn test_expand_nested_entries() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("work");
        let bytes = build_zip(&[
            ("resume.pdf", b"%PDF-1.4"),
            ("letters/", b""),
            ("letters/2024/cover.docx", b"PK"),
        ]);

        let report = ArchiveExpander::default().expand(&bytes, &root).unwrap();

        assert_eq!(report.files_written, 2);
        assert_eq!(report.directories_created, 1);
        assert_eq!(report.bytes_written, 10);
        assert_eq!(fs::read(root.join("resume.pdf")).unwrap(), b"%PDF-1.4");
        assert!(root.join("letters/2024/cover.docx").is_file());
    }

    #[test]
    fn test_traversal_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a/b/work");
        let bytes = build_zip(&[("ok.txt", b"fine"), ("../../evil.txt", b"owned")]);

        let err = ArchiveExpander::default().expand(&bytes, &root).unwrap_err();

        assert!(matches!(err, PipelineError::PathTraversal { ref entry, .. } if entry == "../../evil.txt"));
        assert!(!dir.path().join("a/evil.txt").exists());
        assert!(!root.exists());
    }

    #[test]
    fn test_entry_size_limit() {
        let dir = TempDir::new().unwrap();
        let limits = ArchiveLimits {
            max_entry_bytes: 4,
            ..Default::default()
        };
        let bytes = build_zip(&[("big.doc", b"0123456789")]);

        let err = ArchiveExpander::new(limits)
            .expand(&bytes, dir.path())
            .unwrap_err();

        assert!(matches!(err, PipelineError::CorruptArchive(_)));
    }

    #[test]
    fn test_entry_count_limit() {
        let dir = TempDir::new().unwrap();
        let limits = ArchiveLimits {
            max_entries: 1,
            ..Default::default()
        };
        let bytes = build_zip(&[("a.pdf", b"a"), ("b.pdf", b"b")]);

        let err = ArchiveExpander::new(limits)
            .expand(&bytes, dir.path())
            .unwrap_err();

        assert!(matches!(err, PipelineError::CorruptArchive(_)));
    }

    #[test]
    fn test_cancelled_expansion_stops() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("work");
        let bytes = build_zip(&[("a.pdf", b"a")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ArchiveExpander::default()
            .expand_cancellable(&bytes, &root, &cancel)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(!root.join("a.pdf").exists());
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("work");

        let err = ArchiveExpander::default()
            .expand(b"definitely not a zip", &root)
            .unwrap_err();

        assert!(matches!(err, PipelineError::CorruptArchive(_)));
        assert!(!root.exists());
    }
}

//! Per-file batch runner.
//!
//! A batch of one file runs in single-file mode: the first error is returned
//! to the caller. Larger batches log the error, record a [`FileFailure`] and
//! move on to the next file.

use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// A file that could not be processed in batch mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of running one operation over a list of files.
#[derive(Debug, Clone, Default)]
pub struct BatchReport<S> {
    /// Files handed to the operation.
    pub files_seen: usize,
    /// Files the operation completed on.
    pub files_processed: usize,
    /// Files actually written (zero in dry-run mode).
    pub files_written: usize,
    /// Operation-specific totals.
    pub summary: S,
    pub failures: Vec<FileFailure>,
}

impl<S> BatchReport<S> {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// What the per-file closure did with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Unchanged,
    Written,
}

impl FileOutcome {
    pub(crate) fn from_written(written: Option<PathBuf>) -> Self {
        if written.is_some() {
            FileOutcome::Written
        } else {
            FileOutcome::Unchanged
        }
    }
}

/// Run `per_file` over `files`, folding results into `summary`.
pub(crate) fn run_batch<S, F>(
    files: &[PathBuf],
    summary: S,
    mut per_file: F,
) -> Result<BatchReport<S>, StoreError>
where
    F: FnMut(&Path, &mut S) -> Result<FileOutcome, StoreError>,
{
    let single_file = files.len() == 1;
    let mut report = BatchReport {
        files_seen: files.len(),
        files_processed: 0,
        files_written: 0,
        summary,
        failures: Vec::new(),
    };

    for path in files {
        match per_file(path, &mut report.summary) {
            Ok(outcome) => {
                report.files_processed += 1;
                if outcome == FileOutcome::Written {
                    report.files_written += 1;
                }
            }
            Err(e) if single_file => return Err(e),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping file");
                report.failures.push(FileFailure {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

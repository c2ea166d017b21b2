//! Batch quality operations: the diagnostic report and the flag lifecycle.

use std::path::{Path, PathBuf};

use annocurate_core::lifecycle::{self, FlagSummary, FlaggedEntry, ReannotateSummary};
use annocurate_core::report::QualityReport;
use annocurate_core::{Annotator, ClassifierConfig, PromptCatalog, PromptKey, QualityFlag};
use indexmap::IndexMap;

use crate::batch::{run_batch, BatchReport, FileOutcome};
use crate::error::StoreError;
use crate::files::{read_record, resolve_image_path, Persistence};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Build the diagnostic report. Never fails: unreadable files become
/// `file_error` rows, documents without `annotations` are logged and
/// contribute nothing.
pub fn check(files: &[PathBuf], config: &ClassifierConfig) -> QualityReport {
    let mut report = QualityReport::new(files.len());

    for path in files {
        let name = file_name(path);
        match read_record(path) {
            Ok(record) => report.check_record(&name, &file_stem(path), &record, config),
            Err(StoreError::MissingAnnotations(_)) => {
                tracing::warn!(path = %path.display(), "No annotations in file; skipping");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Error processing file");
                report.record_file_error(&name, &file_stem(path), &e.to_string());
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Flagging
// ---------------------------------------------------------------------------

/// Recompute and persist quality flags. A file is written only when its
/// flags changed.
pub fn flag(
    files: &[PathBuf],
    config: &ClassifierConfig,
    persistence: &Persistence,
) -> Result<BatchReport<FlagSummary>, StoreError> {
    run_batch(files, FlagSummary::default(), |path, totals| {
        let mut record = read_record(path)?;
        let summary = lifecycle::apply_quality_flags(&mut record, config);
        let written = if summary.changed {
            persistence.save(path, &record)?
        } else {
            None
        };
        if summary.flagged_prompts > 0 {
            tracing::info!(
                path = %path.display(),
                flagged = summary.flagged_prompts,
                "Flagged prompts",
            );
        }
        totals.merge(&summary);
        Ok(FileOutcome::from_written(written))
    })
}

/// A flagged entry together with the file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFlaggedEntry {
    pub path: PathBuf,
    pub entry: FlaggedEntry,
}

/// Every flagged prompt result across `files`. Read-only.
pub fn list_flagged(files: &[PathBuf]) -> Result<BatchReport<Vec<FileFlaggedEntry>>, StoreError> {
    run_batch(files, Vec::new(), |path, found| {
        let record = read_record(path)?;
        found.extend(
            lifecycle::flagged_entries(&record)
                .into_iter()
                .map(|entry| FileFlaggedEntry {
                    path: path.to_path_buf(),
                    entry,
                }),
        );
        Ok(FileOutcome::Unchanged)
    })
}

/// Totals for [`remove_flagged`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlaggedRemoval {
    pub files_modified: usize,
    pub prompts_removed: usize,
}

/// Strip flagged prompt entries, optionally only those carrying one of
/// `only`. Files with nothing to remove are left alone.
pub fn remove_flagged(
    files: &[PathBuf],
    only: Option<&[QualityFlag]>,
    persistence: &Persistence,
) -> Result<BatchReport<FlaggedRemoval>, StoreError> {
    run_batch(files, FlaggedRemoval::default(), |path, totals| {
        let mut record = read_record(path)?;
        let removed = lifecycle::remove_flagged(&mut record, only);
        if removed == 0 {
            return Ok(FileOutcome::Unchanged);
        }
        let written = persistence.save(path, &record)?;
        tracing::info!(path = %path.display(), removed, "Removed flagged prompts");
        totals.files_modified += 1;
        totals.prompts_removed += removed;
        Ok(FileOutcome::from_written(written))
    })
}

// ---------------------------------------------------------------------------
// Missing prompts and re-annotation
// ---------------------------------------------------------------------------

/// Missing prompts of one file, grouped by model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPlan {
    pub path: PathBuf,
    pub missing: IndexMap<String, Vec<PromptKey>>,
}

impl MissingPlan {
    pub fn prompt_count(&self) -> usize {
        self.missing.values().map(Vec::len).sum()
    }
}

/// Files with at least one missing prompt. Read-only.
pub fn find_missing(files: &[PathBuf]) -> Result<BatchReport<Vec<MissingPlan>>, StoreError> {
    run_batch(files, Vec::new(), |path, plans| {
        let record = read_record(path)?;
        let missing = lifecycle::missing_prompts(&record);
        if !missing.is_empty() {
            plans.push(MissingPlan {
                path: path.to_path_buf(),
                missing,
            });
        }
        Ok(FileOutcome::Unchanged)
    })
}

/// Totals for [`reannotate_missing`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReannotateOutcome {
    pub files_with_missing: usize,
    /// Prompts that were (or, in dry-run mode, would be) generated.
    pub planned: usize,
    pub prompts: ReannotateSummary,
    /// Files skipped because their image could not be found.
    pub images_missing: Vec<PathBuf>,
}

/// Generate every missing prompt, one call at a time.
///
/// Images are looked up under `image_dir`. In dry-run mode nothing is
/// generated or written; the outcome only counts the planned prompts.
pub fn reannotate_missing(
    files: &[PathBuf],
    image_dir: &Path,
    annotator: &dyn Annotator,
    catalog: &PromptCatalog,
    persistence: &Persistence,
) -> Result<BatchReport<ReannotateOutcome>, StoreError> {
    run_batch(files, ReannotateOutcome::default(), |path, totals| {
        let mut record = read_record(path)?;
        let missing = lifecycle::missing_prompts(&record);
        if missing.is_empty() {
            return Ok(FileOutcome::Unchanged);
        }
        totals.files_with_missing += 1;

        let Some(image_path) = resolve_image_path(image_dir, &record) else {
            tracing::warn!(path = %path.display(), image_dir = %image_dir.display(), "Image not found");
            totals.images_missing.push(path.to_path_buf());
            return Ok(FileOutcome::Unchanged);
        };

        let planned: usize = missing.values().map(Vec::len).sum();
        totals.planned += planned;

        if persistence.is_dry_run() {
            for (model, keys) in &missing {
                for key in keys {
                    tracing::info!(path = %path.display(), model = %model, prompt = %key, "Would re-annotate");
                }
            }
            return Ok(FileOutcome::Unchanged);
        }

        let summary = lifecycle::fill_missing_prompts(&mut record, &image_path, annotator, catalog);
        let written = if summary.reannotated > 0 {
            persistence.save(path, &record)?
        } else {
            None
        };
        totals.prompts.merge(&summary);
        Ok(FileOutcome::from_written(written))
    })
}

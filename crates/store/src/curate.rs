//! Batch curation: statistics, reordering, model removal, token filtering
//! and CSV export.

use std::path::{Path, PathBuf};

use annocurate_core::csv::ExportCsv;
use annocurate_core::curation::{self, CorpusStats, TokenFilter};

use crate::batch::{run_batch, BatchReport, FileOutcome};
use crate::error::StoreError;
use crate::files::{read_record, Persistence};

/// Count annotations per model across `files`.
pub fn stats(files: &[PathBuf]) -> Result<BatchReport<CorpusStats>, StoreError> {
    run_batch(files, CorpusStats::default(), |path, stats| {
        let record = read_record(path)?;
        stats.add(&record);
        Ok(FileOutcome::Unchanged)
    })
}

/// Reorder annotations in every file. Every processed file is written.
pub fn reorder<S: AsRef<str>>(
    files: &[PathBuf],
    model_order: &[S],
    persistence: &Persistence,
) -> Result<BatchReport<()>, StoreError> {
    run_batch(files, (), |path, _| {
        let mut record = read_record(path)?;
        curation::reorder_annotations(&mut record, model_order);
        Ok(FileOutcome::from_written(persistence.save(path, &record)?))
    })
}

/// Totals for [`remove_model`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelRemoval {
    pub files_with_removals: usize,
    pub annotations_removed: usize,
}

/// Remove one model's annotations. Files without that model are left alone.
pub fn remove_model(
    files: &[PathBuf],
    model: &str,
    persistence: &Persistence,
) -> Result<BatchReport<ModelRemoval>, StoreError> {
    run_batch(files, ModelRemoval::default(), |path, totals| {
        let mut record = read_record(path)?;
        let removed = curation::remove_model(&mut record, model);
        if removed == 0 {
            tracing::debug!(path = %path.display(), model, "Model not present");
            return Ok(FileOutcome::Unchanged);
        }
        let written = persistence.save(path, &record)?;
        totals.files_with_removals += 1;
        totals.annotations_removed += removed;
        Ok(FileOutcome::from_written(written))
    })
}

/// Drop annotations outside the token bounds. Every processed file is
/// written. The summary is the number of annotations dropped.
pub fn filter_tokens(
    files: &[PathBuf],
    filter: TokenFilter,
    persistence: &Persistence,
) -> Result<BatchReport<usize>, StoreError> {
    run_batch(files, 0usize, |path, dropped| {
        let mut record = read_record(path)?;
        let removed = curation::filter_by_tokens(&mut record, filter);
        let written = persistence.save(path, &record)?;
        *dropped += removed;
        Ok(FileOutcome::from_written(written))
    })
}

/// Export every prompt result to `output` as CSV. The summary is the number
/// of data rows. Unreadable files are skipped.
pub fn export_csv(
    files: &[PathBuf],
    output: &Path,
    include_metrics: bool,
) -> Result<BatchReport<usize>, StoreError> {
    let mut export = ExportCsv::new(include_metrics);
    let mut report = run_batch(files, 0usize, |path, _| {
        let record = read_record(path)?;
        export.add_record(&record);
        Ok(FileOutcome::Unchanged)
    })?;
    report.summary = export.rows();

    std::fs::write(output, export.finish()).map_err(|e| StoreError::io(output, e))?;
    tracing::info!(path = %output.display(), rows = report.summary, "Exported annotations");
    Ok(report)
}

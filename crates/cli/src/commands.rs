//! Command runners. Reports go to the given writer; diagnostics go through
//! `tracing`.

use std::io::Write;
use std::path::{Path, PathBuf};

use annocurate_core::csv::quality_report_csv;
use annocurate_core::curation::{TokenFilter, DEFAULT_MODEL_ORDER};
use annocurate_core::{ClassifierConfig, QualityFlag};
use annocurate_store::{curate, quality, resolve_inputs, BatchReport, Persistence};
use anyhow::Context;

use crate::cli::{Commands, InputArgs, WriteArgs};
use crate::config::CliConfig;

/// Execute one parsed command.
pub fn run(command: Commands, config: &CliConfig, out: &mut dyn Write) -> anyhow::Result<()> {
    match command {
        Commands::Stats(dir) => stats(&resolve_files(&InputArgs::from(dir), config)?, out),
        Commands::Reorder { input, order, write } => {
            let order: Vec<String> = if order.is_empty() {
                DEFAULT_MODEL_ORDER.iter().map(|m| m.to_string()).collect()
            } else {
                order
            };
            let persistence = persistence_for(&write);
            let report = curate::reorder(&resolve_files(&input, config)?, &order, &persistence)?;
            writeln!(
                out,
                "Reordered {} files (order: {})",
                report.files_processed,
                order.join(", ")
            )?;
            finish_write(&report, &persistence, out)
        }
        Commands::Remove { input, model, write } => {
            let persistence = persistence_for(&write);
            let files = resolve_files(&input, config)?;
            let report = curate::remove_model(&files, &model, &persistence)?;
            writeln!(
                out,
                "Removed {model} from {} files (total {} annotations)",
                report.summary.files_with_removals, report.summary.annotations_removed
            )?;
            finish_write(&report, &persistence, out)
        }
        Commands::FilterTokens { input, min, max, write } => {
            let filter = TokenFilter::new(min, max);
            if filter.is_unbounded() {
                tracing::warn!("No token bounds given; nothing will be filtered");
            }
            let persistence = persistence_for(&write);
            let files = resolve_files(&input, config)?;
            let report = curate::filter_tokens(&files, filter, &persistence)?;
            writeln!(
                out,
                "Filtered {} files, dropped {} annotations",
                report.files_processed, report.summary
            )?;
            finish_write(&report, &persistence, out)
        }
        Commands::Export { dir, output, include_metrics } => {
            let files = resolve_files(&InputArgs::from(dir), config)?;
            let report = curate::export_csv(&files, &output, include_metrics)?;
            writeln!(out, "Exported {} rows to {}", report.summary, output.display())?;
            finish(&report, out)
        }
        Commands::Check { dir, max_length, output_csv, list_files_only } => {
            let classifier = ClassifierConfig::report(max_length.unwrap_or(config.max_length));
            let files = resolve_files(&InputArgs::from(dir), config)?;
            check(&files, &classifier, output_csv.as_deref(), list_files_only, out)
        }
        Commands::Flag { input, max_length, strategy, write } => {
            let classifier = ClassifierConfig::default()
                .with_max_response_length(max_length.unwrap_or(config.max_length))
                .with_strategy(strategy.into());
            let persistence = persistence_for(&write);
            let report = quality::flag(&resolve_files(&input, config)?, &classifier, &persistence)?;
            writeln!(
                out,
                "Flagged {} prompts ({} strategy)",
                report.summary.flagged_prompts,
                classifier.strategy.as_str()
            )?;
            for (flag, count) in &report.summary.by_flag {
                writeln!(out, "  {:20}: {count}", flag.as_str())?;
            }
            finish_write(&report, &persistence, out)
        }
        Commands::ListFlagged(dir) => {
            let report = quality::list_flagged(&resolve_files(&InputArgs::from(dir), config)?)?;
            for found in &report.summary {
                writeln!(
                    out,
                    "{} | {} | {} | {}",
                    file_name(&found.path),
                    found.entry.model,
                    found.entry.prompt,
                    found.entry.flags.join(",")
                )?;
            }
            writeln!(out, "Total flagged: {}", report.summary.len())?;
            finish(&report, out)
        }
        Commands::RemoveFlagged { input, flag_types, write } => {
            let only = flag_types
                .as_deref()
                .map(QualityFlag::parse_list)
                .transpose()
                .context("invalid --flag-types")?;
            let persistence = persistence_for(&write);
            let files = resolve_files(&input, config)?;
            let report = quality::remove_flagged(&files, only.as_deref(), &persistence)?;
            writeln!(
                out,
                "Removed {} flagged prompts from {} files",
                report.summary.prompts_removed, report.summary.files_modified
            )?;
            finish_write(&report, &persistence, out)
        }
        Commands::Missing(dir) => {
            let report = quality::find_missing(&resolve_files(&InputArgs::from(dir), config)?)?;
            if report.summary.is_empty() {
                writeln!(out, "Nothing to do!")?;
            }
            for plan in &report.summary {
                writeln!(out, "\n{}:", file_name(&plan.path))?;
                for (model, keys) in &plan.missing {
                    let names: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
                    writeln!(out, "  {model}: missing [{}]", names.join(", "))?;
                }
            }
            let prompts: usize = report.summary.iter().map(|p| p.prompt_count()).sum();
            writeln!(
                out,
                "\nFound {} files with missing prompts ({prompts} prompts)",
                report.summary.len()
            )?;
            finish(&report, out)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn resolve_files(input: &InputArgs, config: &CliConfig) -> anyhow::Result<Vec<PathBuf>> {
    let pattern = input.pattern.as_deref().unwrap_or(&config.pattern);
    let exclude = input
        .exclude_prefix
        .as_deref()
        .or(config.exclude_prefix.as_deref());
    let files = resolve_inputs(&input.paths, pattern, exclude)?;
    tracing::debug!(count = files.len(), pattern, "Resolved input files");
    Ok(files)
}

fn persistence_for(write: &WriteArgs) -> Persistence {
    Persistence::from_options(write.output_dir.clone(), write.dry_run)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Trailer shared by batch commands: files that failed.
fn finish<S>(report: &BatchReport<S>, out: &mut dyn Write) -> anyhow::Result<()> {
    if report.has_failures() {
        writeln!(out, "Failed: {} of {} files", report.failures.len(), report.files_seen)?;
        for failure in &report.failures {
            writeln!(out, "  {}: {}", file_name(&failure.path), failure.error)?;
        }
    }
    Ok(())
}

/// Trailer for commands that modify files.
fn finish_write<S>(
    report: &BatchReport<S>,
    persistence: &Persistence,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match persistence {
        Persistence::DryRun => writeln!(out, "(dry run: no files written)")?,
        Persistence::WriteTo(dir) => {
            writeln!(out, "Wrote {} files to {}", report.files_written, dir.display())?
        }
        Persistence::Overwrite => writeln!(out, "Updated {} files", report.files_written)?,
    }
    finish(report, out)
}

fn stats(files: &[PathBuf], out: &mut dyn Write) -> anyhow::Result<()> {
    let report = curate::stats(files)?;
    let stats = &report.summary;
    writeln!(out, "Files processed: {}", stats.files_processed)?;
    writeln!(out, "Total annotations: {}", stats.total_annotations)?;
    writeln!(out, "\nModel counts:")?;
    for (model, count) in &stats.model_counts {
        writeln!(out, "  {model:30}: {count:5}")?;
    }
    finish(&report, out)
}

fn check(
    files: &[PathBuf],
    classifier: &ClassifierConfig,
    output_csv: Option<&Path>,
    list_files_only: bool,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    tracing::info!(files = files.len(), "Checking annotation files");
    let report = quality::check(files, classifier);

    if list_files_only {
        for name in &report.files_with_issues {
            writeln!(out, "{name}")?;
        }
        return Ok(());
    }

    write!(out, "{}", report.render())?;

    if let Some(path) = output_csv {
        if report.issues.is_empty() {
            writeln!(out, "No issues to export")?;
        } else {
            std::fs::write(path, quality_report_csv(&report.issues))
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(out, "\nExported {} issues to {}", report.issues.len(), path.display())?;
        }
    }
    Ok(())
}

//! Diagnostic quality report over a set of records.
//!
//! The report never touches the records: it classifies every prompt result
//! with the full-scan strategy and collects one [`QualityIssue`] row per
//! flagged result, plus per-prompt length samples for the overall statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use indexmap::IndexMap;
use serde::Serialize;

use crate::classifier::{classify, ClassifierConfig};
use crate::flags::{join_flags, QualityFlag};
use crate::record::AnnotationFile;

/// Placeholder used for model and prompt on file-level failure rows.
pub const UNKNOWN: &str = "unknown";

/// A maximum this many times the median earns an outlier note.
pub const OUTLIER_RATIO: usize = 5;

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One report row: a flagged prompt result, or a file that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityIssue {
    pub file: String,
    pub image_id: String,
    pub model: String,
    pub prompt: String,
    pub issue_types: Vec<QualityFlag>,
    pub response_length: usize,
    pub total_tokens: u64,
    /// The result's `error` field, empty when none.
    pub error: String,
    /// `"<first 30 chars>... x<count>"`, empty without a described pattern.
    pub pattern_info: String,
    /// Schema violation messages joined by `; `.
    pub schema_errors: String,
}

impl QualityIssue {
    pub fn issue_types_joined(&self) -> String {
        join_flags(&self.issue_types)
    }
}

/// Length and token samples for one prompt key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PromptSamples {
    pub lengths: Vec<usize>,
    /// Non-zero token totals only.
    pub tokens: Vec<u64>,
}

impl PromptSamples {
    /// Upper median of the response lengths.
    pub fn median_length(&self) -> Option<usize> {
        upper_median(&self.lengths)
    }

    pub fn max_length(&self) -> Option<usize> {
        self.lengths.iter().copied().max()
    }

    pub fn median_tokens(&self) -> Option<u64> {
        upper_median(&self.tokens)
    }

    /// `max / median` when the maximum exceeds [`OUTLIER_RATIO`] times the
    /// median. A zero median never yields a ratio.
    pub fn outlier_ratio(&self) -> Option<f64> {
        let median = self.median_length()?;
        let max = self.max_length()?;
        if median > 0 && max > median * OUTLIER_RATIO {
            Some(max as f64 / median as f64)
        } else {
            None
        }
    }
}

fn upper_median<T: Copy + Ord>(samples: &[T]) -> Option<T> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    Some(sorted[sorted.len() / 2])
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Accumulated report over a batch of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_files: usize,
    pub issues: Vec<QualityIssue>,
    pub files_with_issues: BTreeSet<String>,
    pub prompt_stats: BTreeMap<String, PromptSamples>,
}

impl QualityReport {
    pub fn new(total_files: usize) -> Self {
        Self {
            total_files,
            ..Default::default()
        }
    }

    /// Classify every prompt result of one record. `fallback_image_id` is used
    /// when the record has no `image.id` (usually the file stem).
    pub fn check_record(
        &mut self,
        file_name: &str,
        fallback_image_id: &str,
        record: &AnnotationFile,
        config: &ClassifierConfig,
    ) {
        let image_id = record
            .image_id()
            .unwrap_or_else(|| fallback_image_id.to_string());

        for (model, prompt, result) in record.prompt_results() {
            let samples = self.prompt_stats.entry(prompt.to_string()).or_default();
            let response_length = result.response_length();
            let total_tokens = result.total_tokens();
            samples.lengths.push(response_length);
            if total_tokens > 0 {
                samples.tokens.push(total_tokens);
            }

            let classification = classify(prompt, result, config);
            if classification.is_clean() {
                continue;
            }

            self.files_with_issues.insert(file_name.to_string());
            self.issues.push(QualityIssue {
                file: file_name.to_string(),
                image_id: image_id.clone(),
                model: model.to_string(),
                prompt: prompt.to_string(),
                issue_types: classification.flags,
                response_length,
                total_tokens,
                error: result.error().unwrap_or_default().to_string(),
                pattern_info: classification
                    .pattern
                    .as_ref()
                    .map(|p| p.summary())
                    .unwrap_or_default(),
                schema_errors: classification
                    .schema_violations
                    .iter()
                    .map(|v| v.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            });
        }
    }

    /// Record a file that could not be read or parsed.
    pub fn record_file_error(&mut self, file_name: &str, image_id: &str, error: &str) {
        self.files_with_issues.insert(file_name.to_string());
        self.issues.push(QualityIssue {
            file: file_name.to_string(),
            image_id: image_id.to_string(),
            model: UNKNOWN.to_string(),
            prompt: UNKNOWN.to_string(),
            issue_types: vec![QualityFlag::FileError],
            response_length: 0,
            total_tokens: 0,
            error: error.to_string(),
            pattern_info: String::new(),
            schema_errors: String::new(),
        });
    }

    pub fn summary(&self) -> ReportSummary {
        let mut by_issue_type = IndexMap::new();
        let mut by_model = IndexMap::new();
        let mut by_prompt = IndexMap::new();
        for issue in &self.issues {
            for flag in &issue.issue_types {
                *by_issue_type.entry(flag.as_str().to_string()).or_insert(0) += 1;
            }
            *by_model.entry(issue.model.clone()).or_insert(0) += 1;
            *by_prompt.entry(issue.prompt.clone()).or_insert(0) += 1;
        }

        let lengths: Vec<usize> = self
            .issues
            .iter()
            .map(|i| i.response_length)
            .filter(|&l| l > 0)
            .collect();

        ReportSummary {
            total_files: self.total_files,
            files_with_issues: self.files_with_issues.len(),
            total_issues: self.issues.len(),
            by_issue_type: most_common(by_issue_type),
            by_model: most_common(by_model),
            by_prompt: most_common(by_prompt),
            issue_lengths: LengthStats::from_samples(&lengths),
        }
    }

    /// Plain-text rendering of the summary and the per-prompt statistics.
    pub fn render(&self) -> String {
        let summary = self.summary();
        let rule = "-".repeat(70);
        let banner = "=".repeat(70);
        let mut out = String::new();

        let _ = writeln!(out, "\n{banner}");
        let _ = writeln!(out, "ANNOTATION QUALITY REPORT");
        let _ = writeln!(out, "{banner}");
        let _ = writeln!(out, "Total files checked: {}", summary.total_files);
        let _ = writeln!(
            out,
            "Files with issues: {} ({:.1}%)",
            summary.files_with_issues,
            summary.files_with_issues_percent()
        );
        let _ = writeln!(out, "Total issues found: {}", summary.total_issues);

        if summary.total_issues > 0 {
            for (title, counts) in [
                ("Issue Type Distribution", &summary.by_issue_type),
                ("Issues by Model", &summary.by_model),
                ("Issues by Prompt Type", &summary.by_prompt),
            ] {
                let _ = writeln!(out, "\n{title}");
                let _ = writeln!(out, "{rule}");
                for (name, count) in counts {
                    let _ = writeln!(out, "  {name:30}: {count:4}");
                }
            }

            let _ = writeln!(out, "\nResponse Length Statistics (for issues)");
            let _ = writeln!(out, "{rule}");
            if let Some(stats) = &summary.issue_lengths {
                let _ = writeln!(out, "  Min: {} chars", group_thousands(stats.min));
                let _ = writeln!(out, "  Median: {} chars", group_thousands(stats.median));
                let _ = writeln!(out, "  Max: {} chars", group_thousands(stats.max));
                let _ = writeln!(out, "  Mean: {} chars", group_thousands(stats.mean));
            }
        }

        let _ = writeln!(out, "\nOverall Response Statistics by Prompt Type");
        let _ = writeln!(out, "{rule}");
        for (prompt, samples) in &self.prompt_stats {
            let (Some(median), Some(max)) = (samples.median_length(), samples.max_length()) else {
                continue;
            };
            let _ = writeln!(out, "\n  {prompt}:");
            let _ = writeln!(
                out,
                "    Response length - Median: {} | Max: {} | Samples: {}",
                group_thousands(median),
                group_thousands(max),
                samples.lengths.len()
            );
            if let Some(ratio) = samples.outlier_ratio() {
                let _ = writeln!(out, "    Max is {ratio:.1}x larger than median");
            }
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Min / upper-median / max / integer mean of a set of lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LengthStats {
    pub min: usize,
    pub median: usize,
    pub max: usize,
    pub mean: usize,
}

impl LengthStats {
    pub fn from_samples(samples: &[usize]) -> Option<Self> {
        let median = upper_median(samples)?;
        Some(Self {
            min: samples.iter().copied().min().unwrap_or(0),
            median,
            max: samples.iter().copied().max().unwrap_or(0),
            mean: samples.iter().sum::<usize>() / samples.len(),
        })
    }
}

/// Aggregate view of a [`QualityReport`]. Distributions are sorted by count,
/// descending; ties keep first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub files_with_issues: usize,
    pub total_issues: usize,
    pub by_issue_type: Vec<(String, usize)>,
    pub by_model: Vec<(String, usize)>,
    pub by_prompt: Vec<(String, usize)>,
    /// Over issues with a non-empty response.
    pub issue_lengths: Option<LengthStats>,
}

impl ReportSummary {
    pub fn files_with_issues_percent(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            self.files_with_issues as f64 / self.total_files as f64 * 100.0
        }
    }
}

fn most_common(counts: IndexMap<String, usize>) -> Vec<(String, usize)> {
    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

/// `1234567` -> `1,234,567`.
fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

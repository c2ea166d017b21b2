//! CSV rendering for the quality report and the corpus export.

use serde_json::Number;

use crate::record::{AnnotationFile, Nullable};
use crate::report::QualityIssue;

pub const QUALITY_REPORT_HEADERS: &[&str] = &[
    "file",
    "image_id",
    "model",
    "prompt",
    "issue_types",
    "response_length",
    "total_tokens",
    "error",
    "pattern_info",
    "schema_errors",
];

pub const EXPORT_HEADERS: &[&str] = &["image_id", "image_path", "model", "prompt_type", "response"];

pub const EXPORT_METRIC_HEADERS: &[&str] = &[
    "input_tokens",
    "output_tokens",
    "total_tokens",
    "generation_duration_ms",
];

// ---------------------------------------------------------------------------
// CSV helpers
// ---------------------------------------------------------------------------

/// Escape a value for CSV: wrap in quotes if it contains a comma, quote, CR
/// or LF.
pub fn csv_escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S]) {
    let row: Vec<String> = cells.iter().map(|c| csv_escape(c.as_ref())).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// A metric exactly as written on disk; empty when absent or `null`.
fn number_cell(field: Option<&Nullable<Number>>) -> String {
    field
        .and_then(Option::as_ref)
        .and_then(Option::as_ref)
        .map(Number::to_string)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Quality report
// ---------------------------------------------------------------------------

/// Header plus one row per issue.
pub fn quality_report_csv(issues: &[QualityIssue]) -> String {
    let mut out = String::new();
    push_row(&mut out, QUALITY_REPORT_HEADERS);
    for issue in issues {
        push_row(
            &mut out,
            &[
                issue.file.clone(),
                issue.image_id.clone(),
                issue.model.clone(),
                issue.prompt.clone(),
                issue.issue_types_joined(),
                issue.response_length.to_string(),
                issue.total_tokens.to_string(),
                issue.error.clone(),
                issue.pattern_info.clone(),
                issue.schema_errors.clone(),
            ],
        );
    }
    out
}

// ---------------------------------------------------------------------------
// Corpus export
// ---------------------------------------------------------------------------

/// Incremental writer for the corpus export: one row per prompt result.
#[derive(Debug, Clone)]
pub struct ExportCsv {
    include_metrics: bool,
    rows: usize,
    out: String,
}

impl ExportCsv {
    pub fn new(include_metrics: bool) -> Self {
        let mut out = String::new();
        let mut headers: Vec<&str> = EXPORT_HEADERS.to_vec();
        if include_metrics {
            headers.extend_from_slice(EXPORT_METRIC_HEADERS);
        }
        push_row(&mut out, &headers);
        Self {
            include_metrics,
            rows: 0,
            out,
        }
    }

    /// Append every prompt result of `record`. Missing image fields and
    /// metrics become empty cells.
    pub fn add_record(&mut self, record: &AnnotationFile) {
        let image_id = record.image_id().unwrap_or_default();
        let image_path = record.image_path().unwrap_or_default();

        for (model, prompt, result) in record.prompt_results() {
            let mut cells = vec![
                image_id.clone(),
                image_path.to_string(),
                model.to_string(),
                prompt.to_string(),
                result.response().to_string(),
            ];
            if self.include_metrics {
                let tokens = result.token_metrics();
                cells.push(number_cell(tokens.map(|t| &t.input_tokens)));
                cells.push(number_cell(tokens.map(|t| &t.output_tokens)));
                cells.push(number_cell(tokens.map(|t| &t.total_tokens)));
                cells.push(number_cell(
                    result.performance_metrics().map(|p| &p.generation_duration_ms),
                ));
            }
            push_row(&mut self.out, &cells);
            self.rows += 1;
        }
    }

    /// Data rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(self) -> String {
        self.out
    }
}

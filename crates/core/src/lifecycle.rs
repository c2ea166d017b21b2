//! Flag lifecycle over one annotation record.
//!
//! Each prompt result moves through:
//!
//! - **clean**: no `quality_flags` field
//! - **flagged**: non-empty `quality_flags`, recomputed from scratch on every
//!   pass (a result that became clean loses the field)
//! - **removed**: the prompt entry is deleted so it can be regenerated
//! - **re-annotated**: a missing entry is filled by an [`Annotator`]; the next
//!   flagging pass puts it back into clean or flagged
//!
//! Everything here works on an in-memory [`AnnotationFile`]; reading and
//! writing files is the store crate's job.

use std::collections::BTreeMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::annotator::Annotator;
use crate::classifier::{classify, ClassifierConfig};
use crate::flags::QualityFlag;
use crate::prompt::{PromptCatalog, PromptKey};
use crate::record::{flags_field, AnnotationFile, PromptResult, TokenMetrics};

// ---------------------------------------------------------------------------
// Flagging
// ---------------------------------------------------------------------------

/// Outcome of one flagging pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagSummary {
    /// Prompt results carrying at least one flag after the pass.
    pub flagged_prompts: usize,
    /// Occurrences of each flag after the pass.
    pub by_flag: BTreeMap<QualityFlag, usize>,
    /// Whether any `quality_flags` field was added, changed or removed.
    pub changed: bool,
}

impl FlagSummary {
    /// Fold another summary into this one.
    pub fn merge(&mut self, other: &FlagSummary) {
        self.flagged_prompts += other.flagged_prompts;
        for (flag, count) in &other.by_flag {
            *self.by_flag.entry(*flag).or_insert(0) += count;
        }
        self.changed |= other.changed;
    }
}

/// Classify every prompt result and store the resulting flags.
///
/// Flags are replaced, never appended: running this twice on an unchanged
/// record yields the same flags and the same summary (with `changed = false`
/// the second time).
pub fn apply_quality_flags(file: &mut AnnotationFile, config: &ClassifierConfig) -> FlagSummary {
    let mut summary = FlagSummary::default();

    for annotation in &mut file.annotations {
        for (key, result) in annotation.prompts.iter_mut() {
            let classification = classify(key, result, config);
            let new_flags = if classification.is_clean() {
                None
            } else {
                summary.flagged_prompts += 1;
                for flag in &classification.flags {
                    *summary.by_flag.entry(*flag).or_insert(0) += 1;
                }
                flags_field(&classification.flags)
            };

            if result.quality_flags != new_flags {
                summary.changed = true;
                result.quality_flags = new_flags;
            }
        }
    }

    summary
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// One flagged prompt result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedEntry {
    pub model: String,
    pub prompt: String,
    /// Stored flag tags, including any outside the known vocabulary.
    pub flags: Vec<String>,
    pub response_length: usize,
    pub error: Option<String>,
}

/// Every flagged prompt result in the record, in record order. Read-only.
pub fn flagged_entries(file: &AnnotationFile) -> Vec<FlaggedEntry> {
    file.prompt_results()
        .filter(|(_, _, result)| result.is_flagged())
        .map(|(model, prompt, result)| FlaggedEntry {
            model: model.to_string(),
            prompt: prompt.to_string(),
            flags: result.flag_tags().to_vec(),
            response_length: result.response_length(),
            error: result.error().map(str::to_string),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Delete flagged prompt entries so they can be regenerated.
///
/// With `only` set, an entry is removed when it carries at least one of the
/// listed flags; otherwise every flagged entry goes. Returns the number of
/// entries removed.
pub fn remove_flagged(file: &mut AnnotationFile, only: Option<&[QualityFlag]>) -> usize {
    let mut removed = 0usize;

    for annotation in &mut file.annotations {
        annotation.prompts.retain(|_, result| {
            let remove = match only {
                None => result.is_flagged(),
                Some(wanted) => result.has_any_flag(wanted),
            };
            if remove {
                removed += 1;
            }
            !remove
        });
    }

    removed
}

// ---------------------------------------------------------------------------
// Missing prompts and re-annotation
// ---------------------------------------------------------------------------

/// Prompt keys absent from one annotation, sorted by name.
fn missing_keys(prompts: &IndexMap<String, PromptResult>) -> Vec<PromptKey> {
    let mut missing: Vec<PromptKey> = PromptKey::ALL
        .into_iter()
        .filter(|key| !prompts.contains_key(key.as_str()))
        .collect();
    missing.sort_by_key(|key| key.as_str());
    missing
}

/// Missing prompt keys grouped by model. Models without gaps are omitted.
///
/// Keys outside the fixed vocabulary are ignored: they are never "missing".
pub fn missing_prompts(file: &AnnotationFile) -> IndexMap<String, Vec<PromptKey>> {
    let mut by_model: IndexMap<String, Vec<PromptKey>> = IndexMap::new();

    for annotation in &file.annotations {
        let missing = missing_keys(&annotation.prompts);
        if missing.is_empty() {
            continue;
        }
        let entry = by_model.entry(annotation.model().to_string()).or_default();
        for key in missing {
            if !entry.contains(&key) {
                entry.push(key);
            }
        }
        entry.sort_by_key(|key| key.as_str());
    }

    by_model
}

/// Counters from one re-annotation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReannotateSummary {
    /// Prompts for which an entry was written (successful or not).
    pub reannotated: usize,
    /// Calls that returned a response.
    pub succeeded: usize,
    /// Calls that failed and were recorded as error entries.
    pub failed: usize,
}

impl ReannotateSummary {
    pub fn merge(&mut self, other: &ReannotateSummary) {
        self.reannotated += other.reannotated;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Generate every missing prompt of every annotation, one call at a time.
///
/// A failed call is written as an error entry (empty response, `null`
/// metrics) and the pass moves on; nothing is retried.
pub fn fill_missing_prompts(
    file: &mut AnnotationFile,
    image_path: &Path,
    annotator: &dyn Annotator,
    catalog: &PromptCatalog,
) -> ReannotateSummary {
    let mut summary = ReannotateSummary::default();

    for annotation in &mut file.annotations {
        for key in missing_keys(&annotation.prompts) {
            let Some(prompt) = catalog.get(key) else {
                tracing::warn!(prompt = %key, "No prompt definition in catalog; skipping");
                continue;
            };

            let result = match annotator.annotate(image_path, prompt, annotation.model()) {
                Ok(generated) => {
                    summary.succeeded += 1;
                    tracing::info!(
                        model = %annotation.model(),
                        prompt = %key,
                        total_tokens = generated.token_metrics.as_ref().and_then(TokenMetrics::total_count),
                        service_error = generated.error.as_deref(),
                        "Re-annotated prompt",
                    );
                    PromptResult::from(generated)
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::warn!(
                        model = %annotation.model(),
                        prompt = %key,
                        error = %e,
                        "Re-annotation failed; recording error entry",
                    );
                    PromptResult::generation_failed(prompt, &e)
                }
            };

            annotation.prompts.insert(key.as_str().to_string(), result);
            summary.reannotated += 1;
        }
    }

    summary
}

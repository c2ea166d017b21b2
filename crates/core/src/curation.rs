//! Record-level curation transforms and corpus statistics.

use indexmap::IndexMap;
use serde::Serialize;

use crate::record::{AnnotationFile, ModelAnnotation};

/// Model order applied by `reorder` when none is given.
pub const DEFAULT_MODEL_ORDER: &[&str] = &[
    "qwen2.5vl:7b",
    "qwen2.5vl:32b",
    "gemma3:4b",
    "gemma3:12b",
    "gemma3:27b",
    "mistral-small3.2:24b",
];

// ---------------------------------------------------------------------------
// Reorder / remove
// ---------------------------------------------------------------------------

/// Put the listed models first, in the given order; every other annotation
/// follows in its original order. Annotations are never dropped, including
/// repeated passes of the same model.
pub fn reorder_annotations<S: AsRef<str>>(file: &mut AnnotationFile, model_order: &[S]) {
    let mut remaining: Vec<Option<ModelAnnotation>> =
        std::mem::take(&mut file.annotations).into_iter().map(Some).collect();
    let mut reordered = Vec::with_capacity(remaining.len());

    for model in model_order {
        for slot in remaining.iter_mut() {
            if slot.as_ref().is_some_and(|a| a.model() == model.as_ref()) {
                reordered.extend(slot.take());
            }
        }
    }
    reordered.extend(remaining.into_iter().flatten());

    file.annotations = reordered;
}

/// Drop every annotation produced by `model`. Returns how many were removed.
pub fn remove_model(file: &mut AnnotationFile, model: &str) -> usize {
    let before = file.annotations.len();
    file.annotations.retain(|a| a.model() != model);
    before - file.annotations.len()
}

// ---------------------------------------------------------------------------
// Token filter
// ---------------------------------------------------------------------------

/// Bounds on the summed `total_tokens` of one annotation. `None` or `0`
/// means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenFilter {
    pub min_tokens: Option<u64>,
    pub max_tokens: Option<u64>,
}

impl TokenFilter {
    pub fn new(min_tokens: Option<u64>, max_tokens: Option<u64>) -> Self {
        Self {
            min_tokens: min_tokens.filter(|&n| n > 0),
            max_tokens: max_tokens.filter(|&n| n > 0),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min_tokens.is_none() && self.max_tokens.is_none()
    }

    pub fn accepts(&self, total_tokens: u64) -> bool {
        if self.max_tokens.is_some_and(|max| total_tokens > max) {
            return false;
        }
        if self.min_tokens.is_some_and(|min| total_tokens < min) {
            return false;
        }
        true
    }
}

/// Drop annotations whose token total falls outside `filter`. Returns how
/// many were dropped.
pub fn filter_by_tokens(file: &mut AnnotationFile, filter: TokenFilter) -> usize {
    let before = file.annotations.len();
    file.annotations.retain(|a| filter.accepts(a.total_tokens()));
    before - file.annotations.len()
}

// ---------------------------------------------------------------------------
// Corpus statistics
// ---------------------------------------------------------------------------

/// Annotation counts accumulated over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorpusStats {
    pub files_processed: usize,
    pub total_annotations: usize,
    /// Annotations per model, in first-seen order.
    pub model_counts: IndexMap<String, usize>,
}

impl CorpusStats {
    pub fn add(&mut self, file: &AnnotationFile) {
        self.files_processed += 1;
        for annotation in &file.annotations {
            *self
                .model_counts
                .entry(annotation.model().to_string())
                .or_insert(0) += 1;
            self.total_annotations += 1;
        }
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.model_counts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn models(file: &AnnotationFile) -> Vec<&str> {
        file.annotations.iter().map(ModelAnnotation::model).collect()
    }

    fn record(models: &[&str]) -> AnnotationFile {
        let annotations: Vec<_> = models
            .iter()
            .map(|m| json!({"model": m, "prompts": {}}))
            .collect();
        AnnotationFile::from_value(json!({"annotations": annotations})).unwrap()
    }

    fn with_tokens(tokens: &[(&str, &[u64])]) -> AnnotationFile {
        let annotations: Vec<_> = tokens
            .iter()
            .map(|(model, per_prompt)| {
                let prompts: serde_json::Map<_, _> = per_prompt
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        (
                            format!("p{i}"),
                            json!({"response": "x", "token_metrics": {"total_tokens": t}}),
                        )
                    })
                    .collect();
                json!({"model": model, "prompts": prompts})
            })
            .collect();
        AnnotationFile::from_value(json!({"annotations": annotations})).unwrap()
    }

    // -- reorder --------------------------------------------------------------

    #[test]
    fn reorder_puts_listed_models_first() {
        let mut file = record(&["gemma3:4b", "llava", "qwen2.5vl:7b"]);
        reorder_annotations(&mut file, DEFAULT_MODEL_ORDER);
        assert_eq!(models(&file), vec!["qwen2.5vl:7b", "gemma3:4b", "llava"]);
    }

    #[test]
    fn reorder_keeps_unlisted_in_original_order() {
        let mut file = record(&["c", "a", "b", "x"]);
        reorder_annotations(&mut file, &["x"]);
        assert_eq!(models(&file), vec!["x", "c", "a", "b"]);
    }

    #[test]
    fn reorder_keeps_duplicate_models() {
        let mut file = record(&["b", "a", "b"]);
        reorder_annotations(&mut file, &["b", "a"]);
        assert_eq!(models(&file), vec!["b", "b", "a"]);
    }

    // -- remove ---------------------------------------------------------------

    #[test]
    fn remove_model_counts_removed() {
        let mut file = record(&["a", "b", "a"]);
        assert_eq!(remove_model(&mut file, "a"), 2);
        assert_eq!(models(&file), vec!["b"]);
        assert_eq!(remove_model(&mut file, "zzz"), 0);
    }

    // -- token filter ---------------------------------------------------------

    #[test]
    fn filter_drops_outside_bounds() {
        let mut file = with_tokens(&[("small", &[10, 5]), ("mid", &[100]), ("big", &[900, 200])]);
        let dropped = filter_by_tokens(&mut file, TokenFilter::new(Some(20), Some(1000)));
        assert_eq!(dropped, 2);
        assert_eq!(models(&file), vec!["mid"]);
    }

    #[test]
    fn zero_bounds_mean_unbounded() {
        let filter = TokenFilter::new(Some(0), Some(0));
        assert!(filter.is_unbounded());
        let mut file = with_tokens(&[("a", &[1]), ("b", &[1_000_000])]);
        assert_eq!(filter_by_tokens(&mut file, filter), 0);
    }

    #[test]
    fn missing_token_metrics_count_as_zero() {
        let mut file = AnnotationFile::from_value(json!({
            "annotations": [{"model": "a", "prompts": {"p": {"response": "x", "token_metrics": null}}}]
        }))
        .unwrap();
        assert_eq!(filter_by_tokens(&mut file, TokenFilter::new(Some(1), None)), 1);
    }

    #[test]
    fn bounds_are_inclusive() {
        let filter = TokenFilter::new(Some(10), Some(20));
        assert!(filter.accepts(10));
        assert!(filter.accepts(20));
        assert!(!filter.accepts(9));
        assert!(!filter.accepts(21));
    }

    // -- stats ----------------------------------------------------------------

    #[test]
    fn stats_accumulate_per_model() {
        let mut stats = CorpusStats::default();
        stats.add(&record(&["a", "b"]));
        stats.add(&record(&["b"]));
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.total_annotations, 3);
        assert_eq!(stats.model_counts["b"], 2);
        assert_eq!(stats.models().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn annotations_without_model_count_as_unknown() {
        let file = AnnotationFile::from_value(json!({"annotations": [{"prompts": {}}]})).unwrap();
        let mut stats = CorpusStats::default();
        stats.add(&file);
        assert_eq!(stats.model_counts["unknown"], 1);
    }
}

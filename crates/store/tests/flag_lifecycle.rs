//! Integration tests for the flag lifecycle over files on disk: flag, list,
//! remove and re-annotate.

mod common;

use std::cell::Cell;
use std::path::Path;

use annocurate_core::annotator::{AnnotatorError, GeneratedResponse};
use annocurate_core::record::TokenMetrics;
use annocurate_core::{
    Annotator, ClassifierConfig, PromptCatalog, PromptDefinition, PromptKey, QualityFlag,
};
use annocurate_store::quality;
use annocurate_store::{Persistence, StoreError};
use assert_matches::assert_matches;
use common::{clean_record, defective_record, read_json, write_json};

/// Answers every prompt, or fails every call when `fail` is set.
struct StubAnnotator {
    fail: bool,
    calls: Cell<usize>,
}

impl StubAnnotator {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: Cell::new(0),
        }
    }
}

impl Annotator for StubAnnotator {
    fn annotate(
        &self,
        image_path: &Path,
        prompt: &PromptDefinition,
        model: &str,
    ) -> Result<GeneratedResponse, AnnotatorError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(AnnotatorError::Request("connection refused".to_string()));
        }
        assert!(image_path.is_file(), "annotator called with missing image");
        let (response, data) = match prompt.key {
            PromptKey::StructuredInventory => (
                "{\"natural\": {\"sky\": {}}}".to_string(),
                Some(serde_json::json!({"natural": {"sky": {}}})),
            ),
            key => (format!("Regenerated {key} by {model}."), None),
        };
        Ok(GeneratedResponse {
            prompt_text: prompt.instruction_text.clone(),
            response,
            response_format: prompt.expected_format,
            response_data: data,
            token_metrics: Some(TokenMetrics::new(10, 32, 42)),
            ..Default::default()
        })
    }
}

// ---------------------------------------------------------------------------
// Test: flag
// ---------------------------------------------------------------------------

/// Flags land on the defective results only, and every key the record model
/// does not know about survives the rewrite.
#[test]
fn flag_writes_flags_and_preserves_unknown_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));

    let report = quality::flag(&[path.clone()], &ClassifierConfig::default(), &Persistence::Overwrite)
        .expect("flag should succeed");
    assert_eq!(report.files_written, 1);
    assert_eq!(report.summary.flagged_prompts, 3);
    assert_eq!(report.summary.by_flag[&QualityFlag::EmptyResponse], 2);
    assert_eq!(report.summary.by_flag[&QualityFlag::InvalidSchema], 1);
    assert_eq!(report.summary.by_flag[&QualityFlag::JsonParseError], 1);

    let written = read_json(&path);
    assert_eq!(written["run_id"], "batch-7");
    assert_eq!(written["image"]["source"], "nsd");
    assert_eq!(written["annotations"][0]["temperature"], 0.3);

    let gemma = &written["annotations"][0]["prompts"];
    assert!(gemma["general_description"].get("quality_flags").is_none());
    assert!(gemma["general_description"]["response_data"].is_null());
    assert!(gemma["general_description"]
        .as_object()
        .expect("object")
        .contains_key("error"));
    assert_eq!(gemma["general_description"]["token_metrics"]["total_tokens"], 30);
    assert_eq!(gemma["mood_emotions"]["reviewer_note"], "keep");

    let qwen = &written["annotations"][1]["prompts"];
    assert_eq!(qwen["general_description"]["quality_flags"], serde_json::json!(["empty_response"]));
    assert_eq!(qwen["structured_inventory"]["quality_flags"], serde_json::json!(["invalid_schema"]));
    assert_eq!(
        qwen["mood_emotions"]["quality_flags"],
        serde_json::json!(["json_parse_error", "empty_response"])
    );
}

/// A second pass over an already flagged file changes nothing on disk.
#[test]
fn reflagging_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let config = ClassifierConfig::default();

    quality::flag(&[path.clone()], &config, &Persistence::Overwrite).expect("first pass");
    let after_first = std::fs::read_to_string(&path).expect("read");

    let second = quality::flag(&[path.clone()], &config, &Persistence::Overwrite).expect("second pass");
    assert_eq!(second.files_written, 0);
    assert_eq!(second.summary.flagged_prompts, 3);
    assert_eq!(std::fs::read_to_string(&path).expect("read"), after_first);
}

/// Dry-run computes the summary but leaves the file untouched.
#[test]
fn flag_dry_run_never_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let before = std::fs::read_to_string(&path).expect("read");

    let report = quality::flag(&[path.clone()], &ClassifierConfig::default(), &Persistence::DryRun)
        .expect("flag");
    assert_eq!(report.summary.flagged_prompts, 3);
    assert_eq!(report.files_written, 0);
    assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
}

/// With an output directory the source stays as it was.
#[test]
fn flag_into_output_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("flagged");
    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let before = std::fs::read_to_string(&path).expect("read");

    quality::flag(
        &[path.clone()],
        &ClassifierConfig::default(),
        &Persistence::WriteTo(out.clone()),
    )
    .expect("flag");

    assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
    let copy = read_json(&out.join("shared_0001.json"));
    assert!(copy["annotations"][1]["prompts"]["general_description"]
        .get("quality_flags")
        .is_some());
}

// ---------------------------------------------------------------------------
// Test: batch error isolation
// ---------------------------------------------------------------------------

/// In batch mode a broken file is recorded and the rest are still flagged.
#[test]
fn batch_flag_skips_broken_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let broken = dir.path().join("shared_0002.json");
    std::fs::write(&broken, "{ not json").expect("write");
    let bare = write_json(dir.path(), "shared_0003.json", &serde_json::json!({"image": {}}));

    let files = vec![good.clone(), broken.clone(), bare.clone()];
    let report = quality::flag(&files, &ClassifierConfig::default(), &Persistence::Overwrite)
        .expect("batch never fails on a single file");

    assert_eq!(report.files_processed, 1);
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.failures[0].path, broken);
    assert_eq!(report.failures[1].path, bare);
    assert!(report.failures[1].error.contains("annotations"));
    assert_eq!(report.summary.flagged_prompts, 3);
}

/// In single-file mode the error reaches the caller.
#[test]
fn single_file_errors_propagate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let broken = dir.path().join("shared_0002.json");
    std::fs::write(&broken, "[1, 2").expect("write");
    let result = quality::flag(&[broken], &ClassifierConfig::default(), &Persistence::Overwrite);
    assert_matches!(result, Err(StoreError::Json { .. }));

    let bare = write_json(dir.path(), "shared_0003.json", &serde_json::json!({"image": {}}));
    let result = quality::remove_flagged(&[bare], None, &Persistence::Overwrite);
    assert_matches!(result, Err(StoreError::MissingAnnotations(_)));
}

/// A sparse record (nulls, integer metrics, results without `prompt_text`
/// or `response_format`) comes back from flag and remove-flagged with only
/// the flagged entry touched.
#[test]
fn flag_and_remove_leave_sparse_fields_untouched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let original = serde_json::json!({
        "image": {"id": 2951, "name": "nsd02951.png"},
        "annotations": [{
            "model": "gemma3:4b",
            "temperature": null,
            "prompts": {
                "general_description": {
                    "response": "ok text",
                    "token_metrics": {"input_tokens": 4, "output_tokens": null, "total_tokens": null},
                    "performance_metrics": {"generation_duration_ms": 1200, "tokens_per_second": 40}
                },
                "mood_emotions": {"response": ""}
            }
        }]
    });
    let path = write_json(dir.path(), "shared_0001.json", &original);
    let files = vec![path.clone()];

    quality::flag(&files, &ClassifierConfig::default(), &Persistence::Overwrite).expect("flag");
    let mut expected = original.clone();
    expected["annotations"][0]["prompts"]["mood_emotions"]["quality_flags"] =
        serde_json::json!(["empty_response"]);
    let flagged = read_json(&path);
    assert_eq!(flagged, expected);
    let metrics = &flagged["annotations"][0]["prompts"]["general_description"]["performance_metrics"];
    assert_eq!(metrics["generation_duration_ms"].to_string(), "1200");

    quality::remove_flagged(&files, None, &Persistence::Overwrite).expect("remove");
    let mut expected = original;
    expected["annotations"][0]["prompts"]
        .as_object_mut()
        .expect("prompts")
        .remove("mood_emotions");
    assert_eq!(read_json(&path), expected);
}

/// Values outside the typed vocabulary never make a file unreadable.
#[test]
fn loose_values_do_not_fail_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(
        dir.path(),
        "shared_0001.json",
        &serde_json::json!({
            "image": {"id": 2951},
            "annotations": [
                {"prompts": {"general_description": {"response": "", "quality_flags": ["manual_review"]}}},
                {"model": "gemma3:4b", "prompts": {}}
            ]
        }),
    );
    let files = vec![path.clone()];

    let listed = quality::list_flagged(&files).expect("list");
    assert_eq!(listed.summary.len(), 1);
    assert_eq!(listed.summary[0].entry.model, "unknown");
    assert_eq!(listed.summary[0].entry.flags, vec!["manual_review"]);

    let report = quality::check(&files, &ClassifierConfig::report(10_000));
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].image_id, "2951");
    assert_eq!(report.issues[0].model, "unknown");
    assert_eq!(report.issues[0].issue_types, vec![QualityFlag::EmptyResponse]);

    let removed = quality::remove_flagged(&files, None, &Persistence::Overwrite).expect("remove");
    assert_eq!(removed.summary.prompts_removed, 1);
    let written = read_json(&path);
    assert!(written["annotations"][0].get("model").is_none());
    assert_eq!(written["image"]["id"], 2951);
}

// ---------------------------------------------------------------------------
// Test: list / remove
// ---------------------------------------------------------------------------

#[test]
fn list_flagged_reports_each_entry_with_its_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let b = write_json(dir.path(), "shared_0002.json", &clean_record("shared_0002"));
    let files = vec![a.clone(), b];
    quality::flag(&files, &ClassifierConfig::default(), &Persistence::Overwrite).expect("flag");

    let listed = quality::list_flagged(&files).expect("list");
    assert_eq!(listed.summary.len(), 3);
    assert!(listed.summary.iter().all(|e| e.path == a));
    assert!(listed.summary.iter().all(|e| e.entry.model == "qwen2.5vl:7b"));
}

#[test]
fn remove_flagged_filters_by_type() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let files = vec![path.clone()];
    quality::flag(&files, &ClassifierConfig::default(), &Persistence::Overwrite).expect("flag");

    let report = quality::remove_flagged(&files, Some(&[QualityFlag::InvalidSchema]), &Persistence::Overwrite)
        .expect("remove");
    assert_eq!(report.summary.prompts_removed, 1);
    assert_eq!(report.summary.files_modified, 1);

    let written = read_json(&path);
    let qwen = written["annotations"][1]["prompts"].as_object().expect("object");
    assert!(!qwen.contains_key("structured_inventory"));
    assert!(qwen.contains_key("general_description"));
}

// ---------------------------------------------------------------------------
// Test: missing prompts and re-annotation
// ---------------------------------------------------------------------------

#[test]
fn find_missing_lists_gaps_per_model() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let b = write_json(dir.path(), "shared_0002.json", &clean_record("shared_0002"));

    let report = quality::find_missing(&[a.clone(), b.clone()]).expect("find");
    assert_eq!(report.summary.len(), 2);

    let first = &report.summary[0];
    assert_eq!(first.path, a);
    assert_eq!(first.missing["gemma3:4b"].len(), 3);
    assert_eq!(
        first.missing["qwen2.5vl:7b"],
        vec![PromptKey::EntitiesInteractions, PromptKey::ForegroundBackground]
    );
    assert_eq!(first.prompt_count(), 5);

    let second = &report.summary[1];
    assert!(!second.missing.contains_key("gemma3:4b"));
    assert_eq!(second.prompt_count(), 4);
}

/// Flag, strip and regenerate: every previously present key comes back and
/// the regenerated file flags clean.
#[test]
fn remove_then_reannotate_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).expect("mkdir");
    // Only the .jpg exists, so the .png name has to fall back.
    std::fs::write(images.join("shared_0001.jpg"), b"jpeg").expect("write image");

    let path = write_json(dir.path(), "shared_0001.json", &defective_record("shared_0001"));
    let files = vec![path.clone()];
    let config = ClassifierConfig::default();

    quality::flag(&files, &config, &Persistence::Overwrite).expect("flag");
    quality::remove_flagged(&files, None, &Persistence::Overwrite).expect("remove");

    let annotator = StubAnnotator::new(false);
    let report = quality::reannotate_missing(
        &files,
        &images,
        &annotator,
        &PromptCatalog::standard(),
        &Persistence::Overwrite,
    )
    .expect("reannotate");

    assert_eq!(report.summary.files_with_missing, 1);
    assert_eq!(report.summary.planned, 8);
    assert_eq!(report.summary.prompts.reannotated, 8);
    assert_eq!(report.summary.prompts.failed, 0);
    assert_eq!(annotator.calls.get(), 8);
    assert_eq!(report.files_written, 1);

    let missing = quality::find_missing(&files).expect("find");
    assert!(missing.summary.is_empty());

    let reflag = quality::flag(&files, &config, &Persistence::Overwrite).expect("reflag");
    assert_eq!(reflag.summary.flagged_prompts, 0);

    let written = read_json(&path);
    assert_eq!(written["run_id"], "batch-7");
    assert_eq!(
        written["annotations"][1]["prompts"]["general_description"]["token_metrics"]["total_tokens"],
        42
    );
}

/// Failed calls still write error entries with null metrics.
#[test]
fn failed_generation_records_error_entries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).expect("mkdir");
    std::fs::write(images.join("shared_0002.png"), b"png").expect("write image");
    let path = write_json(dir.path(), "shared_0002.json", &clean_record("shared_0002"));

    let annotator = StubAnnotator::new(true);
    let report = quality::reannotate_missing(
        &[path.clone()],
        &images,
        &annotator,
        &PromptCatalog::standard(),
        &Persistence::Overwrite,
    )
    .expect("reannotate");
    assert_eq!(report.summary.prompts.failed, 4);
    assert_eq!(report.summary.prompts.reannotated, 4);

    let written = read_json(&path);
    let entry = &written["annotations"][1]["prompts"]["mood_emotions"];
    assert_eq!(entry["response"], "");
    assert!(entry["error"].as_str().expect("error string").contains("connection refused"));
    assert!(entry["token_metrics"].is_null());
    assert!(entry["performance_metrics"].is_null());
    assert!(entry["response_data"].is_null());
}

#[test]
fn reannotate_dry_run_only_plans() {
    let dir = tempfile::tempdir().expect("tempdir");
    let images = dir.path().join("images");
    std::fs::create_dir_all(&images).expect("mkdir");
    std::fs::write(images.join("shared_0002.png"), b"png").expect("write image");
    let path = write_json(dir.path(), "shared_0002.json", &clean_record("shared_0002"));
    let before = std::fs::read_to_string(&path).expect("read");

    let annotator = StubAnnotator::new(false);
    let report = quality::reannotate_missing(
        &[path.clone()],
        &images,
        &annotator,
        &PromptCatalog::standard(),
        &Persistence::DryRun,
    )
    .expect("reannotate");

    assert_eq!(report.summary.planned, 4);
    assert_eq!(report.summary.prompts.reannotated, 0);
    assert_eq!(annotator.calls.get(), 0);
    assert_eq!(std::fs::read_to_string(&path).expect("read"), before);
}

#[test]
fn reannotate_skips_files_without_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_json(dir.path(), "shared_0002.json", &clean_record("shared_0002"));
    let annotator = StubAnnotator::new(false);

    let report = quality::reannotate_missing(
        &[path.clone()],
        dir.path(),
        &annotator,
        &PromptCatalog::standard(),
        &Persistence::Overwrite,
    )
    .expect("reannotate");

    assert_eq!(report.summary.images_missing, vec![path]);
    assert_eq!(annotator.calls.get(), 0);
    assert_eq!(report.files_written, 0);
}

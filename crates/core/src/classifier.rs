//! Per-result quality classification.
//!
//! [`classify`] is a pure function of one prompt result: it never looks at
//! other results, other models or other files. Flags come out in a fixed
//! order and never repeat.

use serde_json::Value;

use crate::flags::QualityFlag;
use crate::inventory_schema::{validate_structured_inventory_schema, SchemaViolation};
use crate::pattern::{PatternInfo, RepetitionStrategy, FLAG_MIN_REPEATS};
use crate::prompt::PromptKey;
use crate::record::PromptResult;

/// Default maximum response length in characters.
pub const DEFAULT_MAX_RESPONSE_LENGTH: usize = 10_000;

/// Substring of the `error` field written when a JSON response failed to parse.
pub const JSON_PARSE_ERROR_MARKER: &str = "JSON parsing failed";

/// Thresholds and strategy for one classification pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub max_response_length: usize,
    pub min_repeats: usize,
    pub strategy: RepetitionStrategy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_response_length: DEFAULT_MAX_RESPONSE_LENGTH,
            min_repeats: FLAG_MIN_REPEATS,
            strategy: RepetitionStrategy::QuickScan,
        }
    }
}

impl ClassifierConfig {
    /// Configuration for the diagnostic report: full scan, described patterns.
    pub fn report(max_response_length: usize) -> Self {
        Self {
            max_response_length,
            min_repeats: FLAG_MIN_REPEATS,
            strategy: RepetitionStrategy::FullScan,
        }
    }

    pub fn with_max_response_length(mut self, max_response_length: usize) -> Self {
        self.max_response_length = max_response_length;
        self
    }

    pub fn with_strategy(mut self, strategy: RepetitionStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Flags for one result plus the diagnostics that produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub flags: Vec<QualityFlag>,
    /// Described repetition, when the strategy can describe it.
    pub pattern: Option<PatternInfo>,
    pub schema_violations: Vec<SchemaViolation>,
}

impl Classification {
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Classify one prompt result.
///
/// `prompt_key` is the raw key from the record; the schema check only runs
/// for `structured_inventory` results carrying non-empty `response_data`
/// (`null`, `{}`, `[]`, `""`, `false` and `0` are all skipped).
pub fn classify(prompt_key: &str, result: &PromptResult, config: &ClassifierConfig) -> Classification {
    let mut classification = Classification::default();
    let response = result.response();

    if result.response_length() > config.max_response_length {
        classification.flags.push(QualityFlag::TooLong);
    }

    if result
        .error()
        .is_some_and(|e| e.contains(JSON_PARSE_ERROR_MARKER))
    {
        classification.flags.push(QualityFlag::JsonParseError);
    }

    let detection = config.strategy.detect(response, config.min_repeats);
    if detection.is_found() {
        classification.flags.push(QualityFlag::RepetitivePattern);
        classification.pattern = detection.into_info();
    }

    if response.trim().is_empty() {
        classification.flags.push(QualityFlag::EmptyResponse);
    }

    if prompt_key == PromptKey::StructuredInventory.as_str() {
        if let Some(data) = result.response_data().filter(|d| !is_empty_payload(d)) {
            let violations = validate_structured_inventory_schema(data);
            if !violations.is_empty() {
                classification.flags.push(QualityFlag::InvalidSchema);
                classification.schema_violations = violations;
            }
        }
    }

    classification
}

/// Payloads that carry nothing to validate.
fn is_empty_payload(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

//! Annotation record model.
//!
//! One [`AnnotationFile`] is one JSON document on disk: an image reference
//! plus an ordered list of per-model annotation passes. Every struct keeps
//! unknown keys in a flattened `extra` map and nullable fields distinguish
//! "absent" from an explicit `null`, so a record survives a
//! read-modify-write cycle without losing data.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::CoreError;
use crate::flags::QualityFlag;
use crate::prompt::PromptKey;

/// A field that may be absent (`None`), explicitly `null` (`Some(None)`), or
/// set (`Some(Some(v))`).
pub type Nullable<T> = Option<Option<T>>;

/// Deserialize a present field into `Some(..)` so that `null` becomes
/// `Some(None)` instead of collapsing into "absent".
fn present<'de, D, T>(deserializer: D) -> Result<Nullable<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// AnnotationFile
// ---------------------------------------------------------------------------

/// Model name reported when an annotation carries none.
pub const UNKNOWN_MODEL: &str = "unknown";

/// One physical annotation record, keyed by an image identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub annotations: Vec<ModelAnnotation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reference to the annotated image.
///
/// `id` is kept as raw JSON: some corpora use numeric identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub id: Nullable<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Nullable<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub path: Nullable<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageRef {
    /// The identifier rendered as text. Strings are returned as-is, other
    /// scalars in their JSON form; `null` counts as absent.
    pub fn id(&self) -> Option<String> {
        match self.id.as_ref().and_then(Option::as_ref)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn name(&self) -> Option<&str> {
        flatten_str(&self.name)
    }

    pub fn path(&self) -> Option<&str> {
        flatten_str(&self.path)
    }
}

fn flatten_str(field: &Nullable<String>) -> Option<&str> {
    field.as_ref().and_then(|v| v.as_deref())
}

impl AnnotationFile {
    /// Convert a parsed JSON document into a record.
    ///
    /// A document without an `annotations` key is rejected with
    /// [`CoreError::MissingAnnotations`] so callers can tell "not an
    /// annotation file" apart from a structurally broken one.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        match value.as_object() {
            Some(obj) if obj.contains_key("annotations") => {}
            Some(_) => return Err(CoreError::MissingAnnotations),
            None => {
                return Err(CoreError::MalformedRecord(
                    "top-level JSON value is not an object".to_string(),
                ))
            }
        }
        serde_json::from_value(value).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }

    /// Parse a record from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        Self::from_value(value)
    }

    /// Serialize as pretty JSON with two-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::MalformedRecord(e.to_string()))
    }

    /// The image identifier, or `None` when the record carries none.
    pub fn image_id(&self) -> Option<String> {
        self.image.as_ref().and_then(ImageRef::id)
    }

    /// The image path, falling back to the image name.
    pub fn image_path(&self) -> Option<&str> {
        self.image.as_ref().and_then(|i| i.path().or(i.name()))
    }

    /// Iterate `(model, prompt_key, result)` over every prompt result.
    pub fn prompt_results(&self) -> impl Iterator<Item = (&str, &str, &PromptResult)> {
        self.annotations.iter().flat_map(|ann| {
            ann.prompts
                .iter()
                .map(move |(key, result)| (ann.model(), key.as_str(), result))
        })
    }
}

// ---------------------------------------------------------------------------
// ModelAnnotation
// ---------------------------------------------------------------------------

/// One model's full annotation pass over one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAnnotation {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub model: Nullable<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub temperature: Nullable<Number>,
    #[serde(default)]
    pub prompts: IndexMap<String, PromptResult>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelAnnotation {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: Some(Some(model.into())),
            temperature: None,
            prompts: IndexMap::new(),
            extra: Map::new(),
        }
    }

    /// The model name, [`UNKNOWN_MODEL`] when absent or `null`.
    pub fn model(&self) -> &str {
        flatten_str(&self.model).unwrap_or(UNKNOWN_MODEL)
    }

    pub fn get(&self, key: PromptKey) -> Option<&PromptResult> {
        self.prompts.get(key.as_str())
    }

    /// Sum of `total_tokens` across every prompt result of this pass.
    pub fn total_tokens(&self) -> u64 {
        self.prompts.values().map(PromptResult::total_tokens).sum()
    }
}

// ---------------------------------------------------------------------------
// PromptResult
// ---------------------------------------------------------------------------

/// The outcome of one prompt sent to one model.
///
/// Every field is optional on disk. Absent fields stay absent and explicit
/// `null`s stay `null` when the record is written back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResult {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub prompt_text: Nullable<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub response: Nullable<String>,
    /// Raw format tag; see [`ResponseFormat`](crate::prompt::ResponseFormat)
    /// for the known values.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub response_format: Nullable<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub response_data: Nullable<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub error: Nullable<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub token_metrics: Nullable<TokenMetrics>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub performance_metrics: Nullable<PerformanceMetrics>,
    /// Raw flag tags. Absent when the result is clean; tags outside
    /// [`QualityFlag`] are kept verbatim.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub quality_flags: Nullable<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptResult {
    /// A text result with only the prompt and the response set.
    pub fn text(prompt_text: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt_text: Some(Some(prompt_text.into())),
            response: Some(Some(response.into())),
            ..Default::default()
        }
    }

    pub fn prompt_text(&self) -> &str {
        flatten_str(&self.prompt_text).unwrap_or_default()
    }

    /// The response text, empty when absent or `null`.
    pub fn response(&self) -> &str {
        flatten_str(&self.response).unwrap_or_default()
    }

    pub fn response_format(&self) -> Option<&str> {
        flatten_str(&self.response_format)
    }

    pub fn error(&self) -> Option<&str> {
        flatten_str(&self.error)
    }

    pub fn response_data(&self) -> Option<&Value> {
        self.response_data
            .as_ref()
            .and_then(Option::as_ref)
            .filter(|v| !v.is_null())
    }

    pub fn token_metrics(&self) -> Option<&TokenMetrics> {
        self.token_metrics.as_ref().and_then(Option::as_ref)
    }

    pub fn performance_metrics(&self) -> Option<&PerformanceMetrics> {
        self.performance_metrics.as_ref().and_then(Option::as_ref)
    }

    /// Total token count, 0 when metrics are missing.
    pub fn total_tokens(&self) -> u64 {
        self.token_metrics()
            .and_then(TokenMetrics::total_count)
            .unwrap_or(0)
    }

    /// Response length in characters.
    pub fn response_length(&self) -> usize {
        self.response().chars().count()
    }

    /// Flag tags exactly as stored; empty when the result is clean.
    pub fn flag_tags(&self) -> &[String] {
        self.quality_flags
            .as_ref()
            .and_then(|f| f.as_deref())
            .unwrap_or(&[])
    }

    /// Stored flags that belong to the known vocabulary.
    pub fn flags(&self) -> Vec<QualityFlag> {
        self.flag_tags()
            .iter()
            .filter_map(|tag| QualityFlag::from_str(tag).ok())
            .collect()
    }

    /// True when any flag tag is stored, known or not.
    pub fn is_flagged(&self) -> bool {
        !self.flag_tags().is_empty()
    }

    /// True when one of the stored tags names one of `wanted`.
    pub fn has_any_flag(&self, wanted: &[QualityFlag]) -> bool {
        self.flag_tags()
            .iter()
            .any(|tag| wanted.iter().any(|flag| flag.as_str() == tag))
    }

    /// Replace the stored flags. An empty list removes the field.
    pub fn set_flags(&mut self, flags: &[QualityFlag]) {
        self.quality_flags = flags_field(flags);
    }
}

/// On-disk form of a flag list: absent when empty.
pub(crate) fn flags_field(flags: &[QualityFlag]) -> Nullable<Vec<String>> {
    if flags.is_empty() {
        None
    } else {
        Some(Some(flags.iter().map(|f| f.as_str().to_string()).collect()))
    }
}

/// Read a JSON number as a count: integers directly, non-negative floats
/// truncated.
fn as_count(field: &Nullable<Number>) -> Option<u64> {
    let number = field.as_ref().and_then(Option::as_ref)?;
    number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u64)
    })
}

/// Token accounting reported by the generation service. Numbers are kept
/// exactly as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenMetrics {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub input_tokens: Nullable<Number>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub output_tokens: Nullable<Number>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub total_tokens: Nullable<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenMetrics {
    pub fn new(input_tokens: u64, output_tokens: u64, total_tokens: u64) -> Self {
        Self {
            input_tokens: Some(Some(input_tokens.into())),
            output_tokens: Some(Some(output_tokens.into())),
            total_tokens: Some(Some(total_tokens.into())),
            extra: Map::new(),
        }
    }

    pub fn input_count(&self) -> Option<u64> {
        as_count(&self.input_tokens)
    }

    pub fn output_count(&self) -> Option<u64> {
        as_count(&self.output_tokens)
    }

    pub fn total_count(&self) -> Option<u64> {
        as_count(&self.total_tokens)
    }
}

/// Timing reported by the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub generation_duration_ms: Nullable<Number>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Nullable<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PerformanceMetrics {
    pub fn generation_duration_ms(&self) -> Option<&Number> {
        self.generation_duration_ms.as_ref().and_then(Option::as_ref)
    }
}

//! Generation-service seam used by re-annotation.
//!
//! The crate never talks to a model itself. Re-annotation takes any
//! [`Annotator`] and turns each outcome into a [`PromptResult`].

use std::path::Path;

use serde_json::{Map, Value};

use crate::prompt::{PromptDefinition, ResponseFormat};
use crate::record::{PerformanceMetrics, PromptResult, TokenMetrics};

/// What the generation service returns for one prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedResponse {
    pub prompt_text: String,
    pub response: String,
    pub response_format: ResponseFormat,
    pub response_data: Option<Value>,
    /// Diagnostic recorded by the service itself (e.g. a JSON parse failure).
    pub error: Option<String>,
    pub token_metrics: Option<TokenMetrics>,
    pub performance_metrics: Option<PerformanceMetrics>,
}

/// Errors raised when the generation call itself fails.
#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    /// The service could not be reached or the request failed in transit.
    #[error("Generation request failed: {0}")]
    Request(String),

    /// The service answered but the answer could not be used.
    #[error("Generation service error: {0}")]
    Service(String),

    #[error("Image not found: {0}")]
    ImageNotFound(String),
}

/// Blocking generation service: one image, one prompt, one model per call.
pub trait Annotator {
    fn annotate(
        &self,
        image_path: &Path,
        prompt: &PromptDefinition,
        model: &str,
    ) -> Result<GeneratedResponse, AnnotatorError>;
}

impl From<GeneratedResponse> for PromptResult {
    /// Every nullable field is written explicitly, `null` when absent.
    fn from(generated: GeneratedResponse) -> Self {
        PromptResult {
            prompt_text: Some(Some(generated.prompt_text)),
            response: Some(Some(generated.response)),
            response_format: Some(Some(generated.response_format.as_str().to_string())),
            response_data: Some(generated.response_data),
            error: Some(generated.error),
            token_metrics: Some(generated.token_metrics),
            performance_metrics: Some(generated.performance_metrics),
            quality_flags: None,
            extra: Map::new(),
        }
    }
}

impl PromptResult {
    /// Entry recorded when the generation call failed: empty response, the
    /// error message, and `null` data and metrics.
    pub fn generation_failed(prompt: &PromptDefinition, error: &AnnotatorError) -> Self {
        PromptResult {
            prompt_text: Some(Some(prompt.instruction_text.clone())),
            response: Some(Some(String::new())),
            response_format: Some(Some(prompt.expected_format.as_str().to_string())),
            response_data: Some(None),
            error: Some(Some(error.to_string())),
            token_metrics: Some(None),
            performance_metrics: Some(None),
            quality_flags: None,
            extra: Map::new(),
        }
    }
}

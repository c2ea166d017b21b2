#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown {kind} '{value}'. Valid values: {valid}")]
    UnknownVariant {
        kind: &'static str,
        value: String,
        valid: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("No 'annotations' field found")]
    MissingAnnotations,

    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

impl CoreError {
    /// Build an [`CoreError::UnknownVariant`] listing the accepted values.
    pub(crate) fn unknown(kind: &'static str, value: &str, valid: &[&str]) -> Self {
        CoreError::UnknownVariant {
            kind,
            value: value.to_string(),
            valid: valid.join(", "),
        }
    }
}

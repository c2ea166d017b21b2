use std::path::PathBuf;

use annocurate_core::CoreError;

/// Errors from reading, discovering and writing annotation files.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but has no `annotations` key.
    #[error("No 'annotations' field found in {}", .0.display())]
    MissingAnnotations(PathBuf),

    /// The document has `annotations` but does not fit the record model.
    #[error("Malformed record {}: {source}", path.display())]
    Record {
        path: PathBuf,
        #[source]
        source: CoreError,
    },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

//! Annotation quality curation core.
//!
//! Pure, file-free building blocks for curating multi-model image
//! annotation records:
//!
//! - [`record`]: lossless record model ([`AnnotationFile`] and friends).
//! - [`pattern`], [`inventory_schema`], [`classifier`]: defect detection.
//! - [`lifecycle`]: flag, list, remove and re-annotate prompt results.
//! - [`curation`]: reorder, remove and filter model annotations.
//! - [`report`], [`csv`]: the diagnostic report and CSV renderings.
//! - [`annotator`], [`platform`]: seams to the generation service and host.

pub mod annotator;
pub mod classifier;
pub mod csv;
pub mod curation;
pub mod error;
pub mod flags;
pub mod inventory_schema;
pub mod lifecycle;
pub mod pattern;
pub mod platform;
pub mod prompt;
pub mod record;
pub mod report;

pub use annotator::{Annotator, AnnotatorError, GeneratedResponse};
pub use classifier::{classify, Classification, ClassifierConfig};
pub use error::CoreError;
pub use flags::QualityFlag;
pub use pattern::RepetitionStrategy;
pub use prompt::{PromptCatalog, PromptDefinition, PromptKey};
pub use record::{AnnotationFile, ModelAnnotation, PromptResult};

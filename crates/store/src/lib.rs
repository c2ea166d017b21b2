//! Filesystem layer over `annocurate-core`.
//!
//! Resolves command-line inputs to annotation files, reads and writes
//! records, and runs the core operations over batches of files with
//! per-file error isolation.

pub mod batch;
pub mod curate;
pub mod error;
pub mod files;
pub mod quality;

pub use batch::{BatchReport, FileFailure};
pub use error::StoreError;
pub use files::{read_record, resolve_inputs, write_record, Persistence, DEFAULT_PATTERN};

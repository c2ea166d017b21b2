//! File discovery and record persistence.

use std::path::{Path, PathBuf};

use annocurate_core::{AnnotationFile, CoreError};

use crate::error::StoreError;

/// Default glob for annotation files inside a directory.
pub const DEFAULT_PATTERN: &str = "shared*.json";

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Expand the command-line inputs into the list of files to process.
///
/// Each input is a file (taken as-is) or a directory (expanded with
/// `pattern`, sorted, skipping names that start with `exclude_prefix`).
/// An input that does not exist fails the whole call.
pub fn resolve_inputs(
    inputs: &[PathBuf],
    pattern: &str,
    exclude_prefix: Option<&str>,
) -> Result<Vec<PathBuf>, StoreError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            files.extend(glob_dir(input, pattern, exclude_prefix)?);
        } else {
            return Err(StoreError::PathNotFound(input.clone()));
        }
    }
    Ok(files)
}

/// Files in `dir` matching `pattern`, sorted by path.
pub fn glob_dir(
    dir: &Path,
    pattern: &str,
    exclude_prefix: Option<&str>,
) -> Result<Vec<PathBuf>, StoreError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let full_pattern = Path::new(&escaped).join(pattern);
    let full_pattern = full_pattern.to_string_lossy();

    let entries = glob::glob(&full_pattern).map_err(|source| StoreError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => {
                let excluded = exclude_prefix.is_some_and(|prefix| {
                    path.file_name()
                        .is_some_and(|name| name.to_string_lossy().starts_with(prefix))
                });
                if !excluded {
                    files.push(path);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e, "Skipping unreadable path");
            }
        }
    }
    files.sort();
    Ok(files)
}

// ---------------------------------------------------------------------------
// Reading / writing
// ---------------------------------------------------------------------------

/// Read and parse one annotation file.
pub fn read_record(path: &Path) -> Result<AnnotationFile, StoreError> {
    let text = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    AnnotationFile::from_value(value).map_err(|e| match e {
        CoreError::MissingAnnotations => StoreError::MissingAnnotations(path.to_path_buf()),
        source => StoreError::Record {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Write a record as two-space indented JSON, replacing the file.
pub fn write_record(path: &Path, record: &AnnotationFile) -> Result<(), StoreError> {
    let text = record.to_json_pretty()?;
    std::fs::write(path, text).map_err(|e| StoreError::io(path, e))
}

/// Where a modified record goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Replace the source file.
    #[default]
    Overwrite,
    /// Write to this directory under the source file name.
    WriteTo(PathBuf),
    /// Compute only; never write.
    DryRun,
}

impl Persistence {
    pub fn from_options(output_dir: Option<PathBuf>, dry_run: bool) -> Self {
        match (dry_run, output_dir) {
            (true, _) => Persistence::DryRun,
            (false, Some(dir)) => Persistence::WriteTo(dir),
            (false, None) => Persistence::Overwrite,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, Persistence::DryRun)
    }

    /// Destination for a record read from `source`; `None` in dry-run mode.
    pub fn target(&self, source: &Path) -> Option<PathBuf> {
        match self {
            Persistence::Overwrite => Some(source.to_path_buf()),
            Persistence::WriteTo(dir) => Some(dir.join(source.file_name().unwrap_or_default())),
            Persistence::DryRun => None,
        }
    }

    /// Persist `record`. Returns the path written, if any.
    pub fn save(&self, source: &Path, record: &AnnotationFile) -> Result<Option<PathBuf>, StoreError> {
        let Some(target) = self.target(source) else {
            tracing::debug!(path = %source.display(), "Dry run; not writing");
            return Ok(None);
        };
        if let Persistence::WriteTo(dir) = self {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        write_record(&target, record)?;
        Ok(Some(target))
    }
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

/// Locate the image of `record` under `image_dir`.
///
/// Tries `image.name` (or the file name of `image.path`), then the same name
/// with `.png` swapped for `.jpg`.
pub fn resolve_image_path(image_dir: &Path, record: &AnnotationFile) -> Option<PathBuf> {
    let image = record.image.as_ref()?;
    let name = match image.name() {
        Some(name) => name.to_string(),
        None => Path::new(image.path()?)
            .file_name()?
            .to_string_lossy()
            .into_owned(),
    };

    let direct = image_dir.join(&name);
    if direct.is_file() {
        return Some(direct);
    }
    let jpg = image_dir.join(name.replace(".png", ".jpg"));
    jpg.is_file().then_some(jpg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_from_options() {
        assert_eq!(Persistence::from_options(None, false), Persistence::Overwrite);
        assert_eq!(
            Persistence::from_options(Some(PathBuf::from("out")), false),
            Persistence::WriteTo(PathBuf::from("out"))
        );
        assert_eq!(
            Persistence::from_options(Some(PathBuf::from("out")), true),
            Persistence::DryRun
        );
    }

    #[test]
    fn persistence_targets() {
        let source = Path::new("/data/shared_1.json");
        assert_eq!(Persistence::Overwrite.target(source), Some(source.to_path_buf()));
        assert_eq!(
            Persistence::WriteTo(PathBuf::from("/out")).target(source),
            Some(PathBuf::from("/out/shared_1.json"))
        );
        assert_eq!(Persistence::DryRun.target(source), None);
    }
}

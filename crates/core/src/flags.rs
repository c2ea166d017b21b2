//! Quality flag vocabulary.
//!
//! A flag marks one detected defect on a prompt result. Flags are stored in
//! the record's `quality_flags` list and drive which entries get stripped
//! for re-annotation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All valid flag strings, in classification order.
pub const VALID_FLAGS: &[&str] = &[
    "too_long",
    "json_parse_error",
    "repetitive_pattern",
    "empty_response",
    "invalid_schema",
    "file_error",
];

/// A defect detected on a single prompt result (or, for `FileError`, on a
/// whole file that could not be processed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    TooLong,
    JsonParseError,
    RepetitivePattern,
    EmptyResponse,
    InvalidSchema,
    FileError,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooLong => "too_long",
            Self::JsonParseError => "json_parse_error",
            Self::RepetitivePattern => "repetitive_pattern",
            Self::EmptyResponse => "empty_response",
            Self::InvalidSchema => "invalid_schema",
            Self::FileError => "file_error",
        }
    }

    /// Parse from the wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "too_long" => Ok(Self::TooLong),
            "json_parse_error" => Ok(Self::JsonParseError),
            "repetitive_pattern" => Ok(Self::RepetitivePattern),
            "empty_response" => Ok(Self::EmptyResponse),
            "invalid_schema" => Ok(Self::InvalidSchema),
            "file_error" => Ok(Self::FileError),
            _ => Err(CoreError::unknown("quality flag", s, VALID_FLAGS)),
        }
    }

    /// Parse a comma-separated list such as `too_long,empty_response`.
    ///
    /// Blank segments are ignored; duplicates collapse to one entry.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, CoreError> {
        let mut flags = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let flag = Self::from_str(part)?;
            if !flags.contains(&flag) {
                flags.push(flag);
            }
        }
        Ok(flags)
    }
}

impl std::fmt::Display for QualityFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join flags with commas, the format used in report rows.
pub fn join_flags(flags: &[QualityFlag]) -> String {
    flags
        .iter()
        .map(QualityFlag::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

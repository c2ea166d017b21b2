//! Degenerate-repetition detection for generated text.
//!
//! A generator stuck in a loop tends to repeat the same short token or phrase
//! until it hits its output limit. Two strategies look for that:
//!
//! - [`detect_repetitive_pattern`] scans prefixes of length 1..=50 and then
//!   falls back to whole-word frequency. It reports what it found.
//! - [`has_repetitive_pattern`] only answers yes/no. It ignores short texts,
//!   checks the tail for a known corruption marker and scans prefixes of
//!   length 2..=10.
//!
//! The two are intentionally kept separate; see [`RepetitionStrategy`].

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Repeat threshold used when a detection should become a persisted flag.
pub const FLAG_MIN_REPEATS: usize = 50;

/// Repeat threshold for informational reports.
pub const DIAGNOSTIC_MIN_REPEATS: usize = 10;

/// Longest prefix considered by the full scan.
pub const MAX_PATTERN_LENGTH: usize = 50;

/// The word-level fallback only runs on texts with more words than this.
pub const MIN_WORDS_FOR_WORD_SCAN: usize = 20;

/// Texts of this many characters or fewer are never flagged by the quick scan.
pub const QUICK_SCAN_MIN_LENGTH: usize = 1000;

/// Number of trailing characters searched for [`CORRUPTION_MARKER`].
pub const QUICK_SCAN_TAIL_CHARS: usize = 500;

/// Prefix lengths scanned by the quick variant.
pub const QUICK_SCAN_LENGTHS: std::ops::RangeInclusive<usize> = 2..=10;

/// Marker emitted by some models once their output degenerates.
pub const CORRUPTION_MARKER: &str = "!#system";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a pattern was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// A prefix of the text recurs throughout it.
    Substring,
    /// A single word dominates the text.
    Word,
}

/// A detected repetition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternInfo {
    pub kind: PatternKind,
    /// The repeated prefix (at most [`MAX_PATTERN_LENGTH`] chars) or word.
    pub pattern: String,
    pub count: usize,
    /// Length of the pattern in characters.
    pub pattern_length: usize,
}

impl PatternInfo {
    /// Human-readable pattern description, `word: <w>` for word repeats.
    pub fn describe(&self) -> String {
        match self.kind {
            PatternKind::Substring => self.pattern.clone(),
            PatternKind::Word => format!("word: {}", self.pattern),
        }
    }

    /// Short summary used in report rows: first 30 chars and the count.
    pub fn summary(&self) -> String {
        let described = self.describe();
        format!("{}... x{}", prefix_chars(&described, 30), self.count)
    }
}

/// Which repetition check to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepetitionStrategy {
    /// Prefix lengths 1..=50 plus the word fallback.
    FullScan,
    /// Tail marker plus prefix lengths 2..=10, skipped for short texts.
    #[default]
    QuickScan,
}

impl RepetitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullScan => "full",
            Self::QuickScan => "quick",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "full" => Ok(Self::FullScan),
            "quick" => Ok(Self::QuickScan),
            _ => Err(CoreError::unknown("repetition strategy", s, &["quick", "full"])),
        }
    }

    /// Run the strategy. Only the full scan can describe what it found.
    pub fn detect(&self, text: &str, min_repeats: usize) -> Detection {
        match self {
            Self::FullScan => match detect_repetitive_pattern(text, min_repeats) {
                Some(info) => Detection::Found(Some(info)),
                None => Detection::Clean,
            },
            Self::QuickScan => {
                if has_repetitive_pattern(text, min_repeats) {
                    Detection::Found(None)
                } else {
                    Detection::Clean
                }
            }
        }
    }
}

/// Outcome of a [`RepetitionStrategy`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Clean,
    /// Repetition found; details are present for the full scan only.
    Found(Option<PatternInfo>),
}

impl Detection {
    pub fn is_found(&self) -> bool {
        matches!(self, Detection::Found(_))
    }

    pub fn into_info(self) -> Option<PatternInfo> {
        match self {
            Detection::Found(info) => info,
            Detection::Clean => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Full repetition scan.
///
/// For each prefix length from 1 to [`MAX_PATTERN_LENGTH`] (lengths beyond the
/// text are skipped), counts non-overlapping occurrences of that prefix in the
/// whole text and returns the first, shortest one reaching `min_repeats`.
/// Otherwise, when the text has more than [`MIN_WORDS_FOR_WORD_SCAN`] words,
/// reports the most frequent word if it reaches `min_repeats` (ties go to the
/// word seen first).
pub fn detect_repetitive_pattern(text: &str, min_repeats: usize) -> Option<PatternInfo> {
    let char_len = text.chars().count();

    for pattern_len in 1..=MAX_PATTERN_LENGTH.min(char_len) {
        let pattern = prefix_chars(text, pattern_len);
        let count = text.matches(pattern).count();
        if count >= min_repeats {
            return Some(PatternInfo {
                kind: PatternKind::Substring,
                pattern: pattern.to_string(),
                count,
                pattern_length: pattern_len,
            });
        }
    }

    most_frequent_word(text)
        .filter(|(_, count)| *count >= min_repeats)
        .map(|(word, count)| PatternInfo {
            kind: PatternKind::Word,
            pattern: word.to_string(),
            count,
            pattern_length: word.chars().count(),
        })
}

/// Quick yes/no repetition check for the flagging path.
pub fn has_repetitive_pattern(text: &str, min_repeats: usize) -> bool {
    let char_len = text.chars().count();
    if char_len <= QUICK_SCAN_MIN_LENGTH {
        return false;
    }

    if suffix_chars(text, QUICK_SCAN_TAIL_CHARS).contains(CORRUPTION_MARKER) {
        return true;
    }

    QUICK_SCAN_LENGTHS
        .filter(|len| *len <= char_len)
        .any(|len| text.matches(prefix_chars(text, len)).count() >= min_repeats)
}

/// Most frequent whitespace-separated word, only for texts with more than
/// [`MIN_WORDS_FOR_WORD_SCAN`] words.
fn most_frequent_word(text: &str) -> Option<(&str, usize)> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    let mut total = 0usize;
    for word in text.split_whitespace() {
        *counts.entry(word).or_insert(0) += 1;
        total += 1;
    }
    if total <= MIN_WORDS_FOR_WORD_SCAN {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;
    for (word, count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((word, count)),
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Char-boundary helpers
// ---------------------------------------------------------------------------

/// First `n` characters of `text` (whole text if shorter).
fn prefix_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Last `n` characters of `text` (whole text if shorter).
fn suffix_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

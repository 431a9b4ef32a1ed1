//! Content-quality heuristics deciding whether a cleaned chunk is worth indexing.

use std::collections::HashSet;
use thiserror::Error;

/// Tunable limits applied by [`ChunkValidator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationThresholds {
    /// Minimum length in characters.
    pub min_length: usize,
    /// Minimum share of ASCII letters and digits over the total length.
    pub min_alnum_density: f64,
    /// Minimum number of distinct characters after lower-casing.
    pub min_distinct_chars: usize,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_length: 100,
            min_alnum_density: 0.70,
            min_distinct_chars: 10,
        }
    }
}

/// Why a chunk was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChunkRejection {
    /// Fragment too small to carry standalone meaning.
    #[error("too short ({length} < {min} characters)")]
    TooShort {
        /// Observed length.
        length: usize,
        /// Configured minimum.
        min: usize,
    },
    /// Mostly punctuation, table rules, or OCR noise.
    #[error("too many special characters (alphanumeric density {density:.2} < {min:.2})")]
    TooManySpecialCharacters {
        /// Observed alphanumeric density.
        density: f64,
        /// Configured minimum.
        min: f64,
    },
    /// Degenerate content built from very few symbols.
    #[error("too repetitive ({distinct} distinct characters < {min})")]
    TooRepetitive {
        /// Observed number of distinct characters.
        distinct: usize,
        /// Configured minimum.
        min: usize,
    },
}

/// Accepts or rejects cleaned chunk text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkValidator {
    thresholds: ValidationThresholds,
}

impl ChunkValidator {
    /// Build a validator with the given thresholds.
    pub fn new(thresholds: ValidationThresholds) -> Self {
        Self { thresholds }
    }

    /// Thresholds in effect.
    pub fn thresholds(&self) -> ValidationThresholds {
        self.thresholds
    }

    /// Check `text`, returning the first rule it breaks.
    pub fn validate(&self, text: &str) -> Result<(), ChunkRejection> {
        let ValidationThresholds {
            min_length,
            min_alnum_density,
            min_distinct_chars,
        } = self.thresholds;

        let length = text.chars().count();
        if length == 0 || length < min_length {
            return Err(ChunkRejection::TooShort {
                length,
                min: min_length,
            });
        }

        let alphanumeric = text.chars().filter(char::is_ascii_alphanumeric).count();
        let density = alphanumeric as f64 / length as f64;
        if density < min_alnum_density {
            return Err(ChunkRejection::TooManySpecialCharacters {
                density,
                min: min_alnum_density,
            });
        }

        let distinct = text.to_lowercase().chars().collect::<HashSet<_>>().len();
        if distinct < min_distinct_chars {
            return Err(ChunkRejection::TooRepetitive {
                distinct,
                min: min_distinct_chars,
            });
        }

        Ok(())
    }

    /// Convenience wrapper over [`ChunkValidator::validate`].
    pub fn is_valid(&self, text: &str) -> bool {
        self.validate(text).is_ok()
    }
}

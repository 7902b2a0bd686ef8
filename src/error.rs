//! Error Module
//!
//! Every fatal condition a scan can hit. Unmatched OCR candidates are not
//! errors; the matcher drops them and logs a warning.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Cannot open video {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },

    #[error("Video decoding failed: {0}")]
    Decode(String),

    #[error("Row image {index} is {found}px wide, expected {expected}px")]
    ImageDimensionMismatch {
        index: usize,
        expected: u32,
        found: u32,
    },

    #[error("OCR engine failed: {0}")]
    OcrEngine(String),

    #[error("Failed to load vocabulary from {path:?}: {reason}")]
    VocabularyLoad { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

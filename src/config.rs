//! Configuration Module
//!
//! The calibration surface of a scan. Defaults match a 1080p capture of the
//! in-game catalog screen.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Scan configuration, loadable from a JSON file. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// First frame row of the region containing the catalog list.
    pub roi_top: u32,
    /// One past the last frame row of the region.
    pub roi_bottom: u32,
    pub roi_left: u32,
    pub roi_right: u32,
    /// Row heights must fall strictly between these two values (pixels).
    pub row_min_height: u32,
    pub row_max_height: u32,
    /// Left-edge pixels darker than this are separator pixels.
    pub separator_intensity_threshold: u8,
    /// Pixels trimmed below and above each separator.
    pub row_inset: u32,
    /// Only every n-th decoded frame is segmented.
    pub frame_sample_stride: usize,
    pub fuzzy_match_cutoff: f64,
    /// Tesseract language code.
    pub ocr_language: String,
    /// Location of the tesseract language files. Defaults to the tesseract-rs cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tessdata_dir: Option<PathBuf>,
    /// Upper bound on rows per OCR invocation. `None` runs OCR once over every row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_batch_rows: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roi_top: 150,
            roi_bottom: 630,
            roi_left: 635,
            roi_right: 1050,
            row_min_height: 40,
            row_max_height: 60,
            separator_intensity_threshold: 200,
            row_inset: 5,
            frame_sample_stride: 3,
            fuzzy_match_cutoff: 0.8,
            ocr_language: "eng".to_string(),
            tessdata_dir: None,
            ocr_batch_rows: None,
        }
    }
}

impl ScanConfig {
    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ScanError::InvalidConfig(format!("cannot read {:?}: {}", path, e))
        })?;
        let config: ScanConfig = serde_json::from_str(&raw).map_err(|e| {
            ScanError::InvalidConfig(format!("cannot parse {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.roi_bottom <= self.roi_top {
            return Err(ScanError::InvalidConfig(format!(
                "roi_bottom ({}) must be greater than roi_top ({})",
                self.roi_bottom, self.roi_top
            )));
        }
        if self.roi_right <= self.roi_left {
            return Err(ScanError::InvalidConfig(format!(
                "roi_right ({}) must be greater than roi_left ({})",
                self.roi_right, self.roi_left
            )));
        }
        if self.row_max_height <= self.row_min_height {
            return Err(ScanError::InvalidConfig(format!(
                "row_max_height ({}) must be greater than row_min_height ({})",
                self.row_max_height, self.row_min_height
            )));
        }
        if self
            .row_inset
            .checked_mul(2)
            .is_none_or(|trim| trim >= self.row_max_height)
        {
            return Err(ScanError::InvalidConfig(format!(
                "row_inset ({}) leaves no text area in rows shorter than {}px",
                self.row_inset, self.row_max_height
            )));
        }
        if self.frame_sample_stride == 0 {
            return Err(ScanError::InvalidConfig(
                "frame_sample_stride must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_match_cutoff) {
            return Err(ScanError::InvalidConfig(format!(
                "fuzzy_match_cutoff ({}) must be within [0.0, 1.0]",
                self.fuzzy_match_cutoff
            )));
        }
        if self.ocr_batch_rows == Some(0) {
            return Err(ScanError::InvalidConfig(
                "ocr_batch_rows must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

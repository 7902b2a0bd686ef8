//! Row Segmenter Module
//!
//! Splits one catalog frame into item rows using the dashed separator lines
//! drawn at the left edge of the list.

use crate::config::ScanConfig;
use image::GrayImage;
use image::imageops;

/// Detects separator lines and crops the rows between them.
#[derive(Debug, Clone)]
pub struct RowSegmenter {
    threshold: u8,
    min_height: u32,
    max_height: u32,
    inset: u32,
}

impl RowSegmenter {
    pub fn new(threshold: u8, min_height: u32, max_height: u32, inset: u32) -> Self {
        RowSegmenter {
            threshold,
            min_height,
            max_height,
            inset,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.separator_intensity_threshold,
            config.row_min_height,
            config.row_max_height,
            config.row_inset,
        )
    }

    /// Row indices whose leftmost pixel is darker than the threshold, ascending.
    pub fn separator_rows(&self, frame: &GrayImage) -> Vec<u32> {
        if frame.width() == 0 {
            return Vec::new();
        }
        (0..frame.height())
            .filter(|&y| frame.get_pixel(0, y)[0] < self.threshold)
            .collect()
    }

    /// Consecutive boundary pairs whose gap is a plausible row height.
    ///
    /// The top edge of the frame counts as a boundary since the first row has
    /// no separator above it.
    pub fn row_bounds(&self, frame: &GrayImage) -> Vec<(u32, u32)> {
        let separators = self.separator_rows(frame);
        if separators.is_empty() {
            return Vec::new();
        }
        let mut lines = Vec::with_capacity(separators.len() + 1);
        lines.push(0);
        lines.extend(separators);

        lines
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .filter(|&(y1, y2)| {
                y2 > y1 && y2 - y1 > self.min_height && y2 - y1 < self.max_height
            })
            .collect()
    }

    /// Yields the text area of every detected row, top to bottom, at full width.
    pub fn segment<'a>(&'a self, frame: &'a GrayImage) -> impl Iterator<Item = GrayImage> + 'a {
        self.row_bounds(frame)
            .into_iter()
            .filter_map(move |(y1, y2)| {
                let top = y1.checked_add(self.inset)?;
                let bottom = y2.checked_sub(self.inset)?;
                if bottom <= top {
                    return None;
                }
                Some(imageops::crop_imm(frame, 0, top, frame.width(), bottom - top).to_image())
            })
    }
}

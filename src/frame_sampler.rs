//! Frame Sampler Module
//!
//! Walks a frame source, segments every n-th frame and collects the rows.

use crate::error::ScanError;
use crate::row_segmenter::RowSegmenter;
use crate::video_processor::FrameSource;
use image::GrayImage;
use log::{debug, info};
use std::time::Instant;

/// Row images collected across a video, in detection order.
///
/// Frame boundaries are kept so OCR can be split into windows without
/// separating rows that came from the same frame.
#[derive(Debug, Default, Clone)]
pub struct RowImageBatch {
    rows: Vec<GrayImage>,
    frame_row_counts: Vec<usize>,
}

impl RowImageBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the rows found in one frame.
    pub fn push_frame(&mut self, rows: impl IntoIterator<Item = GrayImage>) {
        let before = self.rows.len();
        self.rows.extend(rows);
        let added = self.rows.len() - before;
        if added > 0 {
            self.frame_row_counts.push(added);
        }
    }

    pub fn rows(&self) -> &[GrayImage] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Groups whole frames into slices of at most `max_rows` rows. A frame with
    /// more rows than `max_rows` becomes a window of its own. `None` yields a
    /// single window holding every row.
    pub fn windows(&self, max_rows: Option<usize>) -> Vec<&[GrayImage]> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let Some(max_rows) = max_rows else {
            return vec![&self.rows[..]];
        };

        let mut windows = Vec::new();
        let mut start = 0;
        let mut end = 0;
        for &count in &self.frame_row_counts {
            if end > start && end - start + count > max_rows {
                windows.push(&self.rows[start..end]);
                start = end;
            }
            end += count;
        }
        if end > start {
            windows.push(&self.rows[start..end]);
        }
        windows
    }
}

/// Holds the rows gathered by a sampling pass plus its counters.
pub struct SampleResult {
    pub batch: RowImageBatch,
    pub frames_seen: usize,
    pub frames_sampled: usize,
}

/// A stateful sampler that segments every n-th frame it is handed.
pub struct FrameSampler {
    segmenter: RowSegmenter,
    stride: usize,
    start_time: Instant,
    frame_index: usize,
    frames_sampled: usize,
    batch: RowImageBatch,
}

impl FrameSampler {
    pub fn new(segmenter: RowSegmenter, stride: usize) -> Self {
        FrameSampler {
            segmenter,
            stride: stride.max(1),
            start_time: Instant::now(),
            frame_index: 0,
            frames_sampled: 0,
            batch: RowImageBatch::new(),
        }
    }

    /// Processes a single frame in decode order.
    pub fn process_frame(&mut self, frame: &GrayImage) {
        if self.frame_index % self.stride == 0 {
            let before = self.batch.len();
            self.batch.push_frame(self.segmenter.segment(frame));
            self.frames_sampled += 1;
            debug!(
                "Frame {}: {} rows",
                self.frame_index,
                self.batch.len() - before
            );
        }
        self.frame_index += 1;
    }

    pub fn finish(self) -> SampleResult {
        info!(
            "Frame sampling complete in {:.2?}. Seen {}, sampled {}, rows {}.",
            self.start_time.elapsed(),
            self.frame_index,
            self.frames_sampled,
            self.batch.len()
        );
        SampleResult {
            batch: self.batch,
            frames_seen: self.frame_index,
            frames_sampled: self.frames_sampled,
        }
    }
}

/// Feeds every frame of `source` to `sampler`, calling `on_frame` after each.
///
/// The source is closed before returning, whether it ran dry or failed.
pub fn drain_source<S, F>(
    source: &mut S,
    sampler: &mut FrameSampler,
    on_frame: F,
) -> Result<(), ScanError>
where
    S: FrameSource + ?Sized,
    F: FnMut(),
{
    let result = pump_frames(source, sampler, on_frame);
    source.close();
    result
}

fn pump_frames<S, F>(source: &mut S, sampler: &mut FrameSampler, mut on_frame: F) -> Result<(), ScanError>
where
    S: FrameSource + ?Sized,
    F: FnMut(),
{
    while let Some(frame) = source.next_frame()? {
        sampler.process_frame(&frame);
        on_frame();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use std::collections::VecDeque;

    fn frame_with_separators(separators: &[u32], shade: u8) -> GrayImage {
        let mut frame = GrayImage::from_pixel(8, 160, Luma([shade]));
        for &y in separators {
            frame.put_pixel(0, y, Luma([0]));
        }
        frame
    }

    fn row(shade: u8) -> GrayImage {
        GrayImage::from_pixel(8, 4, Luma([shade]))
    }

    struct VecSource {
        frames: VecDeque<Result<GrayImage, ScanError>>,
        open: bool,
    }

    impl VecSource {
        fn new(frames: Vec<Result<GrayImage, ScanError>>) -> Self {
            VecSource {
                frames: frames.into(),
                open: true,
            }
        }
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError> {
            match self.frames.pop_front() {
                Some(frame) => frame.map(Some),
                None => Ok(None),
            }
        }

        fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }
    }

    fn sampler(stride: usize) -> FrameSampler {
        FrameSampler::new(RowSegmenter::new(200, 40, 60, 5), stride)
    }

    #[test]
    fn segments_every_third_frame() {
        let mut sampler = sampler(3);
        for i in 0..7u8 {
            // each frame yields two rows, shaded by frame index
            sampler.process_frame(&frame_with_separators(&[50, 100], 250 - i));
        }
        let result = sampler.finish();
        assert_eq!(result.frames_seen, 7);
        assert_eq!(result.frames_sampled, 3);
        assert_eq!(result.batch.len(), 6);

        let shades: Vec<u8> = result.batch.rows().iter().map(|r| r.get_pixel(3, 3)[0]).collect();
        assert_eq!(shades, vec![250, 250, 247, 247, 244, 244]);
    }

    #[test]
    fn empty_frames_add_no_boundary() {
        let mut batch = RowImageBatch::new();
        batch.push_frame(vec![row(1), row(2)]);
        batch.push_frame(Vec::new());
        batch.push_frame(vec![row(3)]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.windows(Some(2)).len(), 2);
    }

    #[test]
    fn windows_respect_frame_boundaries() {
        let mut batch = RowImageBatch::new();
        batch.push_frame(vec![row(1), row(2)]);
        batch.push_frame(vec![row(3), row(4)]);
        batch.push_frame(vec![row(5), row(6), row(7), row(8), row(9)]);
        batch.push_frame(vec![row(10)]);

        let sizes: Vec<usize> = batch.windows(Some(4)).iter().map(|w| w.len()).collect();
        assert_eq!(sizes, vec![4, 5, 1]);

        let all = batch.windows(None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 10);

        assert!(RowImageBatch::new().windows(None).is_empty());
    }

    #[test]
    fn drain_closes_source_at_end_of_stream() {
        let mut source = VecSource::new(vec![
            Ok(frame_with_separators(&[50, 100], 255)),
            Ok(frame_with_separators(&[50], 255)),
        ]);
        let mut sampler = sampler(1);
        let mut seen = 0;
        drain_source(&mut source, &mut sampler, || seen += 1).unwrap();
        assert!(!source.is_open());
        assert_eq!(seen, 2);
        assert_eq!(sampler.finish().batch.len(), 3);
    }

    #[test]
    fn drain_closes_source_on_error() {
        let mut source = VecSource::new(vec![
            Ok(frame_with_separators(&[50], 255)),
            Err(ScanError::Decode("corrupt packet".to_string())),
            Ok(frame_with_separators(&[50], 255)),
        ]);
        let mut sampler = sampler(1);
        let err = drain_source(&mut source, &mut sampler, || {}).unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
        assert!(!source.is_open());
    }

    #[test]
    fn drains_frames_that_yield_nothing() {
        let mut source = VecSource::new(vec![
            Ok(frame_with_separators(&[], 255)),
            Ok(frame_with_separators(&[], 255)),
            Ok(frame_with_separators(&[], 255)),
        ]);
        let mut sampler = sampler(3);
        drain_source(&mut source, &mut sampler, || {}).unwrap();
        assert!(source.frames.is_empty());
        let result = sampler.finish();
        assert_eq!(result.frames_seen, 3);
        assert!(result.batch.is_empty());
    }
}

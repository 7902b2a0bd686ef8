//! Video Processor Module
//!
//! Decodes a video with FFmpeg and hands out grayscale crops of the catalog
//! region, one per decoded frame.

use crate::config::ScanConfig;
use crate::error::ScanError;
use ffmpeg_next as ffmpeg;
use ffmpeg::format::{Pixel, input};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{Context as ScalingContext, flag::Flags};
use ffmpeg::util::error::EAGAIN;
use ffmpeg::util::frame::video::Video;
use image::GrayImage;
use image::imageops;
use log::debug;
use std::path::{Path, PathBuf};

/// Rectangle of each frame that contains the catalog list, in native pixel
/// coordinates. `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Roi {
    pub fn from_config(config: &ScanConfig) -> Self {
        Roi {
            top: config.roi_top,
            bottom: config.roi_bottom,
            left: config.roi_left,
            right: config.roi_right,
        }
    }

    /// Crops `frame` to the region, clamped to the frame's bounds.
    pub fn crop(&self, frame: &GrayImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        let left = self.left.min(width);
        let top = self.top.min(height);
        let right = self.right.clamp(left, width);
        let bottom = self.bottom.clamp(top, height);
        imageops::crop_imm(frame, left, top, right - left, bottom - top).to_image()
    }
}

/// A lazy, finite sequence of grayscale region-of-interest frames.
///
/// Implementations hold their decoding resources until the sequence ends, an
/// error is returned, or `close` is called.
pub trait FrameSource {
    /// Returns the next frame in playback order, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError>;

    /// Releases the decode handle. Calling it twice is a no-op.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

/// Frame count from container metadata, falling back to duration times the
/// average frame rate. Only an estimate for variable frame rate videos.
fn estimate_frame_count(stream: &ffmpeg::Stream, duration: i64) -> Option<u64> {
    let frames = stream.frames();
    if frames > 0 {
        return Some(frames as u64);
    }

    let frame_rate = stream.avg_frame_rate();
    if duration > 0 && frame_rate.0 > 0 && frame_rate.1 > 0 {
        // AV_TIME_BASE units (microseconds)
        let seconds = duration as f64 / 1_000_000.0;
        let fps = frame_rate.0 as f64 / frame_rate.1 as f64;
        return Some((seconds * fps).round() as u64);
    }
    None
}

/// Everything FFmpeg needs to keep decoding one video stream.
struct DecodeState {
    ictx: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ScalingContext,
    stream_index: usize,
    frame_count_hint: Option<u64>,
    eof_sent: bool,
}

impl DecodeState {
    fn open(path: &Path) -> Result<Self, ScanError> {
        let unavailable = |reason: String| ScanError::SourceUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        ffmpeg::init().map_err(|e| unavailable(format!("FFmpeg init failed: {}", e)))?;
        let ictx = input(path).map_err(|e| unavailable(e.to_string()))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or_else(|| unavailable("no video stream".to_string()))?;
        let stream_index = stream.index();
        let frame_count_hint = estimate_frame_count(&stream, ictx.duration());

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| unavailable(format!("cannot create decoder context: {}", e)))?;
        let decoder = context_decoder
            .decoder()
            .video()
            .map_err(|e| unavailable(format!("cannot create video decoder: {}", e)))?;

        let scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::GRAY8,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )
        .map_err(|e| unavailable(format!("cannot create scaler: {}", e)))?;

        Ok(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            frame_count_hint,
            eof_sent: false,
        })
    }

    /// Pulls packets until the decoder yields a frame or the stream is drained.
    fn next_gray(&mut self) -> Result<Option<GrayImage>, ScanError> {
        loop {
            let mut decoded = Video::empty();
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.convert_frame(&decoded).map(Some),
                Err(ffmpeg::Error::Eof) => return Ok(None),
                // The decoder wants more input.
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN && !self.eof_sent => {}
                Err(e) => return Err(ScanError::Decode(format!("receive frame: {}", e))),
            }

            let next = self
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match next {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder
                        .send_packet(&packet)
                        .map_err(|e| ScanError::Decode(format!("send packet: {}", e)))?;
                }
                Some(_) => {}
                None => {
                    self.decoder
                        .send_eof()
                        .map_err(|e| ScanError::Decode(format!("send eof: {}", e)))?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert_frame(&mut self, decoded: &Video) -> Result<GrayImage, ScanError> {
        let mut gray_frame = Video::empty();
        self.scaler
            .run(decoded, &mut gray_frame)
            .map_err(|e| ScanError::Decode(format!("scaler failed: {}", e)))?;

        let frame_data = gray_frame.data(0);
        let width = gray_frame.width() as usize;
        let height = gray_frame.height() as usize;
        let stride = gray_frame.stride(0);
        if stride < width {
            return Err(ScanError::Decode(format!(
                "invalid frame stride {} for width {}",
                stride, width
            )));
        }

        let mut pixels = Vec::with_capacity(width * height);
        for y in 0..height {
            let start = y * stride;
            let end = start + width;
            if end > frame_data.len() {
                return Err(ScanError::Decode(
                    "frame data is smaller than expected".to_string(),
                ));
            }
            pixels.extend_from_slice(&frame_data[start..end]);
        }

        GrayImage::from_raw(width as u32, height as u32, pixels).ok_or_else(|| {
            ScanError::Decode("failed to create image buffer from frame data".to_string())
        })
    }
}

/// Frame source backed by an FFmpeg decoder.
///
/// The decoder is released as soon as the stream ends or fails, and on drop
/// if the consumer stops early.
pub struct VideoFrameSource {
    path: PathBuf,
    roi: Roi,
    state: Option<DecodeState>,
    frames_decoded: usize,
}

impl VideoFrameSource {
    pub fn open(path: &Path, roi: Roi) -> Result<Self, ScanError> {
        let state = DecodeState::open(path)?;
        debug!("Opened video decoder for {:?}", path);
        Ok(VideoFrameSource {
            path: path.to_path_buf(),
            roi,
            state: Some(state),
            frames_decoded: 0,
        })
    }

    pub fn frames_decoded(&self) -> usize {
        self.frames_decoded
    }

    /// Total frames the container claims to hold, if it says.
    pub fn frame_count_hint(&self) -> Option<u64> {
        self.state.as_ref().and_then(|state| state.frame_count_hint)
    }
}

impl FrameSource for VideoFrameSource {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, ScanError> {
        let result = match self.state.as_mut() {
            Some(state) => state.next_gray(),
            None => return Ok(None),
        };
        match result {
            Ok(Some(frame)) => {
                self.frames_decoded += 1;
                Ok(Some(self.roi.crop(&frame)))
            }
            Ok(None) => {
                self.close();
                Ok(None)
            }
            Err(e) => {
                self.close();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            debug!(
                "Released video decoder for {:?} after {} frames",
                self.path, self.frames_decoded
            );
        }
    }

    fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl Drop for VideoFrameSource {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]))
    }

    #[test]
    fn roi_crop_takes_requested_rectangle() {
        let frame = gradient(100, 80);
        let roi = Roi { top: 10, bottom: 30, left: 20, right: 60 };
        let cropped = roi.crop(&frame);
        assert_eq!(cropped.dimensions(), (40, 20));
        assert_eq!(cropped.get_pixel(0, 0), frame.get_pixel(20, 10));
        assert_eq!(cropped.get_pixel(39, 19), frame.get_pixel(59, 29));
    }

    #[test]
    fn roi_crop_clamps_to_frame() {
        let frame = gradient(50, 40);
        let roi = Roi { top: 30, bottom: 100, left: 45, right: 200 };
        assert_eq!(roi.crop(&frame).dimensions(), (5, 10));

        let outside = Roi { top: 60, bottom: 90, left: 70, right: 80 };
        assert_eq!(outside.crop(&frame).dimensions(), (0, 0));
    }

    #[test]
    fn roi_from_default_config() {
        let roi = Roi::from_config(&ScanConfig::default());
        assert_eq!(roi, Roi { top: 150, bottom: 630, left: 635, right: 1050 });
    }

    /// Writes an uncompressed YUV4MPEG2 clip of `frames` flat 4:2:0 frames.
    fn write_y4m(name: &str, width: usize, height: usize, frames: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "catalogscanner-{}-{}.y4m",
            name,
            std::process::id()
        ));
        let mut data = format!("YUV4MPEG2 W{} H{} F25:1 Ip A1:1 C420jpeg\n", width, height)
            .into_bytes();
        for _ in 0..frames {
            data.extend_from_slice(b"FRAME\n");
            data.extend(std::iter::repeat_n(220u8, width * height));
            data.extend(std::iter::repeat_n(128u8, width * height / 2));
        }
        std::fs::write(&path, data).unwrap();
        path
    }

    fn full_frame() -> Roi {
        Roi { top: 0, bottom: u32::MAX, left: 0, right: u32::MAX }
    }

    #[test]
    fn draining_a_clip_releases_the_decoder() {
        let path = write_y4m("drain", 32, 24, 4);
        let mut source = VideoFrameSource::open(&path, full_frame()).unwrap();
        assert!(source.is_open());

        let mut frames = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            frames.push(frame);
        }
        std::fs::remove_file(&path).ok();

        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.dimensions() == (32, 24)));
        assert_eq!(source.frames_decoded(), 4);
        assert!(!source.is_open());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn closing_early_releases_the_decoder() {
        let path = write_y4m("early", 32, 24, 6);
        let mut source = VideoFrameSource::open(&path, Roi { top: 4, bottom: 20, left: 8, right: 24 })
            .unwrap();
        let first = source.next_frame().unwrap().expect("clip has frames");
        assert_eq!(first.dimensions(), (16, 16));

        source.close();
        assert!(!source.is_open());
        assert!(source.next_frame().unwrap().is_none());
        source.close();
        drop(source);

        // a source dropped mid-stream leaves the clip readable
        let mut reopened = VideoFrameSource::open(&path, full_frame()).unwrap();
        assert!(reopened.next_frame().unwrap().is_some());
        drop(reopened);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn open_missing_file_is_source_unavailable() {
        let path = std::env::temp_dir().join("catalogscanner-missing-video.mp4");
        let roi = Roi::from_config(&ScanConfig::default());
        match VideoFrameSource::open(&path, roi) {
            Err(ScanError::SourceUnavailable { path: reported, .. }) => assert_eq!(reported, path),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opening a missing file should fail"),
        }
    }
}

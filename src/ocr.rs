//! OCR Module
//!
//! Turns the collected row images into candidate item names using the
//! tesseract-rs crate.

use crate::config::ScanConfig;
use crate::error::ScanError;
use crate::frame_sampler::RowImageBatch;
use image::GrayImage;
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tesseract_rs::TesseractAPI;

/// Anything that can read the text out of a grayscale image.
pub trait Ocr {
    /// Returns the recognized text, one recognized line per line break.
    fn recognize(&self, image: &GrayImage) -> Result<String, ScanError>;
}

/// Gets the default location where this version of `tesseract-rs` caches its data.
/// The build script downloads language files here.
fn get_tessdata_dir() -> Result<PathBuf, ScanError> {
    let env_var = |name: &str| {
        std::env::var(name)
            .map_err(|_| ScanError::OcrEngine(format!("{} env var not set", name)))
    };
    let base_path = if cfg!(target_os = "macos") {
        PathBuf::from(env_var("HOME")?)
            .join("Library")
            .join("Application Support")
    } else if cfg!(target_os = "linux") {
        PathBuf::from(env_var("HOME")?).join(".tesseract-rs")
    } else if cfg!(target_os = "windows") {
        PathBuf::from(env_var("APPDATA")?)
    } else {
        return Err(ScanError::OcrEngine(
            "no default tessdata location for this operating system".to_string(),
        ));
    };
    Ok(base_path.join("tesseract-rs").join("tessdata"))
}

/// Tesseract-backed OCR engine.
pub struct TesseractOcr {
    api: TesseractAPI,
}

impl TesseractOcr {
    /// Initializes Tesseract with the configured language and data directory.
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let tessdata_dir = match &config.tessdata_dir {
            Some(dir) => dir.clone(),
            None => get_tessdata_dir()?,
        };
        let tessdata = tessdata_dir.to_str().ok_or_else(|| {
            ScanError::OcrEngine(format!("tessdata path {:?} is not valid UTF-8", tessdata_dir))
        })?;

        let api = TesseractAPI::new();
        api.init(tessdata, &config.ocr_language).map_err(|e| {
            ScanError::OcrEngine(format!(
                "failed to initialize Tesseract with language '{}': {}",
                config.ocr_language, e
            ))
        })?;
        info!(
            "Tesseract initialized with language '{}' from {:?}",
            config.ocr_language, tessdata_dir
        );
        Ok(TesseractOcr { api })
    }
}

impl Ocr for TesseractOcr {
    fn recognize(&self, image: &GrayImage) -> Result<String, ScanError> {
        self.api
            .set_image(
                image.as_raw(),
                image.width() as i32,
                image.height() as i32,
                1, // bytes per pixel for grayscale
                image.width() as i32,
            )
            .map_err(|e| ScanError::OcrEngine(format!("failed to set image: {}", e)))?;
        self.api
            .get_utf8_text()
            .map_err(|e| ScanError::OcrEngine(format!("failed to recognize text: {}", e)))
    }
}

/// Stacks the rows vertically into one image. All rows must share a width.
pub fn concat_rows(rows: &[GrayImage]) -> Result<GrayImage, ScanError> {
    let Some(first) = rows.first() else {
        return Ok(GrayImage::new(0, 0));
    };
    let width = first.width();
    let mut height = 0u32;
    for (index, row) in rows.iter().enumerate() {
        if row.width() != width {
            return Err(ScanError::ImageDimensionMismatch {
                index,
                expected: width,
                found: row.width(),
            });
        }
        height += row.height();
    }

    // Rows are stored row-major, so stacking images is appending their buffers.
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in rows {
        pixels.extend_from_slice(row.as_raw());
    }
    GrayImage::from_raw(width, height, pixels)
        .ok_or_else(|| ScanError::OcrEngine("failed to build composite image".to_string()))
}

/// Splits OCR output into trimmed, lowercased, non-empty unique lines.
pub fn normalize_lines(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Runs OCR over the batch and returns the candidate names it found.
///
/// An empty batch returns an empty set without invoking the engine. With
/// `max_rows` set, OCR runs once per window of whole frames.
pub fn extract_names<O: Ocr + ?Sized>(
    batch: &RowImageBatch,
    ocr: &O,
    max_rows: Option<usize>,
) -> Result<BTreeSet<String>, ScanError> {
    if batch.is_empty() {
        info!("No item rows found; skipping OCR.");
        return Ok(BTreeSet::new());
    }

    let windows = batch.windows(max_rows);
    info!(
        "Running OCR on {} rows in {} image(s)...",
        batch.len(),
        windows.len()
    );

    let mut names = BTreeSet::new();
    for (i, window) in windows.iter().enumerate() {
        let composite = concat_rows(window)?;
        debug!(
            "OCR window {}: {}x{} px",
            i,
            composite.width(),
            composite.height()
        );
        let text = ocr.recognize(&composite)?;
        names.extend(normalize_lines(&text));
    }

    info!("OCR produced {} unique candidate names.", names.len());
    Ok(names)
}

//! CatalogScanner - Core Library
//!
//! Reads the item catalog out of a screen recording of a scrolling in-game
//! list: decode frames, cut them into item rows, OCR the rows, and match the
//! recognized lines against the known item names.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};

pub mod config;
pub mod error;
pub mod frame_sampler;
pub mod matcher;
pub mod ocr;
pub mod row_segmenter;
pub mod video_processor;
pub mod vocabulary;

pub use config::ScanConfig;
pub use error::ScanError;
pub use ocr::{Ocr, TesseractOcr};
pub use video_processor::{FrameSource, Roi, VideoFrameSource};
pub use vocabulary::Vocabulary;

use frame_sampler::{FrameSampler, drain_source};
use row_segmenter::RowSegmenter;

/// Application configuration structure.
#[derive(Debug)]
pub struct Config {
    pub input_file: PathBuf,
    pub items_file: PathBuf,
    pub scan: ScanConfig,
}

/// Runs the whole pipeline for one vocabulary and one OCR engine.
pub struct CatalogScanner<O: Ocr> {
    config: ScanConfig,
    vocabulary: Vocabulary,
    ocr: O,
}

impl<O: Ocr> CatalogScanner<O> {
    pub fn new(config: ScanConfig, vocabulary: Vocabulary, ocr: O) -> Result<Self, ScanError> {
        config.validate()?;
        if vocabulary.is_empty() {
            warn!("Vocabulary is empty; every OCR candidate will be dropped.");
        }
        Ok(CatalogScanner {
            config,
            vocabulary,
            ocr,
        })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scans the video at `path` and returns the sorted canonical item names.
    pub fn scan_video(&self, path: &Path) -> Result<Vec<String>, ScanError> {
        let mut source = VideoFrameSource::open(path, Roi::from_config(&self.config))?;
        self.scan_source(&mut source)
    }

    pub fn scan_source<S: FrameSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<Vec<String>, ScanError> {
        self.scan_source_with(source, || {})
    }

    /// Like [`scan_source`](Self::scan_source), calling `on_frame` after each
    /// decoded frame.
    pub fn scan_source_with<S, F>(&self, source: &mut S, on_frame: F) -> Result<Vec<String>, ScanError>
    where
        S: FrameSource + ?Sized,
        F: FnMut(),
    {
        let mut sampler = FrameSampler::new(
            RowSegmenter::from_config(&self.config),
            self.config.frame_sample_stride,
        );
        drain_source(source, &mut sampler, on_frame)?;
        let sampled = sampler.finish();

        let names = ocr::extract_names(&sampled.batch, &self.ocr, self.config.ocr_batch_rows)?;
        let outcome = matcher::match_items(&names, &self.vocabulary, self.config.fuzzy_match_cutoff);
        info!(
            "Matched {} items ({} corrected, {} dropped).",
            outcome.matched.len(),
            outcome.corrections.len(),
            outcome.unmatched.len()
        );

        // BTreeSet iteration is already sorted and unique.
        Ok(outcome.matched.into_iter().collect())
    }
}

fn progress_bar(frame_count: Option<u64>) -> ProgressBar {
    match frame_count {
        Some(count) if count > 0 => {
            let bar = ProgressBar::new(count);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} Scanning frames [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) [{elapsed_precise}<{eta}]")
            {
                bar.set_style(style.progress_chars("##-"));
            }
            bar
        }
        _ => {
            warn!("Could not determine total frame count. Using spinner as fallback.");
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} Scanning frames... [{elapsed_precise}] {pos} frames processed")
            {
                bar.set_style(style);
            }
            bar
        }
    }
}

/// The main function that orchestrates a catalog scan.
pub fn run(config: Config) -> Result<Vec<String>> {
    info!("Initializing scan with config: {:?}", config);

    let vocabulary = Vocabulary::load(&config.items_file).context("Failed to load item vocabulary")?;
    let ocr = TesseractOcr::new(&config.scan).context("Failed to initialize OCR engine")?;
    let scanner = CatalogScanner::new(config.scan, vocabulary, ocr)?;

    info!("Starting video scan for: {:?}", config.input_file);
    let mut source = VideoFrameSource::open(&config.input_file, Roi::from_config(scanner.config()))
        .context("Failed to open input video")?;

    let pb = progress_bar(source.frame_count_hint());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    let result = scanner.scan_source_with(&mut source, || pb.inc(1));
    pb.finish_with_message(format!("Scanned {} frames", source.frames_decoded()));

    let items = result.context("Catalog scan failed")?;
    info!("Found {} catalog items.", items.len());
    Ok(items)
}

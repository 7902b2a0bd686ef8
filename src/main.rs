//! CatalogScanner - Main Application Entrypoint
//!
//! Parses command-line arguments, initializes logging, runs the scan and
//! prints the items found, one per line.

use catalogscanner::{ScanConfig, run};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

/// Lists the items shown in a screen recording of a scrolling in-game catalog.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input video file
    #[arg(default_value = "catalog3.mp4")]
    video: PathBuf,

    /// JSON array of canonical item names
    #[arg(long, default_value = "items/items_en-US.json")]
    items: PathBuf,

    /// Optional JSON file overriding the capture calibration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Logging verbosity level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let args = Args::parse();

    // 1. Initialize Logger
    let log_level = match args.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting CatalogScanner...");

    // 2. Validate input path
    if !args.video.exists() {
        error!("Input file does not exist: {:?}", args.video);
        std::process::exit(1);
    }

    // 3. Create a configuration object from arguments
    let scan = match &args.config {
        Some(path) => match ScanConfig::from_file(path) {
            Ok(scan) => scan,
            Err(e) => {
                error!("{}", e);
                std::process::exit(2);
            }
        },
        None => ScanConfig::default(),
    };
    let config = catalogscanner::Config {
        input_file: args.video,
        items_file: args.items,
        scan,
    };

    // 4. Run the scan
    match run(config) {
        Ok(items) => {
            for item in &items {
                println!("{}", item);
            }
            info!("Scan completed successfully.");
        }
        Err(e) => {
            error!("Application failed: {:#}", e);
            std::process::exit(2);
        }
    }
}

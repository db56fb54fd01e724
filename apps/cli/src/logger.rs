//! Logger setup: stderr by default, optionally a log file

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for log files
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rpy-extractor")
        .join("logs")
}

fn timestamped_log_path() -> PathBuf {
    default_log_dir().join(format!(
        "extractor-{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Install the global logger.
///
/// `RUST_LOG` overrides the level picked from `verbose`. `log_file` is
/// `Some(None)` for a timestamped file in [`default_log_dir`]; if the file
/// cannot be opened, logging falls back to stderr.
pub fn init_logger(verbose: bool, log_file: Option<Option<PathBuf>>) -> Option<PathBuf> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S %:z"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    let mut opened = None;
    if let Some(path) = log_file {
        let path = path.unwrap_or_else(timestamped_log_path);
        match open_log_file(&path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
                opened = Some(path);
            }
            Err(err) => {
                eprintln!("Failed to open log file {}: {}", path.display(), err);
            }
        }
    }

    if let Err(err) = builder.try_init() {
        eprintln!("Failed to apply logger: {}", err);
        return None;
    }

    log::info!("{} v{}", CRATE_NAME, CRATE_VERSION);
    opened
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

//! Command-line arguments

use clap::Parser;
use rpy_extractor_core::{ExtractionConfig, ExtractorKind, OutputFormat};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rpy-extract")]
#[command(about = "Extract translatable item strings from Ren'Py scripts into a translation template", long_about = None)]
pub struct Cli {
    /// Game directory containing the .rpy scripts
    #[arg(env = "RPY_GAME_DIR")]
    pub game_dir: Option<PathBuf>,

    /// Output template path (default: <game>/tl/<language>/extracted_strings.<ext>)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Extractor to enable; repeat for several (default: all)
    #[arg(short, long = "extractor", value_name = "KIND")]
    pub extractors: Vec<ExtractorKind>,

    /// Output format: renpy, json or csv
    #[arg(short, long)]
    pub format: Option<OutputFormat>,

    /// Ren'Py translation language
    #[arg(short, long)]
    pub language: Option<String>,

    /// Existing translation file used to skip translated entries (default: output path)
    #[arg(short = 't', long)]
    pub translation_file: Option<PathBuf>,

    /// Keep entries that already have a translation
    #[arg(long)]
    pub no_skip_translated: bool,

    /// Load settings from this JSON file (default: platform config dir, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the effective settings back to the config file
    #[arg(long)]
    pub save_config: bool,

    /// Also log to a file; without a value a timestamped file in the data dir is used
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,

    /// Debug-level logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Overlay command-line flags on a loaded configuration
    pub fn apply_to(&self, config: &mut ExtractionConfig) {
        if let Some(game_dir) = &self.game_dir {
            config.game_directory = game_dir.clone();
        }
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if !self.extractors.is_empty() {
            config.enabled_extractors = self.extractors.iter().copied().collect();
        }
        if let Some(format) = self.format {
            config.writer_format = format;
        }
        if let Some(language) = &self.language {
            config.language = language.clone();
        }
        if let Some(path) = &self.translation_file {
            config.translation_path = Some(path.clone());
        }
        if self.no_skip_translated {
            config.skip_translated = false;
        }
    }
}

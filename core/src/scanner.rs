/// Script file discovery with ignore and size rules
use crate::config::{matches_ignore_pattern, ExtractionConfig};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Extensions without the dot, compared case-insensitively
    pub extensions: Vec<String>,

    pub recursive: bool,

    /// Maximum file size in bytes
    pub max_file_size: u64,

    /// gitignore-style patterns relative to the scan root
    pub ignore_patterns: Vec<String>,

    /// Files never returned, e.g. the output template itself
    pub excluded_files: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default(), Vec::new())
    }
}

impl ScanConfig {
    pub fn from_config(config: &ExtractionConfig, excluded_files: Vec<PathBuf>) -> Self {
        Self {
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            recursive: config.recursive,
            max_file_size: config.max_file_size,
            ignore_patterns: config.collect_ignore_patterns(&config.game_directory),
            excluded_files,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub size: u64,
    /// Relative to the scan root, `/`-separated
    pub relative_path: String,
}

#[derive(Debug)]
pub struct FileScanner {
    config: ScanConfig,
    excluded: Vec<PathBuf>,
}

impl FileScanner {
    pub fn new(config: ScanConfig) -> Self {
        let excluded = config
            .excluded_files
            .iter()
            .map(|path| fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
            .collect();
        Self { config, excluded }
    }

    /// Scan `root` for script files, sorted by relative path.
    ///
    /// Only a failure to list `root` itself is an error. Unreadable
    /// subdirectories and entries are logged and skipped.
    pub fn scan(&self, root: &Path) -> Result<Vec<ScannedFile>, std::io::Error> {
        let mut files = Vec::new();
        self.scan_dir(root, root, &mut files)?;
        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        debug!("found {} script files under {}", files.len(), root.display());
        Ok(files)
    }

    fn scan_dir(
        &self,
        root: &Path,
        current: &Path,
        files: &mut Vec<ScannedFile>,
    ) -> Result<(), std::io::Error> {
        for entry in fs::read_dir(current)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("skipping unreadable entry in {}: {}", current.display(), err);
                    continue;
                }
            };
            let path = entry.path();
            let relative = relative_path(root, &path);

            // Symlinks are not followed.
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    warn!("skipping {}: {}", relative, err);
                    continue;
                }
            };
            if file_type.is_dir() {
                if self.config.recursive && !self.is_path_ignored(&relative) {
                    self.scan_subdir(root, &path, files);
                }
            } else if file_type.is_file() {
                if let Some(scanned) = self.process_file(entry.metadata(), path, relative) {
                    files.push(scanned);
                }
            }
        }
        Ok(())
    }

    fn scan_subdir(&self, root: &Path, dir: &Path, files: &mut Vec<ScannedFile>) {
        if let Err(err) = self.scan_dir(root, dir, files) {
            warn!(
                "skipping unreadable directory {}: {}",
                relative_path(root, dir),
                err
            );
        }
    }

    fn process_file(
        &self,
        metadata: std::io::Result<fs::Metadata>,
        path: PathBuf,
        relative_path: String,
    ) -> Option<ScannedFile> {
        if !self.has_script_extension(&path) || self.is_path_ignored(&relative_path) {
            return None;
        }

        if self.is_excluded(&path) {
            debug!("skipping output file {}", path.display());
            return None;
        }

        // A file whose size cannot be read is still returned so the read
        // failure is reported per file.
        let size = match metadata {
            Ok(meta) => meta.len(),
            Err(err) => {
                warn!("cannot stat {}: {}", path.display(), err);
                0
            }
        };

        if size > self.config.max_file_size {
            warn!(
                "skipping {} ({} bytes exceeds limit of {})",
                relative_path, size, self.config.max_file_size
            );
            return None;
        }

        Some(ScannedFile {
            path,
            size,
            relative_path,
        })
    }

    fn has_script_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.config.extensions.iter().any(|allowed| *allowed == ext)
            })
            .unwrap_or(false)
    }

    /// Check if a path matches any ignore pattern
    fn is_path_ignored(&self, relative_path: &str) -> bool {
        self.config
            .ignore_patterns
            .iter()
            .any(|pattern| matches_ignore_pattern(relative_path, pattern))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.excluded.is_empty() {
            return false;
        }
        let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        self.excluded.iter().any(|excluded| *excluded == resolved)
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    crate::formats::display_path(root, path)
}

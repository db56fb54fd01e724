/// Configuration for extraction runs
use crate::events::{Event, EventBus};
use crate::extractors::ExtractorKind;
use crate::formats::OutputFormat;
use crate::validator::ValidatorKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the optional per-project ignore file in the game directory
pub const IGNORE_FILE_NAME: &str = ".rpyextractignore";

const DEFAULT_OUTPUT_FILE: &str = "extracted_strings.rpy";

fn default_true() -> bool {
    true
}

fn default_extensions() -> Vec<String> {
    vec!["rpy".to_string()]
}

fn default_validators() -> Vec<ValidatorKind> {
    vec![ValidatorKind::NonEmpty, ValidatorKind::NoInvalidChars]
}

fn default_language() -> String {
    "schinese".to_string()
}

fn default_max_size() -> u64 {
    20 * 1024 * 1024 // 20MB
}

fn default_extractors() -> BTreeSet<ExtractorKind> {
    ExtractorKind::ALL.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionConfig {
    /// Root of the game scripts to scan
    #[serde(default)]
    pub game_directory: PathBuf,

    #[serde(default = "default_extractors")]
    pub enabled_extractors: BTreeSet<ExtractorKind>,

    /// Template destination; empty means `<game>/tl/<language>/extracted_strings.rpy`
    #[serde(default)]
    pub output_path: PathBuf,

    #[serde(default = "default_true")]
    pub skip_translated: bool,

    /// Existing translation file checked by skip-translated (default: output path)
    #[serde(default)]
    pub translation_path: Option<PathBuf>,

    /// Script file extensions, without the dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_true")]
    pub recursive: bool,

    /// gitignore-style patterns relative to the game directory
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Read extra patterns from `.rpyextractignore` in the game directory
    #[serde(default = "default_true")]
    pub use_ignore_file: bool,

    #[serde(default = "default_validators")]
    pub validators: Vec<ValidatorKind>,

    #[serde(default)]
    pub writer_format: OutputFormat,

    /// Ren'Py translation language used in the template header
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_max_size")]
    pub max_file_size: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            game_directory: PathBuf::new(),
            enabled_extractors: default_extractors(),
            output_path: PathBuf::new(),
            skip_translated: true,
            translation_path: None,
            extensions: default_extensions(),
            recursive: true,
            ignore_patterns: default_ignore_patterns(),
            use_ignore_file: true,
            validators: default_validators(),
            writer_format: OutputFormat::default(),
            language: default_language(),
            max_file_size: default_max_size(),
        }
    }
}

impl ExtractionConfig {
    /// Output path with the empty default resolved against the game directory
    pub fn resolved_output_path(&self) -> PathBuf {
        if !self.output_path.as_os_str().is_empty() {
            return self.output_path.clone();
        }

        let file_name = Path::new(DEFAULT_OUTPUT_FILE)
            .with_extension(self.writer_format.extension());
        self.game_directory
            .join("tl")
            .join(&self.language)
            .join(file_name)
    }

    /// Translation file consulted when skipping translated entries
    pub fn resolved_translation_path(&self) -> PathBuf {
        self.translation_path
            .clone()
            .unwrap_or_else(|| self.resolved_output_path())
    }

    /// All ignore patterns: configured ones plus the project ignore file
    pub fn collect_ignore_patterns<P: AsRef<Path>>(&self, game_root: P) -> Vec<String> {
        let mut patterns = self.ignore_patterns.clone();

        let game_root = game_root.as_ref();
        if self.use_ignore_file && !game_root.as_os_str().is_empty() {
            let ignore_path = game_root.join(IGNORE_FILE_NAME);
            if let Ok(content) = fs::read_to_string(&ignore_path) {
                patterns.extend(parse_ignore_patterns(&content));
            }
        }

        patterns
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        Self::from_json(&content)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, self.to_json()?)
            .map_err(|e| format!("Failed to write config file: {}", e))
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json)
            .map_err(|e| format!("Failed to parse JSON config: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e))
    }
}

/// Default location of the persisted configuration
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rpy-extractor")
        .join("config.json")
}

/// A single configuration field change, published on `config:changed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum ConfigChange {
    GameDirectory(PathBuf),
    EnabledExtractors(Vec<ExtractorKind>),
    OutputPath(PathBuf),
    SkipTranslated(bool),
    TranslationPath(Option<PathBuf>),
    WriterFormat(OutputFormat),
    Language(String),
    Validators(Vec<ValidatorKind>),
    Recursive(bool),
    Extensions(Vec<String>),
    IgnorePatterns(Vec<String>),
    UseIgnoreFile(bool),
    MaxFileSize(u64),
    /// The whole configuration was replaced, e.g. after loading from disk
    Replaced,
}

/// Mutable configuration shared with the host. Every setter publishes a
/// `config:changed` event on the bus it was created with.
#[derive(Debug)]
pub struct ConfigStore {
    config: ExtractionConfig,
    bus: Arc<EventBus>,
}

impl ConfigStore {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_config(ExtractionConfig::default(), bus)
    }

    pub fn with_config(config: ExtractionConfig, bus: Arc<EventBus>) -> Self {
        Self { config, bus }
    }

    /// Load `path` if it exists, otherwise start from defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P, bus: Arc<EventBus>) -> Result<Self, String> {
        let path = path.as_ref();
        let config = if path.exists() {
            ExtractionConfig::load(path)?
        } else {
            ExtractionConfig::default()
        };
        Ok(Self::with_config(config, bus))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        self.config.save(path)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Copy taken at the start of a run
    pub fn snapshot(&self) -> ExtractionConfig {
        self.config.clone()
    }

    pub fn replace(&mut self, config: ExtractionConfig) {
        self.config = config;
        self.changed(ConfigChange::Replaced);
    }

    pub fn game_directory(&self) -> &Path {
        &self.config.game_directory
    }

    pub fn set_game_directory(&mut self, path: impl Into<PathBuf>) {
        self.config.game_directory = path.into();
        self.changed(ConfigChange::GameDirectory(self.config.game_directory.clone()));
    }

    pub fn enabled_extractors(&self) -> &BTreeSet<ExtractorKind> {
        &self.config.enabled_extractors
    }

    pub fn set_enabled_extractors(&mut self, kinds: impl IntoIterator<Item = ExtractorKind>) {
        self.config.enabled_extractors = kinds.into_iter().collect();
        self.changed(ConfigChange::EnabledExtractors(
            self.config.enabled_extractors.iter().copied().collect(),
        ));
    }

    /// Toggle a single extractor, as a multi-select checkbox would
    pub fn set_extractor_enabled(&mut self, kind: ExtractorKind, enabled: bool) {
        let changed = if enabled {
            self.config.enabled_extractors.insert(kind)
        } else {
            self.config.enabled_extractors.remove(&kind)
        };
        if changed {
            self.changed(ConfigChange::EnabledExtractors(
                self.config.enabled_extractors.iter().copied().collect(),
            ));
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.config.output_path
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.config.output_path = path.into();
        self.changed(ConfigChange::OutputPath(self.config.output_path.clone()));
    }

    pub fn skip_translated(&self) -> bool {
        self.config.skip_translated
    }

    pub fn set_skip_translated(&mut self, skip: bool) {
        self.config.skip_translated = skip;
        self.changed(ConfigChange::SkipTranslated(skip));
    }

    pub fn translation_path(&self) -> Option<&Path> {
        self.config.translation_path.as_deref()
    }

    pub fn set_translation_path(&mut self, path: Option<PathBuf>) {
        self.config.translation_path = path;
        self.changed(ConfigChange::TranslationPath(self.config.translation_path.clone()));
    }

    pub fn writer_format(&self) -> OutputFormat {
        self.config.writer_format
    }

    pub fn set_writer_format(&mut self, format: OutputFormat) {
        self.config.writer_format = format;
        self.changed(ConfigChange::WriterFormat(format));
    }

    pub fn language(&self) -> &str {
        &self.config.language
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.config.language = language.into();
        self.changed(ConfigChange::Language(self.config.language.clone()));
    }

    pub fn validators(&self) -> &[ValidatorKind] {
        &self.config.validators
    }

    pub fn set_validators(&mut self, validators: Vec<ValidatorKind>) {
        self.config.validators = validators;
        self.changed(ConfigChange::Validators(self.config.validators.clone()));
    }

    pub fn recursive(&self) -> bool {
        self.config.recursive
    }

    pub fn set_recursive(&mut self, recursive: bool) {
        self.config.recursive = recursive;
        self.changed(ConfigChange::Recursive(recursive));
    }

    pub fn extensions(&self) -> &[String] {
        &self.config.extensions
    }

    pub fn set_extensions(&mut self, extensions: Vec<String>) {
        self.config.extensions = extensions;
        self.changed(ConfigChange::Extensions(self.config.extensions.clone()));
    }

    pub fn ignore_patterns(&self) -> &[String] {
        &self.config.ignore_patterns
    }

    pub fn set_ignore_patterns(&mut self, patterns: Vec<String>) {
        self.config.ignore_patterns = patterns;
        self.changed(ConfigChange::IgnorePatterns(self.config.ignore_patterns.clone()));
    }

    pub fn use_ignore_file(&self) -> bool {
        self.config.use_ignore_file
    }

    pub fn set_use_ignore_file(&mut self, enabled: bool) {
        self.config.use_ignore_file = enabled;
        self.changed(ConfigChange::UseIgnoreFile(enabled));
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    pub fn set_max_file_size(&mut self, bytes: u64) {
        self.config.max_file_size = bytes;
        self.changed(ConfigChange::MaxFileSize(bytes));
    }

    fn changed(&self, change: ConfigChange) {
        self.bus.publish(Event::ConfigChanged(change));
    }
}

/// Parse gitignore-style patterns, skipping blanks and `#` comments
pub fn parse_ignore_patterns(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

/// Directories a Ren'Py project keeps next to its scripts that never hold
/// source strings
pub fn default_ignore_patterns() -> Vec<String> {
    vec![
        "tl/".to_string(),
        "cache/".to_string(),
        "saves/".to_string(),
        ".git/".to_string(),
        "__pycache__/".to_string(),
    ]
}

/// Check whether a relative path matches an ignore pattern
pub fn matches_ignore_pattern(path: &str, pattern: &str) -> bool {
    let path_lower = path.replace('\\', "/").to_lowercase();
    let pattern_lower = pattern.replace('\\', "/").to_lowercase();

    // Directory pattern (trailing /)
    if let Some(dir_pattern) = pattern_lower.strip_suffix('/') {
        return path_lower == dir_pattern
            || path_lower.starts_with(&format!("{}/", dir_pattern))
            || path_lower.contains(&format!("/{}/", dir_pattern))
            || path_lower.ends_with(&format!("/{}", dir_pattern));
    }

    // Extension wildcard (*.ext)
    if let Some(ext) = pattern_lower.strip_prefix('*') {
        if ext.starts_with('.') {
            return path_lower.ends_with(ext);
        }
    }

    // File name prefix (README*)
    if let Some(prefix) = pattern_lower.strip_suffix('*') {
        let filename = path_lower.rsplit('/').next().unwrap_or(&path_lower);
        return filename.starts_with(prefix);
    }

    // Plain substring
    path_lower.contains(&pattern_lower)
}

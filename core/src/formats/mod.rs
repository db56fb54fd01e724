/// Output writers for translation templates
///
/// Each format renders extracted entries into a template and parses a
/// previously written (and possibly translated) template back into a
/// key → translation index.
pub mod csv;
pub mod json;
pub mod renpy;

use crate::backup::{backup_and_swap, BackupError};
use crate::entry::ExtractionEntry;
use crate::factories::{FactoryError, Role};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    RenPy,
    Json,
    Csv,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::RenPy, OutputFormat::Json, OutputFormat::Csv];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RenPy => "renpy",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// File extension used for the default output path
    pub fn extension(&self) -> &'static str {
        match self {
            Self::RenPy => "rpy",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Construct the built-in writer for this format
    pub fn build(&self) -> Box<dyn TemplateWriter> {
        match self {
            Self::RenPy => Box::new(renpy::RenPyWriter::new()),
            Self::Json => Box::new(json::JsonWriter::new()),
            Self::Csv => Box::new(csv::CsvWriter::new()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "renpy" | "rpy" => Ok(Self::RenPy),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(FactoryError::unknown(Role::Writer, s)),
        }
    }
}

/// Existing translations keyed by normalized source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationIndex {
    translations: HashMap<String, String>,
}

impl TranslationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, translation: impl Into<String>) {
        self.translations.insert(key.into(), translation.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.translations.get(key).map(String::as_str)
    }

    /// A key counts as translated only when its translation has visible text
    pub fn is_translated(&self, key: &str) -> bool {
        self.get(key).is_some_and(|t| !t.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.translations.keys().map(String::as_str)
    }
}

impl FromIterator<(String, String)> for TranslationIndex {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            translations: iter.into_iter().collect(),
        }
    }
}

/// Settings shared by every writer for one run
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Ren'Py translation language
    pub language: String,
    /// Source paths are written relative to this directory
    pub source_root: PathBuf,
    /// Translations written back into the template's translation slots
    pub translations: TranslationIndex,
}

impl RenderContext {
    pub fn new(language: impl Into<String>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            language: language.into(),
            source_root: source_root.into(),
            translations: TranslationIndex::new(),
        }
    }

    pub fn with_translations(mut self, translations: TranslationIndex) -> Self {
        self.translations = translations;
        self
    }

    /// Existing translation for `key`, or "" for an untranslated slot
    pub fn translation(&self, key: &str) -> &str {
        self.translations.get(key).unwrap_or("")
    }

    pub fn display_path(&self, path: &Path) -> String {
        display_path(&self.source_root, path)
    }
}

/// Trait for output format writers
pub trait TemplateWriter: Send + Sync {
    fn format(&self) -> OutputFormat;

    /// Render entries into template text. Zero entries render as "".
    fn render(&self, entries: &[ExtractionEntry], ctx: &RenderContext) -> Result<String, WriteError>;

    /// Parse template text into a translation index
    fn parse(&self, content: &str) -> Result<TranslationIndex, WriteError>;

    /// Render and atomically write to `path`
    fn write(
        &self,
        path: &Path,
        entries: &[ExtractionEntry],
        ctx: &RenderContext,
    ) -> Result<(), WriteError> {
        let content = self.render(entries, ctx)?;
        let outcome = backup_and_swap(path, content.as_bytes())?;
        if let Some(backup) = outcome.backup_path {
            debug!("previous output kept at {}", backup.display());
        }
        Ok(())
    }

    /// Load an existing template; a missing file is an empty index
    fn load(&self, path: &Path) -> Result<TranslationIndex, WriteError> {
        match fs::read_to_string(path) {
            Ok(content) => self.parse(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(TranslationIndex::new()),
            Err(err) => Err(WriteError::Io(err)),
        }
    }
}

/// `path` relative to `root` with `/` separators; paths outside `root` are
/// kept as given.
pub fn display_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracted translation entries and per-run results
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The script attributes whose string values are translatable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Description,
    PurchaseNotification,
    UnlockNotification,
}

impl Attribute {
    pub const ALL: [Attribute; 3] = [
        Attribute::Description,
        Attribute::PurchaseNotification,
        Attribute::UnlockNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::PurchaseNotification => "purchase_notification",
            Self::UnlockNotification => "unlock_notification",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute assignment found in a script file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionEntry {
    pub attribute: Attribute,
    /// String body as written in the source, without the surrounding quotes
    pub value: String,
    pub source_file: PathBuf,
    /// 1-indexed
    pub line_number: usize,
}

impl ExtractionEntry {
    pub fn new(
        attribute: Attribute,
        value: impl Into<String>,
        source_file: impl Into<PathBuf>,
        line_number: usize,
    ) -> Self {
        Self {
            attribute,
            value: value.into(),
            source_file: source_file.into(),
            line_number,
        }
    }

    /// Translation key used by writers and the skip-translated check.
    pub fn key(&self) -> String {
        normalize_key(&self.value)
    }
}

/// Normalize a raw string body into the form it takes inside a double-quoted
/// Ren'Py string: existing escapes are kept, bare `"` is escaped and line
/// breaks become `\n`.
pub fn normalize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.trim().chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                // A trailing lone backslash would swallow the closing quote.
                out.push(chars.next().unwrap_or('\\'));
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }

    out
}

/// A script file that could not be processed during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Aggregate outcome of one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    pub count: usize,
    pub message: String,
    pub entries: Vec<ExtractionEntry>,
    pub files_scanned: usize,
    pub failed_files: Vec<FileFailure>,
    /// Entries dropped because the translation file already covers them
    pub skipped_translated: usize,
    /// Entries rejected by the text validators
    pub rejected: usize,
    pub duplicates: usize,
    pub output_path: Option<PathBuf>,
}

impl ExtractionResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

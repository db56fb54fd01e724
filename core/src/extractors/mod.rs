/// Attribute extractors for script files
pub mod rpy;

use crate::encoding;
use crate::entry::{Attribute, ExtractionEntry};
use crate::factories::{FactoryError, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Built-in extractor kinds, one per attribute.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    Description,
    PurchaseNotification,
    UnlockNotification,
}

impl ExtractorKind {
    pub const ALL: [ExtractorKind; 3] = [
        ExtractorKind::Description,
        ExtractorKind::PurchaseNotification,
        ExtractorKind::UnlockNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        self.attribute().as_str()
    }

    pub fn attribute(&self) -> Attribute {
        match self {
            Self::Description => Attribute::Description,
            Self::PurchaseNotification => Attribute::PurchaseNotification,
            Self::UnlockNotification => Attribute::UnlockNotification,
        }
    }

    /// Construct the built-in implementation for this kind
    pub fn build(&self) -> Box<dyn Extractor> {
        Box::new(rpy::RpyAttributeExtractor::new(self.attribute()))
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractorKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| FactoryError::unknown(Role::Extractor, s))
    }
}

/// Pulls entries for one attribute out of script text.
pub trait Extractor: Send + Sync {
    fn kind(&self) -> ExtractorKind;

    /// Scan already-loaded text; `source` is recorded on every entry
    fn extract_from_content(&self, content: &str, source: &Path) -> Vec<ExtractionEntry>;

    /// Read `path` and scan it
    fn extract(&self, path: &Path) -> Result<Vec<ExtractionEntry>, ExtractError> {
        let content = read_script(path)?;
        Ok(self.extract_from_content(&content, path))
    }
}

/// Read and decode a script file
pub fn read_script(path: &Path) -> Result<String, ExtractError> {
    encoding::read_text(path).map_err(|source| ExtractError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn kinds_parse_from_names() {
        for kind in ExtractorKind::ALL {
            assert_eq!(kind.as_str().parse::<ExtractorKind>().unwrap(), kind);
        }
        assert!(matches!(
            "tooltip".parse::<ExtractorKind>(),
            Err(FactoryError::UnknownImplementation { role: Role::Extractor, .. })
        ));
    }

    #[test]
    fn extract_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("items.rpy");
        fs::write(&path, "define x = Item(description \"Sword\")\n").unwrap();

        let entries = ExtractorKind::Description.build().extract(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "Sword");
        assert_eq!(entries[0].source_file, path);
    }

    #[test]
    fn missing_or_undecodable_file_is_read_error() {
        let dir = tempdir().unwrap();
        let extractor = ExtractorKind::Description.build();

        let err = extractor.extract(&dir.path().join("absent.rpy")).unwrap_err();
        assert!(matches!(err, ExtractError::FileRead { .. }));

        let broken = dir.path().join("broken.rpy");
        fs::write(&broken, b"description \"\xC3\x28\"\n").unwrap();
        let err = extractor.extract(&broken).unwrap_err();
        assert!(err.to_string().contains("broken.rpy"));
    }
}

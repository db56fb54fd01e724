/// Ren'Py string translation block
///
/// ```text
/// translate schinese strings:
///
///     # description: scripts/items.rpy:12
///     old "Hello"
///     new ""
/// ```
use super::{OutputFormat, RenderContext, TemplateWriter, TranslationIndex, WriteError};
use crate::entry::ExtractionEntry;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;

static OLD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*old\s+"((?:\\.|[^"\\])*)"\s*$"#).expect("valid old-line regex")
});

static NEW_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*new\s+"((?:\\.|[^"\\])*)"\s*$"#).expect("valid new-line regex")
});

pub struct RenPyWriter;

impl RenPyWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RenPyWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateWriter for RenPyWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::RenPy
    }

    fn render(&self, entries: &[ExtractionEntry], ctx: &RenderContext) -> Result<String, WriteError> {
        if entries.is_empty() {
            return Ok(String::new());
        }

        let mut out = format!("translate {} strings:\n\n", ctx.language);
        for entry in entries {
            let key = entry.key();
            writeln!(
                out,
                "    # {}: {}:{}\n    old \"{}\"\n    new \"{}\"\n",
                entry.attribute,
                ctx.display_path(&entry.source_file),
                entry.line_number,
                key,
                ctx.translation(&key)
            )
            .map_err(|e| WriteError::Serialization(e.to_string()))?;
        }
        Ok(out)
    }

    fn parse(&self, content: &str) -> Result<TranslationIndex, WriteError> {
        let mut index = TranslationIndex::new();
        let mut pending_old: Option<String> = None;

        for line in content.lines() {
            if let Some(caps) = OLD_LINE.captures(line) {
                pending_old = caps.get(1).map(|m| m.as_str().to_string());
            } else if let Some(caps) = NEW_LINE.captures(line) {
                if let (Some(old), Some(new)) = (pending_old.take(), caps.get(1)) {
                    index.insert(old, new.as_str());
                }
            }
        }

        Ok(index)
    }
}

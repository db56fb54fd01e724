/// JSON template writer
use super::{OutputFormat, RenderContext, TemplateWriter, TranslationIndex, WriteError};
use crate::entry::{Attribute, ExtractionEntry};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateDocument {
    pub language: String,
    pub entries: Vec<TemplateEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TemplateEntry {
    /// Normalized key, as in the Ren'Py `old` line
    pub key: String,
    pub attribute: Attribute,
    /// Raw source text
    pub source: String,
    pub file: String,
    pub line: usize,
    #[serde(default)]
    pub translation: String,
}

pub struct JsonWriter;

impl JsonWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateWriter for JsonWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn render(&self, entries: &[ExtractionEntry], ctx: &RenderContext) -> Result<String, WriteError> {
        if entries.is_empty() {
            return Ok(String::new());
        }

        let document = TemplateDocument {
            language: ctx.language.clone(),
            entries: entries
                .iter()
                .map(|entry| {
                    let key = entry.key();
                    TemplateEntry {
                        translation: ctx.translation(&key).to_string(),
                        key,
                        attribute: entry.attribute,
                        source: entry.value.clone(),
                        file: ctx.display_path(&entry.source_file),
                        line: entry.line_number,
                    }
                })
                .collect(),
        };

        let mut out = serde_json::to_string_pretty(&document)
            .map_err(|e| WriteError::Serialization(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    fn parse(&self, content: &str) -> Result<TranslationIndex, WriteError> {
        if content.trim().is_empty() {
            return Ok(TranslationIndex::new());
        }

        let document: TemplateDocument =
            serde_json::from_str(content).map_err(|e| WriteError::Parse(e.to_string()))?;
        Ok(document
            .entries
            .into_iter()
            .map(|entry| (entry.key, entry.translation))
            .collect())
    }
}

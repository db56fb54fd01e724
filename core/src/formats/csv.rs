/// CSV template writer (RFC 4180 quoting)
use super::{OutputFormat, RenderContext, TemplateWriter, TranslationIndex, WriteError};
use crate::entry::ExtractionEntry;

const HEADER: [&str; 5] = ["key", "attribute", "source_file", "line", "translation"];

pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateWriter for CsvWriter {
    fn format(&self) -> OutputFormat {
        OutputFormat::Csv
    }

    fn render(&self, entries: &[ExtractionEntry], ctx: &RenderContext) -> Result<String, WriteError> {
        if entries.is_empty() {
            return Ok(String::new());
        }

        let mut out = HEADER.join(",");
        out.push_str("\r\n");
        for entry in entries {
            let key = entry.key();
            let translation = ctx.translation(&key).to_string();
            let fields = [
                key,
                entry.attribute.to_string(),
                ctx.display_path(&entry.source_file),
                entry.line_number.to_string(),
                translation,
            ];
            let row: Vec<String> = fields.iter().map(|f| quote_field(f)).collect();
            out.push_str(&row.join(","));
            out.push_str("\r\n");
        }
        Ok(out)
    }

    fn parse(&self, content: &str) -> Result<TranslationIndex, WriteError> {
        let mut records = parse_records(content)?.into_iter();
        let Some(header) = records.next() else {
            return Ok(TranslationIndex::new());
        };

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| WriteError::Parse(format!("missing '{}' column", name)))
        };
        let key_col = column("key")?;
        let translation_col = column("translation")?;

        Ok(records
            .filter_map(|record| {
                let key = record.get(key_col)?.clone();
                let translation = record.get(translation_col).cloned().unwrap_or_default();
                Some((key, translation))
            })
            .collect())
    }
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Split CSV text into records, honoring quoted fields. Blank lines are skipped.
fn parse_records(content: &str) -> Result<Vec<Vec<String>>, WriteError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_started = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                field_started = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                field_started = true;
            }
            '\r' => {}
            '\n' => {
                if field_started || !field.is_empty() {
                    record.push(std::mem::take(&mut field));
                    records.push(std::mem::take(&mut record));
                }
                field_started = false;
            }
            _ => {
                field.push(c);
                field_started = true;
            }
        }
    }

    if in_quotes {
        return Err(WriteError::Parse("unterminated quoted field".into()));
    }
    if field_started || !field.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Attribute;
    use std::path::PathBuf;

    #[test]
    fn renders_header_and_quoted_rows() {
        let entries = vec![
            ExtractionEntry::new(
                Attribute::Description,
                "Plain",
                PathBuf::from("/g/a.rpy"),
                1,
            ),
            ExtractionEntry::new(
                Attribute::PurchaseNotification,
                "Bought, thanks",
                PathBuf::from("/g/shop/b.rpy"),
                9,
            ),
        ];
        let out = CsvWriter::new()
            .render(&entries, &RenderContext::new("schinese", "/g"))
            .unwrap();
        assert_eq!(
            out,
            "key,attribute,source_file,line,translation\r\n\
             Plain,description,a.rpy,1,\r\n\
             \"Bought, thanks\",purchase_notification,shop/b.rpy,9,\r\n"
        );
    }

    #[test]
    fn parses_quoted_fields() {
        let content = "key,attribute,source_file,line,translation\n\
                       Hello,description,a.rpy,1,你好\n\
                       \"Say \\\"\"hi\\\"\"\",description,a.rpy,2,\"multi\nline\"\n\
                       \n\
                       Empty,description,a.rpy,3,\n";
        let index = CsvWriter::new().parse(content).unwrap();
        assert_eq!(index.get("Hello"), Some("你好"));
        assert_eq!(index.get("Say \\\"hi\\\""), Some("multi\nline"));
        assert_eq!(index.get("Empty"), Some(""));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn rendered_output_parses_back() {
        let entries = vec![ExtractionEntry::new(
            Attribute::UnlockNotification,
            "Line \"one\", two",
            PathBuf::from("/g/a.rpy"),
            5,
        )];
        let writer = CsvWriter::new();
        let out = writer
            .render(&entries, &RenderContext::new("schinese", "/g"))
            .unwrap();
        let index = writer.parse(&out).unwrap();
        assert_eq!(index.get(&entries[0].key()), Some(""));
    }

    #[test]
    fn keeps_existing_translations() {
        let entries = vec![ExtractionEntry::new(
            Attribute::Description,
            "Hello",
            PathBuf::from("/g/a.rpy"),
            1,
        )];
        let translations: TranslationIndex =
            [("Hello".to_string(), "你好, 朋友".to_string())].into_iter().collect();
        let ctx = RenderContext::new("schinese", "/g").with_translations(translations);

        let writer = CsvWriter::new();
        let out = writer.render(&entries, &ctx).unwrap();
        assert!(out.ends_with("Hello,description,a.rpy,1,\"你好, 朋友\"\r\n"));
        assert_eq!(writer.parse(&out).unwrap().get("Hello"), Some("你好, 朋友"));
    }

    #[test]
    fn rejects_bad_input() {
        let writer = CsvWriter::new();
        assert!(writer.parse("").unwrap().is_empty());
        assert!(matches!(writer.parse("key,translation\n\"open"), Err(WriteError::Parse(_))));
        assert!(matches!(writer.parse("a,b\n1,2\n"), Err(WriteError::Parse(_))));
    }
}

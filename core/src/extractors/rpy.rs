/// Ren'Py (.rpy) attribute extractor
///
/// Matches `attribute "value"` and `attribute = "value"` assignments for a
/// single attribute. Matches that begin inside a `#` comment or inside a
/// string literal are skipped.
use super::{Extractor, ExtractorKind};
use crate::entry::{Attribute, ExtractionEntry};
use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::path::Path;

/// Triple-quoted alternatives first so `"""a"""` is not read as `""` + `"a"`.
const STRING_LITERAL: &str = r#"(?:"""(?:\\[\s\S]|[^\\])*?"""|'''(?:\\[\s\S]|[^\\])*?'''|"(?:\\[\s\S]|[^"\\])*"|'(?:\\[\s\S]|[^'\\])*')"#;

fn attribute_regex(name: &str) -> Regex {
    Regex::new(&format!(r"\b{}(?:\s*=\s*|[ \t]+)(f?{})", name, STRING_LITERAL))
        .expect("valid attribute regex")
}

static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| attribute_regex("description"));

static PURCHASE_NOTIFICATION_RE: Lazy<Regex> =
    Lazy::new(|| attribute_regex("purchase_notification"));

static UNLOCK_NOTIFICATION_RE: Lazy<Regex> =
    Lazy::new(|| attribute_regex("unlock_notification"));

fn pattern_for(attribute: Attribute) -> &'static Regex {
    match attribute {
        Attribute::Description => &DESCRIPTION_RE,
        Attribute::PurchaseNotification => &PURCHASE_NOTIFICATION_RE,
        Attribute::UnlockNotification => &UNLOCK_NOTIFICATION_RE,
    }
}

#[derive(Debug, Clone)]
pub struct RpyAttributeExtractor {
    attribute: Attribute,
}

impl RpyAttributeExtractor {
    pub fn new(attribute: Attribute) -> Self {
        Self { attribute }
    }

    pub fn attribute(&self) -> Attribute {
        self.attribute
    }
}

impl Extractor for RpyAttributeExtractor {
    fn kind(&self) -> ExtractorKind {
        match self.attribute {
            Attribute::Description => ExtractorKind::Description,
            Attribute::PurchaseNotification => ExtractorKind::PurchaseNotification,
            Attribute::UnlockNotification => ExtractorKind::UnlockNotification,
        }
    }

    fn extract_from_content(&self, content: &str, source: &Path) -> Vec<ExtractionEntry> {
        let pattern = pattern_for(self.attribute);
        let map = SourceMap::new(content);
        let mut entries = Vec::new();
        let mut pos = 0;

        while pos < content.len() {
            let Some(caps) = pattern.captures_at(content, pos) else {
                break;
            };
            let (Some(whole), Some(literal)) = (caps.get(0), caps.get(1)) else {
                break;
            };

            if map.is_masked(whole.start()) {
                // Resume right after the match start; a real assignment may
                // follow on the same line once the string closes.
                pos = next_char_boundary(content, whole.start());
                continue;
            }

            let value = unquote(literal.as_str());
            if value.trim().is_empty() {
                trace!(
                    "{}:{}: empty {} skipped",
                    source.display(),
                    map.line_of(whole.start()),
                    self.attribute
                );
            } else {
                entries.push(ExtractionEntry::new(
                    self.attribute,
                    value,
                    source,
                    map.line_of(whole.start()),
                ));
            }
            pos = whole.end();
        }

        entries
    }
}

fn next_char_boundary(content: &str, index: usize) -> usize {
    let mut next = index + 1;
    while next < content.len() && !content.is_char_boundary(next) {
        next += 1;
    }
    next
}

/// Strip the optional `f` prefix and the surrounding quotes
fn unquote(literal: &str) -> &str {
    let literal = literal.strip_prefix('f').unwrap_or(literal);
    let quote_len = if literal.starts_with("\"\"\"") || literal.starts_with("'''") {
        3
    } else {
        1
    };
    literal
        .get(quote_len..literal.len().saturating_sub(quote_len))
        .unwrap_or("")
}

/// Byte ranges covered by comments and string literals, plus line offsets.
struct SourceMap {
    masked: Vec<Range<usize>>,
    line_starts: Vec<usize>,
}

impl SourceMap {
    fn new(content: &str) -> Self {
        let bytes = content.as_bytes();
        let mut masked = Vec::new();
        let mut line_starts = vec![0];
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    line_starts.push(i + 1);
                    i += 1;
                }
                b'#' => {
                    let end = bytes[i..]
                        .iter()
                        .position(|&b| b == b'\n')
                        .map_or(bytes.len(), |offset| i + offset);
                    masked.push(i..end);
                    i = end;
                }
                quote @ (b'"' | b'\'') => {
                    let end = string_end(bytes, i, quote);
                    line_starts.extend(
                        (i..end).filter(|&j| bytes[j] == b'\n').map(|j| j + 1),
                    );
                    masked.push(i..end);
                    i = end;
                }
                _ => i += 1,
            }
        }

        Self {
            masked,
            line_starts,
        }
    }

    fn is_masked(&self, pos: usize) -> bool {
        let index = self.masked.partition_point(|range| range.start <= pos);
        index > 0 && self.masked[index - 1].end > pos
    }

    /// 1-based line containing byte `pos`
    fn line_of(&self, pos: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= pos)
    }
}

/// Index just past the literal opening at `start`; unterminated literals run
/// to the end of the text.
fn string_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let triple = bytes.len() >= start + 3 && bytes[start + 1] == quote && bytes[start + 2] == quote;
    let mut i = start + if triple { 3 } else { 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !triple {
                    return i + 1;
                }
                if bytes.len() >= i + 3 && bytes[i + 1] == quote && bytes[i + 2] == quote {
                    return i + 3;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    bytes.len()
}

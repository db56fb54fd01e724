/// Script file decoding
use std::io::{self, ErrorKind};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

impl Encoding {
    /// Detect the encoding from a byte-order mark, defaulting to plain UTF-8
    pub fn detect(content: &[u8]) -> Self {
        if content.starts_with(&[0xEF, 0xBB, 0xBF]) {
            return Encoding::Utf8Bom;
        }

        if content.starts_with(&[0xFF, 0xFE]) {
            return Encoding::Utf16Le;
        }

        if content.starts_with(&[0xFE, 0xFF]) {
            return Encoding::Utf16Be;
        }

        Encoding::Utf8
    }

    fn bom_len(self) -> usize {
        match self {
            Encoding::Utf8 => 0,
            Encoding::Utf8Bom => 3,
            Encoding::Utf16Le | Encoding::Utf16Be => 2,
        }
    }
}

/// Decode raw script bytes. Invalid sequences are errors, never replaced.
pub fn decode(bytes: &[u8]) -> io::Result<String> {
    let encoding = Encoding::detect(bytes);
    let content = &bytes[encoding.bom_len()..];

    match encoding {
        Encoding::Utf8 | Encoding::Utf8Bom => String::from_utf8(content.to_vec())
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e)),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if content.len() % 2 != 0 {
                return Err(io::Error::new(
                    ErrorKind::InvalidData,
                    "odd number of bytes in UTF-16 content",
                ));
            }
            let units: Vec<u16> = content
                .chunks_exact(2)
                .map(|chunk| {
                    if encoding == Encoding::Utf16Le {
                        u16::from_le_bytes([chunk[0], chunk[1]])
                    } else {
                        u16::from_be_bytes([chunk[0], chunk[1]])
                    }
                })
                .collect();
            String::from_utf16(&units).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))
        }
    }
}

/// Read and decode a script file
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

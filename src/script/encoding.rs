// Script Encoding
// Character encodings accepted for SQL scripts and byte decoding

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const BOM: char = '\u{FEFF}';

/// Text encoding used to decode script bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScriptEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// UTF-16 with byte order taken from the BOM (big-endian without one)
    Utf16,
    Latin1,
    Ascii,
}

impl ScriptEncoding {
    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            ScriptEncoding::Utf8 => "UTF-8",
            ScriptEncoding::Utf16Le => "UTF-16LE",
            ScriptEncoding::Utf16Be => "UTF-16BE",
            ScriptEncoding::Utf16 => "UTF-16",
            ScriptEncoding::Latin1 => "ISO-8859-1",
            ScriptEncoding::Ascii => "US-ASCII",
        }
    }

    /// Decode raw script bytes. The error string describes where decoding failed.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            ScriptEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| {
                    format!(
                        "invalid byte sequence at offset {}",
                        e.utf8_error().valid_up_to()
                    )
                })
            }
            ScriptEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            ScriptEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
            ScriptEncoding::Utf16 => match bytes {
                [0xFF, 0xFE, ..] => decode_utf16(bytes, u16::from_le_bytes),
                _ => decode_utf16(bytes, u16::from_be_bytes),
            },
            ScriptEncoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            ScriptEncoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(format!("non-ASCII byte at offset {}", offset)),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("odd byte length {}", bytes.len()));
    }

    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();

    let text = String::from_utf16(&units).map_err(|_| "unpaired surrogate".to_string())?;
    Ok(text.strip_prefix(BOM).map(str::to_string).unwrap_or(text))
}

impl fmt::Display for ScriptEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScriptEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "utf8" => Ok(ScriptEncoding::Utf8),
            "utf16le" => Ok(ScriptEncoding::Utf16Le),
            "utf16be" => Ok(ScriptEncoding::Utf16Be),
            "utf16" => Ok(ScriptEncoding::Utf16),
            "iso88591" | "latin1" => Ok(ScriptEncoding::Latin1),
            "usascii" | "ascii" => Ok(ScriptEncoding::Ascii),
            _ => Err(format!("unsupported script encoding '{}'", s)),
        }
    }
}

impl TryFrom<String> for ScriptEncoding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScriptEncoding> for String {
    fn from(encoding: ScriptEncoding) -> Self {
        encoding.name().to_string()
    }
}

//! Source encodings for SFZ text and sample file names.
//!
//! Every structural character of the SFZ format (`<`, `>`, `=`, `"`, `/`, `#`, `$`
//! and whitespace) is ASCII, and none of the supported encodings ever uses an ASCII
//! byte inside a multi-byte sequence. The lexer therefore works on raw bytes and
//! only opcode values are decoded, with the encoding chosen here.

use std::fmt;
use std::str::FromStr;

use crate::parser::error::Error;

/// UTF-8 byte-order mark, dropped from the start of every file.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Windows-1252 code points for bytes 0x80..=0x9F; `None` marks undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// Text encodings accepted for SFZ sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceEncoding {
    /// UTF-8, the default for modern instruments
    #[default]
    Utf8,
    /// ISO-8859-1; every byte is valid
    Latin1,
    /// Windows-1252, common in instruments authored on Windows
    Windows1252,
    /// 7-bit ASCII; any byte above 0x7F is invalid
    Ascii,
}

impl SourceEncoding {
    /// Canonical label, as accepted by [`SourceEncoding::from_label`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin-1",
            Self::Windows1252 => "windows-1252",
            Self::Ascii => "ascii",
        }
    }

    /// Look up an encoding by one of its common labels (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" => Some(Self::Latin1),
            "windows-1252" | "cp1252" | "win1252" => Some(Self::Windows1252),
            "ascii" | "us-ascii" => Some(Self::Ascii),
            _ => None,
        }
    }

    /// Guess the encoding of a root file.
    ///
    /// A BOM or content that is valid UTF-8 selects UTF-8; anything else is assumed
    /// to be Windows-1252, the usual encoding of legacy instruments.
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(UTF8_BOM) || std::str::from_utf8(bytes).is_ok() {
            Self::Utf8
        } else {
            Self::Windows1252
        }
    }

    /// Check `bytes`, returning the offset of the first invalid byte on failure.
    pub fn validate(&self, bytes: &[u8]) -> std::result::Result<(), usize> {
        match self {
            Self::Utf8 => std::str::from_utf8(bytes).map(|_| ()).map_err(|e| e.valid_up_to()),
            Self::Latin1 => Ok(()),
            Self::Windows1252 => match bytes.iter().position(|&b| cp1252_char(b).is_none()) {
                Some(offset) => Err(offset),
                None => Ok(()),
            },
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(offset),
                None => Ok(()),
            },
        }
    }

    /// Decode `bytes`, failing with the offset of the first invalid byte.
    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<String, usize> {
        self.validate(bytes)?;
        Ok(self.decode_lossy(bytes))
    }

    /// Decode `bytes`, replacing invalid sequences with U+FFFD.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Self::Windows1252 => bytes
                .iter()
                .map(|&b| cp1252_char(b).unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect(),
            Self::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
        }
    }

    /// Encode `text`, replacing unrepresentable characters with `?`.
    pub fn encode_lossy(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Windows1252 => text.chars().map(cp1252_byte).collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

fn cp1252_char(byte: u8) -> Option<char> {
    match byte {
        0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
        _ => Some(byte as char),
    }
}

fn cp1252_byte(c: char) -> u8 {
    let code = u32::from(c);
    if code < 0x80 || (0xA0..=0xFF).contains(&code) {
        return code as u8;
    }
    CP1252_HIGH
        .iter()
        .position(|slot| *slot == Some(c))
        .map(|index| 0x80 + index as u8)
        .unwrap_or(b'?')
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceEncoding {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Error> {
        Self::from_label(s)
            .ok_or_else(|| Error::InvalidOpcodeValue(s.to_string(), "SourceEncoding".to_string()))
    }
}

/// The encoding a document was read with, and whether the caller chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DocumentEncoding {
    /// The encoding used for every file of the document
    pub encoding: SourceEncoding,
    /// `true` when the caller declared the encoding, `false` when it was detected
    pub declared: bool,
}

impl DocumentEncoding {
    pub fn declared(encoding: SourceEncoding) -> Self {
        Self { encoding, declared: true }
    }

    pub fn detected(encoding: SourceEncoding) -> Self {
        Self { encoding, declared: false }
    }
}

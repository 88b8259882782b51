//! Writing documents back to SFZ text.
//!
//! Output layout is fixed: every header on its own line, one `name=value` per line
//! and a blank line between sections. Comments, `#define` and `#include` are not
//! reproduced; the output holds the expanded and inlined content, so parsing it
//! again with the same options yields the same sections.

use std::borrow::Cow;
use std::io::{self, Write};

use crate::parser::lexer::{is_blank, plain_value_len};
use crate::parser::opcodes::opcode_rank;
use crate::parser::{Opcode, SfzDocument, SfzSection};

/// Order of opcodes within a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpcodeOrder {
    /// As written in the source
    #[default]
    Original,
    /// Sorted by [`OPCODE_SORT_ORDER`](crate::parser::opcodes::OPCODE_SORT_ORDER);
    /// unlisted opcodes follow in their original order
    Canonical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeOptions {
    pub order: OpcodeOrder,
}

impl SerializeOptions {
    pub fn canonical() -> Self {
        Self { order: OpcodeOrder::Canonical }
    }
}

/// True if `value` would not read back unchanged when written unquoted
///
/// Values containing a `"` cannot be quoted, there being no escape syntax, and are
/// always written as they are.
pub fn needs_quotes(value: &[u8]) -> bool {
    if value.is_empty() || value.contains(&b'"') {
        return false;
    }
    let contains = |needle: &[u8]| value.windows(needle.len()).any(|window| window == needle);
    contains(b"//")
        || contains(b"/*")
        || is_blank(value[0])
        || plain_value_len(value) != value.len()
        || ends_in_continuation(value)
}

/// A trailing `\` that is alone or follows a blank would join the next line
fn ends_in_continuation(value: &[u8]) -> bool {
    match value {
        [b'\\'] => true,
        [.., last, b'\\'] => is_blank(*last),
        _ => false,
    }
}

fn ordered(section: &SfzSection, order: OpcodeOrder) -> Vec<&Opcode> {
    let mut opcodes: Vec<&Opcode> = section.opcodes.iter().collect();
    if order == OpcodeOrder::Canonical {
        opcodes.sort_by_key(|opcode| opcode_rank(&opcode.name));
    }
    opcodes
}

fn render<'d>(doc: &'d SfzDocument, options: &SerializeOptions, value: impl Fn(&'d Opcode) -> &'d [u8]) -> Vec<u8> {
    let mut out = Vec::new();

    for (index, section) in doc.sections().iter().enumerate() {
        if index > 0 {
            out.push(b'\n');
        }
        if !(section.implicit && index == 0) {
            out.extend_from_slice(section.section_type.header_str().as_bytes());
            out.push(b'\n');
        }
        for opcode in ordered(section, options.order) {
            let value = value(opcode);
            out.extend_from_slice(opcode.name.as_bytes());
            out.push(b'=');
            if needs_quotes(value) {
                out.push(b'"');
                out.extend_from_slice(value);
                out.push(b'"');
            } else {
                out.extend_from_slice(value);
            }
            out.push(b'\n');
        }
    }

    out
}

/// Serialize a document with opcodes in their original order
pub fn serialize(doc: &SfzDocument) -> String {
    serialize_with(doc, &SerializeOptions::default())
}

/// Serialize a document using decoded values
pub fn serialize_with(doc: &SfzDocument, options: &SerializeOptions) -> String {
    let bytes = render(doc, options, |opcode| opcode.value.as_bytes());
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Serialize a document using the raw value bytes
///
/// Values are written exactly as they were read, so a legacy-encoded document
/// round-trips byte for byte in its values.
pub fn serialize_bytes(doc: &SfzDocument, options: &SerializeOptions) -> Vec<u8> {
    render(doc, options, |opcode| opcode.raw.as_slice())
}

/// Write the raw serialization of a document
pub fn write_sfz<W: Write>(doc: &SfzDocument, options: &SerializeOptions, mut writer: W) -> io::Result<()> {
    writer.write_all(&serialize_bytes(doc, options))?;
    writer.flush()
}

/// Quote a single value for display the way the serializer would write it
pub fn format_value(value: &str) -> Cow<'_, str> {
    if needs_quotes(value.as_bytes()) {
        Cow::Owned(format!("\"{value}\""))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{
        parse_sfz_bytes, parse_sfz_str, OrphanPolicy, ParseOptions, SfzSectionType, SourceEncoding,
    };

    fn parse(content: &str) -> SfzDocument {
        parse_sfz_str(content, &ParseOptions::default()).unwrap()
    }

    #[test]
    fn test_layout() {
        let doc = parse("<global> volume=-6 // loud\n<region> sample=a.wav key=60\n");
        assert_eq!(serialize(&doc), "<global>\nvolume=-6\n\n<region>\nsample=a.wav\nkey=60\n");
    }

    #[test]
    fn test_round_trip() {
        let source = r#"
            #define $DIR piano
            <control> default_path=samples/$DIR/
            <global> ampeg_release=0.5 label="a // b"
            <master> volume=-3
            <group> lovel=1 hivel=64 seq_length=2
            <region> sample=C4 soft.wav key=c4
            <region> sample=C4 loud.wav key=c4 label="x=1 lokey=2"
            <curve> v000=0 v127=1
            <effect> bus=main
        "#;
        let doc = parse(source);
        let text = serialize(&doc);
        let reparsed = parse(&text);
        assert_eq!(reparsed.sections(), doc.sections());
        assert!(text.contains("label=\"a // b\"\n"));
        assert!(text.contains("label=\"x=1 lokey=2\"\n"));
        assert!(text.contains("sample=C4 soft.wav\n"));
    }

    #[test]
    fn test_trailing_backslash_round_trip() {
        let doc = parse("<region> label=\"a \\\" key=60\n<region> label=\"\\\" key=61\n");
        assert_eq!(doc.sections()[0].opcode("label").unwrap().value, "a \\");
        let text = serialize(&doc);
        assert!(text.contains("label=\"a \\\"\n"));
        assert!(text.contains("label=\"\\\"\n"));
        let reparsed = parse(&text);
        assert_eq!(reparsed.sections(), doc.sections());
    }

    #[test]
    fn test_canonical_order() {
        let doc = parse("<region> volume=-1 custom=1 sample=a.wav hikey=61 lokey=60\n");
        let text = serialize_with(&doc, &SerializeOptions::canonical());
        assert_eq!(text, "<region>\nlokey=60\nhikey=61\nsample=a.wav\nvolume=-1\ncustom=1\n");
    }

    #[test]
    fn test_implicit_section_has_no_header() {
        let options = ParseOptions { orphans: OrphanPolicy::ImplicitGlobal, ..ParseOptions::default() };
        let doc = parse_sfz_str("volume=-3\n<region> key=1\n", &options).unwrap();
        let text = serialize(&doc);
        assert_eq!(text, "volume=-3\n\n<region>\nkey=1\n");
        let reparsed = parse_sfz_str(&text, &options).unwrap();
        assert_eq!(reparsed.sections(), doc.sections());
    }

    #[test]
    fn test_unknown_section_keeps_spelling() {
        let doc = parse("<Midi> foo=1\n");
        assert_eq!(doc.sections()[0].section_type, SfzSectionType::Unknown("Midi".into()));
        assert_eq!(serialize(&doc), "<Midi>\nfoo=1\n");
    }

    #[test]
    fn test_raw_bytes_round_trip() {
        let source = b"<region>\nsample=caf\xE9.wav\n";
        let options = ParseOptions { encoding: Some(SourceEncoding::Latin1), ..ParseOptions::default() };
        let doc = parse_sfz_bytes(source, &options).unwrap();
        assert_eq!(serialize_bytes(&doc, &SerializeOptions::default()), source.to_vec());
        assert_eq!(serialize(&doc), "<region>\nsample=café.wav\n");

        let mut written = Vec::new();
        write_sfz(&doc, &SerializeOptions::default(), &mut written).unwrap();
        assert_eq!(written, source.to_vec());
    }

    #[test]
    fn test_needs_quotes() {
        assert!(!needs_quotes(b"plain value.wav"));
        assert!(!needs_quotes(b""));
        assert!(needs_quotes(b"a /* b"));
        assert!(needs_quotes(b" leading"));
        assert!(needs_quotes(b"trailing "));
        assert!(needs_quotes(b"a <region>"));
        assert!(needs_quotes(b"a<region>"));
        assert!(!needs_quotes(b"has \"quote\" // inside"));
        assert!(needs_quotes(b"a \\"));
        assert!(needs_quotes(b"\\"));
        assert!(!needs_quotes(b"dir\\"));
        assert_eq!(format_value("a b=c"), "\"a b=c\"");
    }
}

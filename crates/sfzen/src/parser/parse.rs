use std::path::PathBuf;

use crate::parser::error::Error;
use crate::parser::preprocess::Preprocessed;
use crate::parser::token::{Origin, TokenKind};
use crate::parser::types::{Opcode, SfzSection, SfzSectionType};
use crate::parser::{OrphanPolicy, ParseOptions, Result};

/// Build the flat section list from a preprocessed token stream
///
/// A header token opens a new section and closes the previous one. A key token
/// followed by a value token adds an opcode to the open section; a key repeated
/// within one section keeps its first position and takes the last value.
///
/// # SFZ Inheritance Model
///
/// Sections are kept exactly as written. Inheritance is not applied here but
/// computed on demand by [`resolve`](crate::inheritance::resolve):
///
/// ```text
/// <global>       // applies to all regions
/// volume=0
///
/// <group>        // applies to the regions that follow
/// lovel=64
///
/// <region>       // region opcodes override everything above
/// sample=C4.wav
/// key=60
/// ```
pub(crate) fn build_sections(pre: &Preprocessed, options: &ParseOptions) -> Result<Vec<SfzSection>> {
    let file_of = |origin: Origin| pre.files.get(origin.file).cloned().unwrap_or_else(PathBuf::new);
    let mut sections: Vec<SfzSection> = Vec::new();
    let mut tokens = pre.tokens.iter().filter(|token| token.kind != TokenKind::Comment).peekable();

    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::Header => {
                let section_type = SfzSectionType::from_header(&token.text);
                sections.push(SfzSection::with_origin(section_type, token.origin));
            }
            TokenKind::OpcodeKey => {
                let Some(value) = tokens.next_if(|next| next.kind == TokenKind::OpcodeValue) else {
                    return Err(Error::Syntax {
                        file: file_of(token.origin),
                        line: token.origin.line,
                        message: format!("opcode '{}' has no value", token.text),
                    });
                };
                let opcode = Opcode {
                    name: token.text.clone(),
                    value: value.text.clone(),
                    raw: value.raw.clone(),
                    origin: token.origin,
                };

                match sections.last_mut() {
                    Some(section) => section.insert(opcode),
                    None => match options.orphans {
                        OrphanPolicy::Reject => {
                            return Err(Error::OrphanOpcode {
                                name: opcode.name,
                                file: file_of(token.origin),
                                line: token.origin.line,
                            });
                        }
                        OrphanPolicy::ImplicitGlobal => {
                            let mut section = SfzSection::with_origin(SfzSectionType::Global, token.origin);
                            section.implicit = true;
                            section.insert(opcode);
                            sections.push(section);
                        }
                    },
                }
            }
            TokenKind::OpcodeValue => {
                return Err(Error::Syntax {
                    file: file_of(token.origin),
                    line: token.origin.line,
                    message: format!("value '{}' without an opcode name", token.text),
                });
            }
            TokenKind::Comment => {}
            TokenKind::Eof => break,
        }
    }

    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::encoding::DocumentEncoding;
    use crate::parser::preprocess::MacroTable;
    use crate::parser::token::Token;
    use crate::parser::{parse_sfz_str, SfzSectionType};

    #[test]
    fn test_parse_simple_sfz() {
        let content = r#"
        <control>
        default_path=samples/piano/

        <global>
        volume=0

        <region>
        sample=piano_C3.wav
        key=60
        "#;

        let sfz = parse_sfz_str(content, &ParseOptions::default()).expect("Failed to parse SFZ");
        let sections = sfz.sections();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].section_type, SfzSectionType::Control);
        assert_eq!(sections[0].get_opcode_str("default_path"), Some("samples/piano/"));
        assert_eq!(sections[1].get_opcode_str("volume"), Some("0"));
        assert_eq!(sections[2].get_opcode_str("sample"), Some("piano_C3.wav"));
        assert_eq!(sections[2].get_opcode_str("key"), Some("60"));
        assert_eq!(sections[2].origin.line, 8);
    }

    #[test]
    fn test_orphan_policies() {
        let content = "volume=-3\n<region> key=60\n";

        let err = parse_sfz_str(content, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::OrphanOpcode { ref name, line: 1, .. } if name == "volume"));

        let options = ParseOptions { orphans: OrphanPolicy::ImplicitGlobal, ..ParseOptions::default() };
        let sfz = parse_sfz_str(content, &options).unwrap();
        assert!(sfz.sections()[0].implicit);
        assert_eq!(sfz.sections()[0].section_type, SfzSectionType::Global);
        assert_eq!(sfz.sections()[0].get_opcode_str("volume"), Some("-3"));
    }

    #[test]
    fn test_unknown_header_keeps_spelling() {
        let sfz = parse_sfz_str("<Midi> ccN=1\n<REGION> key=1\n", &ParseOptions::default()).unwrap();
        assert_eq!(sfz.sections()[0].section_type, SfzSectionType::Unknown("Midi".to_string()));
        assert_eq!(sfz.sections()[1].section_type, SfzSectionType::Region);
    }

    #[test]
    fn test_key_without_value_is_an_error() {
        let origin = Origin::new(0, 4);
        let pre = Preprocessed {
            tokens: vec![
                Token::new(TokenKind::Header, "region".into(), b"region".to_vec(), origin),
                Token::new(TokenKind::OpcodeKey, "key".into(), b"key".to_vec(), origin),
                Token::eof(origin),
            ],
            files: vec![PathBuf::from("/x.sfz")],
            diagnostics: Vec::new(),
            macros: MacroTable::new(),
            encoding: DocumentEncoding::default(),
        };
        let err = build_sections(&pre, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Syntax { line: 4, .. }));
    }
}

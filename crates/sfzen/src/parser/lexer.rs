//! Line lexer for SFZ content.
//!
//! Works on one logical line at a time, after comments have been stripped and
//! macros expanded. Lexing happens on bytes so that values in legacy encodings are
//! carried through untouched.
//!
//! | construct    | rule                                                              |
//! |--------------|-------------------------------------------------------------------|
//! | header       | `<` name `>` with name `[A-Za-z0-9_]+`; several per line allowed   |
//! | key          | `[A-Za-z0-9_$]+` immediately followed by `=`                      |
//! | plain value  | up to end of line, or up to the whitespace run before the next `key=` or `<name>`, trailing whitespace trimmed |
//! | quoted value | starts with `"`, runs to the next `"`, quotes removed, no escapes  |

use nom::bytes::complete::{tag, take_while, take_while1};
use nom::character::complete::{space0, space1};
use nom::combinator::{opt, rest};
use nom::sequence::{delimited, terminated};
use nom::IResult;

/// One lexical item of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lexeme<'a> {
    Header(&'a [u8]),
    Opcode { key: &'a [u8], value: &'a [u8] },
}

/// A lexing failure; `column` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub column: usize,
    pub message: String,
}

pub(crate) fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == 0x0B || b == 0x0C
}

pub(crate) fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn is_key_byte(b: u8) -> bool {
    is_name_byte(b) || b == b'$'
}

pub(crate) fn trim_blanks(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_blank(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !is_blank(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn blanks(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while(is_blank)(input)
}

fn header(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(tag("<"), take_while1(is_name_byte), tag(">"))(input)
}

fn opcode_key(input: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_while1(is_key_byte), tag("="))(input)
}

fn quoted(input: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(tag("\""), take_while(|b| b != b'"'), tag("\""))(input)
}

/// True if `input` starts with something that ends a plain value.
fn starts_token(input: &[u8]) -> bool {
    header(input).is_ok() || opcode_key(input).is_ok()
}

/// Length of a plain (unquoted) value at the start of `input`, trailing blanks
/// excluded.
pub(crate) fn plain_value_len(input: &[u8]) -> usize {
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b == b'<' && header(&input[i..]).is_ok() {
            break;
        }
        if is_blank(b) {
            let run = input[i..].iter().take_while(|&&c| is_blank(c)).count();
            let next = i + run;
            if next == input.len() || starts_token(&input[next..]) {
                break;
            }
            i = next;
            continue;
        }
        i += 1;
    }
    input[..i].iter().rposition(|&b| !is_blank(b)).map_or(0, |p| p + 1)
}

/// Split one logical line into headers and opcodes.
pub(crate) fn lex_line(line: &[u8]) -> Result<Vec<Lexeme<'_>>, LexError> {
    let column = |rest: &[u8]| line.len() - rest.len() + 1;
    let mut lexemes = Vec::new();
    let mut rest = line;

    loop {
        rest = blanks(rest).map(|(r, _)| r).unwrap_or(rest);
        if rest.is_empty() {
            break;
        }

        if let Ok((after, name)) = header(rest) {
            lexemes.push(Lexeme::Header(name));
            rest = after;
            continue;
        }

        if let Ok((after, key)) = opcode_key(rest) {
            let value_start = blanks(after).map(|(r, _)| r).unwrap_or(after);
            // `key=   other=1`: the blanks separate an empty value from the next opcode
            if value_start.len() < after.len() && starts_token(value_start) {
                lexemes.push(Lexeme::Opcode { key, value: &[] });
                rest = value_start;
                continue;
            }
            if value_start.first() == Some(&b'"') {
                match quoted(value_start) {
                    Ok((after_quote, value)) => {
                        lexemes.push(Lexeme::Opcode { key, value });
                        rest = after_quote;
                    }
                    Err(_) => {
                        return Err(LexError {
                            column: column(value_start),
                            message: format!(
                                "unterminated quoted value for opcode '{}'",
                                String::from_utf8_lossy(key)
                            ),
                        });
                    }
                }
            } else {
                let len = plain_value_len(value_start);
                lexemes.push(Lexeme::Opcode { key, value: &value_start[..len] });
                rest = &value_start[len..];
            }
            continue;
        }

        let snippet_len = rest.iter().position(|&b| is_blank(b)).unwrap_or(rest.len());
        let message = if rest[0] == b'<' {
            format!("malformed header '{}'", String::from_utf8_lossy(&rest[..snippet_len]))
        } else {
            format!(
                "expected a header or opcode, found '{}'",
                String::from_utf8_lossy(&rest[..snippet_len])
            )
        };
        return Err(LexError { column: column(rest), message });
    }

    Ok(lexemes)
}

/// Parse `#define $NAME value`; the `$` is optional. Returns name and value.
pub(crate) fn define_directive(line: &[u8]) -> Option<(&[u8], &[u8])> {
    fn parse(input: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
        let (input, _) = tag("#define")(input)?;
        let (input, _) = space1(input)?;
        let (input, _) = opt(tag("$"))(input)?;
        let (input, name) = take_while1(is_name_byte)(input)?;
        let (input, gap) = space0(input)?;
        let (input, value) = rest(input)?;
        if gap.is_empty() && !value.is_empty() {
            // `#define $A-B`: the name must be followed by whitespace
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Space,
            )));
        }
        Ok((input, (name, trim_blanks(value))))
    }
    parse(trim_blanks(line)).ok().map(|(_, parsed)| parsed)
}

/// Parse `#include "path"` (quotes optional when the path has no blanks).
pub(crate) fn include_directive(line: &[u8]) -> Option<&[u8]> {
    fn parse(input: &[u8]) -> IResult<&[u8], &[u8]> {
        let (input, _) = tag("#include")(input)?;
        let (input, _) = space0(input)?;
        if input.first() == Some(&b'"') {
            quoted(input)
        } else {
            take_while1(|b: u8| !is_blank(b))(input)
        }
    }
    match parse(trim_blanks(line)) {
        Ok((remaining, path)) if trim_blanks(remaining).is_empty() => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opcode<'a>(key: &'a str, value: &'a str) -> Lexeme<'a> {
        Lexeme::Opcode { key: key.as_bytes(), value: value.as_bytes() }
    }

    #[test]
    fn test_headers_and_opcodes_on_one_line() {
        let lexemes = lex_line(b"<region> sample=kick.wav key=36 <region>lokey=40").unwrap();
        assert_eq!(
            lexemes,
            vec![
                Lexeme::Header(b"region"),
                opcode("sample", "kick.wav"),
                opcode("key", "36"),
                Lexeme::Header(b"region"),
                opcode("lokey", "40"),
            ]
        );
    }

    #[test]
    fn test_value_with_spaces_runs_to_next_key() {
        let lexemes = lex_line(b"sample=My Piano C4.wav   pitch_keycenter=60  ").unwrap();
        assert_eq!(
            lexemes,
            vec![opcode("sample", "My Piano C4.wav"), opcode("pitch_keycenter", "60")]
        );
    }

    #[test]
    fn test_value_stops_at_glued_header() {
        let lexemes = lex_line(b"sample=a.wav<region>").unwrap();
        assert_eq!(lexemes, vec![opcode("sample", "a.wav"), Lexeme::Header(b"region")]);
    }

    #[test]
    fn test_quoted_value_keeps_equals_and_spaces() {
        let lexemes = lex_line(br#"label="a b=c" volume=-3"#).unwrap();
        assert_eq!(lexemes, vec![opcode("label", "a b=c"), opcode("volume", "-3")]);
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(lex_line(b"sample=").unwrap(), vec![opcode("sample", "")]);
        assert_eq!(
            lex_line(b"sample=   key=60").unwrap(),
            vec![opcode("sample", ""), opcode("key", "60")]
        );
    }

    #[test]
    fn test_non_utf8_value_bytes_survive() {
        let lexemes = lex_line(b"sample=caf\xE9.wav").unwrap();
        assert_eq!(
            lexemes,
            vec![Lexeme::Opcode { key: b"sample", value: b"caf\xE9.wav" }]
        );
    }

    #[test]
    fn test_errors() {
        let err = lex_line(b"<region> stray").unwrap_err();
        assert_eq!(err.column, 10);
        assert!(err.message.contains("stray"));

        let err = lex_line(b"<region").unwrap_err();
        assert!(err.message.contains("malformed header"));

        let err = lex_line(br#"label="open"#).unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_directives() {
        assert_eq!(
            define_directive(b"#define $VOL  -6 dB "),
            Some((&b"VOL"[..], &b"-6 dB"[..]))
        );
        assert_eq!(define_directive(b"#define KEY 60"), Some((&b"KEY"[..], &b"60"[..])));
        assert_eq!(define_directive(b"#define $EMPTY"), Some((&b"EMPTY"[..], &b""[..])));
        assert_eq!(define_directive(b"#define"), None);

        assert_eq!(include_directive(br#"#include "sub dir/a.sfz""#), Some(&b"sub dir/a.sfz"[..]));
        assert_eq!(include_directive(b"#include b.sfz"), Some(&b"b.sfz"[..]));
        assert_eq!(include_directive(br#"#include "a.sfz" trailing"#), None);
    }
}

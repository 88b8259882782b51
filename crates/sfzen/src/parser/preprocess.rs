//! Preprocessor: comments, line continuations, `#define` and `#include`.
//!
//! The preprocessor turns the bytes of a root file into a flat token stream. Every
//! run owns a [`PreprocessContext`] holding the macro table, the include stack and
//! the diagnostics collected so far, so independent documents can be processed on
//! different threads.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::parser::encoding::{DocumentEncoding, SourceEncoding, UTF8_BOM};
use crate::parser::error::Error;
use crate::parser::lexer::{
    define_directive, include_directive, is_blank, is_name_byte, lex_line, trim_blanks, Lexeme,
};
use crate::parser::path_utils::{lexical_normalize, normalize_path};
use crate::parser::token::{FileId, Origin, Token, TokenKind};
use crate::parser::types::Diagnostic;
use crate::parser::{ParseOptions, Result};

/// Loads the content of included files
///
/// `resolve` maps a candidate path to the identity used for cycle detection, or
/// `None` if there is no such file. `read` is only called with identities returned
/// by `resolve`.
pub trait IncludeResolver {
    fn resolve(&self, path: &Path) -> Option<PathBuf>;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Resolves includes on the filesystem; identities are canonical paths
#[derive(Debug, Clone, Copy, Default)]
pub struct FsResolver;

impl IncludeResolver for FsResolver {
    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        fs::canonicalize(path).ok().filter(|canonical| canonical.is_file())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// Resolves includes from an in-memory map of files
///
/// Paths are normalized lexically, so `a/../b.sfz` and `b.sfz` name the same file.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        self.files.insert(lexical_normalize(path.as_ref()), content.into());
    }

    pub fn with_file(mut self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }
}

impl IncludeResolver for MemoryResolver {
    fn resolve(&self, path: &Path) -> Option<PathBuf> {
        let normalized = lexical_normalize(path);
        self.files.contains_key(&normalized).then_some(normalized)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(&lexical_normalize(path))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// `#define` macros of one document run
///
/// Names are stored without the leading `$`. Values are stored unexpanded and
/// substituted verbatim: the replacement text is never scanned again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    macros: HashMap<Vec<u8>, Vec<u8>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine a macro, returning the previous value
    pub fn define(&mut self, name: &[u8], value: &[u8]) -> Option<Vec<u8>> {
        self.macros.insert(name.to_vec(), value.to_vec())
    }

    pub fn get(&self, name: &[u8]) -> Option<&[u8]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Replace every `$NAME` in `line`; returns the new line and the names that
    /// matched no macro
    ///
    /// A name runs over `[A-Za-z0-9_]` and must match a definition in full:
    /// `$VOLUME` is unknown even when `VOL` is defined.
    pub fn expand(&self, line: &[u8]) -> (Vec<u8>, Vec<String>) {
        let mut out = Vec::with_capacity(line.len());
        let mut unknown = Vec::new();
        let mut i = 0;

        while i < line.len() {
            if line[i] != b'$' {
                out.push(line[i]);
                i += 1;
                continue;
            }
            let name_len = line[i + 1..].iter().take_while(|&&b| is_name_byte(b)).count();
            let name = &line[i + 1..i + 1 + name_len];
            match self.get(name).filter(|_| name_len > 0) {
                Some(value) => {
                    out.extend_from_slice(value);
                    i += 1 + name_len;
                }
                None => {
                    if name_len > 0 {
                        unknown.push(String::from_utf8_lossy(name).into_owned());
                    }
                    out.push(b'$');
                    out.extend_from_slice(name);
                    i += 1 + name_len;
                }
            }
        }

        (out, unknown)
    }
}

/// A physical line with its comments removed
#[derive(Debug, Default)]
struct StrippedLine {
    code: Vec<u8>,
    comment: Option<Vec<u8>>,
}

/// Removes `//` and `/* */` comments; block comments may span lines
#[derive(Debug, Default)]
struct CommentStripper {
    in_block: bool,
}

impl CommentStripper {
    fn strip(&mut self, line: &[u8]) -> StrippedLine {
        let mut stripped = StrippedLine::default();
        let directive = trim_blanks(line).starts_with(b"#");
        let mut i = 0;

        while i < line.len() {
            if self.in_block {
                match find(&line[i..], b"*/") {
                    Some(end) => {
                        self.in_block = false;
                        i += end + 2;
                    }
                    None => break,
                }
                continue;
            }

            let b = line[i];
            // a quoted value (or a quoted include path) may contain `//`; like the
            // lexer, blanks may sit between `=` and the opening quote
            let after_equals = stripped.code.iter().rev().find(|&&c| !is_blank(c)) == Some(&b'=');
            let opens_quote = b == b'"' && (directive || after_equals);
            if opens_quote {
                let close = line[i + 1..].iter().position(|&c| c == b'"');
                let end = close.map_or(line.len(), |offset| i + 1 + offset + 1);
                stripped.code.extend_from_slice(&line[i..end]);
                i = end;
                continue;
            }
            if line[i..].starts_with(b"//") {
                stripped.comment = Some(line[i + 2..].to_vec());
                break;
            }
            if line[i..].starts_with(b"/*") {
                self.in_block = true;
                stripped.code.push(b' ');
                i += 2;
                continue;
            }
            stripped.code.push(b);
            i += 1;
        }

        stripped
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// The line without its continuation marker, if it ends in a lone `\`
fn continuation_body(code: &[u8]) -> Option<&[u8]> {
    let end = code.iter().rposition(|&b| !is_blank(b))?;
    if code[end] != b'\\' {
        return None;
    }
    let body = &code[..end];
    match body.last() {
        None => Some(body),
        Some(&b) if is_blank(b) => Some(body),
        Some(_) => None,
    }
}

/// The output of a preprocessor run
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub tokens: Vec<Token>,
    /// Root file first, then included files in the order first read
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// Macro table as it stood at the end of the root file
    pub macros: MacroTable,
    pub encoding: DocumentEncoding,
}

/// Per-document preprocessor state
pub struct PreprocessContext<'a> {
    resolver: &'a dyn IncludeResolver,
    options: &'a ParseOptions,
    encoding: DocumentEncoding,
    macros: MacroTable,
    include_stack: Vec<PathBuf>,
    files: Vec<PathBuf>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> PreprocessContext<'a> {
    pub fn new(resolver: &'a dyn IncludeResolver, options: &'a ParseOptions, encoding: DocumentEncoding) -> Self {
        Self {
            resolver,
            options,
            encoding,
            macros: MacroTable::new(),
            include_stack: Vec::new(),
            files: Vec::new(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Process a root file and return everything collected
    pub fn run(mut self, root: &Path, content: &[u8]) -> Result<Preprocessed> {
        let identity = self.resolver.resolve(root).unwrap_or_else(|| root.to_path_buf());
        let file_id = self.file_id(&identity);
        self.include_stack.push(identity.clone());
        self.process_file(file_id, &identity, content)?;
        self.include_stack.pop();

        let last_line = self.tokens.last().map_or(0, |token| token.origin.line);
        self.tokens.push(Token::eof(Origin::new(file_id, last_line)));

        Ok(Preprocessed {
            tokens: self.tokens,
            files: self.files,
            diagnostics: self.diagnostics,
            macros: self.macros,
            encoding: self.encoding,
        })
    }

    fn file_id(&mut self, identity: &Path) -> FileId {
        match self.files.iter().position(|file| file == identity) {
            Some(id) => id,
            None => {
                self.files.push(identity.to_path_buf());
                self.files.len() - 1
            }
        }
    }

    fn process_file(&mut self, file_id: FileId, path: &Path, content: &[u8]) -> Result<()> {
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(content);
        let mut stripper = CommentStripper::default();
        let mut pending: Option<(usize, Vec<u8>)> = None;

        for (index, physical) in content.split(|&b| b == b'\n').enumerate() {
            let line = index + 1;
            let physical = physical.strip_suffix(b"\r").unwrap_or(physical);

            if self.options.strict_encoding {
                if let Err(offset) = self.encoding.encoding.validate(physical) {
                    return Err(Error::InvalidEncoding {
                        file: path.to_path_buf(),
                        line,
                        offset,
                        encoding: self.encoding.encoding,
                    });
                }
            }

            let stripped = stripper.strip(physical);
            let origin = Origin::new(file_id, line);

            if let Some(body) = continuation_body(&stripped.code) {
                let (_, buffer) = pending.get_or_insert_with(|| (line, Vec::new()));
                buffer.extend_from_slice(body);
                buffer.push(b' ');
                self.push_comment(stripped.comment.as_deref(), origin);
                continue;
            }

            match pending.take() {
                Some((start, mut buffer)) => {
                    buffer.extend_from_slice(&stripped.code);
                    self.process_line(file_id, path, start, &buffer)?;
                }
                None => self.process_line(file_id, path, line, &stripped.code)?,
            }
            self.push_comment(stripped.comment.as_deref(), origin);
        }

        if let Some((start, buffer)) = pending.take() {
            self.process_line(file_id, path, start, &buffer)?;
        }
        Ok(())
    }

    fn process_line(&mut self, file_id: FileId, path: &Path, line: usize, bytes: &[u8]) -> Result<()> {
        let trimmed = trim_blanks(bytes);
        if trimmed.is_empty() {
            return Ok(());
        }
        let origin = Origin::new(file_id, line);

        if trimmed.starts_with(b"#") {
            return self.directive(path, origin, trimmed);
        }

        let expanded = self.expand(trimmed, origin);
        let lexemes = lex_line(&expanded).map_err(|err| Error::Syntax {
            file: path.to_path_buf(),
            line,
            message: format!("{} (column {})", err.message, err.column),
        })?;

        for lexeme in lexemes {
            match lexeme {
                Lexeme::Header(name) => self.push_token(TokenKind::Header, name, origin),
                Lexeme::Opcode { key, value } => {
                    self.push_token(TokenKind::OpcodeKey, key, origin);
                    self.push_token(TokenKind::OpcodeValue, value, origin);
                }
            }
        }
        Ok(())
    }

    fn push_token(&mut self, kind: TokenKind, raw: &[u8], origin: Origin) {
        let text = self.encoding.encoding.decode_lossy(raw);
        self.tokens.push(Token::new(kind, text, raw.to_vec(), origin));
    }

    fn push_comment(&mut self, comment: Option<&[u8]>, origin: Origin) {
        if let (true, Some(comment)) = (self.options.keep_comments, comment) {
            self.push_token(TokenKind::Comment, trim_blanks(comment), origin);
        }
    }

    fn expand(&mut self, bytes: &[u8], origin: Origin) -> Vec<u8> {
        let (expanded, unknown) = self.macros.expand(bytes);
        for name in unknown {
            log::warn!(
                "Unknown macro ${} in {} at line {}",
                name,
                self.files.get(origin.file).map_or_else(String::new, |p| p.display().to_string()),
                origin.line
            );
            self.diagnostics.push(Diagnostic::UnknownMacro { name, origin });
        }
        expanded
    }

    fn directive(&mut self, path: &Path, origin: Origin, line: &[u8]) -> Result<()> {
        let syntax = |message: String| Error::Syntax { file: path.to_path_buf(), line: origin.line, message };

        if line.starts_with(b"#define") {
            let (name, value) = define_directive(line)
                .ok_or_else(|| syntax(format!("malformed #define: '{}'", String::from_utf8_lossy(line))))?;
            log::debug!(
                "#define ${} = '{}'",
                String::from_utf8_lossy(name),
                self.encoding.encoding.decode_lossy(value)
            );
            self.macros.define(name, value);
            return Ok(());
        }

        if line.starts_with(b"#include") {
            let expanded = self.expand(line, origin);
            let target = include_directive(&expanded)
                .ok_or_else(|| syntax(format!("malformed #include: '{}'", String::from_utf8_lossy(&expanded))))?
                .to_vec();
            return self.include(path, origin, &target);
        }

        let word_len = line.iter().position(|&b| is_blank(b)).unwrap_or(line.len());
        Err(syntax(format!("unknown directive '{}'", String::from_utf8_lossy(&line[..word_len]))))
    }

    fn include(&mut self, including: &Path, origin: Origin, target: &[u8]) -> Result<()> {
        let target = PathBuf::from(normalize_path(&self.encoding.encoding.decode_lossy(target)));
        let candidate = if target.is_absolute() {
            target
        } else {
            including.parent().unwrap_or_else(|| Path::new("")).join(target)
        };

        let identity = self.resolver.resolve(&candidate).ok_or_else(|| Error::IncludeNotFound {
            path: candidate.clone(),
            file: including.to_path_buf(),
            line: origin.line,
        })?;
        if self.include_stack.contains(&identity) {
            return Err(Error::IncludeCycle {
                path: identity,
                file: including.to_path_buf(),
                line: origin.line,
            });
        }
        if self.include_stack.len() > self.options.max_include_depth {
            return Err(Error::IncludeDepth { path: identity, depth: self.options.max_include_depth });
        }

        let content = self
            .resolver
            .read(&identity)
            .map_err(|source| Error::Read { path: identity.clone(), source })?;
        let file_id = self.file_id(&identity);
        log::debug!(
            "Including {} from {} at line {}",
            identity.display(),
            including.display(),
            origin.line
        );

        self.include_stack.push(identity.clone());
        let result = self.process_file(file_id, &identity, &content);
        self.include_stack.pop();
        result
    }
}

/// Preprocess `content`, read from `root`, into a token stream
///
/// The encoding is taken from the options, or detected from the root file.
pub fn preprocess(
    root: &Path,
    content: &[u8],
    resolver: &dyn IncludeResolver,
    options: &ParseOptions,
) -> Result<Preprocessed> {
    let encoding = match options.encoding {
        Some(encoding) => DocumentEncoding::declared(encoding),
        None => DocumentEncoding::detected(SourceEncoding::detect(content)),
    };
    PreprocessContext::new(resolver, options, encoding).run(root, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(files: &[(&str, &str)]) -> Result<Preprocessed> {
        let mut resolver = MemoryResolver::new();
        for (path, content) in files {
            resolver.insert(path, content.as_bytes());
        }
        let (root, content) = files[0];
        preprocess(Path::new(root), content.as_bytes(), &resolver, &ParseOptions::default())
    }

    fn texts(pre: &Preprocessed) -> Vec<&str> {
        pre.tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| t.text.as_str())
            .collect()
    }

    #[test]
    fn test_macro_expansion_and_redefinition() {
        let pre = run(&[(
            "/i/root.sfz",
            "#define $VOL 80\n<region> volume=$VOL\n#define $VOL 90\n<region> volume=$VOL\n",
        )])
        .unwrap();
        assert_eq!(texts(&pre), vec!["region", "volume", "80", "region", "volume", "90"]);
        assert_eq!(pre.macros.get(b"VOL"), Some(&b"90"[..]));
    }

    #[test]
    fn test_macro_full_name_and_single_pass() {
        let table = {
            let mut table = MacroTable::new();
            table.define(b"DIR", b"drums");
            table.define(b"A", b"$B");
            table.define(b"B", b"never");
            table
        };
        let (out, unknown) = table.expand(b"sample=$DIR/kick.wav x=$A y=$DIRkick");
        assert_eq!(out, b"sample=drums/kick.wav x=$B y=$DIRkick".to_vec());
        assert_eq!(unknown, vec!["DIRkick".to_string()]);
    }

    #[test]
    fn test_longer_name_is_not_expanded_by_prefix() {
        let pre = run(&[("/i/root.sfz", "#define $VOL 80\n<region> volume=$VOLUME pan=$VOL\n")]).unwrap();
        assert_eq!(texts(&pre), vec!["region", "volume", "$VOLUME", "pan", "80"]);
        assert_eq!(
            pre.diagnostics,
            vec![Diagnostic::UnknownMacro { name: "VOLUME".to_string(), origin: Origin::new(0, 2) }]
        );
    }

    #[test]
    fn test_unknown_macro_is_kept_and_reported() {
        let pre = run(&[("/i/root.sfz", "<region> sample=$MISSING.wav\n")]).unwrap();
        assert_eq!(texts(&pre), vec!["region", "sample", "$MISSING.wav"]);
        assert_eq!(
            pre.diagnostics,
            vec![Diagnostic::UnknownMacro { name: "MISSING".to_string(), origin: Origin::new(0, 1) }]
        );
    }

    #[test]
    fn test_quote_after_blanks_keeps_slashes() {
        let pre = run(&[("/i/root.sfz", "<region> label= \"a // b\" key=60 // note\n")]).unwrap();
        assert_eq!(texts(&pre), vec!["region", "label", "a // b", "key", "60"]);
    }

    #[test]
    fn test_comments() {
        let pre = run(&[(
            "/i/root.sfz",
            "<region> // a region\nsample=a.wav /* block\nstill comment */ key=60\nlabel=\"x // y\"\n",
        )])
        .unwrap();
        assert_eq!(
            texts(&pre),
            vec!["region", "sample", "a.wav", "key", "60", "label", "x // y"]
        );
    }

    #[test]
    fn test_keep_comments() {
        let resolver = MemoryResolver::new();
        let options = ParseOptions { keep_comments: true, ..ParseOptions::default() };
        let pre = preprocess(Path::new("/r.sfz"), b"<region> // note\n", &resolver, &options).unwrap();
        assert_eq!(pre.tokens[1].kind, TokenKind::Comment);
        assert_eq!(pre.tokens[1].text, "note");
    }

    #[test]
    fn test_line_continuation() {
        let pre = run(&[("/i/root.sfz", "<region> sample=a.wav \\\n key=60\ndefault_path=samples\\\n")]).unwrap();
        assert_eq!(
            texts(&pre),
            vec!["region", "sample", "a.wav", "key", "60", "default_path", "samples\\"]
        );
        // the continued line is reported at its first physical line
        assert_eq!(pre.tokens[3].origin.line, 1);
        assert_eq!(pre.tokens[5].origin.line, 3);
    }

    #[test]
    fn test_include_is_spliced_and_macros_stay_visible() {
        let pre = run(&[
            ("/i/root.sfz", "<group> lovel=1\n#include \"sub/inc.sfz\"\n<region> key=$KEY\n"),
            ("/i/sub/inc.sfz", "#define $KEY 61\n<region> key=60\n"),
        ])
        .unwrap();
        assert_eq!(
            texts(&pre),
            vec!["group", "lovel", "1", "region", "key", "60", "region", "key", "61"]
        );
        assert_eq!(pre.files, vec![PathBuf::from("/i/root.sfz"), PathBuf::from("/i/sub/inc.sfz")]);
        assert_eq!(pre.tokens[3].origin, Origin::new(1, 2));
    }

    #[test]
    fn test_include_path_uses_macros_and_backslashes() {
        let pre = run(&[
            ("/i/root.sfz", "#define $DIR sub\n#include \"$DIR\\inc.sfz\"\n"),
            ("/i/sub/inc.sfz", "<region> key=60\n"),
        ])
        .unwrap();
        assert_eq!(texts(&pre), vec!["region", "key", "60"]);
    }

    #[test]
    fn test_include_errors() {
        let err = run(&[("/i/root.sfz", "<region>\n#include \"nope.sfz\"\n")]).unwrap_err();
        assert!(matches!(err, Error::IncludeNotFound { line: 2, .. }));

        let err = run(&[("/i/root.sfz", "#include \"root.sfz\"\n")]).unwrap_err();
        assert!(matches!(err, Error::IncludeCycle { .. }));

        let err = run(&[
            ("/i/a.sfz", "#include \"b.sfz\"\n"),
            ("/i/b.sfz", "#include \"a.sfz\"\n"),
        ])
        .unwrap_err();
        match err {
            Error::IncludeCycle { path, file, .. } => {
                assert_eq!(path, PathBuf::from("/i/a.sfz"));
                assert_eq!(file, PathBuf::from("/i/b.sfz"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_include_depth_limit() {
        let mut resolver = MemoryResolver::new();
        for level in 0..5 {
            resolver.insert(format!("/d/{level}.sfz"), format!("#include \"{}.sfz\"\n", level + 1));
        }
        resolver.insert("/d/5.sfz", "<region> key=1\n");
        let options = ParseOptions { max_include_depth: 3, ..ParseOptions::default() };
        let err = preprocess(Path::new("/d/0.sfz"), b"#include \"1.sfz\"\n", &resolver, &options).unwrap_err();
        assert!(matches!(err, Error::IncludeDepth { depth: 3, .. }));

        let options = ParseOptions { max_include_depth: 5, ..ParseOptions::default() };
        assert!(preprocess(Path::new("/d/0.sfz"), b"#include \"1.sfz\"\n", &resolver, &options).is_ok());
    }

    #[test]
    fn test_unknown_directive() {
        let err = run(&[("/i/root.sfz", "#import foo\n")]).unwrap_err();
        match err {
            Error::Syntax { line, message, .. } => {
                assert_eq!(line, 1);
                assert!(message.contains("#import"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_strict_encoding() {
        let resolver = MemoryResolver::new();
        let options = ParseOptions {
            encoding: Some(SourceEncoding::Utf8),
            strict_encoding: true,
            ..ParseOptions::default()
        };
        let err = preprocess(Path::new("/r.sfz"), b"<region>\nsample=caf\xE9.wav\n", &resolver, &options)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { line: 2, offset: 10, .. }));
    }

    #[test]
    fn test_bom_and_crlf() {
        let pre = run(&[("/i/root.sfz", "\u{FEFF}<region>\r\nkey=60\r\n")]).unwrap();
        assert_eq!(texts(&pre), vec!["region", "key", "60"]);
    }
}

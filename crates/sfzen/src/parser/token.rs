//! Tokens produced by the preprocessor.

/// Index into the list of source files of a document (0 is the root file).
pub type FileId = usize;

/// Where a token, opcode or section came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Origin {
    /// Source file, see [`SfzDocument::source_path`](crate::SfzDocument::source_path)
    pub file: FileId,
    /// Line number (1-based); 0 for content created through the API
    pub line: usize,
}

impl Origin {
    pub fn new(file: FileId, line: usize) -> Self {
        Self { file, line }
    }
}

/// The kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `<name>`; the text is the name without brackets
    Header,
    /// The name of an opcode, without the `=`
    OpcodeKey,
    /// The value of the preceding opcode key, with quotes removed
    OpcodeValue,
    /// A `//` comment, only emitted when comments are kept
    Comment,
    /// End of the root file
    Eof,
}

/// A single token with its text and source location.
///
/// `raw` holds the bytes exactly as they appeared in the (macro-expanded) source;
/// `text` is their lossy decoding in the document encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub raw: Vec<u8>,
    pub origin: Origin,
}

impl Token {
    pub fn new(kind: TokenKind, text: String, raw: Vec<u8>, origin: Origin) -> Self {
        Self { kind, text, raw, origin }
    }

    pub fn eof(origin: Origin) -> Self {
        Self::new(TokenKind::Eof, String::new(), Vec::new(), origin)
    }
}

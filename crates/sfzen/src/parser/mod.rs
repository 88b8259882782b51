//! SFZ parser
//!
//! Reading a document happens in two stages. The [preprocessor](preprocess) turns
//! raw bytes into a token stream, stripping comments, expanding `#define` macros and
//! inlining `#include` files. The parser then groups the tokens into a flat list of
//! typed sections.

use std::fs;
use std::path::Path;

mod encoding;
mod error;
pub(crate) mod lexer;
mod parse;
mod preprocess;
mod token;
mod types;
pub mod opcodes;
pub mod path_utils;

pub use encoding::{DocumentEncoding, SourceEncoding, UTF8_BOM};
pub use error::Error;
pub use preprocess::{
    preprocess, FsResolver, IncludeResolver, MacroTable, MemoryResolver, PreprocessContext, Preprocessed,
};
pub use token::{FileId, Origin, Token, TokenKind};
pub use types::{Diagnostic, Opcode, SfzDocument, SfzSection, SfzSectionType};

pub use opcodes::{
    parse_midi_note, LoopMode, OpcodeValue, RegionLogicOpcodes, SamplePlaybackOpcodes, SfzOpcodes,
    TriggerMode,
};
pub use path_utils::{combine_sample_path, normalize_path};

pub type Result<T> = std::result::Result<T, Error>;

/// Include nesting allowed by default
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// What to do with opcodes written before the first header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Fail with [`Error::OrphanOpcode`]
    #[default]
    Reject,
    /// Collect them into an implicit leading `<global>` section, which is written
    /// back without a header
    ImplicitGlobal,
}

/// Options for reading SFZ documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Encoding of the source files; detected from the root file when `None`
    pub encoding: Option<SourceEncoding>,
    /// Fail with [`Error::InvalidEncoding`] instead of decoding invalid bytes lossily
    pub strict_encoding: bool,
    pub orphans: OrphanPolicy,
    /// Emit [`TokenKind::Comment`] tokens for `//` comments
    pub keep_comments: bool,
    /// Maximum nesting of `#include` directives
    pub max_include_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            strict_encoding: false,
            orphans: OrphanPolicy::Reject,
            keep_comments: false,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Parse SFZ text
///
/// The text is UTF-8, so `options.encoding` is ignored. Includes are resolved
/// relative to the current directory.
pub fn parse_sfz_str(content: &str, options: &ParseOptions) -> Result<SfzDocument> {
    let options = ParseOptions { encoding: Some(SourceEncoding::Utf8), ..options.clone() };
    parse_with_resolver(Path::new(""), content.as_bytes(), &FsResolver, &options)
}

/// Parse SFZ content in any supported encoding
pub fn parse_sfz_bytes(content: &[u8], options: &ParseOptions) -> Result<SfzDocument> {
    parse_with_resolver(Path::new(""), content, &FsResolver, options)
}

/// Parse an SFZ file from a file path
///
/// The document records the canonical path of the file, and of every included file,
/// in [`SfzDocument::sources`].
pub fn parse_sfz_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<SfzDocument> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
    let absolute_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    parse_with_resolver(&absolute_path, &content, &FsResolver, options)
}

/// Parse `content` as if read from `root`, loading includes through `resolver`
pub fn parse_with_resolver(
    root: &Path,
    content: &[u8],
    resolver: &dyn IncludeResolver,
    options: &ParseOptions,
) -> Result<SfzDocument> {
    let pre = preprocess(root, content, resolver, options)?;
    let sections = parse::build_sections(&pre, options)?;
    log::debug!(
        "Parsed {} sections from {} file(s) of {}",
        sections.len(),
        pre.files.len(),
        root.display()
    );
    Ok(SfzDocument::from_parts(sections, pre.files, pre.encoding, pre.diagnostics))
}

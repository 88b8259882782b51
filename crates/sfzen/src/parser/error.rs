use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parser::encoding::SourceEncoding;

/// Errors that can occur while reading, preprocessing or parsing SFZ files
///
/// Every variant that comes out of the preprocessor or the parser is fatal for the
/// document being processed and carries enough provenance (file and line) to point
/// the user at the offending text. Findings that only affect a single region, such
/// as a missing sample file, are not errors; they are reported as
/// [`SampleIssue`](crate::samples::SampleIssue) values instead.
///
/// # Common SFZ Errors
///
/// - Malformed headers such as `<region` or `<>`
/// - Text that is neither a header nor a `key=value` pair
/// - `#include` directives pointing at files that do not exist, or at a file that
///   is already being included
/// - Opcodes written before the first header
#[derive(Error, Debug)]
pub enum Error {
    /// Input/Output error when reading files
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// A file could not be read
    ///
    /// Unlike [`Error::IO`] this keeps the path that failed, which is what batch
    /// tools print when one document out of many cannot be opened.
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        /// The file that could not be read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Malformed header, opcode or directive
    ///
    /// Common causes include:
    /// - Missing angle brackets in section headers
    /// - Stray words that are not followed by `=`
    /// - A quoted value without its closing quote
    /// - Unknown preprocessor directives such as `#import`
    #[error("Syntax error in {} at line {line}: {message}", .file.display())]
    Syntax {
        /// File containing the error
        file: PathBuf,
        /// Line number where the error occurred (1-based)
        line: usize,
        /// Description of the problem, including the offending text
        message: String,
    },

    /// An `#include` directive points at a file that does not exist
    #[error("Include not found: {} (included from {} at line {line})", .path.display(), .file.display())]
    IncludeNotFound {
        /// The path the directive resolved to
        path: PathBuf,
        /// The file containing the directive
        file: PathBuf,
        /// Line of the directive (1-based)
        line: usize,
    },

    /// An `#include` directive points at a file that is already being processed
    ///
    /// The include stack is checked before any content of the target is read, so a
    /// file that includes itself, directly or through other files, fails here
    /// instead of recursing forever.
    #[error("Include cycle: {} is already open (included from {} at line {line})", .path.display(), .file.display())]
    IncludeCycle {
        /// The file that would have been entered a second time
        path: PathBuf,
        /// The file containing the directive
        file: PathBuf,
        /// Line of the directive (1-based)
        line: usize,
    },

    /// Includes are nested deeper than the configured limit
    #[error("Include depth limit of {depth} exceeded at {}", .path.display())]
    IncludeDepth {
        /// The file that would have exceeded the limit
        path: PathBuf,
        /// The configured maximum depth
        depth: usize,
    },

    /// An opcode appears before any header
    ///
    /// This is only reported with [`OrphanPolicy::Reject`](crate::parser::OrphanPolicy).
    /// With [`OrphanPolicy::ImplicitGlobal`](crate::parser::OrphanPolicy) such opcodes
    /// are collected into an implicit leading `<global>` section.
    #[error("Opcode '{name}' appears before any header in {} at line {line}", .file.display())]
    OrphanOpcode {
        /// The opcode name
        name: String,
        /// File containing the opcode
        file: PathBuf,
        /// Line of the opcode (1-based)
        line: usize,
    },

    /// Source text that is not valid in the configured encoding
    ///
    /// Only reported when strict decoding is requested in
    /// [`ParseOptions`](crate::parser::ParseOptions); by default invalid bytes are
    /// kept raw and decoded lossily.
    #[error("Invalid {encoding} text in {} at line {line}, byte {offset}", .file.display())]
    InvalidEncoding {
        /// File containing the invalid bytes
        file: PathBuf,
        /// Line number (1-based)
        line: usize,
        /// Byte offset of the first invalid byte within the line
        offset: usize,
        /// The encoding the line was decoded with
        encoding: SourceEncoding,
    },

    /// Invalid opcode value for a particular type
    ///
    /// This occurs when an opcode value cannot be converted to the expected type,
    /// for example `key=foo` where a note number or note name is expected.
    #[error("Invalid value '{0}' for type {1}")]
    InvalidOpcodeValue(String, String),

    /// Missing required opcode
    #[error("Opcode '{0}' not found")]
    MissingOpcode(String),

    /// An operation that only applies to regions was given another section
    #[error("Section {0} is not a region")]
    NotARegion(usize),

    /// A sample file could not be copied
    #[error("Failed to copy {} to {}: {source}", .from.display(), .to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A sample file could not be probed as WAV
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl Error {
    /// The source line this error points at, if it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Syntax { line, .. }
            | Error::IncludeNotFound { line, .. }
            | Error::IncludeCycle { line, .. }
            | Error::OrphanOpcode { line, .. }
            | Error::InvalidEncoding { line, .. } => Some(*line),
            _ => None,
        }
    }
}

//! core::error
//!
//! Failure kinds raised while reading, expanding and resolving a document.
//!
//! These are detected close to the offending line. The walker attaches the
//! document path, line number and line text (see
//! [`crate::engine::walker::WalkError`]) and nothing below it recovers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from parsing a single line (or a document read).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Unterminated, conflicting or self-referencing macro definition.
    #[error("malformed definition: {0}")]
    MalformedDefinition(String),

    /// A macro invocation supplied fewer arguments than its arity.
    #[error("{name} expects {expected} argument(s), got {found} in '{invocation}'")]
    ArgumentCount {
        /// Command name, including the backslash
        name: String,
        /// Declared arity
        expected: usize,
        /// Arguments found on the line
        found: usize,
        /// The text that was recognized as the invocation
        invocation: String,
    },

    /// A required include is missing, or an extension-less include matches
    /// more than one file.
    #[error("unresolved include '{written}': {reason}")]
    UnresolvedInclude {
        /// The path as written in the source
        written: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// The written extension conflicts with the directive's kind.
    #[error("expected {expected} file, got '{written}'")]
    ExtensionMismatch {
        /// The path as written in the source
        written: String,
        /// Human-readable list of acceptable extensions
        expected: String,
    },

    /// The include resolves outside of the root directory.
    #[error("include '{written}' resolves outside of the root directory")]
    EscapesRoot {
        /// The path as written in the source
        written: String,
    },

    /// A document includes itself, directly or through other documents.
    #[error("cyclic include: {}", format_chain(.chain))]
    CyclicInclude {
        /// Documents currently being parsed, ending with the re-entered one
        chain: Vec<PathBuf>,
    },

    /// None of the candidate encodings could decode the document.
    #[error("unable to read {} with encodings [{}]; pass --encodings", .path.display(), .encodings.join(", "))]
    EncodingExhausted {
        /// The document that could not be decoded
        path: PathBuf,
        /// The candidates that were tried, in order
        encodings: Vec<String>,
    },

    /// An encoding label is not known.
    #[error("unknown encoding '{0}'")]
    UnknownEncoding(String),
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

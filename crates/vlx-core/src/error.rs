//! Error types for VLX parsing, linking, binary decoding, and serialization.

use thiserror::Error;

/// Errors that can occur while reading, linking, or writing a VLX document.
#[derive(Error, Debug)]
pub enum VlxError {
    /// An unrecognized character, or an unterminated string, comment, or
    /// rawtext block. Carries the 1-based line number where lexing stopped.
    #[error("Line {line}: {message}")]
    Lex { line: usize, message: String },

    /// The token sequence does not match the document grammar.
    #[error("Line {line}: parse error at '{token}'.")]
    Parse { line: usize, token: String },

    /// The input does not start with `<NAME> version = N encoding = E`.
    #[error("Line {line}: VLX header not found.")]
    HeaderNotFound { line: usize },

    #[error("Line {line}: VLX version {version} not supported.")]
    UnsupportedVersion { line: usize, version: i64 },

    #[error("Line {line}: VLX encoding '{encoding}' not supported.")]
    UnsupportedEncoding { line: usize, encoding: String },

    /// One or more UID problems found while linking. Every problem from both
    /// passes is reported, not just the first.
    #[error("Link failed with {} error(s): {}", .0.len(), join_link_errors(.0))]
    Link(Vec<LinkError>),

    /// The binary stream is malformed (bad magic, truncated, unknown chunk).
    #[error("Binary decode error: {0}")]
    BinaryDecode(String),

    /// A structure could not be turned into a domain object.
    #[error("Import error: {0}")]
    Import(String),

    /// A domain object could not be turned into a structure.
    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single problem found by the linker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Two distinct structures declare the same uid.
    #[error("duplicate UID {uid} (declared by {first_tag} and {second_tag})")]
    DuplicateUid {
        uid: String,
        first_tag: String,
        second_tag: String,
    },

    /// A UID value names a structure that nobody declares.
    #[error("line {line}: unresolved UID {uid}")]
    UnresolvedUid { uid: String, line: usize },
}

fn join_link_errors(errors: &[LinkError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience alias used throughout vlx-core.
pub type Result<T> = std::result::Result<T, VlxError>;

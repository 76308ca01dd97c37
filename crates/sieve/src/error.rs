//! Error types for the sieve crate.

use std::io;

use thiserror::Error;

use crate::token::TokenKind;

/// Errors raised while constructing a mask by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    /// The same field name was inserted twice at one level.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),
}

/// A rejected mask expression.
///
/// `offset` is the byte offset of the offending character in the input
/// (the input length when the problem is an unexpected end of input).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct ParseError {
    /// What went wrong.
    pub kind: ParseErrorKind,
    /// Byte offset into the expression.
    pub offset: usize,
}

impl ParseError {
    pub(crate) fn new(kind: ParseErrorKind, offset: usize) -> Self {
        ParseError { kind, offset }
    }
}

/// The reason a mask expression was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseErrorKind {
    /// A field name was empty (`a,,b`, a lone `-`, `(,`).
    #[error("empty field name")]
    EmptyField,

    /// The same name appeared twice within one level.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// A `:` was not followed by `(`.
    #[error("expected '(' after ':' for field '{0}'")]
    ExpectedOpenParen(String),

    /// A subtree was opened and immediately closed: `a:()`.
    #[error("empty subtree for field '{0}'")]
    EmptySubtree(String),

    /// End of input reached while a subtree was still open.
    #[error("unexpected end of input: missing closing ')'")]
    UnclosedSubtree,

    /// A `)` with no open subtree.
    #[error("unmatched ')'")]
    UnmatchedClose,

    /// A `,` with nothing after it.
    #[error("trailing ','")]
    TrailingSeparator,

    /// Something other than `:`, `,`, `)` or end of input followed a name.
    #[error("unexpected '{found}' after field '{field}'")]
    UnexpectedChar { found: char, field: String },

    /// Something other than `,`, `)` or end of input followed a `)`.
    #[error("expected ',' or ')' but found '{0}'")]
    ExpectedSeparator(char),

    /// Nesting went deeper than the configured limit.
    #[error("nesting exceeds the maximum depth of {0}")]
    DepthExceeded(usize),
}

/// Errors surfaced while projecting a document stream.
///
/// The projector defines no semantic errors of its own: everything here
/// comes from the underlying codec or from a token stream that is not a
/// well-formed document.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Reading or writing the underlying byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The JSON codec rejected the input or failed to encode output.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A token arrived where the document grammar does not allow it.
    #[error("unexpected {found} token, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: TokenKind,
    },

    /// The token stream ended in the middle of a value.
    #[error("unexpected end of token stream")]
    UnexpectedEnd,

    /// The input is not well-formed JSON text.
    #[error("invalid JSON at byte {offset}: {reason}")]
    Syntax { reason: &'static str, offset: u64 },
}

impl StreamError {
    pub(crate) fn unexpected(expected: &'static str, found: TokenKind) -> Self {
        StreamError::UnexpectedToken { expected, found }
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

//! The abstract document-stream interface.
//!
//! The projector never sees a concrete wire format. It pulls [`Token`]s
//! from a [`TokenSource`] and pushes them into a [`TokenSink`]; adapters for
//! JSON text and for in-memory `serde_json::Value` trees live in
//! [`crate::json`] and [`crate::value`].
//!
//! A document is a single value:
//!
//! ```text
//! value  = scalar
//!        | BeginObject (Key value)* EndObject
//!        | BeginArray value* EndArray
//! ```

use std::fmt;

use serde_json::Number;

use crate::error::{Result, StreamError};

/// One unit of a hierarchical document.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BeginObject,
    /// An object member name. Always followed by exactly one value.
    Key(String),
    EndObject,
    BeginArray,
    EndArray,
    Scalar(Scalar),
}

impl Token {
    /// The token's kind, without its payload.
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::BeginObject => TokenKind::BeginObject,
            Token::Key(_) => TokenKind::Key,
            Token::EndObject => TokenKind::EndObject,
            Token::BeginArray => TokenKind::BeginArray,
            Token::EndArray => TokenKind::EndArray,
            Token::Scalar(_) => TokenKind::Scalar,
        }
    }
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<Number> for Scalar {
    fn from(n: Number) -> Self {
        Scalar::Number(n)
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

/// The kind of the next token, as reported by [`TokenSource::peek_kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    BeginObject,
    Key,
    EndObject,
    BeginArray,
    EndArray,
    Scalar,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::BeginObject => "begin-object",
            TokenKind::Key => "key",
            TokenKind::EndObject => "end-object",
            TokenKind::BeginArray => "begin-array",
            TokenKind::EndArray => "end-array",
            TokenKind::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// Pull side of the stream interface.
pub trait TokenSource {
    /// Reports the kind of the next token without consuming it.
    ///
    /// Returns `None` once the stream is exhausted.
    fn peek_kind(&mut self) -> Result<Option<TokenKind>>;

    /// Consumes the next token.
    ///
    /// Fails with [`StreamError::UnexpectedEnd`] if there is none.
    fn next_token(&mut self) -> Result<Token>;

    /// Consumes one complete value without emitting it.
    fn skip_value(&mut self) -> Result<()> {
        walk_value(self, |_| Ok(()))
    }
}

/// Push side of the stream interface.
pub trait TokenSink {
    /// Emits one token.
    fn write_token(&mut self, token: Token) -> Result<()>;
}

impl<S: TokenSource + ?Sized> TokenSource for &mut S {
    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        (**self).peek_kind()
    }

    fn next_token(&mut self) -> Result<Token> {
        (**self).next_token()
    }

    fn skip_value(&mut self) -> Result<()> {
        (**self).skip_value()
    }
}

impl<K: TokenSink + ?Sized> TokenSink for &mut K {
    fn write_token(&mut self, token: Token) -> Result<()> {
        (**self).write_token(token)
    }
}

impl TokenSink for Vec<Token> {
    fn write_token(&mut self, token: Token) -> Result<()> {
        self.push(token);
        Ok(())
    }
}

/// Moves one complete value from `source` into `sink` unchanged.
pub fn copy_value<S, K>(source: &mut S, sink: &mut K) -> Result<()>
where
    S: TokenSource + ?Sized,
    K: TokenSink + ?Sized,
{
    walk_value(source, |token| sink.write_token(token))
}

/// Reads exactly one value, handing every token to `emit`.
///
/// Tracks nesting with a counter instead of recursing, so arbitrarily deep
/// values are fine.
fn walk_value<S, F>(source: &mut S, mut emit: F) -> Result<()>
where
    S: TokenSource + ?Sized,
    F: FnMut(Token) -> Result<()>,
{
    let mut depth = 0usize;
    loop {
        let token = source.next_token()?;
        match token.kind() {
            TokenKind::BeginObject | TokenKind::BeginArray => depth += 1,
            TokenKind::EndObject | TokenKind::EndArray => {
                if depth == 0 {
                    return Err(StreamError::unexpected("a value", token.kind()));
                }
                depth -= 1;
            }
            TokenKind::Key if depth == 0 => {
                return Err(StreamError::unexpected("a value", TokenKind::Key));
            }
            TokenKind::Key | TokenKind::Scalar => {}
        }
        emit(token)?;
        if depth == 0 {
            return Ok(());
        }
    }
}

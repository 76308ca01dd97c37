//! Compact JSON output for token streams.

use std::io::Write;

use crate::error::{Result, StreamError};
use crate::token::{Scalar, Token, TokenKind, TokenSink};

/// A [`TokenSink`] that encodes tokens as compact JSON.
///
/// Token order is checked as it is written, so a malformed stream fails
/// with [`StreamError::UnexpectedToken`] instead of producing invalid text.
#[derive(Debug)]
pub struct JsonWriter<W> {
    out: W,
    frames: Vec<Frame>,
    complete: bool,
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Object { first: bool, after_key: bool },
    Array { first: bool },
}

impl<W: Write> JsonWriter<W> {
    pub fn new(out: W) -> Self {
        JsonWriter {
            out,
            frames: Vec::new(),
            complete: false,
        }
    }

    /// Returns the underlying writer without checking for completeness.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Flushes and returns the writer, failing if the document is unfinished.
    pub fn finish(mut self) -> Result<W> {
        if !self.complete {
            return Err(StreamError::UnexpectedEnd);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    /// Writes the separator a value needs at the current position.
    fn begin_value(&mut self, kind: TokenKind) -> Result<()> {
        match self.frames.last_mut() {
            None if self.complete => Err(StreamError::unexpected("end of document", kind)),
            None => Ok(()),
            Some(Frame::Array { first }) => {
                if !std::mem::replace(first, false) {
                    self.out.write_all(b",")?;
                }
                Ok(())
            }
            Some(Frame::Object { after_key, .. }) if *after_key => {
                *after_key = false;
                Ok(())
            }
            Some(Frame::Object { .. }) => Err(StreamError::unexpected("a key", kind)),
        }
    }

    fn end_value(&mut self) {
        if self.frames.is_empty() {
            self.complete = true;
        }
    }

    fn scalar(&mut self, scalar: &Scalar) -> Result<()> {
        match scalar {
            Scalar::Null => self.out.write_all(b"null")?,
            Scalar::Bool(true) => self.out.write_all(b"true")?,
            Scalar::Bool(false) => self.out.write_all(b"false")?,
            Scalar::Number(n) => write!(self.out, "{n}")?,
            Scalar::String(s) => serde_json::to_writer(&mut self.out, s)?,
        }
        Ok(())
    }
}

impl<W: Write> TokenSink for JsonWriter<W> {
    fn write_token(&mut self, token: Token) -> Result<()> {
        let kind = token.kind();
        match token {
            Token::BeginObject => {
                self.begin_value(kind)?;
                self.out.write_all(b"{")?;
                self.frames.push(Frame::Object {
                    first: true,
                    after_key: false,
                });
            }
            Token::BeginArray => {
                self.begin_value(kind)?;
                self.out.write_all(b"[")?;
                self.frames.push(Frame::Array { first: true });
            }
            Token::Key(name) => {
                match self.frames.last_mut() {
                    Some(Frame::Object { first, after_key }) if !*after_key => {
                        if !std::mem::replace(first, false) {
                            self.out.write_all(b",")?;
                        }
                        *after_key = true;
                    }
                    _ => return Err(StreamError::unexpected("a value", kind)),
                }
                serde_json::to_writer(&mut self.out, &name)?;
                self.out.write_all(b":")?;
            }
            Token::EndObject => {
                match self.frames.last() {
                    Some(Frame::Object {
                        after_key: false, ..
                    }) => {}
                    _ => return Err(StreamError::unexpected("a value", kind)),
                }
                self.frames.pop();
                self.out.write_all(b"}")?;
                self.end_value();
            }
            Token::EndArray => {
                if !matches!(self.frames.last(), Some(Frame::Array { .. })) {
                    return Err(StreamError::unexpected("a value", kind));
                }
                self.frames.pop();
                self.out.write_all(b"]")?;
                self.end_value();
            }
            Token::Scalar(scalar) => {
                self.begin_value(kind)?;
                self.scalar(&scalar)?;
                self.end_value();
            }
        }
        Ok(())
    }
}

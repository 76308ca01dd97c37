//! Pull tokenizer for JSON text.

use std::io::{BufRead, BufReader, Read};

use serde_json::Number;

use crate::error::{Result, StreamError};
use crate::token::{Scalar, Token, TokenKind, TokenSource};

/// A [`TokenSource`] reading one JSON document from a byte stream.
///
/// Open containers live on a heap stack, so document depth is bounded only
/// by memory. String and number literals are decoded by `serde_json`;
/// numbers keep their source text.
///
/// ```
/// use sieve::{JsonReader, Token, TokenSource};
///
/// let mut reader = JsonReader::new(&br#"{"a":[]}"#[..]);
/// assert_eq!(reader.next_token().unwrap(), Token::BeginObject);
/// assert_eq!(reader.next_token().unwrap(), Token::Key("a".into()));
/// ```
#[derive(Debug)]
pub struct JsonReader<R> {
    input: BufReader<R>,
    offset: u64,
    frames: Vec<Frame>,
    expect: Expect,
    peeked: Option<Token>,
    scratch: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Object,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// The document itself, an array element after `,`, or a member value.
    Value,
    /// A value or `]` right after `[`.
    FirstElement,
    /// A member name or `}` right after `{`.
    FirstKey,
    /// A member name after `,`.
    Key,
    /// `,` or the close of the innermost container.
    Separator,
    Done,
}

impl<R: Read> JsonReader<R> {
    pub fn new(reader: R) -> Self {
        JsonReader {
            input: BufReader::new(reader),
            offset: 0,
            frames: Vec::new(),
            expect: Expect::Value,
            peeked: None,
            scratch: Vec::new(),
        }
    }

    /// Byte offset of the next unread input byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Fails unless the document is complete and only whitespace follows it.
    pub fn end(&mut self) -> Result<()> {
        if self.expect != Expect::Done {
            return Err(StreamError::UnexpectedEnd);
        }
        self.skip_whitespace()?;
        match self.peek_byte()? {
            None => Ok(()),
            Some(_) => Err(self.syntax("trailing characters after the document")),
        }
    }

    fn read_token(&mut self) -> Result<Option<Token>> {
        loop {
            if self.expect == Expect::Done {
                return Ok(None);
            }
            self.skip_whitespace()?;
            let byte = match self.peek_byte()? {
                Some(byte) => byte,
                None if self.expect == Expect::Value && self.frames.is_empty() => return Ok(None),
                None => return Err(StreamError::UnexpectedEnd),
            };
            let token = match (self.expect, byte) {
                (Expect::FirstElement, b']') | (Expect::Separator, b']') => self.close(Frame::Array)?,
                (Expect::FirstKey, b'}') | (Expect::Separator, b'}') => self.close(Frame::Object)?,
                (Expect::Value | Expect::FirstElement, _) => self.value(byte)?,
                (Expect::FirstKey | Expect::Key, b'"') => self.key()?,
                (Expect::FirstKey | Expect::Key, _) => {
                    return Err(self.syntax("expected a member name"))
                }
                (Expect::Separator, b',') => {
                    self.bump();
                    self.expect = match self.frames.last() {
                        Some(Frame::Object) => Expect::Key,
                        _ => Expect::Value,
                    };
                    continue;
                }
                (Expect::Separator, _) => {
                    return Err(self.syntax("expected ',' or a closing bracket"))
                }
                (Expect::Done, _) => return Ok(None),
            };
            return Ok(Some(token));
        }
    }

    fn value(&mut self, byte: u8) -> Result<Token> {
        let scalar = match byte {
            b'{' => return Ok(self.open(Frame::Object)),
            b'[' => return Ok(self.open(Frame::Array)),
            b'"' => Scalar::String(self.string()?),
            b't' => {
                self.literal(b"true")?;
                Scalar::Bool(true)
            }
            b'f' => {
                self.literal(b"false")?;
                Scalar::Bool(false)
            }
            b'n' => {
                self.literal(b"null")?;
                Scalar::Null
            }
            b'-' | b'0'..=b'9' => Scalar::Number(self.number()?),
            _ => return Err(self.syntax("expected a value")),
        };
        self.finish_value();
        Ok(Token::Scalar(scalar))
    }

    fn open(&mut self, frame: Frame) -> Token {
        self.bump();
        self.frames.push(frame);
        match frame {
            Frame::Object => {
                self.expect = Expect::FirstKey;
                Token::BeginObject
            }
            Frame::Array => {
                self.expect = Expect::FirstElement;
                Token::BeginArray
            }
        }
    }

    fn close(&mut self, frame: Frame) -> Result<Token> {
        if self.frames.last() != Some(&frame) {
            return Err(self.syntax("mismatched closing bracket"));
        }
        self.bump();
        self.frames.pop();
        self.finish_value();
        Ok(match frame {
            Frame::Object => Token::EndObject,
            Frame::Array => Token::EndArray,
        })
    }

    fn finish_value(&mut self) {
        self.expect = if self.frames.is_empty() {
            Expect::Done
        } else {
            Expect::Separator
        };
    }

    fn key(&mut self) -> Result<Token> {
        let name = self.string()?;
        self.skip_whitespace()?;
        match self.peek_byte()? {
            Some(b':') => self.bump(),
            Some(_) => return Err(self.syntax("expected ':' after a member name")),
            None => return Err(StreamError::UnexpectedEnd),
        }
        self.expect = Expect::Value;
        Ok(Token::Key(name))
    }

    /// Reads a quoted string literal, escapes and all, and decodes it.
    fn string(&mut self) -> Result<String> {
        let start = self.offset;
        self.scratch.clear();
        self.take(b'"');
        let mut escaped = false;
        loop {
            let byte = self.peek_byte()?.ok_or(StreamError::UnexpectedEnd)?;
            self.take(byte);
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                break;
            }
        }
        serde_json::from_slice(&self.scratch).map_err(|_| StreamError::Syntax {
            reason: "malformed string",
            offset: start,
        })
    }

    fn number(&mut self) -> Result<Number> {
        let start = self.offset;
        self.scratch.clear();
        while let Some(byte) = self.peek_byte()? {
            if !matches!(byte, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E') {
                break;
            }
            self.take(byte);
        }
        serde_json::from_slice(&self.scratch).map_err(|_| StreamError::Syntax {
            reason: "malformed number",
            offset: start,
        })
    }

    fn literal(&mut self, word: &[u8]) -> Result<()> {
        for &expected in word {
            match self.peek_byte()? {
                Some(byte) if byte == expected => self.bump(),
                Some(_) => return Err(self.syntax("expected a value")),
                None => return Err(StreamError::UnexpectedEnd),
            }
        }
        Ok(())
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.peek_byte()? {
            self.bump();
        }
        Ok(())
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        Ok(self.input.fill_buf()?.first().copied())
    }

    fn bump(&mut self) {
        self.input.consume(1);
        self.offset += 1;
    }

    fn take(&mut self, byte: u8) {
        self.scratch.push(byte);
        self.bump();
    }

    fn syntax(&self, reason: &'static str) -> StreamError {
        StreamError::Syntax {
            reason,
            offset: self.offset,
        }
    }
}

impl<R: Read> TokenSource for JsonReader<R> {
    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        if self.peeked.is_none() {
            self.peeked = self.read_token()?;
        }
        Ok(self.peeked.as_ref().map(Token::kind))
    }

    fn next_token(&mut self) -> Result<Token> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.read_token()?.ok_or(StreamError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Result<Vec<Token>> {
        let mut reader = JsonReader::new(text.as_bytes());
        let mut out = Vec::new();
        while reader.peek_kind()?.is_some() {
            out.push(reader.next_token()?);
        }
        reader.end()?;
        Ok(out)
    }

    fn syntax_offset(text: &str) -> u64 {
        match tokens(text).unwrap_err() {
            StreamError::Syntax { offset, .. } => offset,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    fn number(text: &str) -> Token {
        Token::Scalar(Scalar::Number(text.parse().unwrap()))
    }

    mod accepts {
        use super::*;

        #[test]
        fn mixed_document() {
            let out = tokens(r#" {"a" : [1, "x\"y", null, true, false, {}], "b": {"c": -2.5}} "#)
                .unwrap();
            assert_eq!(
                out,
                vec![
                    Token::BeginObject,
                    Token::Key("a".into()),
                    Token::BeginArray,
                    number("1"),
                    Token::Scalar(Scalar::String("x\"y".into())),
                    Token::Scalar(Scalar::Null),
                    Token::Scalar(Scalar::Bool(true)),
                    Token::Scalar(Scalar::Bool(false)),
                    Token::BeginObject,
                    Token::EndObject,
                    Token::EndArray,
                    Token::Key("b".into()),
                    Token::BeginObject,
                    Token::Key("c".into()),
                    number("-2.5"),
                    Token::EndObject,
                    Token::EndObject,
                ]
            );
        }

        #[test]
        fn escapes_are_decoded() {
            let out = tokens(r#"["é\n", "😀"]"#).unwrap();
            assert_eq!(out[1], Token::Scalar(Scalar::String("é\n".into())));
            assert_eq!(out[2], Token::Scalar(Scalar::String("😀".into())));
        }

        #[test]
        fn top_level_scalar() {
            assert_eq!(tokens("42").unwrap(), vec![number("42")]);
            assert_eq!(tokens(" \"s\" ").unwrap().len(), 1);
        }

        #[test]
        fn numbers_keep_their_text() {
            for text in ["123456789012345678901234567890", "1e400", "-0.10"] {
                let out = tokens(text).unwrap();
                let [Token::Scalar(Scalar::Number(n))] = out.as_slice() else {
                    panic!("expected one number for {text:?}");
                };
                assert_eq!(n.to_string(), text);
            }
        }

        #[test]
        fn empty_input_has_no_tokens() {
            let mut reader = JsonReader::new(&b"  "[..]);
            assert_eq!(reader.peek_kind().unwrap(), None);
        }

        #[test]
        fn deep_nesting() {
            let depth = 100_000;
            let text = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
            assert_eq!(tokens(&text).unwrap().len(), depth * 2);
        }
    }

    mod rejects {
        use super::*;

        #[test]
        fn trailing_comma() {
            assert_eq!(syntax_offset("[1,]"), 3);
            assert_eq!(syntax_offset(r#"{"a":1,}"#), 7);
        }

        #[test]
        fn missing_colon() {
            assert_eq!(syntax_offset(r#"{"a" 1}"#), 5);
        }

        #[test]
        fn mismatched_bracket() {
            assert_eq!(syntax_offset("[1}"), 2);
            assert_eq!(syntax_offset(r#"{"a":1]"#), 6);
        }

        #[test]
        fn bad_literals_and_numbers() {
            assert_eq!(syntax_offset("[nul]"), 4);
            assert_eq!(syntax_offset("[01]"), 1);
            assert_eq!(syntax_offset("[1.e5]"), 1);
            assert_eq!(syntax_offset("[x]"), 1);
        }

        #[test]
        fn bad_escape() {
            assert_eq!(syntax_offset(r#"[1, "\q"]"#), 4);
        }

        #[test]
        fn unquoted_key() {
            assert_eq!(syntax_offset("{a:1}"), 1);
        }

        #[test]
        fn trailing_characters() {
            assert_eq!(syntax_offset("{} x"), 3);
            assert_eq!(syntax_offset("1 2"), 2);
        }

        #[test]
        fn truncated_document() {
            for text in ["[1,2", r#"{"a":"#, r#"{"a""#, r#""open"#, "tr"] {
                assert!(
                    matches!(tokens(text), Err(StreamError::UnexpectedEnd)),
                    "for {text:?}"
                );
            }
        }

        #[test]
        fn error_display() {
            let err = tokens("[1,]").unwrap_err();
            assert_eq!(err.to_string(), "invalid JSON at byte 3: expected a value");
        }
    }
}

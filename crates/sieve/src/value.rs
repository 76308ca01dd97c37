//! Token adapters for in-memory `serde_json::Value` trees.

use serde_json::{Map, Value};

use crate::error::{Result, StreamError};
use crate::mask::Mask;
use crate::project::project;
use crate::token::{Scalar, Token, TokenKind, TokenSink, TokenSource};

/// Walks a borrowed [`Value`] as a token stream.
///
/// Tokens are produced lazily from an explicit cursor stack; the tree is
/// never flattened up front.
#[derive(Debug)]
pub struct ValueSource<'a> {
    stack: Vec<Cursor<'a>>,
    pending: Option<&'a Value>,
    peeked: Option<Token>,
}

#[derive(Debug)]
enum Cursor<'a> {
    Object(serde_json::map::Iter<'a>),
    Array(std::slice::Iter<'a, Value>),
}

enum Step<'a> {
    Member(&'a String, &'a Value),
    Element(&'a Value),
    Close(Token),
}

impl<'a> ValueSource<'a> {
    /// Starts a stream positioned before `root`.
    pub fn new(root: &'a Value) -> Self {
        ValueSource {
            stack: Vec::new(),
            pending: Some(root),
            peeked: None,
        }
    }

    fn produce(&mut self) -> Option<Token> {
        if let Some(value) = self.pending.take() {
            return Some(self.open(value));
        }
        let step = match self.stack.last_mut()? {
            Cursor::Object(members) => match members.next() {
                Some((key, value)) => Step::Member(key, value),
                None => Step::Close(Token::EndObject),
            },
            Cursor::Array(elements) => match elements.next() {
                Some(value) => Step::Element(value),
                None => Step::Close(Token::EndArray),
            },
        };
        match step {
            Step::Member(key, value) => {
                self.pending = Some(value);
                Some(Token::Key(key.clone()))
            }
            Step::Element(value) => Some(self.open(value)),
            Step::Close(token) => {
                self.stack.pop();
                Some(token)
            }
        }
    }

    fn open(&mut self, value: &'a Value) -> Token {
        match value {
            Value::Object(map) => {
                self.stack.push(Cursor::Object(map.iter()));
                Token::BeginObject
            }
            Value::Array(items) => {
                self.stack.push(Cursor::Array(items.iter()));
                Token::BeginArray
            }
            Value::Null => Token::Scalar(Scalar::Null),
            Value::Bool(b) => Token::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => Token::Scalar(Scalar::Number(n.clone())),
            Value::String(s) => Token::Scalar(Scalar::String(s.clone())),
        }
    }
}

impl TokenSource for ValueSource<'_> {
    fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
        if self.peeked.is_none() {
            self.peeked = self.produce();
        }
        Ok(self.peeked.as_ref().map(Token::kind))
    }

    fn next_token(&mut self) -> Result<Token> {
        self.peeked
            .take()
            .or_else(|| self.produce())
            .ok_or(StreamError::UnexpectedEnd)
    }
}

/// Rebuilds a [`Value`] from a token stream.
#[derive(Debug, Default)]
pub struct ValueSink {
    stack: Vec<Building>,
    root: Option<Value>,
}

#[derive(Debug)]
enum Building {
    Object(Map<String, Value>, Option<String>),
    Array(Vec<Value>),
}

impl ValueSink {
    pub fn new() -> Self {
        ValueSink::default()
    }

    /// Returns the finished document.
    ///
    /// Fails if no value was written or a container is still open.
    pub fn finish(self) -> Result<Value> {
        if !self.stack.is_empty() {
            return Err(StreamError::UnexpectedEnd);
        }
        self.root.ok_or(StreamError::UnexpectedEnd)
    }

    fn place(&mut self, value: Value, kind: TokenKind) -> Result<()> {
        match self.stack.last_mut() {
            None if self.root.is_none() => {
                self.root = Some(value);
                Ok(())
            }
            None => Err(StreamError::unexpected("end of document", kind)),
            Some(Building::Array(items)) => {
                items.push(value);
                Ok(())
            }
            Some(Building::Object(map, key)) => match key.take() {
                Some(key) => {
                    map.insert(key, value);
                    Ok(())
                }
                None => Err(StreamError::unexpected("a key", kind)),
            },
        }
    }

    fn expects_value(&self) -> bool {
        match self.stack.last() {
            None => self.root.is_none(),
            Some(Building::Array(_)) => true,
            Some(Building::Object(_, key)) => key.is_some(),
        }
    }
}

impl TokenSink for ValueSink {
    fn write_token(&mut self, token: Token) -> Result<()> {
        let kind = token.kind();
        match token {
            Token::BeginObject | Token::BeginArray if !self.expects_value() => {
                Err(StreamError::unexpected("a key or close", kind))
            }
            Token::BeginObject => {
                self.stack.push(Building::Object(Map::new(), None));
                Ok(())
            }
            Token::BeginArray => {
                self.stack.push(Building::Array(Vec::new()));
                Ok(())
            }
            Token::Key(name) => match self.stack.last_mut() {
                Some(Building::Object(_, key @ None)) => {
                    *key = Some(name);
                    Ok(())
                }
                _ => Err(StreamError::unexpected("a value", kind)),
            },
            Token::EndObject => match self.stack.pop() {
                Some(Building::Object(map, None)) => self.place(Value::Object(map), kind),
                _ => Err(StreamError::unexpected("a value", kind)),
            },
            Token::EndArray => match self.stack.pop() {
                Some(Building::Array(items)) => self.place(Value::Array(items), kind),
                _ => Err(StreamError::unexpected("a value", kind)),
            },
            Token::Scalar(scalar) => {
                let value = match scalar {
                    Scalar::Null => Value::Null,
                    Scalar::Bool(b) => Value::Bool(b),
                    Scalar::Number(n) => Value::Number(n),
                    Scalar::String(s) => Value::String(s),
                };
                self.place(value, kind)
            }
        }
    }
}

/// Projects an in-memory document, returning the filtered copy.
///
/// ```
/// use serde_json::json;
/// use sieve::{parse, project_value};
///
/// let mask = parse("-secret").unwrap();
/// let out = project_value(Some(&mask), &json!({"id": 7, "secret": "x"})).unwrap();
/// assert_eq!(out, json!({"id": 7}));
/// ```
pub fn project_value(mask: Option<&Mask>, doc: &Value) -> Result<Value> {
    let mut sink = ValueSink::new();
    project(mask, &mut ValueSource::new(doc), &mut sink)?;
    sink.finish()
}

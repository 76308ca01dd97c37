//! Mask expression parser.
//!
//! ```text
//! mask  = entry ("," entry)*
//! entry = ["-"] name [":" "(" mask ")"]
//! name  = run of characters other than whitespace and ":,)"
//! ```
//!
//! The parser is an explicit state machine over a byte cursor. Open
//! subtrees live on a frame stack instead of the call stack, so nesting
//! depth is bounded only by memory unless [`Parser::max_depth`] says
//! otherwise.

use std::collections::BTreeMap;
use std::mem;
use std::str::FromStr;

use crate::error::{ParseError, ParseErrorKind};
use crate::mask::{Mask, Node, Polarity};

/// Parses a mask expression with the default settings.
///
/// ```
/// use sieve::{parse, Polarity};
///
/// let mask = parse("a,-b,c:(d)").unwrap();
/// assert_eq!(mask.mode(), Polarity::Include);
/// assert!(mask.get("c").unwrap().sub_mask().is_some());
/// ```
pub fn parse(text: &str) -> Result<Mask, ParseError> {
    Parser::default().parse(text)
}

impl FromStr for Mask {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Configurable mask parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    max_depth: Option<usize>,
}

impl Parser {
    pub fn new() -> Self {
        Parser::default()
    }

    /// Limits how many subtrees may be nested inside each other.
    ///
    /// `Some(0)` rejects every `:(`. `None` (the default) is unbounded.
    pub fn max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Parses `text` into a mask.
    ///
    /// Empty or all-whitespace input yields the empty mask.
    pub fn parse(&self, text: &str) -> Result<Mask, ParseError> {
        if text.trim().is_empty() {
            return Ok(Mask::new());
        }
        Machine::new(text, self.max_depth).run().inspect_err(|err| {
            tracing::debug!(expression = text, %err, "rejected mask expression");
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Reading an optional `-` and a name.
    Field,
    /// A name was read; `:`, `,`, `)` or end of input must follow.
    AfterField,
    /// A `:` was read; `(` must follow.
    Descend,
    /// Closing zero or more subtrees until `,` or end of input.
    Ascend,
    /// Sitting on a `,`.
    Separator,
}

/// A subtree that has been opened but not yet closed.
struct Frame {
    name: String,
    polarity: Polarity,
    fields: BTreeMap<String, Node>,
}

struct Machine<'t> {
    text: &'t str,
    pos: usize,
    root: BTreeMap<String, Node>,
    open: Vec<Frame>,
    max_depth: Option<usize>,
}

impl<'t> Machine<'t> {
    fn new(text: &'t str, max_depth: Option<usize>) -> Self {
        Machine {
            text,
            pos: 0,
            root: BTreeMap::new(),
            open: Vec::new(),
            max_depth,
        }
    }

    fn run(mut self) -> Result<Mask, ParseError> {
        let mut state = State::Field;
        let mut name = String::new();
        let mut polarity = Polarity::Include;
        loop {
            state = match state {
                State::Field => {
                    (name, polarity) = self.field()?;
                    State::AfterField
                }
                State::AfterField => self.after_field(&mut name, polarity)?,
                State::Descend => {
                    self.descend(mem::take(&mut name), polarity)?;
                    State::Field
                }
                State::Ascend => match self.ascend()? {
                    Some(mask) => return Ok(mask),
                    None => State::Separator,
                },
                State::Separator => {
                    self.separator()?;
                    State::Field
                }
            };
        }
    }

    fn field(&mut self) -> Result<(String, Polarity), ParseError> {
        self.skip_whitespace();
        let mut polarity = Polarity::Include;
        if self.peek() == Some('-') {
            polarity = Polarity::Exclude;
            self.pos += 1;
            self.skip_whitespace();
        }

        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ':' | ',' | ')') {
                break;
            }
            self.pos += c.len_utf8();
        }
        if self.pos == start {
            return Err(self.empty_field(polarity));
        }

        let name = &self.text[start..self.pos];
        if self.current().contains_key(name) {
            return Err(ParseError::new(
                ParseErrorKind::DuplicateField(name.to_string()),
                start,
            ));
        }
        Ok((name.to_string(), polarity))
    }

    fn empty_field(&self, polarity: Polarity) -> ParseError {
        let kind = match (self.peek(), self.open.last()) {
            (None, Some(_)) => ParseErrorKind::UnclosedSubtree,
            (Some(')'), Some(frame)) if frame.fields.is_empty() && polarity.is_include() => {
                ParseErrorKind::EmptySubtree(frame.name.clone())
            }
            _ => ParseErrorKind::EmptyField,
        };
        self.error(kind)
    }

    fn after_field(&mut self, name: &mut String, polarity: Polarity) -> Result<State, ParseError> {
        self.skip_whitespace();
        let next = match self.peek() {
            Some(':') => {
                self.pos += 1;
                return Ok(State::Descend);
            }
            None | Some(')') => State::Ascend,
            Some(',') => State::Separator,
            Some(found) => {
                return Err(self.error(ParseErrorKind::UnexpectedChar {
                    found,
                    field: mem::take(name),
                }))
            }
        };
        self.current_mut()
            .insert(mem::take(name), Node::Leaf(polarity));
        Ok(next)
    }

    fn descend(&mut self, name: String, polarity: Polarity) -> Result<(), ParseError> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Err(self.error(ParseErrorKind::ExpectedOpenParen(name)));
        }
        if let Some(limit) = self.max_depth {
            if self.open.len() >= limit {
                return Err(self.error(ParseErrorKind::DepthExceeded(limit)));
            }
        }
        self.pos += 1;
        self.open.push(Frame {
            name,
            polarity,
            fields: BTreeMap::new(),
        });
        Ok(())
    }

    /// Returns the finished mask at end of input, or `None` on a `,`.
    fn ascend(&mut self) -> Result<Option<Mask>, ParseError> {
        loop {
            self.skip_whitespace();
            match self.peek() {
                None if self.open.is_empty() => {
                    return Ok(Some(Mask::from_map(mem::take(&mut self.root))));
                }
                None => return Err(self.error(ParseErrorKind::UnclosedSubtree)),
                Some(',') => return Ok(None),
                Some(')') => {
                    let frame = self
                        .open
                        .pop()
                        .ok_or_else(|| self.error(ParseErrorKind::UnmatchedClose))?;
                    self.pos += 1;
                    let children = Mask::from_map(frame.fields);
                    self.current_mut()
                        .insert(frame.name, Node::Subtree(frame.polarity, children));
                }
                Some(found) => return Err(self.error(ParseErrorKind::ExpectedSeparator(found))),
            }
        }
    }

    fn separator(&mut self) -> Result<(), ParseError> {
        let comma = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        if self.peek().is_none() {
            return Err(ParseError::new(ParseErrorKind::TrailingSeparator, comma));
        }
        Ok(())
    }

    fn current(&self) -> &BTreeMap<String, Node> {
        self.open.last().map_or(&self.root, |frame| &frame.fields)
    }

    fn current_mut(&mut self) -> &mut BTreeMap<String, Node> {
        match self.open.last_mut() {
            Some(frame) => &mut frame.fields,
            None => &mut self.root,
        }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        ParseError::new(kind, self.pos)
    }
}

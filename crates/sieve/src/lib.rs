//! Sieve - Field-projection masks for hierarchical documents.
//!
//! A mask is a compact, human-written tree of include/exclude decisions:
//!
//! ```text
//! a,-b,c:(d,-e),f:(g,h),i,-z:(-y,x)
//! ```
//!
//! Sieve provides:
//!
//! - A parser for the expression syntax, with byte-offset errors
//! - An immutable [`Mask`] tree with a canonical text form
//! - Overlay merging, where the first mask wins every conflict
//! - A streaming projector over an abstract token interface
//! - Adapters for JSON text, serde deserializers and `serde_json::Value`
//! - A serde representation of the mask itself
//!
//! # Quick Start
//!
//! ```rust
//! use sieve::{parse, project_json_str};
//!
//! let mask = parse("a,-b,c:(d,-e),f:(g,h),i,-z:(-y,x)").unwrap();
//! let doc = r#"{"a":"A","b":"B","c":{"d":"D","e":"E"},"f":{"g":"G","h":"H"},"i":"I","z":{"x":"X","y":"Y"}}"#;
//!
//! let out = project_json_str(Some(&mask), doc).unwrap();
//! assert_eq!(out, r#"{"a":"A","c":{"d":"D"},"f":{"g":"G","h":"H"},"i":"I","z":{"x":"X"}}"#);
//! ```
//!
//! # Mask Semantics
//!
//! Every mask level has a *mode*, derived from its direct fields only:
//!
//! ```text
//! mode = Exclude  iff  some field is Exclude and none is Include
//! mode = Include  otherwise
//! ```
//!
//! An `Include` level keeps only what it names; an `Exclude` level keeps
//! everything it does not drop. A field that is excluded but carries
//! children (`-z:(x)`) is an *override*: the field stays, but inside it only
//! the named children survive, whatever the mode below says.
//!
//! | Expression | Keeps |
//! |------------|-------|
//! | `a,b` | `a`, `b` |
//! | `-a,-b` | everything except `a`, `b` |
//! | `a,-b` | `a` (the exclude is redundant in an include level) |
//! | `c:(d)` | `c`, reduced to `c.d` |
//! | `-z:(x)` | `z`, reduced to `z.x` |
//!
//! Arrays are transparent: every element is projected with the mask level
//! of the array's field. An empty mask, or no mask at all, keeps everything.

mod error;
mod json;
mod mask;
mod overlay;
mod parse;
mod project;
mod structural;
mod token;
mod value;

// Re-export public API
pub use error::{MaskError, ParseError, ParseErrorKind, Result, StreamError};
pub use json::{project_deserializer, project_json_reader, project_json_str, JsonReader, JsonWriter};
pub use mask::{derive_mode, Mask, MaskBuilder, Node, Polarity};
pub use overlay::overlay;
pub use parse::{parse, Parser};
pub use project::project;
pub use token::{copy_value, Scalar, Token, TokenKind, TokenSink, TokenSource};
pub use value::{project_value, ValueSink, ValueSource};

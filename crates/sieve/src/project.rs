//! Streaming projection of a document through a mask.
//!
//! The projector walks the input token stream and the mask in lock-step.
//! Only the mask is held in memory; values are copied or skipped token by
//! token as they are read.
//!
//! # Selection rules
//!
//! Each object level is governed by a mask view and an inherited
//! `ancestor_excluded` flag. A level is in *whitelist* mode when the view's
//! mode is `Include` or an ancestor was an override; otherwise it is in
//! *blacklist* mode. For each key:
//!
//! | node                        | whitelist | blacklist |
//! |-----------------------------|-----------|-----------|
//! | absent                      | skip      | copy      |
//! | `Include`, no children      | copy      | copy      |
//! | `Include` with children     | descend into children, flag cleared | same |
//! | `Exclude`, no children      | skip      | skip      |
//! | `Exclude` with children     | descend into children as a whitelist, flag set | same |
//!
//! Arrays do not consume a mask level: every element is projected with the
//! same view and flag. Scalars that reach the projector are copied.

use tracing::trace;

use crate::error::{Result, StreamError};
use crate::mask::{Mask, MaskView, Polarity};
use crate::token::{copy_value, Token, TokenKind, TokenSink, TokenSource};

/// What to do with one object member.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FieldAction<'m> {
    /// Consume the value, emit nothing (not even the key).
    Skip,
    /// Emit the key and the value unchanged.
    Copy,
    /// Emit the key and project the value through a nested view.
    Descend {
        view: MaskView<'m>,
        ancestor_excluded: bool,
    },
}

/// Decides the fate of `key` under `view`.
///
/// Every traversal driver goes through here so that both polarity systems,
/// the mask mode and per-node overrides, are reconciled in one place.
pub(crate) fn decide<'m>(view: MaskView<'m>, ancestor_excluded: bool, key: &str) -> FieldAction<'m> {
    let whitelist = view.mode.is_include() || ancestor_excluded;
    let Some(node) = view.fields.get(key) else {
        return if whitelist {
            FieldAction::Skip
        } else {
            FieldAction::Copy
        };
    };
    match (node.polarity(), node.sub_mask()) {
        (Polarity::Exclude, None) => FieldAction::Skip,
        (Polarity::Exclude, Some(children)) => FieldAction::Descend {
            view: MaskView::overriding(children),
            ancestor_excluded: true,
        },
        (Polarity::Include, None) => FieldAction::Copy,
        (Polarity::Include, Some(children)) => FieldAction::Descend {
            view: children.view(),
            ancestor_excluded: false,
        },
    }
}

/// The view to start a projection with, or `None` for a verbatim copy.
///
/// An absent mask and an empty mask are the same thing: the identity.
pub(crate) fn root_view(mask: Option<&Mask>) -> Option<MaskView<'_>> {
    mask.filter(|mask| !mask.is_empty()).map(Mask::view)
}

/// Projects one value from `source` into `sink`.
///
/// ```
/// use serde_json::json;
/// use sieve::{parse, project, ValueSink, ValueSource};
///
/// let mask = parse("a,c:(d)").unwrap();
/// let doc = json!({"a": 1, "b": 2, "c": {"d": 3, "e": 4}});
///
/// let mut sink = ValueSink::new();
/// project(Some(&mask), &mut ValueSource::new(&doc), &mut sink).unwrap();
/// assert_eq!(sink.finish().unwrap(), json!({"a": 1, "c": {"d": 3}}));
/// ```
///
/// On error the sink may hold a partial document; discard it.
///
/// Open objects and arrays are tracked on a heap stack, so document depth
/// is bounded by memory rather than by the call stack.
pub fn project<S, K>(mask: Option<&Mask>, source: &mut S, sink: &mut K) -> Result<()>
where
    S: TokenSource + ?Sized,
    K: TokenSink + ?Sized,
{
    let mut projector = Projector {
        source,
        sink,
        open: Vec::new(),
    };
    match root_view(mask) {
        Some(view) => projector.run(view),
        None => projector.copy(),
    }
}

/// An open container and the view its members are judged by.
#[derive(Clone, Copy)]
enum Level<'m> {
    Object {
        view: MaskView<'m>,
        ancestor_excluded: bool,
    },
    Array {
        view: MaskView<'m>,
        ancestor_excluded: bool,
    },
}

struct Projector<'a, 'm, S: ?Sized, K: ?Sized> {
    source: &'a mut S,
    sink: &'a mut K,
    open: Vec<Level<'m>>,
}

impl<'m, S, K> Projector<'_, 'm, S, K>
where
    S: TokenSource + ?Sized,
    K: TokenSink + ?Sized,
{
    fn run(&mut self, view: MaskView<'m>) -> Result<()> {
        self.value(view, false)?;
        while let Some(&level) = self.open.last() {
            match level {
                Level::Object {
                    view,
                    ancestor_excluded,
                } => self.member(view, ancestor_excluded)?,
                Level::Array {
                    view,
                    ancestor_excluded,
                } => match self.source.peek_kind()? {
                    Some(TokenKind::EndArray) => self.close()?,
                    Some(_) => self.value(view, ancestor_excluded)?,
                    None => return Err(StreamError::UnexpectedEnd),
                },
            }
        }
        Ok(())
    }

    /// Starts one value: containers are opened and pushed, scalars copied.
    fn value(&mut self, view: MaskView<'m>, ancestor_excluded: bool) -> Result<()> {
        let level = match self.source.peek_kind()? {
            Some(TokenKind::BeginObject) => Level::Object {
                view,
                ancestor_excluded,
            },
            Some(TokenKind::BeginArray) => Level::Array {
                view,
                ancestor_excluded,
            },
            Some(TokenKind::Scalar) => return self.copy(),
            Some(other) => return Err(StreamError::unexpected("a value", other)),
            None => return Err(StreamError::UnexpectedEnd),
        };
        let token = self.source.next_token()?;
        self.sink.write_token(token)?;
        self.open.push(level);
        Ok(())
    }

    /// Handles the next member of the innermost object, or its close.
    fn member(&mut self, view: MaskView<'m>, ancestor_excluded: bool) -> Result<()> {
        match self.source.peek_kind()? {
            Some(TokenKind::EndObject) => return self.close(),
            Some(TokenKind::Key) => {}
            Some(other) => return Err(StreamError::unexpected("a key or end-object", other)),
            None => return Err(StreamError::UnexpectedEnd),
        }
        let key = self.source.next_token()?;
        let name = match &key {
            Token::Key(name) => name.as_str(),
            other => return Err(StreamError::unexpected("a key", other.kind())),
        };
        match decide(view, ancestor_excluded, name) {
            FieldAction::Skip => {
                trace!(field = name, "skipping masked field");
                self.source.skip_value()
            }
            FieldAction::Copy => {
                self.sink.write_token(key)?;
                self.copy()
            }
            FieldAction::Descend {
                view,
                ancestor_excluded,
            } => {
                self.sink.write_token(key)?;
                self.value(view, ancestor_excluded)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let token = self.source.next_token()?;
        self.sink.write_token(token)?;
        self.open.pop();
        Ok(())
    }

    fn copy(&mut self) -> Result<()> {
        copy_value(&mut *self.source, &mut *self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::{JsonReader, JsonWriter};
    use crate::mask::Node;
    use crate::token::Scalar;
    use crate::value::{ValueSink, ValueSource};
    use serde_json::{json, Value};

    fn run(mask: Option<&Mask>, doc: &Value) -> Value {
        let mut sink = ValueSink::new();
        project(mask, &mut ValueSource::new(doc), &mut sink).unwrap();
        sink.finish().unwrap()
    }

    fn sample() -> Value {
        json!({
            "a": "va",
            "b": "vb",
            "c": {"d": 1, "e": 2},
            "z": {"x": 10, "y": 20}
        })
    }

    fn leaves(entries: &[(&str, Polarity)]) -> Mask {
        Mask::from_fields(
            entries
                .iter()
                .map(|(name, polarity)| (*name, Node::Leaf(*polarity))),
        )
        .unwrap()
    }

    mod decisions {
        use super::*;

        #[test]
        fn absent_field_depends_on_mode() {
            let include = leaves(&[("a", Polarity::Include)]);
            assert!(matches!(decide(include.view(), false, "q"), FieldAction::Skip));

            let exclude = leaves(&[("a", Polarity::Exclude)]);
            assert!(matches!(decide(exclude.view(), false, "q"), FieldAction::Copy));
            assert!(matches!(decide(exclude.view(), true, "q"), FieldAction::Skip));
        }

        #[test]
        fn override_sets_flag_and_forces_include() {
            let mask = Mask::builder()
                .subtree("z", Polarity::Exclude, leaves(&[("y", Polarity::Exclude)]))
                .build()
                .unwrap();
            match decide(mask.view(), false, "z") {
                FieldAction::Descend {
                    view,
                    ancestor_excluded,
                } => {
                    assert!(ancestor_excluded);
                    assert_eq!(view.mode, Polarity::Include);
                }
                other => panic!("unexpected action {other:?}"),
            }
        }

        #[test]
        fn include_subtree_clears_flag() {
            let mask = Mask::builder()
                .subtree("c", Polarity::Include, leaves(&[("d", Polarity::Include)]))
                .build()
                .unwrap();
            assert!(matches!(
                decide(mask.view(), true, "c"),
                FieldAction::Descend {
                    ancestor_excluded: false,
                    ..
                }
            ));
        }

        #[test]
        fn empty_subtree_acts_as_leaf() {
            let mask = Mask::builder()
                .subtree("c", Polarity::Include, Mask::new())
                .subtree("d", Polarity::Exclude, Mask::new())
                .build()
                .unwrap();
            assert!(matches!(decide(mask.view(), false, "c"), FieldAction::Copy));
            assert!(matches!(decide(mask.view(), false, "d"), FieldAction::Skip));
        }
    }

    mod whitelist {
        use super::*;

        #[test]
        fn simple_includes() {
            let mask = Mask::builder()
                .include("a")
                .subtree("c", Polarity::Include, leaves(&[("d", Polarity::Include)]))
                .build()
                .unwrap();
            assert_eq!(run(Some(&mask), &sample()), json!({"a": "va", "c": {"d": 1}}));
        }

        #[test]
        fn override_reincludes_nested() {
            let mask = Mask::builder()
                .subtree("z", Polarity::Exclude, leaves(&[("x", Polarity::Include)]))
                .build()
                .unwrap()
                .with_mode(Polarity::Include);
            assert_eq!(run(Some(&mask), &sample()), json!({"z": {"x": 10}}));
        }

        #[test]
        fn mixed_expression() {
            let mask = Mask::builder()
                .include("a")
                .exclude("b")
                .subtree(
                    "c",
                    Polarity::Include,
                    leaves(&[("d", Polarity::Include), ("e", Polarity::Exclude)]),
                )
                .subtree("z", Polarity::Exclude, leaves(&[("x", Polarity::Include)]))
                .build()
                .unwrap();
            assert_eq!(
                run(Some(&mask), &sample()),
                json!({"a": "va", "c": {"d": 1}, "z": {"x": 10}})
            );
        }
    }

    mod blacklist {
        use super::*;

        #[test]
        fn simple_excludes_with_empty_override_result() {
            // -b,-c:(-e): c is an override whose only child is an exclude,
            // so nothing inside c survives.
            let mask = Mask::builder()
                .exclude("b")
                .subtree("c", Polarity::Exclude, leaves(&[("e", Polarity::Exclude)]))
                .build()
                .unwrap();
            assert_eq!(mask.mode(), Polarity::Exclude);
            assert_eq!(
                run(Some(&mask), &sample()),
                json!({"a": "va", "c": {}, "z": {"x": 10, "y": 20}})
            );
        }

        #[test]
        fn single_override_keeps_everything_else() {
            let mask = Mask::builder()
                .subtree("c", Polarity::Exclude, leaves(&[("e", Polarity::Exclude)]))
                .build()
                .unwrap();
            assert_eq!(
                run(Some(&mask), &sample()),
                json!({"a": "va", "b": "vb", "c": {}, "z": {"x": 10, "y": 20}})
            );
        }

        #[test]
        fn override_in_blacklist_root() {
            let mask = leaves(&[("b", Polarity::Exclude)])
                .with_field(
                    "z",
                    Node::subtree(Polarity::Exclude, leaves(&[("x", Polarity::Include)])),
                )
                .unwrap();
            assert_eq!(
                run(Some(&mask), &sample()),
                json!({"a": "va", "c": {"d": 1, "e": 2}, "z": {"x": 10}})
            );
        }
    }

    mod shapes {
        use super::*;

        #[test]
        fn arrays_apply_mask_per_element() {
            let mask = Mask::builder()
                .subtree("z", Polarity::Exclude, leaves(&[("x", Polarity::Include)]))
                .build()
                .unwrap();
            let doc = Value::Array(vec![sample(), sample()]);
            assert_eq!(
                run(Some(&mask), &doc),
                json!([
                    {"a": "va", "b": "vb", "c": {"d": 1, "e": 2}, "z": {"x": 10}},
                    {"a": "va", "b": "vb", "c": {"d": 1, "e": 2}, "z": {"x": 10}}
                ])
            );
        }

        #[test]
        fn nested_arrays_do_not_consume_levels() {
            let mask = Mask::builder()
                .subtree("items", Polarity::Include, leaves(&[("id", Polarity::Include)]))
                .build()
                .unwrap();
            let doc = json!({"items": [[{"id": 1, "x": 0}], [{"id": 2}], 7], "other": true});
            assert_eq!(
                run(Some(&mask), &doc),
                json!({"items": [[{"id": 1}], [{"id": 2}], 7]})
            );
        }

        #[test]
        fn deep_arrays_under_a_view() {
            let depth = 50_000;
            let wrap = |inner: &str| {
                format!(r#"{{"items":{}{inner}{},"n":1}}"#, "[".repeat(depth), "]".repeat(depth))
            };
            let mask = Mask::builder()
                .subtree("items", Polarity::Exclude, leaves(&[("id", Polarity::Include)]))
                .build()
                .unwrap();

            let input = wrap(r#"{"id":1,"x":2}"#);
            let mut source = JsonReader::new(input.as_bytes());
            let mut sink = JsonWriter::new(Vec::new());
            project(Some(&mask), &mut source, &mut sink).unwrap();

            let out = String::from_utf8(sink.finish().unwrap()).unwrap();
            assert_eq!(out, wrap(r#"{"id":1}"#));
        }

        #[test]
        fn scalar_root_is_copied() {
            let mask = leaves(&[("a", Polarity::Include)]);
            assert_eq!(run(Some(&mask), &json!(42)), json!(42));
        }

        #[test]
        fn none_and_empty_are_identity() {
            let doc = sample();
            assert_eq!(run(None, &doc), doc);
            assert_eq!(run(Some(&Mask::new()), &doc), doc);
        }
    }

    #[test]
    fn malformed_stream_is_reported() {
        struct Broken(Vec<Token>);
        impl TokenSource for Broken {
            fn peek_kind(&mut self) -> Result<Option<TokenKind>> {
                Ok(self.0.first().map(Token::kind))
            }
            fn next_token(&mut self) -> Result<Token> {
                if self.0.is_empty() {
                    Err(StreamError::UnexpectedEnd)
                } else {
                    Ok(self.0.remove(0))
                }
            }
        }

        let mask = leaves(&[("a", Polarity::Include)]);
        let mut out = Vec::new();

        let mut source = Broken(vec![Token::BeginObject, Token::Scalar(Scalar::Null)]);
        let err = project(Some(&mask), &mut source, &mut out).unwrap_err();
        assert!(matches!(
            err,
            StreamError::UnexpectedToken {
                found: TokenKind::Scalar,
                ..
            }
        ));

        let mut source = Broken(vec![Token::BeginObject, Token::Key("a".into())]);
        let err = project(Some(&mask), &mut source, &mut out).unwrap_err();
        assert!(matches!(err, StreamError::UnexpectedEnd));
    }
}

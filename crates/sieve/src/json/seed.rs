//! Projection driven by serde's visitor protocol.

use std::fmt;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Number;
use tracing::trace;

use crate::mask::{Mask, MaskView};
use crate::project::{decide, root_view, FieldAction};
use crate::token::{Scalar, Token, TokenSink};

/// Map key `serde_json` uses to hand an arbitrary-precision number to
/// `deserialize_any` as a single-entry map holding the number's text.
pub(crate) const NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Projects one value pulled from `deserializer` into `sink`.
///
/// This is the serde-driven counterpart of [`crate::project`], for formats
/// that have no [`TokenSource`](crate::TokenSource) of their own: members
/// the mask drops are consumed as [`IgnoredAny`] and never buffered. Errors
/// from the sink are reported through the deserializer's error type.
///
/// Nesting depth is subject to the deserializer's own recursion limit. The
/// JSON text helpers, [`crate::project_json_str`] and
/// [`crate::project_json_reader`], go through [`crate::JsonReader`] instead
/// and have no such limit.
///
/// ```
/// use sieve::{parse, project_deserializer, JsonWriter};
///
/// let mask = parse("a").unwrap();
/// let mut de = serde_json::Deserializer::from_str(r#"{"a":1,"b":2}"#);
/// let mut writer = JsonWriter::new(Vec::new());
/// project_deserializer(Some(&mask), &mut de, &mut writer).unwrap();
/// assert_eq!(writer.into_inner(), br#"{"a":1}"#);
/// ```
pub fn project_deserializer<'de, D, K>(
    mask: Option<&Mask>,
    deserializer: D,
    sink: &mut K,
) -> Result<(), D::Error>
where
    D: Deserializer<'de>,
    K: TokenSink + ?Sized,
{
    MaskedSeed {
        view: root_view(mask),
        ancestor_excluded: false,
        sink,
    }
    .deserialize(deserializer)
}

struct MaskedSeed<'m, 'k, K: ?Sized> {
    view: Option<MaskView<'m>>,
    ancestor_excluded: bool,
    sink: &'k mut K,
}

impl<K: TokenSink + ?Sized> MaskedSeed<'_, '_, K> {
    fn emit<E: de::Error>(&mut self, token: Token) -> Result<(), E> {
        self.sink.write_token(token).map_err(E::custom)
    }

    fn scalar<E: de::Error>(mut self, scalar: Scalar) -> Result<(), E> {
        self.emit(Token::Scalar(scalar))
    }

    fn member<'de, A>(&mut self, map: &mut A, key: String) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let action = match self.view {
            Some(view) => decide(view, self.ancestor_excluded, &key),
            None => FieldAction::Copy,
        };
        let (view, ancestor_excluded) = match action {
            FieldAction::Skip => {
                trace!(field = %key, "skipping masked field");
                map.next_value::<IgnoredAny>()?;
                return Ok(());
            }
            FieldAction::Copy => (None, false),
            FieldAction::Descend {
                view,
                ancestor_excluded,
            } => (Some(view), ancestor_excluded),
        };
        self.emit(Token::Key(key))?;
        map.next_value_seed(MaskedSeed {
            view,
            ancestor_excluded,
            sink: &mut *self.sink,
        })
    }
}

impl<'de, K: TokenSink + ?Sized> DeserializeSeed<'de> for MaskedSeed<'_, '_, K> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de, K: TokenSink + ?Sized> Visitor<'de> for MaskedSeed<'_, '_, K> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<(), E> {
        self.scalar(Scalar::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<(), E> {
        self.scalar(Scalar::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<(), E> {
        self.scalar(Scalar::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<(), E> {
        let n = Number::from_f64(v).ok_or_else(|| E::custom("non-finite number"))?;
        self.scalar(Scalar::Number(n))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<(), E> {
        self.scalar(Scalar::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<(), E> {
        self.scalar(Scalar::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<(), E> {
        self.scalar(Scalar::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<(), E> {
        self.scalar(Scalar::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A>(mut self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        self.emit(Token::BeginArray)?;
        loop {
            let element = MaskedSeed {
                view: self.view,
                ancestor_excluded: self.ancestor_excluded,
                sink: &mut *self.sink,
            };
            if seq.next_element_seed(element)?.is_none() {
                break;
            }
        }
        self.emit(Token::EndArray)
    }

    fn visit_map<A>(mut self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut key = map.next_key::<String>()?;
        if key.as_deref() == Some(NUMBER_TOKEN) {
            let text: String = map.next_value()?;
            let n = text.parse::<Number>().map_err(de::Error::custom)?;
            return self.scalar(Scalar::Number(n));
        }
        self.emit(Token::BeginObject)?;
        while let Some(name) = key {
            self.member(&mut map, name)?;
            key = map.next_key()?;
        }
        self.emit(Token::EndObject)
    }
}

//! The serialized form of a mask.
//!
//! A mask serializes as a map from field name to either a boolean (a leaf:
//! `true` keeps, `false` drops) or a nested map (a field with children).
//! Reading also accepts numbers, where negative means exclude.
//!
//! ```
//! use sieve::{parse, Mask};
//!
//! let mask = parse("a,-b,c:(d)").unwrap();
//! let json = serde_json::to_string(&mask).unwrap();
//! assert_eq!(json, r#"{"a":true,"b":false,"c":{"d":true}}"#);
//!
//! let back: Mask = serde_json::from_str(&json).unwrap();
//! assert_eq!(back, mask);
//! ```
//!
//! A nested map has no place for its own polarity, so an override such as
//! `-z:(x)` comes back as `z:(x)`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::json::NUMBER_TOKEN;
use crate::mask::{Mask, Node, Polarity};

impl Serialize for Mask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, node) in self {
            match node.sub_mask() {
                Some(children) => map.serialize_entry(name, children)?,
                None => map.serialize_entry(name, &node.polarity().is_include())?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Mask {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(MaskVisitor)
    }
}

struct MaskVisitor;

impl<'de> Visitor<'de> for MaskVisitor {
    type Value = Mask;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to booleans, numbers or nested maps")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Mask, A::Error> {
        let first = map.next_key::<String>()?;
        read_fields(map, first)
    }
}

/// Reads the remaining entries of a mask map whose first key is `first`.
fn read_fields<'de, A: MapAccess<'de>>(mut map: A, first: Option<String>) -> Result<Mask, A::Error> {
    let mut fields = BTreeMap::new();
    let mut key = first;
    while let Some(name) = key {
        if fields.contains_key(&name) {
            return Err(de::Error::custom(format_args!("duplicate field '{name}'")));
        }
        let FieldValue(node) = map.next_value()?;
        fields.insert(name, node);
        key = map.next_key()?;
    }
    Ok(Mask::from_map(fields))
}

fn weight(negative: bool) -> Node {
    Node::Leaf(if negative {
        Polarity::Exclude
    } else {
        Polarity::Include
    })
}

/// One map value, read as a node.
struct FieldValue(Node);

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FieldVisitor).map(FieldValue)
    }
}

struct FieldVisitor;

impl<'de> Visitor<'de> for FieldVisitor {
    type Value = Node;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, a number or a nested map")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Node, E> {
        Ok(if v { Node::include() } else { Node::exclude() })
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Node, E> {
        Ok(weight(v < 0))
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Node, E> {
        Ok(Node::include())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Node, E> {
        Ok(weight(v < 0.0))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Node, A::Error> {
        let first = map.next_key::<String>()?;
        if first.as_deref() == Some(NUMBER_TOKEN) {
            let text: String = map.next_value()?;
            let value = text.parse::<f64>().map_err(de::Error::custom)?;
            return Ok(weight(value < 0.0));
        }
        read_fields(map, first).map(|children| Node::Subtree(Polarity::Include, children))
    }
}

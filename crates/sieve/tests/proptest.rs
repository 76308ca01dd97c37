//! Property-based tests for sieve using proptest.

use proptest::prelude::*;
use serde_json::Value;
use sieve::{
    parse, project_deserializer, project_json_str, project_value, JsonWriter, Mask, Node, Polarity,
};

// ============================================================================
// Strategies
// ============================================================================

fn polarity(include: bool) -> Polarity {
    if include {
        Polarity::Include
    } else {
        Polarity::Exclude
    }
}

fn mask_strategy() -> impl Strategy<Value = Mask> {
    let flat = prop::collection::btree_map("[a-e]", any::<bool>(), 0..4).prop_map(|fields| {
        Mask::from_fields(
            fields
                .into_iter()
                .map(|(name, include)| (name, Node::Leaf(polarity(include)))),
        )
        .unwrap()
    });
    flat.prop_recursive(3, 32, 4, |inner| {
        let node = prop_oneof![
            any::<bool>().prop_map(|include| Node::Leaf(polarity(include))),
            (any::<bool>(), inner)
                .prop_map(|(include, children)| Node::subtree(polarity(include), children)),
        ];
        prop::collection::btree_map("[a-e]", node, 0..4)
            .prop_map(|fields| Mask::from_fields(fields).unwrap())
    })
}

fn document_strategy() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::String),
    ];
    scalar.prop_recursive(4, 64, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-e]", inner, 0..5)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

fn object_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-e]", document_strategy(), 0..5)
        .prop_map(|fields| Value::Object(fields.into_iter().collect()))
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// Canonical text parses back to the same tree and is stable.
    #[test]
    fn text_round_trip(mask in mask_strategy()) {
        let text = mask.to_text();
        let parsed = parse(&text).unwrap();
        prop_assert_eq!(parsed.to_text(), text);
        prop_assert_eq!(parse(&parsed.to_text()).unwrap(), parsed);
    }

    /// The parser reports errors, it never panics.
    #[test]
    fn parser_is_total(text in "[a-c,:() \\-]{0,24}") {
        let _ = parse(&text);
    }

    /// Mode is Exclude exactly when the level has excludes and no includes.
    #[test]
    fn mode_follows_direct_children(mask in mask_strategy()) {
        let includes = mask.iter().filter(|(_, node)| node.polarity().is_include()).count();
        let excludes = mask.len() - includes;
        let expected = if excludes > 0 && includes == 0 {
            Polarity::Exclude
        } else {
            Polarity::Include
        };
        prop_assert_eq!(mask.mode(), expected);
    }

    /// The base decides every field it names; the rest comes from other.
    #[test]
    fn overlay_precedence(base in mask_strategy(), other in mask_strategy()) {
        let merged = base.overlay(&other);
        for (name, node) in merged.iter() {
            match (base.get(name), other.get(name)) {
                (Some(ours), _) => prop_assert_eq!(node.polarity(), ours.polarity()),
                (None, Some(theirs)) => prop_assert_eq!(node, theirs),
                (None, None) => prop_assert!(false, "field {} came from nowhere", name),
            }
        }
        prop_assert_eq!(merged.len(), base.iter().chain(other.iter())
            .map(|(name, _)| name)
            .collect::<std::collections::BTreeSet<_>>()
            .len());
    }

    /// Overlaying a mask with itself changes nothing.
    #[test]
    fn overlay_idempotent(mask in mask_strategy()) {
        prop_assert_eq!(mask.overlay(&mask), mask);
    }

    /// Projecting twice gives byte-identical output.
    #[test]
    fn projection_deterministic(mask in mask_strategy(), doc in document_strategy()) {
        let text = serde_json::to_string(&doc).unwrap();
        let first = project_json_str(Some(&mask), &text).unwrap();
        let second = project_json_str(Some(&mask), &text).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Value trees, JSON text and the serde driver make the same decisions.
    #[test]
    fn drivers_agree(mask in mask_strategy(), doc in document_strategy()) {
        let text = serde_json::to_string(&doc).unwrap();
        let by_tokens = project_value(Some(&mask), &doc).unwrap();
        let by_text: Value = serde_json::from_str(&project_json_str(Some(&mask), &text).unwrap()).unwrap();

        let mut de = serde_json::Deserializer::from_str(&text);
        let mut writer = JsonWriter::new(Vec::new());
        project_deserializer(Some(&mask), &mut de, &mut writer).unwrap();
        let by_serde: Value = serde_json::from_slice(&writer.into_inner()).unwrap();

        prop_assert_eq!(&by_tokens, &by_text);
        prop_assert_eq!(by_tokens, by_serde);
    }

    /// JSON text comes back byte for byte when nothing is masked.
    #[test]
    fn json_text_identity(doc in document_strategy()) {
        let text = serde_json::to_string(&doc).unwrap();
        prop_assert_eq!(project_json_str(None, &text).unwrap(), text);
    }

    /// No mask, or an empty one, is the identity.
    #[test]
    fn empty_mask_identity(doc in document_strategy()) {
        prop_assert_eq!(project_value(None, &doc).unwrap(), doc.clone());
        prop_assert_eq!(project_value(Some(&Mask::new()), &doc).unwrap(), doc);
    }

    /// Top-level leaves are honored no matter what else the mask says.
    #[test]
    fn top_level_leaves(mask in mask_strategy(), doc in object_strategy()) {
        let out = project_value(Some(&mask), &doc).unwrap();
        let out = out.as_object().unwrap();
        for (name, node) in mask.iter() {
            if node.sub_mask().is_some() {
                continue;
            }
            match node.polarity() {
                Polarity::Exclude => prop_assert!(!out.contains_key(name)),
                Polarity::Include => prop_assert_eq!(out.get(name), doc.get(name)),
            }
        }
    }
}

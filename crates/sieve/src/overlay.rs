//! Mask composition.

use std::collections::btree_map::Entry;

use crate::mask::{Mask, Node};

impl Mask {
    /// Layers `other` underneath `self`.
    ///
    /// Fields from either side are kept. Where both sides name a field,
    /// `self`'s polarity wins; `other` can only contribute children that
    /// `self` lacks, merged recursively when both have them. Modes are
    /// re-derived at every merged level. Neither input is modified.
    ///
    /// ```
    /// use sieve::parse;
    ///
    /// let caller = parse("-a,b").unwrap();
    /// let defaults = parse("a,c:(d)").unwrap();
    /// assert_eq!(caller.overlay(&defaults).to_text(), "-a,b,c:(d)");
    /// ```
    pub fn overlay(&self, other: &Mask) -> Mask {
        let mut fields = self.fields().clone();
        for (name, incoming) in other.fields() {
            match fields.entry(name.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(incoming.clone());
                }
                Entry::Occupied(mut slot) => {
                    let merged = merge_node(slot.get(), incoming);
                    slot.insert(merged);
                }
            }
        }
        Mask::from_map(fields)
    }

    /// Folds several masks together; earlier masks take precedence.
    ///
    /// An empty iterator yields the empty mask.
    pub fn overlay_all<'a, I>(masks: I) -> Mask
    where
        I: IntoIterator<Item = &'a Mask>,
    {
        masks
            .into_iter()
            .fold(Mask::new(), |acc, next| acc.overlay(next))
    }
}

fn merge_node(base: &Node, other: &Node) -> Node {
    let polarity = base.polarity();
    match (base.sub_mask(), other.sub_mask()) {
        (_, None) => base.clone(),
        (None, Some(theirs)) => Node::Subtree(polarity, theirs.clone()),
        (Some(ours), Some(theirs)) => Node::Subtree(polarity, ours.overlay(theirs)),
    }
}

/// [`Mask::overlay`] that treats a missing mask as empty.
pub fn overlay(base: Option<&Mask>, other: Option<&Mask>) -> Mask {
    match (base, other) {
        (Some(base), Some(other)) => base.overlay(other),
        (Some(only), None) | (None, Some(only)) => only.overlay(&Mask::new()),
        (None, None) => Mask::new(),
    }
}

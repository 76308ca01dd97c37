//! The mask tree model.
//!
//! A [`Mask`] maps field names to [`Node`]s. Each node carries a
//! [`Polarity`] and, optionally, a child mask that narrows the field's
//! value further. The mask's own `mode` decides what happens to fields it
//! does not mention, and is always derived from its direct children:
//!
//! ```text
//! mode = Exclude  iff  at least one direct child is Exclude
//!                      and no direct child is Include
//! mode = Include  otherwise (including the empty mask)
//! ```
//!
//! Masks are immutable once built. The builder methods consume `self` and
//! return a new value, and merging ([`Mask::overlay`]) always produces a
//! fresh tree, so a finished mask can be shared freely across threads.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::MaskError;

/// Whether a field is kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Polarity {
    /// Keep the field.
    #[default]
    Include,
    /// Drop the field.
    Exclude,
}

impl Polarity {
    /// Returns `true` for [`Polarity::Include`].
    pub fn is_include(self) -> bool {
        self == Polarity::Include
    }

    /// Returns `true` for [`Polarity::Exclude`].
    pub fn is_exclude(self) -> bool {
        self == Polarity::Exclude
    }
}

/// One field's decision within a mask.
///
/// A `Subtree` whose mask is empty behaves exactly like a `Leaf` of the same
/// polarity everywhere the mask is applied; use [`Node::sub_mask`] to get
/// the child mask only when it narrows anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A plain include or exclude.
    Leaf(Polarity),
    /// A decision with a nested projection of the field's value.
    Subtree(Polarity, Mask),
}

impl Node {
    /// An include leaf.
    pub fn include() -> Self {
        Node::Leaf(Polarity::Include)
    }

    /// An exclude leaf.
    pub fn exclude() -> Self {
        Node::Leaf(Polarity::Exclude)
    }

    /// A node with a nested mask.
    pub fn subtree(polarity: Polarity, children: Mask) -> Self {
        Node::Subtree(polarity, children)
    }

    /// The node's own polarity.
    pub fn polarity(&self) -> Polarity {
        match self {
            Node::Leaf(polarity) | Node::Subtree(polarity, _) => *polarity,
        }
    }

    /// The raw child mask, which may be empty.
    pub fn children(&self) -> Option<&Mask> {
        match self {
            Node::Leaf(_) => None,
            Node::Subtree(_, children) => Some(children),
        }
    }

    /// The child mask, but only if it has at least one field.
    pub fn sub_mask(&self) -> Option<&Mask> {
        self.children().filter(|children| !children.is_empty())
    }

    /// Returns `true` for an exclude that re-includes some descendants:
    /// `-z:(x)` drops `z` except for `z.x`.
    pub fn is_override(&self) -> bool {
        self.polarity().is_exclude() && self.sub_mask().is_some()
    }
}

/// A field-projection tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mask {
    mode: Polarity,
    fields: BTreeMap<String, Node>,
}

impl Mask {
    /// Creates an empty mask. It keeps everything when applied.
    pub fn new() -> Self {
        Mask::default()
    }

    /// Starts a fluent builder.
    ///
    /// ```
    /// use sieve::{Mask, Polarity};
    ///
    /// let mask = Mask::builder()
    ///     .include("a")
    ///     .exclude("b")
    ///     .subtree("c", Polarity::Include, Mask::builder().include("d").build().unwrap())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(mask.to_string(), "a,-b,c:(d)");
    /// ```
    pub fn builder() -> MaskBuilder {
        MaskBuilder::default()
    }

    /// Builds a mask from `(name, node)` pairs, deriving its mode.
    ///
    /// Fails on the first repeated name.
    pub fn from_fields<I, S>(fields: I) -> Result<Self, MaskError>
    where
        I: IntoIterator<Item = (S, Node)>,
        S: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, node) in fields {
            let name = name.into();
            if map.contains_key(&name) {
                return Err(MaskError::DuplicateField(name));
            }
            map.insert(name, node);
        }
        Ok(Mask::from_map(map))
    }

    /// Wraps an already de-duplicated field map, deriving the mode.
    pub(crate) fn from_map(fields: BTreeMap<String, Node>) -> Self {
        Mask {
            mode: derive_mode(fields.values()),
            fields,
        }
    }

    /// Returns a copy with one more field and a re-derived mode.
    ///
    /// Re-deriving discards any mode set with [`Mask::with_mode`].
    pub fn with_field(mut self, name: impl Into<String>, node: Node) -> Result<Self, MaskError> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(MaskError::DuplicateField(name));
        }
        self.fields.insert(name, node);
        Ok(Mask::from_map(self.fields))
    }

    /// Overrides the derived mode.
    ///
    /// This is the only way to get a mode that disagrees with the mask's
    /// direct children.
    pub fn with_mode(mut self, mode: Polarity) -> Self {
        self.mode = mode;
        self
    }

    /// Default treatment for fields this mask does not mention.
    pub fn mode(&self) -> Polarity {
        self.mode
    }

    /// The field decisions, ordered by name.
    pub fn fields(&self) -> &BTreeMap<String, Node> {
        &self.fields
    }

    /// Looks up one field.
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.fields.get(name)
    }

    /// Returns `true` if the mask mentions `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Iterates over `(name, node)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.fields.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Number of fields at this level.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if this level has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the canonical expression: fields sorted by name, `-` for
    /// excludes, `name:(...)` for non-empty subtrees.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    pub(crate) fn view(&self) -> MaskView<'_> {
        MaskView {
            mode: self.mode,
            fields: &self.fields,
        }
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, node)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if node.polarity().is_exclude() {
                f.write_str("-")?;
            }
            f.write_str(name)?;
            if let Some(children) = node.sub_mask() {
                write!(f, ":({})", children)?;
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Mask {
    type Item = (&'a String, &'a Node);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Derives a mask mode from its direct children.
///
/// Only the nodes' own polarities count; what sits inside their subtrees
/// never influences the parent.
pub fn derive_mode<'a, I>(nodes: I) -> Polarity
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut has_exclude = false;
    for node in nodes {
        match node.polarity() {
            Polarity::Include => return Polarity::Include,
            Polarity::Exclude => has_exclude = true,
        }
    }
    if has_exclude {
        Polarity::Exclude
    } else {
        Polarity::Include
    }
}

/// Fluent builder for [`Mask`].
///
/// Duplicates are reported by [`MaskBuilder::build`], not when added.
#[derive(Debug, Clone, Default)]
pub struct MaskBuilder {
    entries: Vec<(String, Node)>,
}

impl MaskBuilder {
    /// Adds an include leaf.
    pub fn include(self, name: impl Into<String>) -> Self {
        self.node(name, Node::include())
    }

    /// Adds an exclude leaf.
    pub fn exclude(self, name: impl Into<String>) -> Self {
        self.node(name, Node::exclude())
    }

    /// Adds a field with a nested mask.
    pub fn subtree(self, name: impl Into<String>, polarity: Polarity, children: Mask) -> Self {
        self.node(name, Node::subtree(polarity, children))
    }

    /// Adds an arbitrary node.
    pub fn node(mut self, name: impl Into<String>, node: Node) -> Self {
        self.entries.push((name.into(), node));
        self
    }

    /// Finalizes the mask, deriving its mode.
    pub fn build(self) -> Result<Mask, MaskError> {
        Mask::from_fields(self.entries)
    }
}

/// A borrowed mask level as seen by the projector.
///
/// Overrides are applied through a view that reuses the excluded node's
/// children with the mode forced to `Include`, so no synthetic mask is ever
/// allocated.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MaskView<'m> {
    pub(crate) mode: Polarity,
    pub(crate) fields: &'m BTreeMap<String, Node>,
}

impl<'m> MaskView<'m> {
    /// The whitelist-only view used below an override.
    pub(crate) fn overriding(children: &'m Mask) -> Self {
        MaskView {
            mode: Polarity::Include,
            fields: &children.fields,
        }
    }
}

//! Sieve Query - Flat query projections from sieve masks.
//!
//! Many query layers only understand a flat projection document: a list of
//! dotted field paths that are either all included (`1`) or all excluded
//! (`0`). A [`Mask`] is richer than that, so [`export`] picks whichever
//! flat form reproduces it:
//!
//! - **Exclusion**, when nothing anywhere asks for inclusion: every simple
//!   top-level exclude, weight `0`.
//! - **Inclusion**, otherwise: the dotted path of every include leaf
//!   reachable through include subtrees or overrides, weight `1`.
//!
//! ```rust
//! use sieve::parse;
//! use sieve_query::{export, ProjectionKind};
//!
//! let projection = export(Some(&parse("a,-b,c:(d,-e),-z:(x)").unwrap()));
//! assert_eq!(projection.kind(), ProjectionKind::Inclusion);
//!
//! let paths: Vec<_> = projection.iter().collect();
//! assert_eq!(paths, vec![("a", 1), ("c.d", 1), ("z.x", 1)]);
//! ```
//!
//! Simple excludes never appear in an inclusion projection; leaving a path
//! out of an inclusion list already drops it.

use std::collections::BTreeSet;

use serde::ser::{Serialize, SerializeMap, Serializer};
use sieve::{Mask, Polarity};
use tracing::debug;

/// Which flat form a projection took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProjectionKind {
    /// No mask, or an empty one: project nothing away.
    #[default]
    Empty,
    /// Listed paths are the only ones kept.
    Inclusion,
    /// Listed paths are dropped, everything else is kept.
    Exclusion,
}

impl ProjectionKind {
    /// The weight every entry of this kind carries.
    pub fn weight(self) -> u8 {
        match self {
            ProjectionKind::Inclusion => 1,
            ProjectionKind::Empty | ProjectionKind::Exclusion => 0,
        }
    }
}

/// A flat projection: one kind, a sorted set of dotted paths.
///
/// Serializes as a map from path to weight, e.g. `{"a":1,"c.d":1}`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryProjection {
    kind: ProjectionKind,
    paths: BTreeSet<String>,
}

impl QueryProjection {
    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    /// `(path, weight)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u8)> {
        let weight = self.kind.weight();
        self.paths.iter().map(move |path| (path.as_str(), weight))
    }

    /// The paths alone, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Serialize for QueryProjection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (path, weight) in self.iter() {
            map.serialize_entry(path, &weight)?;
        }
        map.end()
    }
}

/// Flattens `mask` into a query projection.
pub fn export(mask: Option<&Mask>) -> QueryProjection {
    let Some(mask) = mask.filter(|mask| !mask.is_empty()) else {
        return QueryProjection::default();
    };

    let projection = if needs_inclusion(mask) {
        QueryProjection {
            kind: ProjectionKind::Inclusion,
            paths: inclusion_paths(mask),
        }
    } else {
        QueryProjection {
            kind: ProjectionKind::Exclusion,
            paths: mask
                .iter()
                .filter(|(_, node)| node.polarity().is_exclude() && node.sub_mask().is_none())
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    };
    debug!(kind = ?projection.kind, paths = projection.len(), "exported query projection");
    projection
}

/// True if any include is reachable from this level through overrides.
///
/// Includes nested inside an include subtree are not searched: the subtree's
/// own include already decides.
fn needs_inclusion(mask: &Mask) -> bool {
    mask.iter().any(|(_, node)| match node.polarity() {
        Polarity::Include => true,
        Polarity::Exclude => node.sub_mask().is_some_and(needs_inclusion),
    })
}

/// Dotted paths of every include leaf below `mask`.
///
/// Walks include subtrees and overrides alike; plain excludes contribute
/// nothing.
fn inclusion_paths(mask: &Mask) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    let mut pending: Vec<(String, &Mask)> = vec![(String::new(), mask)];
    while let Some((prefix, level)) = pending.pop() {
        for (name, node) in level.iter() {
            let path = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            };
            match (node.polarity(), node.sub_mask()) {
                (_, Some(children)) => pending.push((path, children)),
                (Polarity::Include, None) => {
                    paths.insert(path);
                }
                (Polarity::Exclude, None) => {}
            }
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve::parse;

    fn mask(text: &str) -> Mask {
        parse(text).unwrap()
    }

    #[test]
    fn inclusion_detection() {
        assert!(needs_inclusion(&mask("a")));
        assert!(needs_inclusion(&mask("-a,b")));
        assert!(!needs_inclusion(&mask("-a,-b")));
        assert!(needs_inclusion(&mask("-z:(x)")));
        assert!(needs_inclusion(&mask("-z:(-y:(x))")));
        assert!(!needs_inclusion(&mask("-z:(-y)")));
    }

    #[test]
    fn excludes_inside_override_are_dropped() {
        let paths = inclusion_paths(&mask("-z:(x,-y,w:(q,-r))"));
        let paths: Vec<_> = paths.iter().map(String::as_str).collect();
        assert_eq!(paths, vec!["z.w.q", "z.x"]);
    }

    #[test]
    fn include_subtree_with_only_excludes_lists_nothing() {
        let projection = export(Some(&mask("a:(-b)")));
        assert_eq!(projection.kind(), ProjectionKind::Inclusion);
        assert!(projection.is_empty());
    }

    #[test]
    fn override_without_includes_is_left_out_of_exclusion() {
        let projection = export(Some(&mask("-a,-z:(-y)")));
        assert_eq!(projection.kind(), ProjectionKind::Exclusion);
        assert_eq!(projection.paths().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn weights() {
        assert_eq!(ProjectionKind::Inclusion.weight(), 1);
        assert_eq!(ProjectionKind::Exclusion.weight(), 0);
        assert_eq!(ProjectionKind::default(), ProjectionKind::Empty);
    }
}

//! Canonical undirected edges.
//!
//! An [`Edge`] identifies an edge purely by its two endpoint vertex
//! indices, canonicalized so `(a, b)` and `(b, a)` map to the same value.
//! Edges are `Copy`/`Hash`/`Ord` for use as set and map keys in the
//! fixed-edge set and the overlap-count map.

use crate::core::triangle::VertInd;
use serde::{Deserialize, Serialize};

/// Canonical identifier for an undirected edge.
///
/// # Examples
///
/// ```
/// use cdt2d::core::edge::Edge;
///
/// let e1 = Edge::new(5, 2);
/// let e2 = Edge::new(2, 5);
/// assert_eq!(e1, e2);
/// assert_eq!(e1.v1(), 2);
/// assert_eq!(e1.v2(), 5);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    v1: VertInd,
    v2: VertInd,
}

impl Edge {
    /// Creates a canonical edge; endpoints are reordered so `v1 <= v2`.
    #[inline]
    #[must_use]
    pub fn new(a: VertInd, b: VertInd) -> Self {
        if a <= b {
            Self { v1: a, v2: b }
        } else {
            Self { v1: b, v2: a }
        }
    }

    /// Smaller endpoint.
    #[inline]
    #[must_use]
    pub const fn v1(self) -> VertInd {
        self.v1
    }

    /// Larger endpoint.
    #[inline]
    #[must_use]
    pub const fn v2(self) -> VertInd {
        self.v2
    }

    /// Both endpoints as a `(v1, v2)` tuple.
    #[inline]
    #[must_use]
    pub const fn endpoints(self) -> (VertInd, VertInd) {
        (self.v1, self.v2)
    }
}

impl From<(VertInd, VertInd)> for Edge {
    #[inline]
    fn from((a, b): (VertInd, VertInd)) -> Self {
        Self::new(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeSet, HashSet};

    #[test]
    fn edge_is_canonical() {
        let e1 = Edge::new(1, 2);
        let e2 = Edge::new(2, 1);
        assert_eq!(e1, e2);
        assert!(e1.v1() <= e1.v2());
        assert_eq!(e1.endpoints(), (1, 2));
    }

    #[test]
    fn edge_from_tuple() {
        assert_eq!(Edge::from((7, 3)), Edge::new(3, 7));
    }

    #[test]
    fn edge_is_hashable_and_orderable() {
        let mut hash_set: HashSet<Edge> = HashSet::new();
        hash_set.insert(Edge::new(0, 1));
        hash_set.insert(Edge::new(1, 0));
        hash_set.insert(Edge::new(0, 2));
        assert_eq!(hash_set.len(), 2);

        let mut btree_set: BTreeSet<Edge> = BTreeSet::new();
        btree_set.insert(Edge::new(0, 1));
        btree_set.insert(Edge::new(1, 0));
        btree_set.insert(Edge::new(0, 2));
        assert_eq!(btree_set.len(), 2);
    }

    #[test]
    fn self_loop_is_representable() {
        // The triangulation ignores degenerate constraints, but the key type
        // itself does not reject them.
        let e = Edge::new(4, 4);
        assert_eq!(e.endpoints(), (4, 4));
    }
}

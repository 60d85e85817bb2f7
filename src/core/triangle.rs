//! Triangles, index types, and slot arithmetic.
//!
//! Triangles reference vertices and each other by plain integer index into
//! flat arrays. A triangle stores its three vertex indices in CCW order and
//! three neighbor indices in parallel, with **neighbor `k` across the edge
//! opposite vertex `k`** (the edge between vertices `(k + 1) % 3` and
//! `(k + 2) % 3`). Outer edges carry the [`NO_NEIGHBOR`] sentinel.

use serde::{Deserialize, Serialize};

/// Index of a vertex in the triangulation's vertex array.
pub type VertInd = usize;

/// Index of a triangle in the triangulation's triangle array.
pub type TriInd = usize;

/// Sentinel marking "no adjacent triangle" across a boundary edge.
pub const NO_NEIGHBOR: TriInd = TriInd::MAX;

/// Nesting depth of a triangle under constraint boundaries.
///
/// Odd depths are inside material, even depths are outside or inside a
/// hole. Unreached triangles keep `LayerDepth::MAX`.
pub type LayerDepth = u16;

/// Number of *additional* input boundaries overlapping a fixed edge; the
/// effective multiplicity of the edge is `1 + count`.
pub type BoundaryOverlapCount = u16;

/// Next slot counter-clockwise: `0 -> 1 -> 2 -> 0`.
#[inline]
#[must_use]
pub const fn ccw(slot: u8) -> u8 {
    (slot + 1) % 3
}

/// Next slot clockwise: `0 -> 2 -> 1 -> 0`.
#[inline]
#[must_use]
pub const fn cw(slot: u8) -> u8 {
    (slot + 2) % 3
}

/// A triangle: CCW vertex triple plus the parallel neighbor triple.
///
/// # Examples
///
/// ```
/// use cdt2d::core::triangle::{Triangle, NO_NEIGHBOR};
///
/// let t = Triangle::new([0, 1, 2], [NO_NEIGHBOR, 3, NO_NEIGHBOR]);
/// assert!(t.contains_vertex(1));
/// // Neighbor 1 sits across the edge opposite vertex 1, i.e. edge (2, 0).
/// assert_eq!(t.edge_opposite(1), (2, 0));
/// assert_eq!(t.opposed_vertex(3), 1);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triangle {
    /// Vertex indices in counter-clockwise order.
    pub vertices: [VertInd; 3],
    /// Neighbor `k` is across the edge opposite `vertices[k]`.
    pub neighbors: [TriInd; 3],
}

impl Triangle {
    /// Creates a triangle from its vertex and neighbor triples.
    #[inline]
    #[must_use]
    pub const fn new(vertices: [VertInd; 3], neighbors: [TriInd; 3]) -> Self {
        Self {
            vertices,
            neighbors,
        }
    }

    /// Returns `true` when `v` is one of the triangle's vertices.
    #[inline]
    #[must_use]
    pub fn contains_vertex(&self, v: VertInd) -> bool {
        self.vertices.contains(&v)
    }

    /// Slot of vertex `v` in this triangle.
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the triangle; that indicates a
    /// corrupted adjacency structure.
    #[inline]
    #[must_use]
    pub fn vertex_slot(&self, v: VertInd) -> u8 {
        match self.vertices.iter().position(|&x| x == v) {
            Some(slot) => slot as u8,
            None => panic!("vertex {v} is not incident to triangle {self:?}"),
        }
    }

    /// Slot of neighbor `n` in this triangle.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a neighbor of the triangle; that indicates a
    /// corrupted adjacency structure.
    #[inline]
    #[must_use]
    pub fn neighbor_slot(&self, n: TriInd) -> u8 {
        match self.neighbors.iter().position(|&x| x == n) {
            Some(slot) => slot as u8,
            None => panic!("triangle {n} is not a neighbor of triangle {self:?}"),
        }
    }

    /// Neighbor across the edge opposite vertex `v`.
    ///
    /// # Panics
    ///
    /// Panics if `v` is not a vertex of the triangle.
    #[inline]
    #[must_use]
    pub fn opposed_neighbor(&self, v: VertInd) -> TriInd {
        self.neighbors[self.vertex_slot(v) as usize]
    }

    /// Vertex opposite the edge shared with neighbor `n`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not a neighbor of the triangle.
    #[inline]
    #[must_use]
    pub fn opposed_vertex(&self, n: TriInd) -> VertInd {
        self.vertices[self.neighbor_slot(n) as usize]
    }

    /// Endpoints of the edge opposite vertex slot `slot`, directed along
    /// the CCW boundary.
    #[inline]
    #[must_use]
    pub fn edge_opposite(&self, slot: u8) -> (VertInd, VertInd) {
        (
            self.vertices[ccw(slot) as usize],
            self.vertices[cw(slot) as usize],
        )
    }
}

//! # cdt2d
//!
//! A 2D **constrained Delaunay triangulation** (CDT) of a planar point set
//! augmented with fixed (constraint) edges.
//!
//! # Features
//!
//! - Incremental point insertion with Lawson edge-flipping
//! - Walking point location seeded by a pluggable nearest-vertex locator
//! - Constraint-edge enforcement via intersection walk and pseudo-polygon
//!   re-triangulation, with overlapping-boundary counting
//! - Automatic removal of outer triangles and holes by layer-depth peeling
//! - Generic coordinates (`f32`, `f64`, or any
//!   [`CoordinateScalar`](geometry::point::CoordinateScalar))
//! - Input deduplication helpers and serde-serializable data types
//!
//! # Basic usage
//!
//! Feed vertices, then constraints, then trim:
//!
//! ```rust
//! use cdt2d::prelude::*;
//!
//! // Outer square with a square hole.
//! let vertices: Vec<Point2<f64>> = vec![
//!     Point2::new(0.0, 0.0),
//!     Point2::new(10.0, 0.0),
//!     Point2::new(10.0, 10.0),
//!     Point2::new(0.0, 10.0),
//!     Point2::new(3.0, 3.0),
//!     Point2::new(7.0, 3.0),
//!     Point2::new(7.0, 7.0),
//!     Point2::new(3.0, 7.0),
//! ];
//! let edges = vec![
//!     // outer boundary
//!     Edge::new(0, 1),
//!     Edge::new(1, 2),
//!     Edge::new(2, 3),
//!     Edge::new(3, 0),
//!     // hole boundary
//!     Edge::new(4, 5),
//!     Edge::new(5, 6),
//!     Edge::new(6, 7),
//!     Edge::new(7, 4),
//! ];
//!
//! let mut cdt = Triangulation::<f64>::new();
//! cdt.insert_vertices(&vertices).unwrap();
//! cdt.insert_edges(&edges).unwrap();
//! cdt.erase_outer_triangles_and_holes();
//!
//! // The annular region between the squares: 8 vertices, 1 hole.
//! assert_eq!(cdt.num_triangles(), 8);
//! assert!(cdt.is_valid().is_ok());
//! assert!(cdt.is_delaunay().is_ok());
//! ```
//!
//! # Triangulation invariants
//!
//! Between public operations the triangulation maintains:
//!
//! | Invariant | Checked by |
//! |---|---|
//! | Triangles are counter-clockwise | [`Triangulation::is_valid`](core::triangulation::Triangulation::is_valid) |
//! | Neighbor links are mutual across reversed edges | [`Triangulation::is_valid`](core::triangulation::Triangulation::is_valid) |
//! | A triangle is in the fans of exactly its vertices | [`Triangulation::is_valid`](core::triangulation::Triangulation::is_valid) |
//! | Every fixed edge is an edge of some triangle | [`Triangulation::is_valid`](core::triangulation::Triangulation::is_valid) |
//! | Non-fixed interior edges are locally Delaunay | [`Triangulation::is_delaunay`](core::triangulation::Triangulation::is_delaunay) |
//!
//! # Limitations
//!
//! The predicates are inexact floating-point determinants with
//! consistently resolved ties; robustness degrades gracefully on
//! near-degenerate input but is not formally guaranteed. Duplicate input
//! points are the caller's responsibility — see
//! [`core::dedup`](core::dedup) for the supported pre-processing path.
//! Constraints must form a planar subdivision; a constraint crossing an
//! already-fixed edge is reported as
//! [`ConstraintsIntersect`](core::triangulation::TriangulationError::ConstraintsIntersect)
//! and leaves the triangulation in a state that must be discarded.

#![forbid(unsafe_code)]

/// Core data structures and algorithms of the CDT kernel.
pub mod core {
    /// Collection aliases tuned for index-keyed geometry workloads.
    pub mod collections;
    /// Input deduplication, edge remapping, and edge extraction.
    pub mod dedup;
    /// Layer-depth computation for hole detection.
    pub mod depth;
    /// Canonical undirected edges.
    pub mod edge;
    /// Triangle storage with fans and dummy-slot recycling.
    pub mod store;
    /// Triangles, index types, and slot arithmetic.
    pub mod triangle;
    /// The constrained Delaunay triangulation itself.
    pub mod triangulation;
}

/// Geometric types and predicates.
pub mod geometry {
    /// 2D points, bounding boxes, and the coordinate scalar abstraction.
    pub mod point;
    /// Orientation, in-circle, and intersection predicates.
    pub mod predicates;
}

/// Nearest-vertex location (trait and default kd-tree implementation).
pub mod locator;

/// Re-exports of the commonly used types.
pub mod prelude {
    pub use crate::core::collections::{FastHashMap, FastHashSet, SmallBuffer, TriFan};
    pub use crate::core::dedup::{
        extract_edges, find_duplicates, remap_edges, remove_duplicates,
        remove_duplicates_and_remap_edges, DuplicatesInfo,
    };
    pub use crate::core::depth::{
        calculate_triangle_depths, calculate_triangle_depths_with_overlaps, peel_layer,
        peel_layer_with_overlaps,
    };
    pub use crate::core::edge::Edge;
    pub use crate::core::store::TriangleStore;
    pub use crate::core::triangle::{
        BoundaryOverlapCount, LayerDepth, TriInd, Triangle, VertInd, NO_NEIGHBOR,
    };
    pub use crate::core::triangulation::{
        Triangulation, TriangulationError, TriangulationValidationError, VertexInsertionOrder,
    };
    pub use crate::geometry::point::{Box2, CoordinateScalar, Point2};
    pub use crate::geometry::predicates::{
        is_in_circumcircle, locate_point_line, locate_point_triangle, orient2d,
        segments_intersect, PtLineLocation, PtTriLocation,
    };
    pub use crate::locator::{KdTreeLocator, NearPointLocator};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    fn is_normal<T: Sized + Send + Sync + Unpin>() {}

    #[test]
    fn public_types_are_normal() {
        is_normal::<Point2<f64>>();
        is_normal::<Edge>();
        is_normal::<Triangle>();
        is_normal::<TriangleStore>();
        is_normal::<Triangulation<f64>>();
        is_normal::<KdTreeLocator<f32>>();
    }

    #[test]
    fn prelude_covers_the_basic_pipeline() {
        let mut vertices = vec![
            Point2::new(0.0_f64, 0.0),
            Point2::new(4.0, 0.0),
            Point2::new(2.0, 3.0),
            Point2::new(0.0, 0.0), // duplicate
        ];
        let mut edges = vec![Edge::new(0, 3)];
        let info = remove_duplicates_and_remap_edges(&mut vertices, &mut edges);
        assert_eq!(info.duplicates, vec![3]);

        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&vertices).unwrap();
        cdt.insert_edges(&edges).unwrap();
        cdt.erase_super_triangle();
        assert_eq!(cdt.num_triangles(), 1);
        assert_eq!(extract_edges(cdt.triangles()).len(), 3);
    }
}

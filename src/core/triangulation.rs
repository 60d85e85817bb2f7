//! The constrained Delaunay triangulation kernel.
//!
//! [`Triangulation`] drives the whole pipeline: vertices are inserted
//! incrementally with Lawson edge-flipping, constraint edges are enforced
//! by removing the corridor of intersected triangles and re-triangulating
//! the two resulting pseudo-polygons, and trimming operations erase the
//! super-triangle, everything outside the constrained boundary, or outside
//! plus auto-detected holes.
//!
//! # Invariants
//!
//! Between public operations the structure maintains:
//!
//! - every stored triangle is counter-clockwise;
//! - neighbor links are symmetric and cross reversed edges;
//! - a triangle is in the fan of exactly its three vertices;
//! - every fixed edge is an edge of at least one triangle;
//! - every non-fixed interior edge satisfies the empty-circumcircle
//!   property under the crate's inexact predicates.
//!
//! [`Triangulation::is_valid`] and [`Triangulation::is_delaunay`] check
//! these invariants explicitly; the test suite leans on both.
//!
//! # Lifecycle
//!
//! A triangulation starts empty. The first vertex batch builds the
//! super-triangle (unless custom super-geometry was installed), constraints
//! are applied after all vertices, and a trimming operation finalizes the
//! result. Trimming is terminal: repeated trimming calls are no-ops, and
//! further insertions are unsupported after it.

use crate::core::collections::{FastHashMap, FastHashSet, TriFan};
use crate::core::depth::{calculate_triangle_depths, calculate_triangle_depths_with_overlaps};
use crate::core::edge::Edge;
use crate::core::store::TriangleStore;
use crate::core::triangle::{
    ccw, cw, BoundaryOverlapCount, TriInd, Triangle, VertInd, NO_NEIGHBOR,
};
use crate::geometry::point::{Box2, CoordinateScalar, Point2};
use crate::geometry::predicates::{
    circumcircle_det, is_in_circumcircle, locate_point_line, locate_point_triangle, orient2d,
    PtLineLocation, PtTriLocation,
};
use crate::locator::{KdTreeLocator, NearPointLocator};
use num_traits::cast;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Seed of the per-object generator driving the insertion shuffle and the
/// walk's first-edge offset. Fixed so results are reproducible run to run.
const RNG_SEED: u64 = 9001;

/// Number of super-triangle vertices; they occupy the lowest indices.
const N_SUPER_VERTICES: usize = 3;

/// Strategy for ordering vertex insertions.
///
/// Randomized insertion only shuffles the *insertion order*; vertex
/// indices in the final triangulation stay as provided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VertexInsertionOrder {
    /// Vertices are inserted in random order (deterministic per-object
    /// shuffle). Expected-case performance on adversarial input orders.
    #[default]
    Randomized,
    /// Vertices are inserted in the order they were provided.
    AsProvided,
}

/// What kind of geometry embeds the triangulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SuperGeometry {
    SuperTriangle,
    Custom,
}

/// Errors reported by triangulation operations.
///
/// `ConstraintsIntersect` leaves the triangulation in an inconsistent
/// state; discard the object after observing it. The other errors are
/// reported before the failing input mutates the structure.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TriangulationError {
    /// A vertex in the input batch has a NaN or infinite coordinate.
    #[error("vertex {index} in the input batch has a non-finite coordinate")]
    NonFiniteVertex {
        /// Position of the offending vertex within the input batch.
        index: usize,
    },

    /// A newly inserted vertex coincides exactly with an existing vertex.
    ///
    /// The core does not deduplicate input; use
    /// [`find_duplicates`](crate::core::dedup::find_duplicates) and
    /// friends before inserting.
    #[error("a newly inserted vertex coincides with existing vertex {index}")]
    DuplicateVertex {
        /// Index of the pre-existing vertex at the same position.
        index: VertInd,
    },

    /// The walking search did not reach a containing triangle.
    #[error("point location walk failed to reach a containing triangle")]
    PointLocationFailed,

    /// A constraint crosses an edge that is already fixed; the input
    /// constraints are not a planar subdivision.
    #[error("constraint edge {edge:?} intersects already-fixed edge {fixed:?}")]
    ConstraintsIntersect {
        /// The constraint being inserted (by internal vertex indices).
        edge: Edge,
        /// The previously fixed edge it crosses.
        fixed: Edge,
    },

    /// An edge references a vertex index beyond the inserted vertices.
    #[error("edge vertex index {index} is out of range ({num_vertices} vertices)")]
    VertexIndexOutOfRange {
        /// The offending vertex index, as provided by the caller.
        index: VertInd,
        /// Number of caller-visible vertices.
        num_vertices: usize,
    },

    /// The corridor walk for a constraint left the triangulation; the
    /// input is degenerate beyond what the inexact predicates tolerate.
    #[error("constraint walk from vertex {a} toward vertex {b} left the triangulation")]
    ConstraintWalkFailed {
        /// Constraint start vertex.
        a: VertInd,
        /// Constraint end vertex.
        b: VertInd,
    },

    /// The operation requires vertices to be inserted first.
    #[error("operation requires vertices to be inserted first")]
    EmptyTriangulation,

    /// Custom super-geometry can only be installed into an empty
    /// triangulation.
    #[error("super-geometry must be set before any vertices are inserted")]
    SuperGeometryAlreadyInitialized,
}

/// Violations reported by [`Triangulation::is_valid`] and
/// [`Triangulation::is_delaunay`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TriangulationValidationError {
    /// A stored triangle is clockwise.
    #[error("triangle {tri} is not counter-clockwise")]
    NotCounterClockwise {
        /// The offending triangle.
        tri: TriInd,
    },

    /// Two triangles disagree about their shared edge.
    #[error("triangles {tri} and {neighbor} disagree about their shared edge")]
    NeighborAsymmetry {
        /// The triangle whose neighbor link failed verification.
        tri: TriInd,
        /// The neighbor it points to.
        neighbor: TriInd,
    },

    /// A triangle is missing from the fan of one of its vertices.
    #[error("triangle {tri} is missing from the fan of its vertex {vertex}")]
    FanMissingTriangle {
        /// The vertex whose fan is incomplete.
        vertex: VertInd,
        /// The missing triangle.
        tri: TriInd,
    },

    /// A fan lists a triangle that is not incident to the vertex.
    #[error("fan of vertex {vertex} lists triangle {tri} which is not incident to it")]
    FanStaleTriangle {
        /// The vertex whose fan is stale.
        vertex: VertInd,
        /// The stale triangle entry.
        tri: TriInd,
    },

    /// A fixed edge does not appear as an edge of any triangle.
    #[error("fixed edge {edge:?} is not an edge of any triangle")]
    FixedEdgeMissing {
        /// The absent fixed edge.
        edge: Edge,
    },

    /// A vertex lies strictly inside the circumcircle across a non-fixed
    /// edge.
    #[error("vertex {vertex} lies inside the circumcircle of triangle {tri}")]
    DelaunayViolation {
        /// Triangle whose circumcircle is violated.
        tri: TriInd,
        /// The intruding opposite vertex.
        vertex: VertInd,
    },
}

/// A 2D constrained Delaunay triangulation.
///
/// Generic over the coordinate scalar `T` (`f32` or `f64`) and the
/// nearest-vertex locator `L` seeding point-location walks
/// ([`KdTreeLocator`] by default).
///
/// # Examples
///
/// ```
/// use cdt2d::core::triangulation::Triangulation;
/// use cdt2d::geometry::point::Point2;
///
/// let mut cdt = Triangulation::<f64>::new();
/// cdt.insert_vertices(&[
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(1.0, 1.0),
///     Point2::new(0.0, 1.0),
/// ])
/// .unwrap();
/// cdt.erase_super_triangle();
///
/// assert_eq!(cdt.num_vertices(), 4);
/// assert_eq!(cdt.num_triangles(), 2);
/// assert!(cdt.is_valid().is_ok());
/// assert!(cdt.is_delaunay().is_ok());
/// ```
#[derive(Debug)]
pub struct Triangulation<T: CoordinateScalar, L: NearPointLocator<T> = KdTreeLocator<T>> {
    vertices: Vec<Point2<T>>,
    store: TriangleStore,
    fixed_edges: FastHashSet<Edge>,
    overlap_count: FastHashMap<Edge, BoundaryOverlapCount>,
    locator: L,
    n_target_verts: usize,
    super_geometry: SuperGeometry,
    insertion_order: VertexInsertionOrder,
    rng: StdRng,
    trimmed: bool,
    rejected_degenerate_flips: usize,
}

impl<T: CoordinateScalar> Triangulation<T> {
    /// Creates a triangulation with randomized insertion order and the
    /// default kd-tree locator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_order(VertexInsertionOrder::default())
    }

    /// Creates a triangulation with the given insertion order and the
    /// default kd-tree locator.
    #[must_use]
    pub fn with_order(order: VertexInsertionOrder) -> Self {
        Self::with_order_and_locator(order, KdTreeLocator::default())
    }
}

impl<T: CoordinateScalar> Default for Triangulation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CoordinateScalar, L: NearPointLocator<T>> Triangulation<T, L> {
    /// Creates a triangulation with the given insertion order and locator.
    #[must_use]
    pub fn with_order_and_locator(order: VertexInsertionOrder, locator: L) -> Self {
        Self {
            vertices: Vec::new(),
            store: TriangleStore::new(),
            fixed_edges: FastHashSet::default(),
            overlap_count: FastHashMap::default(),
            locator,
            n_target_verts: 0,
            super_geometry: SuperGeometry::SuperTriangle,
            insertion_order: order,
            rng: StdRng::seed_from_u64(RNG_SEED),
            trimmed: false,
            rejected_degenerate_flips: 0,
        }
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    /// Vertex positions, super-geometry vertices first (until trimming
    /// removes them).
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Point2<T>] {
        &self.vertices
    }

    /// All triangles.
    #[inline]
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        self.store.triangles()
    }

    /// The set of constraint (fixed) edges, by internal vertex index.
    #[inline]
    #[must_use]
    pub fn fixed_edges(&self) -> &FastHashSet<Edge> {
        &self.fixed_edges
    }

    /// Overlap counts for fixed edges covered by more than one input
    /// boundary. Absent entry means no overlap; the stored value is the
    /// count of *additional* boundaries.
    #[inline]
    #[must_use]
    pub fn overlap_count(&self) -> &FastHashMap<Edge, BoundaryOverlapCount> {
        &self.overlap_count
    }

    /// Triangles incident to each vertex.
    #[inline]
    #[must_use]
    pub fn vert_tris(&self) -> &[TriFan] {
        self.store.vert_tris()
    }

    /// Number of vertices, super-geometry vertices included.
    #[inline]
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[inline]
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.store.num_triangles()
    }

    /// Number of flips refused because they would have produced a
    /// non-counter-clockwise triangle.
    ///
    /// Zero on healthy input; a growing value indicates near-degenerate
    /// geometry that the inexact predicates could not order.
    #[inline]
    #[must_use]
    pub fn rejected_degenerate_flips(&self) -> usize {
        self.rejected_degenerate_flips
    }

    // =========================================================================
    // INPUT OPERATIONS
    // =========================================================================

    /// Inserts a batch of vertices.
    ///
    /// The first batch also builds the super-triangle from the batch's
    /// bounding box (unless custom super-geometry was installed); later
    /// batches append without rebuilding it.
    ///
    /// # Errors
    ///
    /// - [`TriangulationError::NonFiniteVertex`] if a coordinate is NaN or
    ///   infinite (checked before any mutation);
    /// - [`TriangulationError::DuplicateVertex`] if a vertex coincides
    ///   exactly with an existing one.
    pub fn insert_vertices(&mut self, points: &[Point2<T>]) -> Result<(), TriangulationError> {
        self.insert_vertices_from(points.iter().copied(), |p| p.x, |p| p.y)
    }

    /// Inserts vertices from custom point-like items via coordinate
    /// getters.
    ///
    /// # Errors
    ///
    /// See [`Triangulation::insert_vertices`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cdt2d::core::triangulation::Triangulation;
    ///
    /// struct City {
    ///     lon: f64,
    ///     lat: f64,
    /// }
    ///
    /// let cities = [
    ///     City { lon: 0.0, lat: 0.0 },
    ///     City { lon: 2.0, lat: 0.0 },
    ///     City { lon: 1.0, lat: 2.0 },
    /// ];
    /// let mut cdt = Triangulation::<f64>::new();
    /// cdt.insert_vertices_from(cities.iter(), |c| c.lon, |c| c.lat)
    ///     .unwrap();
    /// cdt.erase_super_triangle();
    /// assert_eq!(cdt.num_triangles(), 1);
    /// ```
    pub fn insert_vertices_from<I, P, Fx, Fy>(
        &mut self,
        items: I,
        get_x: Fx,
        get_y: Fy,
    ) -> Result<(), TriangulationError>
    where
        I: IntoIterator<Item = P>,
        Fx: Fn(&P) -> T,
        Fy: Fn(&P) -> T,
    {
        let positions: Vec<Point2<T>> = items
            .into_iter()
            .map(|p| Point2::new(get_x(&p), get_y(&p)))
            .collect();
        if positions.is_empty() {
            return Ok(());
        }
        if let Some(index) = positions.iter().position(|p| !p.is_finite()) {
            return Err(TriangulationError::NonFiniteVertex { index });
        }

        if self.vertices.is_empty() {
            let Some(envelope) = Box2::envelop_points(positions.iter().copied()) else {
                unreachable!("batch is non-empty");
            };
            self.add_super_triangle(&envelope);
        }

        let n_existing = self.vertices.len();
        self.vertices.reserve(positions.len());
        for &pos in &positions {
            self.add_new_vertex(pos);
        }

        match self.insertion_order {
            VertexInsertionOrder::AsProvided => {
                for offset in 0..positions.len() {
                    self.insert_vertex(n_existing + offset)?;
                }
            }
            VertexInsertionOrder::Randomized => {
                let mut order: Vec<VertInd> =
                    (n_existing..n_existing + positions.len()).collect();
                order.shuffle(&mut self.rng);
                for i_vert in order {
                    self.insert_vertex(i_vert)?;
                }
            }
        }
        Ok(())
    }

    /// Inserts constraint edges by caller-visible vertex index.
    ///
    /// Indices refer to the caller's vertices: 0 is the first vertex the
    /// caller inserted, regardless of super-geometry. If some edge appears
    /// more than once, the repeats are counted as overlapping boundaries
    /// and recorded in [`Triangulation::overlap_count`].
    ///
    /// # Errors
    ///
    /// - [`TriangulationError::VertexIndexOutOfRange`] for an endpoint
    ///   beyond the inserted vertices;
    /// - [`TriangulationError::ConstraintsIntersect`] if a constraint
    ///   crosses an already-fixed edge — the triangulation is left
    ///   inconsistent and must be discarded;
    /// - [`TriangulationError::EmptyTriangulation`] if no vertices were
    ///   inserted yet.
    pub fn insert_edges(&mut self, edges: &[Edge]) -> Result<(), TriangulationError> {
        self.insert_edges_from(edges.iter(), |e| e.v1(), |e| e.v2())
    }

    /// Inserts constraint edges from custom edge-like items via endpoint
    /// getters.
    ///
    /// # Errors
    ///
    /// See [`Triangulation::insert_edges`].
    pub fn insert_edges_from<I, E, Fs, Fe>(
        &mut self,
        items: I,
        get_start: Fs,
        get_end: Fe,
    ) -> Result<(), TriangulationError>
    where
        I: IntoIterator<Item = E>,
        Fs: Fn(&E) -> VertInd,
        Fe: Fn(&E) -> VertInd,
    {
        if self.vertices.is_empty() {
            return Err(TriangulationError::EmptyTriangulation);
        }
        let num_vertices = self.vertices.len() - self.n_target_verts;
        for item in items {
            let start = get_start(&item);
            let end = get_end(&item);
            for index in [start, end] {
                if index >= num_vertices {
                    return Err(TriangulationError::VertexIndexOutOfRange {
                        index,
                        num_vertices,
                    });
                }
            }
            self.insert_edge(Edge::new(
                start + self.n_target_verts,
                end + self.n_target_verts,
            ))?;
        }
        self.store.erase_dummies();
        Ok(())
    }

    /// Installs caller-built super-geometry (e.g. a grid) instead of the
    /// super-triangle.
    ///
    /// Vertex fans are derived from the triangles; the triangles must
    /// already satisfy the adjacency invariants (CCW orientation, mutual
    /// neighbor links) — [`Triangulation::is_valid`] verifies them.
    /// Constraint indices passed to [`Triangulation::insert_edges`] later
    /// are offset past these vertices.
    ///
    /// # Errors
    ///
    /// - [`TriangulationError::SuperGeometryAlreadyInitialized`] if any
    ///   vertices exist already;
    /// - [`TriangulationError::NonFiniteVertex`] /
    ///   [`TriangulationError::VertexIndexOutOfRange`] for invalid input.
    pub fn insert_custom_super_geometry(
        &mut self,
        vertices: &[Point2<T>],
        triangles: &[Triangle],
    ) -> Result<(), TriangulationError> {
        if !self.vertices.is_empty() {
            return Err(TriangulationError::SuperGeometryAlreadyInitialized);
        }
        if let Some(index) = vertices.iter().position(|p| !p.is_finite()) {
            return Err(TriangulationError::NonFiniteVertex { index });
        }
        for t in triangles {
            for &v in &t.vertices {
                if v >= vertices.len() {
                    return Err(TriangulationError::VertexIndexOutOfRange {
                        index: v,
                        num_vertices: vertices.len(),
                    });
                }
            }
        }

        self.vertices.extend_from_slice(vertices);
        for _ in 0..vertices.len() {
            self.store.add_vertex();
        }
        for t in triangles {
            let i_t = self.store.add_triangle(*t);
            for &v in &t.vertices {
                self.store.add_adjacent_triangle(v, i_t);
            }
        }
        for (i, p) in vertices.iter().enumerate() {
            self.locator.add_point(*p, i);
        }
        self.n_target_verts = self.vertices.len();
        self.super_geometry = SuperGeometry::Custom;
        Ok(())
    }

    // =========================================================================
    // TRIMMING
    // =========================================================================

    /// Erases the super-triangle vertices and all triangles touching them.
    ///
    /// Does nothing with custom super-geometry, and nothing on repeated
    /// calls. Afterwards vertex indices are the caller's own (shifted down
    /// past the super-triangle), and held triangle indices are invalid.
    pub fn erase_super_triangle(&mut self) {
        if self.trimmed
            || self.vertices.is_empty()
            || self.super_geometry != SuperGeometry::SuperTriangle
        {
            return;
        }
        let to_erase: Vec<TriInd> = (0..self.store.num_triangles())
            .filter(|&i| {
                self.store
                    .triangle(i)
                    .vertices
                    .iter()
                    .any(|&v| v < N_SUPER_VERTICES)
            })
            .collect();
        self.erase_triangles(to_erase);
        self.erase_super_triangle_vertices();
        self.trimmed = true;
    }

    /// Erases all triangles outside the constrained boundary, growing from
    /// the super-geometry and never crossing a fixed edge.
    ///
    /// No-op on repeated calls.
    pub fn erase_outer_triangles(&mut self) {
        if self.trimmed || self.vertices.is_empty() {
            return;
        }
        let Some(&seed) = self.store.fan(0).first() else {
            return;
        };
        let to_erase: Vec<TriInd> = self.grow_to_boundary(vec![seed]).into_iter().collect();
        self.erase_triangles(to_erase);
        self.erase_super_triangle_vertices();
        self.trimmed = true;
    }

    /// Erases triangles outside the constrained boundary and inside
    /// auto-detected holes.
    ///
    /// Hole detection relies on layer-depth peeling and supports
    /// overlapping or touching boundaries: triangles at even depth (outside
    /// material, or inside an even-nested hole) are removed. No-op on
    /// repeated calls.
    pub fn erase_outer_triangles_and_holes(&mut self) {
        if self.trimmed || self.vertices.is_empty() {
            return;
        }
        let Some(&seed) = self.store.fan(0).first() else {
            return;
        };
        let depths = if self.overlap_count.is_empty() {
            calculate_triangle_depths(seed, self.store.triangles(), &self.fixed_edges)
        } else {
            calculate_triangle_depths_with_overlaps(
                seed,
                self.store.triangles(),
                &self.fixed_edges,
                &self.overlap_count,
            )
        };
        let to_erase: Vec<TriInd> = (0..self.store.num_triangles())
            .filter(|&i| depths[i] % 2 == 0)
            .collect();
        self.erase_triangles(to_erase);
        self.erase_super_triangle_vertices();
        self.trimmed = true;
    }

    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Checks the structural invariants: CCW orientation, neighbor
    /// symmetry, fan membership, and fixed-edge presence.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn is_valid(&self) -> Result<(), TriangulationValidationError> {
        let triangles = self.store.triangles();
        for (i, t) in triangles.iter().enumerate() {
            let [a, b, c] = t.vertices.map(|v| self.vertices[v]);
            if orient2d(a, b, c) < T::zero() {
                return Err(TriangulationValidationError::NotCounterClockwise { tri: i });
            }
            for slot in 0..3u8 {
                let n = t.neighbors[slot as usize];
                if n == NO_NEIGHBOR {
                    continue;
                }
                let t_n = &triangles[n];
                let Some(back) = t_n.neighbors.iter().position(|&x| x == i) else {
                    return Err(TriangulationValidationError::NeighborAsymmetry {
                        tri: i,
                        neighbor: n,
                    });
                };
                let (va, vb) = t.edge_opposite(slot);
                if t_n.edge_opposite(back as u8) != (vb, va) {
                    return Err(TriangulationValidationError::NeighborAsymmetry {
                        tri: i,
                        neighbor: n,
                    });
                }
            }
            for &v in &t.vertices {
                if !self.store.fan(v).contains(&i) {
                    return Err(TriangulationValidationError::FanMissingTriangle {
                        vertex: v,
                        tri: i,
                    });
                }
            }
        }
        for (v, fan) in self.store.vert_tris().iter().enumerate() {
            for &i in fan {
                if !triangles[i].contains_vertex(v) {
                    return Err(TriangulationValidationError::FanStaleTriangle {
                        vertex: v,
                        tri: i,
                    });
                }
            }
        }
        for &edge in &self.fixed_edges {
            let (a, b) = edge.endpoints();
            let present = self
                .store
                .fan(a)
                .iter()
                .any(|&i| triangles[i].contains_vertex(b));
            if !present {
                return Err(TriangulationValidationError::FixedEdgeMissing { edge });
            }
        }
        Ok(())
    }

    /// Checks the Delaunay property: across every non-fixed interior edge,
    /// the opposite vertex is not strictly inside the circumcircle.
    ///
    /// A tolerance commensurate with the coordinate magnitude absorbs
    /// floating-point noise on near-cocircular configurations. Edges
    /// touching super-triangle vertices are skipped (their flips follow
    /// point-at-infinity semantics, not the in-circle test).
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn is_delaunay(&self) -> Result<(), TriangulationValidationError> {
        let triangles = self.store.triangles();
        let super_active =
            self.super_geometry == SuperGeometry::SuperTriangle && !self.trimmed;
        for (i, t) in triangles.iter().enumerate() {
            for slot in 0..3u8 {
                let n = t.neighbors[slot as usize];
                if n == NO_NEIGHBOR || n < i {
                    continue;
                }
                let (va, vb) = t.edge_opposite(slot);
                if self.fixed_edges.contains(&Edge::new(va, vb)) {
                    continue;
                }
                let v_opp = triangles[n].opposed_vertex(i);
                if super_active
                    && t.vertices
                        .iter()
                        .chain(std::iter::once(&v_opp))
                        .any(|&v| v < N_SUPER_VERTICES)
                {
                    continue;
                }
                let [a, b, c] = t.vertices.map(|v| self.vertices[v]);
                let p = self.vertices[v_opp];
                let magnitude = [a, b, c, p]
                    .iter()
                    .fold(T::one(), |m, q| m.max(q.x.abs()).max(q.y.abs()));
                let tolerance =
                    T::epsilon() * magnitude.powi(4) * cast(64.0).unwrap_or_else(T::one);
                if circumcircle_det(p, a, b, c) > tolerance {
                    return Err(TriangulationValidationError::DelaunayViolation {
                        tri: i,
                        vertex: v_opp,
                    });
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // SUPER-GEOMETRY
    // =========================================================================

    /// Builds the super-triangle strictly enclosing the inflated bounding
    /// box of the first vertex batch. Its three vertices take indices 0..2.
    fn add_super_triangle(&mut self, envelope: &Box2<T>) {
        let two = T::one() + T::one();
        let three = two + T::one();
        let center = envelope.center();
        let w = envelope.width();
        let h = envelope.height();
        let mut r = (w * w + h * h).sqrt() / two;
        r = r * cast(1.1).unwrap_or_else(T::one);
        if r == T::zero() {
            r = T::one();
        }
        let big_r = two * r;
        let shift_x = big_r * (three.sqrt() / two);
        let positions = [
            Point2::new(center.x - shift_x, center.y - r),
            Point2::new(center.x + shift_x, center.y - r),
            Point2::new(center.x, center.y + big_r),
        ];

        self.n_target_verts = N_SUPER_VERTICES;
        self.super_geometry = SuperGeometry::SuperTriangle;
        for (i, &pos) in positions.iter().enumerate() {
            self.vertices.push(pos);
            let mut fan = TriFan::new();
            fan.push(0);
            self.store.add_vertex_with_fan(fan);
            self.locator.add_point(pos, i);
        }
        self.store
            .add_triangle(Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3]));
    }

    fn add_new_vertex(&mut self, pos: Point2<T>) {
        self.vertices.push(pos);
        self.store.add_vertex();
    }

    // =========================================================================
    // POINT LOCATION
    // =========================================================================

    /// Walks from a triangle incident to `start_vertex` toward `pos`,
    /// stepping across any edge whose far side contains the query point.
    fn walk_triangles(
        &mut self,
        start_vertex: VertInd,
        pos: Point2<T>,
    ) -> Result<TriInd, TriangulationError> {
        let Some(&start) = self.store.fan(start_vertex).first() else {
            return Err(TriangulationError::EmptyTriangulation);
        };
        let max_steps = 4 * self.store.num_triangles() + 16;
        let mut i_t = start;
        for _ in 0..max_steps {
            let t = *self.store.triangle(i_t);
            let mut moved = false;
            // Randomize which edge is tested first so that walks do not
            // degenerate on structured input.
            let offset: u8 = self.rng.random_range(0..3);
            for k in 0..3u8 {
                let slot = (k + offset) % 3;
                let (va, vb) = t.edge_opposite(slot);
                let i_n = t.neighbors[slot as usize];
                if i_n != NO_NEIGHBOR
                    && locate_point_line(pos, self.vertices[va], self.vertices[vb])
                        == PtLineLocation::Right
                {
                    i_t = i_n;
                    moved = true;
                    break;
                }
            }
            if !moved {
                return Ok(i_t);
            }
        }
        Err(TriangulationError::PointLocationFailed)
    }

    /// Locates `pos`: one containing triangle, or two triangles when `pos`
    /// lies on their shared edge (second slot is [`NO_NEIGHBOR`] in the
    /// in-triangle case).
    fn triangles_at(&mut self, pos: Point2<T>) -> Result<(TriInd, TriInd), TriangulationError> {
        let start_vertex = self.locator.near_point(&pos).unwrap_or(0);
        let i_t = self.walk_triangles(start_vertex, pos)?;
        let t = *self.store.triangle(i_t);
        let [a, b, c] = t.vertices.map(|v| self.vertices[v]);
        match locate_point_triangle(pos, a, b, c) {
            PtTriLocation::Outside(_) => Err(TriangulationError::PointLocationFailed),
            PtTriLocation::OnVertex(slot) => Err(TriangulationError::DuplicateVertex {
                index: t.vertices[slot as usize],
            }),
            PtTriLocation::OnEdge(slot) => {
                let i_n = t.neighbors[slot as usize];
                if i_n == NO_NEIGHBOR {
                    return Err(TriangulationError::PointLocationFailed);
                }
                Ok((i_t, i_n))
            }
            PtTriLocation::Inside => Ok((i_t, NO_NEIGHBOR)),
        }
    }

    // =========================================================================
    // INCREMENTAL INSERTION
    // =========================================================================

    fn insert_vertex(&mut self, i_vert: VertInd) -> Result<(), TriangulationError> {
        let pos = self.vertices[i_vert];
        let (i_t1, i_t2) = self.triangles_at(pos)?;
        let mut flip_stack = if i_t2 == NO_NEIGHBOR {
            self.insert_point_in_triangle(i_vert, i_t1)
        } else {
            self.insert_point_on_edge(i_vert, i_t1, i_t2)
        };

        // Lawson cascade: every stacked triangle contains the new vertex.
        while let Some(i_t) = flip_stack.pop() {
            let t = *self.store.triangle(i_t);
            let slot = t.vertex_slot(i_vert);
            let i_t_opp = t.neighbors[slot as usize];
            if i_t_opp == NO_NEIGHBOR {
                continue;
            }
            let (va, vb) = t.edge_opposite(slot);
            if self.fixed_edges.contains(&Edge::new(va, vb)) {
                continue;
            }
            if self.is_flip_needed(pos, i_t, i_t_opp, i_vert) {
                self.flip_edge(i_t, i_t_opp);
                flip_stack.push(i_t);
                flip_stack.push(i_t_opp);
            }
        }

        self.locator.add_point(pos, i_vert);
        Ok(())
    }

    /// Splits triangle `i_t` into three triangles joined at the interior
    /// vertex `v`; returns the new triangles for the flip stack.
    ///
    /// ```text
    ///              v3
    ///             / | \
    ///            /  |  \
    ///       n2  / new2  \  n1
    ///          /    |    \
    ///         /     v     \
    ///        /    /   \    \
    ///       /  /  (i_t)  \  \
    ///      v1 ------------- v2
    ///              n3
    /// ```
    fn insert_point_in_triangle(&mut self, v: VertInd, i_t: TriInd) -> Vec<TriInd> {
        let t = *self.store.triangle(i_t);
        let [v1, v2, v3] = t.vertices;
        let [n1, n2, n3] = t.neighbors;

        let i_new1 = self
            .store
            .add_triangle(Triangle::new([v, v2, v3], [n1, NO_NEIGHBOR, i_t]));
        let i_new2 = self
            .store
            .add_triangle(Triangle::new([v, v3, v1], [n2, i_t, i_new1]));
        self.store.triangle_mut(i_new1).neighbors[1] = i_new2;
        *self.store.triangle_mut(i_t) = Triangle::new([v, v1, v2], [n3, i_new1, i_new2]);

        if n1 != NO_NEIGHBOR {
            self.store.change_neighbor(n1, i_t, i_new1);
        }
        if n2 != NO_NEIGHBOR {
            self.store.change_neighbor(n2, i_t, i_new2);
        }

        for i in [i_t, i_new1, i_new2] {
            self.store.add_adjacent_triangle(v, i);
        }
        self.store.add_adjacent_triangle(v1, i_new2);
        self.store.add_adjacent_triangle(v2, i_new1);
        self.store.remove_adjacent_triangle(v3, i_t);
        self.store.add_adjacent_triangle(v3, i_new1);
        self.store.add_adjacent_triangle(v3, i_new2);

        vec![i_t, i_new1, i_new2]
    }

    /// Splits the two triangles sharing the edge `v` lies on into four
    /// triangles joined at `v`; returns them for the flip stack.
    ///
    /// ```text
    ///                   a
    ///                 / | \
    ///        n_a_v2  /  |  \  n_a_v1
    ///               /   |   \
    ///             v1 -- v -- v2
    ///               \   |   /
    ///        n_b_v2  \  |  /  n_b_v1
    ///                 \ | /
    ///                   b
    /// ```
    fn insert_point_on_edge(&mut self, v: VertInd, i_t1: TriInd, i_t2: TriInd) -> Vec<TriInd> {
        let t1 = *self.store.triangle(i_t1);
        let t2 = *self.store.triangle(i_t2);
        let s1 = t1.neighbor_slot(i_t2);
        let a = t1.vertices[s1 as usize];
        let v1 = t1.vertices[ccw(s1) as usize];
        let v2 = t1.vertices[cw(s1) as usize];
        let s2 = t2.neighbor_slot(i_t1);
        let b = t2.vertices[s2 as usize];
        debug_assert_eq!(t2.vertices[ccw(s2) as usize], v2);
        debug_assert_eq!(t2.vertices[cw(s2) as usize], v1);

        let n_a_v1 = t1.neighbors[ccw(s1) as usize]; // across (v2, a)
        let n_a_v2 = t1.neighbors[cw(s1) as usize]; // across (a, v1)
        let n_b_v2 = t2.neighbors[ccw(s2) as usize]; // across (v1, b)
        let n_b_v1 = t2.neighbors[cw(s2) as usize]; // across (b, v2)

        // (v, a, v1) reuses i_t1; (v, b, v2) reuses i_t2.
        let i_tb = self
            .store
            .add_triangle(Triangle::new([v, v1, b], [n_b_v2, i_t2, i_t1]));
        let i_td = self
            .store
            .add_triangle(Triangle::new([v, v2, a], [n_a_v1, i_t1, i_t2]));
        *self.store.triangle_mut(i_t1) = Triangle::new([v, a, v1], [n_a_v2, i_tb, i_td]);
        *self.store.triangle_mut(i_t2) = Triangle::new([v, b, v2], [n_b_v1, i_td, i_tb]);

        if n_a_v1 != NO_NEIGHBOR {
            self.store.change_neighbor(n_a_v1, i_t1, i_td);
        }
        if n_b_v2 != NO_NEIGHBOR {
            self.store.change_neighbor(n_b_v2, i_t2, i_tb);
        }

        for i in [i_t1, i_tb, i_t2, i_td] {
            self.store.add_adjacent_triangle(v, i);
        }
        self.store.add_adjacent_triangle(a, i_td);
        self.store.remove_adjacent_triangle(v1, i_t2);
        self.store.add_adjacent_triangle(v1, i_tb);
        self.store.add_adjacent_triangle(b, i_tb);
        self.store.remove_adjacent_triangle(v2, i_t1);
        self.store.add_adjacent_triangle(v2, i_td);

        vec![i_t1, i_tb, i_t2, i_td]
    }

    /// Decides whether the edge shared by `i_t` (containing the freshly
    /// inserted vertex at `pos`) and `i_t_opp` must be flipped.
    ///
    /// Super-triangle vertices are not infinitely far away, so the plain
    /// in-circle test is wrong near them. Three cases:
    ///
    /// 1. an endpoint of the flip-candidate diagonal (the inserted vertex
    ///    or the opposed vertex) is artificial: no flip;
    /// 2. a shared-edge endpoint is artificial: flip iff the opposed vertex
    ///    and the artificial vertex lie on the same side of the line
    ///    through the two real diagonal endpoints;
    /// 3. no artificial vertices: the in-circle test.
    ///
    /// Additionally a flip that would produce a non-CCW triangle is
    /// refused and counted; see
    /// [`Triangulation::rejected_degenerate_flips`].
    fn is_flip_needed(
        &mut self,
        pos: Point2<T>,
        i_t: TriInd,
        i_t_opp: TriInd,
        i_vert: VertInd,
    ) -> bool {
        let t_opp = *self.store.triangle(i_t_opp);
        let slot = t_opp.neighbor_slot(i_t);
        let i_v_opp = t_opp.vertices[slot as usize];
        let i_e1 = t_opp.vertices[ccw(slot) as usize];
        let i_e2 = t_opp.vertices[cw(slot) as usize];
        let v_opp = self.vertices[i_v_opp];
        let e1 = self.vertices[i_e1];
        let e2 = self.vertices[i_e2];

        let super_active = self.super_geometry == SuperGeometry::SuperTriangle;
        let flip = if super_active
            && (i_vert < N_SUPER_VERTICES
                || i_v_opp < N_SUPER_VERTICES
                || i_e1 < N_SUPER_VERTICES
                || i_e2 < N_SUPER_VERTICES)
        {
            if i_vert < N_SUPER_VERTICES || i_v_opp < N_SUPER_VERTICES {
                false
            } else if i_e1 < N_SUPER_VERTICES && i_e2 < N_SUPER_VERTICES {
                false
            } else if i_e1 < N_SUPER_VERTICES {
                locate_point_line(v_opp, pos, e2) == locate_point_line(e1, pos, e2)
            } else {
                locate_point_line(v_opp, pos, e1) == locate_point_line(e2, pos, e1)
            }
        } else {
            let [u0, u1, u2] = t_opp.vertices.map(|v| self.vertices[v]);
            is_in_circumcircle(pos, u0, u1, u2)
        };
        if !flip {
            return false;
        }

        // The replacement triangles are (pos, e2, v_opp) and
        // (pos, v_opp, e1); refuse the flip if either degenerates.
        if orient2d(pos, e2, v_opp) <= T::zero() || orient2d(pos, v_opp, e1) <= T::zero() {
            self.rejected_degenerate_flips += 1;
            return false;
        }
        true
    }

    /// Flips the edge shared by `i_t` and `i_t_opp`, replacing both with
    /// the two triangles on the opposite diagonal.
    ///
    /// ```text
    ///          q                  q
    ///        / | \              /   \
    ///   n2  /  |  \  n4    n2  / t'  \  n4
    ///      /   |   \          /       \
    ///     a  t | t_o b  ==>  a ------- b
    ///      \   |   /          \       /
    ///   n3  \  |  /  n1    n3  \ t_o' /  n1
    ///        \ | /              \   /
    ///          p                  p
    /// ```
    fn flip_edge(&mut self, i_t: TriInd, i_t_opp: TriInd) {
        let t = *self.store.triangle(i_t);
        let t_opp = *self.store.triangle(i_t_opp);
        let sp = t.neighbor_slot(i_t_opp);
        let p = t.vertices[sp as usize];
        let a = t.vertices[ccw(sp) as usize];
        let b = t.vertices[cw(sp) as usize];
        let n1 = t.neighbors[ccw(sp) as usize]; // across (b, p)
        let n3 = t.neighbors[cw(sp) as usize]; // across (p, a)
        let sq = t_opp.neighbor_slot(i_t);
        let q = t_opp.vertices[sq as usize];
        debug_assert_eq!(t_opp.vertices[ccw(sq) as usize], b);
        debug_assert_eq!(t_opp.vertices[cw(sq) as usize], a);
        let n2 = t_opp.neighbors[ccw(sq) as usize]; // across (a, q)
        let n4 = t_opp.neighbors[cw(sq) as usize]; // across (q, b)

        *self.store.triangle_mut(i_t) = Triangle::new([p, a, q], [n2, i_t_opp, n3]);
        *self.store.triangle_mut(i_t_opp) = Triangle::new([p, q, b], [n4, n1, i_t]);

        if n1 != NO_NEIGHBOR {
            self.store.change_neighbor(n1, i_t, i_t_opp);
        }
        if n2 != NO_NEIGHBOR {
            self.store.change_neighbor(n2, i_t_opp, i_t);
        }

        self.store.remove_adjacent_triangle(a, i_t_opp);
        self.store.remove_adjacent_triangle(b, i_t);
        self.store.add_adjacent_triangle(p, i_t_opp);
        self.store.add_adjacent_triangle(q, i_t);
    }

    // =========================================================================
    // CONSTRAINT INSERTION
    // =========================================================================

    fn vertices_share_edge(&self, i_a: VertInd, i_b: VertInd) -> bool {
        self.store
            .fan(i_a)
            .iter()
            .any(|&i_t| self.store.triangle(i_t).contains_vertex(i_b))
    }

    /// Inserts one constraint, splitting it at every existing vertex the
    /// segment passes through.
    fn insert_edge(&mut self, edge: Edge) -> Result<(), TriangulationError> {
        let mut i_a = edge.v1();
        let i_b = edge.v2();
        loop {
            match self.insert_edge_segment(i_a, i_b)? {
                None => return Ok(()),
                Some(split_vertex) => i_a = split_vertex,
            }
        }
    }

    /// Enforces the sub-constraint from `i_a` toward `i_b`.
    ///
    /// Returns `Some(v)` when the segment hit an existing vertex `v`
    /// en route; the caller continues from there.
    fn insert_edge_segment(
        &mut self,
        i_a: VertInd,
        i_b: VertInd,
    ) -> Result<Option<VertInd>, TriangulationError> {
        if i_a == i_b {
            return Ok(None);
        }
        if self.vertices_share_edge(i_a, i_b) {
            self.fix_edge(Edge::new(i_a, i_b));
            return Ok(None);
        }

        let a = self.vertices[i_a];
        let b = self.vertices[i_b];
        let (i_t0, first_left, first_right) = self.intersected_triangle(i_a, a, b, i_b)?;
        if i_t0 == NO_NEIGHBOR {
            // The constraint passes through vertex `first_left`.
            self.fix_edge(Edge::new(i_a, first_left));
            return Ok(Some(first_left));
        }

        // Walk the corridor of triangles crossed by the segment,
        // collecting the polygon chains on both sides.
        let mut i_b_cur = i_b;
        let mut intersected = vec![i_t0];
        let mut pts_left = vec![first_left];
        let mut pts_right = vec![first_right];
        let mut iv_left = first_left;
        let mut iv_right = first_right;
        let mut i_v = i_a;
        let mut i_t = i_t0;
        let mut t = *self.store.triangle(i_t0);

        while !t.contains_vertex(i_b_cur) {
            let crossed = Edge::new(iv_left, iv_right);
            if self.fixed_edges.contains(&crossed) {
                return Err(TriangulationError::ConstraintsIntersect {
                    edge: Edge::new(i_a, i_b_cur),
                    fixed: crossed,
                });
            }
            let i_t_opp = t.opposed_neighbor(i_v);
            if i_t_opp == NO_NEIGHBOR {
                return Err(TriangulationError::ConstraintWalkFailed { a: i_a, b: i_b_cur });
            }
            let t_opp = *self.store.triangle(i_t_opp);
            let i_v_opp = t_opp.opposed_vertex(i_t);
            match locate_point_line(self.vertices[i_v_opp], a, b) {
                PtLineLocation::Left => {
                    pts_left.push(i_v_opp);
                    i_v = iv_left;
                    iv_left = i_v_opp;
                }
                PtLineLocation::Right => {
                    pts_right.push(i_v_opp);
                    i_v = iv_right;
                    iv_right = i_v_opp;
                }
                // The segment passes exactly through a vertex: truncate
                // this pass there and continue from it afterwards.
                PtLineLocation::OnLine => i_b_cur = i_v_opp,
            }
            intersected.push(i_t_opp);
            i_t = i_t_opp;
            t = t_opp;
        }

        for &i in &intersected {
            self.store.make_dummy(i);
        }

        // Re-triangulate the two pseudo-polygons and stitch them across
        // the new fixed edge.
        let i_left_root = self.triangulate_pseudopolygon(i_a, i_b_cur, &pts_left);
        pts_right.reverse();
        let i_right_root = self.triangulate_pseudopolygon(i_b_cur, i_a, &pts_right);
        self.store.triangle_mut(i_left_root).neighbors[2] = i_right_root;
        self.store.triangle_mut(i_right_root).neighbors[2] = i_left_root;

        self.fix_edge(Edge::new(i_a, i_b_cur));
        Ok((i_b_cur != i_b).then_some(i_b_cur))
    }

    /// Finds, among the triangles of `i_a`'s fan, the one whose opposite
    /// edge is crossed by segment `a -> b`.
    ///
    /// Returns `(triangle, left_vertex, right_vertex)` for a proper
    /// crossing, or `(NO_NEIGHBOR, v, v)` when the segment passes exactly
    /// through fan vertex `v`.
    fn intersected_triangle(
        &self,
        i_a: VertInd,
        a: Point2<T>,
        b: Point2<T>,
        i_b: VertInd,
    ) -> Result<(TriInd, VertInd, VertInd), TriangulationError> {
        for &i_t in self.store.fan(i_a) {
            let t = self.store.triangle(i_t);
            let slot = t.vertex_slot(i_a);
            // In CCW order the fan vertex following `i_a` lies to the
            // right of a segment leaving `i_a` through the triangle.
            let i_right = t.vertices[ccw(slot) as usize];
            let i_left = t.vertices[cw(slot) as usize];
            let loc_right = locate_point_line(self.vertices[i_right], a, b);
            if loc_right != PtLineLocation::Right {
                continue;
            }
            match locate_point_line(self.vertices[i_left], a, b) {
                PtLineLocation::Left => return Ok((i_t, i_left, i_right)),
                PtLineLocation::OnLine => {
                    // Collinear fan vertex counts only when it lies ahead
                    // of `a` on the segment's direction.
                    let p = self.vertices[i_left];
                    let ahead =
                        (b.x - a.x) * (p.x - a.x) + (b.y - a.y) * (p.y - a.y) > T::zero();
                    if ahead {
                        return Ok((NO_NEIGHBOR, i_left, i_left));
                    }
                }
                PtLineLocation::Right => {}
            }
        }
        Err(TriangulationError::ConstraintWalkFailed { a: i_a, b: i_b })
    }

    /// Marks an edge as fixed; repeated fixing records a boundary overlap.
    fn fix_edge(&mut self, edge: Edge) {
        if !self.fixed_edges.insert(edge) {
            *self.overlap_count.entry(edge).or_insert(0) += 1;
        }
    }

    /// Re-triangulates one pseudo-polygon: endpoints `i_a`, `i_b` and the
    /// ordered chain `points` on one side of the removed corridor.
    ///
    /// Processes sub-polygons children-before-parent with an explicit
    /// stack (chains can be long and the recursion would be as deep).
    /// Emitted triangles are `(a, b, c)` with `c` the chain point whose
    /// circumcircle with `(a, b)` contains no other chain point; slot 2
    /// (across the edge `(a, b)`) is left for the caller or parent to
    /// link. Returns the root triangle adjacent to `(i_a, i_b)`.
    fn triangulate_pseudopolygon(
        &mut self,
        i_a: VertInd,
        i_b: VertInd,
        points: &[VertInd],
    ) -> TriInd {
        debug_assert!(!points.is_empty(), "corridor sides are never empty");

        enum Frame {
            Build {
                a: VertInd,
                b: VertInd,
                lo: usize,
                hi: usize,
            },
            Emit {
                a: VertInd,
                b: VertInd,
                c_pos: usize,
            },
        }
        enum Child {
            New(TriInd),
            Border(TriInd),
        }

        let mut frames = vec![Frame::Build {
            a: i_a,
            b: i_b,
            lo: 0,
            hi: points.len(),
        }];
        let mut results: Vec<Child> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Build { a, b, lo, hi } => {
                    if lo == hi {
                        results.push(Child::Border(self.pseudopoly_outer_triangle(a, b)));
                        continue;
                    }
                    let c_pos = self.find_delaunay_point(a, b, points, lo, hi);
                    let c = points[c_pos];
                    frames.push(Frame::Emit { a, b, c_pos });
                    frames.push(Frame::Build {
                        a: c,
                        b,
                        lo: c_pos + 1,
                        hi,
                    });
                    frames.push(Frame::Build {
                        a,
                        b: c,
                        lo,
                        hi: c_pos,
                    });
                }
                Frame::Emit { a, b, c_pos } => {
                    let c = points[c_pos];
                    let (Some(right), Some(left)) = (results.pop(), results.pop()) else {
                        unreachable!("children are emitted before their parent");
                    };
                    let i_t = self
                        .store
                        .add_triangle(Triangle::new([a, b, c], [NO_NEIGHBOR; 3]));
                    match right {
                        Child::New(i_r) => {
                            self.store.triangle_mut(i_t).neighbors[0] = i_r;
                            self.store.triangle_mut(i_r).neighbors[2] = i_t;
                        }
                        Child::Border(i_o) => {
                            if i_o != NO_NEIGHBOR {
                                self.store.triangle_mut(i_t).neighbors[0] = i_o;
                                self.store.change_neighbor_across_edge(i_o, c, b, i_t);
                            }
                        }
                    }
                    match left {
                        Child::New(i_l) => {
                            self.store.triangle_mut(i_t).neighbors[1] = i_l;
                            self.store.triangle_mut(i_l).neighbors[2] = i_t;
                        }
                        Child::Border(i_o) => {
                            if i_o != NO_NEIGHBOR {
                                self.store.triangle_mut(i_t).neighbors[1] = i_o;
                                self.store.change_neighbor_across_edge(i_o, a, c, i_t);
                            }
                        }
                    }
                    self.store.add_adjacent_triangle(a, i_t);
                    self.store.add_adjacent_triangle(b, i_t);
                    self.store.add_adjacent_triangle(c, i_t);
                    results.push(Child::New(i_t));
                }
            }
        }

        match results.pop() {
            Some(Child::New(root)) => root,
            _ => unreachable!("top-level chain is non-empty"),
        }
    }

    /// The chain point whose circumcircle with `(i_a, i_b)` contains no
    /// other point of the chain.
    fn find_delaunay_point(
        &self,
        i_a: VertInd,
        i_b: VertInd,
        points: &[VertInd],
        lo: usize,
        hi: usize,
    ) -> usize {
        let a = self.vertices[i_a];
        let b = self.vertices[i_b];
        let mut best = lo;
        let mut c = self.vertices[points[lo]];
        for pos in lo + 1..hi {
            let p = self.vertices[points[pos]];
            if is_in_circumcircle(p, a, b, c) {
                best = pos;
                c = p;
            }
        }
        best
    }

    /// The live triangle containing edge `(i_a, i_b)`, i.e. the border
    /// triangle just outside the corridor across that edge.
    fn pseudopoly_outer_triangle(&self, i_a: VertInd, i_b: VertInd) -> TriInd {
        let fan_b = self.store.fan(i_b);
        for &i_t in self.store.fan(i_a) {
            if fan_b.contains(&i_t) {
                return i_t;
            }
        }
        NO_NEIGHBOR
    }

    // =========================================================================
    // TRIMMING MACHINERY
    // =========================================================================

    /// BFS over adjacency from `seeds`, never crossing a fixed edge.
    fn grow_to_boundary(&self, seeds: Vec<TriInd>) -> FastHashSet<TriInd> {
        let mut traversed = FastHashSet::default();
        let mut stack = seeds;
        while let Some(i_t) = stack.pop() {
            traversed.insert(i_t);
            let t = self.store.triangle(i_t);
            for slot in 0..3u8 {
                let (va, vb) = t.edge_opposite(slot);
                if self.fixed_edges.contains(&Edge::new(va, vb)) {
                    continue;
                }
                let i_n = t.neighbors[slot as usize];
                if i_n != NO_NEIGHBOR && !traversed.contains(&i_n) {
                    stack.push(i_n);
                }
            }
        }
        traversed
    }

    fn erase_triangles(&mut self, triangles: Vec<TriInd>) {
        for i in triangles {
            self.store.make_dummy(i);
        }
        self.store.erase_dummies();
    }

    /// Removes the three super-triangle vertices and shifts all vertex
    /// references (triangles, fixed edges, overlap counts) down past them.
    fn erase_super_triangle_vertices(&mut self) {
        if self.super_geometry != SuperGeometry::SuperTriangle {
            return;
        }
        self.store.erase_leading_vertices(N_SUPER_VERTICES);
        self.vertices.drain(0..N_SUPER_VERTICES);
        self.fixed_edges = self
            .fixed_edges
            .iter()
            .map(|e| Edge::new(e.v1() - N_SUPER_VERTICES, e.v2() - N_SUPER_VERTICES))
            .collect();
        self.overlap_count = self
            .overlap_count
            .iter()
            .map(|(e, &c)| {
                (
                    Edge::new(e.v1() - N_SUPER_VERTICES, e.v2() - N_SUPER_VERTICES),
                    c,
                )
            })
            .collect();
        self.n_target_verts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ]
    }

    #[test]
    fn empty_triangulation_has_no_geometry() {
        let cdt = Triangulation::<f64>::new();
        assert_eq!(cdt.num_vertices(), 0);
        assert_eq!(cdt.num_triangles(), 0);
        assert!(cdt.fixed_edges().is_empty());
        assert!(cdt.is_valid().is_ok());
    }

    #[test]
    fn first_batch_builds_super_triangle() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        // 3 super vertices + 4 user vertices; 1 + 2 * 4 triangles.
        assert_eq!(cdt.num_vertices(), 7);
        assert_eq!(cdt.num_triangles(), 9);
        assert!(cdt.is_valid().is_ok());
        assert!(cdt.is_delaunay().is_ok());
        assert_eq!(cdt.rejected_degenerate_flips(), 0);
    }

    #[test]
    fn super_triangle_encloses_the_input_box() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        let [s0, s1, s2] = [cdt.vertices()[0], cdt.vertices()[1], cdt.vertices()[2]];
        assert!(orient2d(s0, s1, s2) > 0.0);
        for p in &square() {
            assert_eq!(
                locate_point_triangle(*p, s0, s1, s2),
                PtTriLocation::Inside
            );
        }
    }

    #[test]
    fn insertion_is_incremental_across_batches() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        cdt.insert_vertices(&[Point2::new(0.5, 0.5)]).unwrap();
        assert_eq!(cdt.num_vertices(), 8);
        assert!(cdt.is_valid().is_ok());
        assert!(cdt.is_delaunay().is_ok());
    }

    #[test]
    fn as_provided_and_randomized_agree_on_the_square() {
        let mut provided = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        provided.insert_vertices(&square()).unwrap();
        provided.erase_super_triangle();

        let mut randomized = Triangulation::<f64>::with_order(VertexInsertionOrder::Randomized);
        randomized.insert_vertices(&square()).unwrap();
        randomized.erase_super_triangle();

        assert_eq!(provided.num_triangles(), 2);
        assert_eq!(randomized.num_triangles(), 2);
    }

    #[test]
    fn non_finite_vertex_is_rejected_before_mutation() {
        let mut cdt = Triangulation::<f64>::new();
        let result = cdt.insert_vertices(&[
            Point2::new(0.0, 0.0),
            Point2::new(f64::NAN, 1.0),
        ]);
        assert_eq!(result, Err(TriangulationError::NonFiniteVertex { index: 1 }));
        assert_eq!(cdt.num_vertices(), 0);
        assert_eq!(cdt.num_triangles(), 0);
    }

    #[test]
    fn coincident_vertex_is_detected() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        let result = cdt.insert_vertices(&[Point2::new(1.0, 1.0)]);
        // User vertex (1, 1) is internal vertex 5 (after 3 super vertices).
        assert_eq!(result, Err(TriangulationError::DuplicateVertex { index: 5 }));
    }

    #[test]
    fn point_on_existing_edge_splits_both_triangles() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        let triangles_before = cdt.num_triangles();
        // The square's diagonal produced by triangulating the four corners
        // passes through (0.5, 0.5) for either diagonal choice.
        cdt.insert_vertices(&[Point2::new(0.5, 0.5)]).unwrap();
        // On-edge insertion replaces 2 triangles with 4.
        assert_eq!(cdt.num_triangles(), triangles_before + 2);
        assert!(cdt.is_valid().is_ok());
        assert!(cdt.is_delaunay().is_ok());
    }

    #[test]
    fn constraints_before_vertices_are_rejected() {
        let mut cdt = Triangulation::<f64>::new();
        assert_eq!(
            cdt.insert_edges(&[Edge::new(0, 1)]),
            Err(TriangulationError::EmptyTriangulation)
        );
    }

    #[test]
    fn out_of_range_constraint_index_is_rejected() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        assert_eq!(
            cdt.insert_edges(&[Edge::new(0, 4)]),
            Err(TriangulationError::VertexIndexOutOfRange {
                index: 4,
                num_vertices: 4
            })
        );
    }

    #[test]
    fn existing_edge_constraint_is_fixed_in_place() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        let triangles_before = cdt.triangles().to_vec();
        cdt.insert_edges(&[Edge::new(0, 1)]).unwrap();
        // Boundary edge already present: no re-triangulation happens.
        assert_eq!(cdt.triangles(), &triangles_before[..]);
        assert!(cdt.fixed_edges().contains(&Edge::new(3, 4)));
        assert!(cdt.overlap_count().is_empty());
    }

    #[test]
    fn diagonal_constraint_is_enforced() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        cdt.insert_edges(&[Edge::new(0, 2)]).unwrap();
        assert!(cdt.is_valid().is_ok());
        // Internal indices are offset by the 3 super-triangle vertices.
        assert!(cdt.fixed_edges().contains(&Edge::new(3, 5)));
        let present = cdt
            .triangles()
            .iter()
            .any(|t| t.contains_vertex(3) && t.contains_vertex(5));
        assert!(present);
    }

    #[test]
    fn repeated_constraint_counts_overlaps() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        cdt.insert_edges(&[Edge::new(0, 2), Edge::new(2, 0), Edge::new(0, 2)])
            .unwrap();
        assert_eq!(cdt.overlap_count().get(&Edge::new(3, 5)), Some(&2));
    }

    #[test]
    fn crossing_constraints_are_reported() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        let result = cdt.insert_edges(&[Edge::new(0, 2), Edge::new(1, 3)]);
        assert!(matches!(
            result,
            Err(TriangulationError::ConstraintsIntersect { .. })
        ));
    }

    #[test]
    fn degenerate_constraint_is_ignored() {
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_vertices(&square()).unwrap();
        cdt.insert_edges(&[Edge::new(2, 2)]).unwrap();
        assert!(cdt.fixed_edges().is_empty());
    }

    #[test]
    fn erase_super_triangle_leaves_user_geometry() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        cdt.erase_super_triangle();
        assert_eq!(cdt.num_vertices(), 4);
        assert_eq!(cdt.num_triangles(), 2);
        assert!(cdt.is_valid().is_ok());
        assert!(cdt.is_delaunay().is_ok());
    }

    #[test]
    fn trimming_twice_is_a_noop() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        cdt.erase_super_triangle();
        let vertices = cdt.vertices().to_vec();
        let triangles = cdt.triangles().to_vec();
        cdt.erase_super_triangle();
        cdt.erase_outer_triangles();
        cdt.erase_outer_triangles_and_holes();
        assert_eq!(cdt.vertices(), &vertices[..]);
        assert_eq!(cdt.triangles(), &triangles[..]);
    }

    #[test]
    fn trimming_an_empty_triangulation_is_a_noop() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.erase_super_triangle();
        cdt.erase_outer_triangles();
        cdt.erase_outer_triangles_and_holes();
        assert_eq!(cdt.num_vertices(), 0);
    }

    #[test]
    fn custom_super_geometry_offsets_constraint_indices() {
        // Two CCW triangles forming a square embedding.
        let geometry_vertices = [
            Point2::new(-10.0, -10.0),
            Point2::new(10.0, -10.0),
            Point2::new(10.0, 10.0),
            Point2::new(-10.0, 10.0),
        ];
        let geometry_triangles = [
            Triangle::new([0, 1, 2], [NO_NEIGHBOR, 1, NO_NEIGHBOR]),
            Triangle::new([0, 2, 3], [NO_NEIGHBOR, NO_NEIGHBOR, 0]),
        ];
        let mut cdt = Triangulation::<f64>::with_order(VertexInsertionOrder::AsProvided);
        cdt.insert_custom_super_geometry(&geometry_vertices, &geometry_triangles)
            .unwrap();
        assert!(cdt.is_valid().is_ok());

        cdt.insert_vertices(&[
            Point2::new(0.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(1.0, 2.0),
        ])
        .unwrap();
        cdt.insert_edges(&[Edge::new(0, 1)]).unwrap();
        // User vertex 0 is internal vertex 4 (after the 4 geometry vertices).
        assert!(cdt.fixed_edges().contains(&Edge::new(4, 5)));
        assert!(cdt.is_valid().is_ok());
    }

    #[test]
    fn custom_super_geometry_requires_empty_triangulation() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&square()).unwrap();
        let result = cdt.insert_custom_super_geometry(
            &[Point2::new(0.0, 0.0)],
            &[],
        );
        assert_eq!(
            result,
            Err(TriangulationError::SuperGeometryAlreadyInitialized)
        );
    }

    #[test]
    fn erase_super_triangle_does_nothing_with_custom_geometry() {
        let geometry_vertices = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 1.0),
        ];
        let geometry_triangles = [Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3])];
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_custom_super_geometry(&geometry_vertices, &geometry_triangles)
            .unwrap();
        cdt.erase_super_triangle();
        assert_eq!(cdt.num_vertices(), 3);
        assert_eq!(cdt.num_triangles(), 1);
    }

    #[test]
    fn collinear_input_triangulates_and_trims_to_nothing() {
        let mut cdt = Triangulation::<f64>::new();
        cdt.insert_vertices(&[
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
            Point2::new(3.0, 0.0),
        ])
        .unwrap();
        assert!(cdt.is_valid().is_ok());
        cdt.erase_super_triangle();
        assert_eq!(cdt.num_triangles(), 0);
        assert_eq!(cdt.num_vertices(), 4);
    }

    #[test]
    fn f32_coordinates_are_supported() {
        let mut cdt = Triangulation::<f32>::new();
        cdt.insert_vertices(&[
            Point2::new(0.0_f32, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ])
        .unwrap();
        cdt.erase_super_triangle();
        assert_eq!(cdt.num_triangles(), 2);
        assert!(cdt.is_valid().is_ok());
    }
}

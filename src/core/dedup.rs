//! Input pre-processing: duplicate detection, edge remapping, and edge
//! extraction.
//!
//! The triangulation kernel requires unique vertex positions; feeding it
//! coincident points produces undefined adjacency. These helpers let
//! callers deduplicate arbitrary point inputs and rewrite their edge lists
//! accordingly before triangulating.
//!
//! Duplicates are points with exactly equal coordinates; comparison is
//! NaN-aware via `OrderedFloat`, so NaN coordinates compare equal to
//! themselves.

use crate::core::collections::{FastHashMap, FastHashSet};
use crate::core::edge::Edge;
use crate::core::triangle::{Triangle, VertInd};
use crate::geometry::point::{CoordinateScalar, Point2};
use num_traits::float::FloatCore;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Information about removed duplicate vertices.
///
/// For input vertices `{0, 1, 2, 3, 4}` where 0 and 3 coincide, the result
/// is `mapping = [0, 1, 2, 0, 3]` (into the deduplicated vertices
/// `{0, 1, 2, 3}`) and `duplicates = [3]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicatesInfo {
    /// Maps each input vertex index to its index after deduplication.
    pub mapping: Vec<VertInd>,
    /// Indices of the removed duplicates in the original input, ascending.
    pub duplicates: Vec<usize>,
}

/// Finds duplicates in a range of custom point-like items.
///
/// The first occurrence of each position wins; later occurrences are
/// recorded as duplicates and mapped to the first occurrence's output
/// index.
///
/// # Examples
///
/// ```
/// use cdt2d::core::dedup::find_duplicates;
///
/// let points = [(0.0, 0.0), (1.0, 1.0), (0.0, 0.0)];
/// let info = find_duplicates::<f64, _, _, _, _>(points.iter(), |p| p.0, |p| p.1);
/// assert_eq!(info.mapping, vec![0, 1, 0]);
/// assert_eq!(info.duplicates, vec![2]);
/// ```
#[must_use]
pub fn find_duplicates<T, I, P, Fx, Fy>(items: I, get_x: Fx, get_y: Fy) -> DuplicatesInfo
where
    T: CoordinateScalar + FloatCore,
    I: IntoIterator<Item = P>,
    Fx: Fn(&P) -> T,
    Fy: Fn(&P) -> T,
{
    let mut unique_verts: FastHashMap<(OrderedFloat<T>, OrderedFloat<T>), VertInd> =
        FastHashMap::default();
    let mut info = DuplicatesInfo::default();
    let mut i_out: VertInd = 0;
    for item in items {
        let key = (OrderedFloat(get_x(&item)), OrderedFloat(get_y(&item)));
        let i_in = info.mapping.len();
        match unique_verts.entry(key) {
            std::collections::hash_map::Entry::Vacant(entry) => {
                entry.insert(i_out);
                info.mapping.push(i_out);
                i_out += 1;
            }
            std::collections::hash_map::Entry::Occupied(entry) => {
                info.mapping.push(*entry.get());
                info.duplicates.push(i_in);
            }
        }
    }
    info
}

/// Removes the vertices at the given ascending `duplicates` indices
/// in-place, preserving the order of the survivors.
pub fn remove_duplicates<V>(vertices: &mut Vec<V>, duplicates: &[usize]) {
    let mut pending = duplicates.iter().peekable();
    let mut index = 0;
    vertices.retain(|_| {
        let drop = pending.peek() == Some(&&index);
        if drop {
            pending.next();
        }
        index += 1;
        !drop
    });
}

/// Rewrites edge endpoints in-place through a vertex-index mapping (as
/// produced by [`find_duplicates`]).
pub fn remap_edges(edges: &mut [Edge], mapping: &[VertInd]) {
    for edge in edges {
        *edge = Edge::new(mapping[edge.v1()], mapping[edge.v2()]);
    }
}

/// Finds duplicates, removes them from `vertices` and remaps `edges`, all
/// in-place.
///
/// Equivalent to chaining [`find_duplicates`], [`remove_duplicates`] and
/// [`remap_edges`].
///
/// # Examples
///
/// ```
/// use cdt2d::core::dedup::remove_duplicates_and_remap_edges;
/// use cdt2d::core::edge::Edge;
/// use cdt2d::geometry::point::Point2;
///
/// let mut vertices = vec![
///     Point2::new(0.0, 0.0),
///     Point2::new(1.0, 0.0),
///     Point2::new(0.0, 0.0), // duplicate of vertex 0
/// ];
/// let mut edges = vec![Edge::new(1, 2)];
/// let info = remove_duplicates_and_remap_edges(&mut vertices, &mut edges);
/// assert_eq!(vertices.len(), 2);
/// assert_eq!(edges, vec![Edge::new(0, 1)]);
/// assert_eq!(info.duplicates, vec![2]);
/// ```
pub fn remove_duplicates_and_remap_edges<T: CoordinateScalar + FloatCore>(
    vertices: &mut Vec<Point2<T>>,
    edges: &mut [Edge],
) -> DuplicatesInfo {
    let info = find_duplicates(vertices.iter(), |p| p.x, |p| p.y);
    remove_duplicates(vertices, &info.duplicates);
    remap_edges(edges, &info.mapping);
    info
}

/// Enumerates the unique undirected edges of a triangle array.
///
/// # Examples
///
/// ```
/// use cdt2d::core::dedup::extract_edges;
/// use cdt2d::core::edge::Edge;
/// use cdt2d::core::triangle::{Triangle, NO_NEIGHBOR};
///
/// let triangles = [
///     Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3]),
///     Triangle::new([2, 1, 3], [NO_NEIGHBOR; 3]),
/// ];
/// let edges = extract_edges(&triangles);
/// assert_eq!(edges.len(), 5); // 6 half-edges collapse onto 5 undirected edges
/// assert!(edges.contains(&Edge::new(1, 2)));
/// ```
#[must_use]
pub fn extract_edges(triangles: &[Triangle]) -> FastHashSet<Edge> {
    let mut edges = FastHashSet::default();
    for t in triangles {
        let [v0, v1, v2] = t.vertices;
        edges.insert(Edge::new(v0, v1));
        edges.insert(Edge::new(v1, v2));
        edges.insert(Edge::new(v2, v0));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_duplicates_first_occurrence_wins() {
        let points = [
            Point2::new(0.0_f64, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        let info = find_duplicates(points.iter(), |p| p.x, |p| p.y);
        assert_eq!(info.mapping, vec![0, 1, 0, 1, 2]);
        assert_eq!(info.duplicates, vec![2, 3]);
    }

    #[test]
    fn find_duplicates_treats_nan_as_equal_to_itself() {
        let points = [
            Point2::new(f64::NAN, 0.0),
            Point2::new(f64::NAN, 0.0),
            Point2::new(0.0, 0.0),
        ];
        let info = find_duplicates(points.iter(), |p| p.x, |p| p.y);
        assert_eq!(info.mapping, vec![0, 0, 1]);
        assert_eq!(info.duplicates, vec![1]);
    }

    #[test]
    fn remove_duplicates_preserves_survivor_order() {
        let mut values = vec!["a", "b", "c", "d", "e"];
        remove_duplicates(&mut values, &[1, 3]);
        assert_eq!(values, vec!["a", "c", "e"]);
    }

    #[test]
    fn remove_duplicates_with_no_duplicates_is_noop() {
        let mut values = vec![1, 2, 3];
        remove_duplicates(&mut values, &[]);
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn remap_edges_recanonicalizes() {
        let mut edges = vec![Edge::new(3, 4), Edge::new(0, 4)];
        // 3 -> 0, 4 -> 2: (3, 4) becomes (0, 2); (0, 4) becomes (0, 2) too.
        let mapping = vec![0, 1, 2, 0, 2];
        remap_edges(&mut edges, &mapping);
        assert_eq!(edges, vec![Edge::new(0, 2), Edge::new(0, 2)]);
    }

    #[test]
    fn chained_dedup_and_remap() {
        let mut vertices = vec![
            Point2::new(0.0_f64, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 0.0),
        ];
        let mut edges = vec![Edge::new(3, 2), Edge::new(0, 1)];
        let info = remove_duplicates_and_remap_edges(&mut vertices, &mut edges);
        assert_eq!(vertices.len(), 3);
        assert_eq!(info.mapping, vec![0, 1, 2, 0]);
        assert_eq!(edges, vec![Edge::new(0, 2), Edge::new(0, 1)]);
    }

    #[test]
    fn extract_edges_deduplicates_shared_edges() {
        use crate::core::triangle::NO_NEIGHBOR;
        let triangles = [
            Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3]),
            Triangle::new([2, 1, 3], [NO_NEIGHBOR; 3]),
        ];
        let edges = extract_edges(&triangles);
        let expected: FastHashSet<Edge> = [
            Edge::new(0, 1),
            Edge::new(1, 2),
            Edge::new(0, 2),
            Edge::new(1, 3),
            Edge::new(2, 3),
        ]
        .into_iter()
        .collect();
        assert_eq!(edges, expected);
    }
}

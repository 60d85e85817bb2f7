//! Nearest-vertex location for seeding triangle walks.
//!
//! The triangulation only needs a vertex *close* to a query position to
//! start its walking search; exactness is not required, but better answers
//! mean shorter walks. The [`NearPointLocator`] trait captures that
//! contract, and [`KdTreeLocator`] provides the default implementation: a
//! bucketed 2D kd-tree with median splits and an iterative branch-and-bound
//! nearest query.

use crate::core::collections::SmallBuffer;
use crate::core::triangle::VertInd;
use crate::geometry::point::{CoordinateScalar, Point2};

/// Capability to record vertices and answer near-point queries.
///
/// Implementations are notified of every vertex the triangulation inserts
/// (super-geometry vertices included) and must return the index of *some*
/// previously added vertex close to the query position. Returning the
/// exact nearest vertex is not required; monotonically improving quality
/// yields faster walks.
pub trait NearPointLocator<T: CoordinateScalar> {
    /// Records a new vertex at `pos` with index `i_vertex`.
    fn add_point(&mut self, pos: Point2<T>, i_vertex: VertInd);

    /// Returns a vertex close to `pos`, or `None` when no vertex has been
    /// added yet.
    fn near_point(&self, pos: &Point2<T>) -> Option<VertInd>;
}

/// Points per kd-tree leaf before it splits.
const LEAF_CAPACITY: usize = 32;

#[derive(Clone, Debug)]
enum Node<T> {
    Leaf {
        bucket: SmallBuffer<(Point2<T>, VertInd), LEAF_CAPACITY>,
    },
    Split {
        /// 0 = split on x, 1 = split on y.
        axis: u8,
        value: T,
        /// Children: `[below, at-or-above]` the split value.
        children: [usize; 2],
    },
}

/// Default nearest-vertex locator: a bucketed 2D kd-tree.
///
/// Leaves hold up to 32 points; a full leaf splits at the
/// median coordinate of its wider axis. The nearest query prunes subtrees
/// whose splitting plane is farther than the best candidate found so far,
/// and returns the exact nearest vertex.
///
/// # Examples
///
/// ```
/// use cdt2d::geometry::point::Point2;
/// use cdt2d::locator::{KdTreeLocator, NearPointLocator};
///
/// let mut locator = KdTreeLocator::default();
/// assert_eq!(locator.near_point(&Point2::new(0.0, 0.0)), None);
///
/// locator.add_point(Point2::new(0.0, 0.0), 0);
/// locator.add_point(Point2::new(10.0, 10.0), 1);
/// assert_eq!(locator.near_point(&Point2::new(1.0, 1.0)), Some(0));
/// assert_eq!(locator.near_point(&Point2::new(9.0, 9.0)), Some(1));
/// ```
#[derive(Clone, Debug)]
pub struct KdTreeLocator<T> {
    nodes: Vec<Node<T>>,
    size: usize,
}

impl<T> Default for KdTreeLocator<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            size: 0,
        }
    }
}

impl<T: CoordinateScalar> KdTreeLocator<T> {
    /// Creates an empty locator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points added so far.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether no points have been added yet.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn coord(p: &Point2<T>, axis: u8) -> T {
        if axis == 0 {
            p.x
        } else {
            p.y
        }
    }

    /// Splits the full leaf at `node` in two, or leaves it oversized when
    /// all bucket points coincide.
    fn split_leaf(&mut self, node: usize) -> bool {
        let bucket = match &self.nodes[node] {
            Node::Leaf { bucket } => bucket.clone(),
            Node::Split { .. } => unreachable!("split_leaf called on a split node"),
        };

        let envelope = crate::geometry::point::Box2::envelop_points(bucket.iter().map(|e| e.0))
            .expect("a full leaf bucket cannot be empty");
        let (axis, spread) = if envelope.width() >= envelope.height() {
            (0, envelope.width())
        } else {
            (1, envelope.height())
        };
        if spread <= T::zero() {
            // All bucket points coincide; the leaf absorbs the overflow.
            return false;
        }

        let mut coords: Vec<T> = bucket.iter().map(|e| Self::coord(&e.0, axis)).collect();
        coords.sort_by(|a, b| a.partial_cmp(b).expect("coordinates are finite"));
        let mut value = coords[coords.len() / 2];
        if value == coords[0] {
            // Degenerate median: pick the smallest coordinate strictly above
            // the minimum so both children are non-empty.
            value = *coords
                .iter()
                .find(|&&c| c > coords[0])
                .expect("positive spread guarantees a larger coordinate");
        }

        let mut below = SmallBuffer::new();
        let mut above = SmallBuffer::new();
        for entry in bucket {
            if Self::coord(&entry.0, axis) < value {
                below.push(entry);
            } else {
                above.push(entry);
            }
        }
        let below_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { bucket: below });
        let above_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { bucket: above });
        self.nodes[node] = Node::Split {
            axis,
            value,
            children: [below_idx, above_idx],
        };
        true
    }
}

impl<T: CoordinateScalar> NearPointLocator<T> for KdTreeLocator<T> {
    fn add_point(&mut self, pos: Point2<T>, i_vertex: VertInd) {
        self.size += 1;
        if self.nodes.is_empty() {
            let mut bucket = SmallBuffer::new();
            bucket.push((pos, i_vertex));
            self.nodes.push(Node::Leaf { bucket });
            return;
        }
        let mut node = 0;
        loop {
            let descend = match &self.nodes[node] {
                Node::Split {
                    axis,
                    value,
                    children,
                } => Some(children[usize::from(Self::coord(&pos, *axis) >= *value)]),
                Node::Leaf { .. } => None,
            };
            if let Some(next) = descend {
                node = next;
                continue;
            }
            let full = match &self.nodes[node] {
                Node::Leaf { bucket } => bucket.len() >= LEAF_CAPACITY,
                Node::Split { .. } => unreachable!(),
            };
            if full && self.split_leaf(node) {
                // The leaf just split; descend into the new children.
                continue;
            }
            match &mut self.nodes[node] {
                Node::Leaf { bucket } => bucket.push((pos, i_vertex)),
                Node::Split { .. } => unreachable!(),
            }
            return;
        }
    }

    fn near_point(&self, pos: &Point2<T>) -> Option<VertInd> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<(T, VertInd)> = None;
        // Stack entries: (node, squared distance lower bound of its region).
        let mut stack: Vec<(usize, T)> = vec![(0, T::zero())];
        while let Some((node, bound)) = stack.pop() {
            if let Some((best_dist, _)) = best {
                if bound >= best_dist {
                    continue;
                }
            }
            match &self.nodes[node] {
                Node::Leaf { bucket } => {
                    for (p, i) in bucket {
                        let dist = pos.distance_squared(p);
                        if best.map_or(true, |(best_dist, _)| dist < best_dist) {
                            best = Some((dist, *i));
                        }
                    }
                }
                Node::Split {
                    axis,
                    value,
                    children,
                } => {
                    let delta = Self::coord(pos, *axis) - *value;
                    let (near, far) = if delta < T::zero() {
                        (children[0], children[1])
                    } else {
                        (children[1], children[0])
                    };
                    // Visit the near side first: push the far side below it.
                    stack.push((far, bound.max(delta * delta)));
                    stack.push((near, bound));
                }
            }
        }
        best.map(|(_, i)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_locator_answers_none() {
        let locator: KdTreeLocator<f64> = KdTreeLocator::new();
        assert!(locator.is_empty());
        assert_eq!(locator.near_point(&Point2::new(0.0, 0.0)), None);
    }

    #[test]
    fn single_point_is_always_nearest() {
        let mut locator = KdTreeLocator::new();
        locator.add_point(Point2::new(3.0, 4.0), 7);
        assert_eq!(locator.len(), 1);
        assert_eq!(locator.near_point(&Point2::new(-100.0, 50.0)), Some(7));
    }

    #[test]
    fn coincident_points_do_not_break_splitting() {
        let mut locator = KdTreeLocator::new();
        for i in 0..(LEAF_CAPACITY * 2) {
            locator.add_point(Point2::new(1.0, 1.0), i);
        }
        locator.add_point(Point2::new(2.0, 2.0), 999);
        assert_eq!(locator.near_point(&Point2::new(2.1, 2.1)), Some(999));
    }

    #[test]
    fn nearest_matches_brute_force_on_random_points() {
        let mut rng = StdRng::seed_from_u64(42);
        let points: Vec<Point2<f64>> = (0..500)
            .map(|_| Point2::new(rng.random_range(-50.0..50.0), rng.random_range(-50.0..50.0)))
            .collect();

        let mut locator = KdTreeLocator::new();
        for (i, p) in points.iter().enumerate() {
            locator.add_point(*p, i);
        }

        for _ in 0..200 {
            let q = Point2::new(rng.random_range(-60.0..60.0), rng.random_range(-60.0..60.0));
            let found = locator.near_point(&q).unwrap();
            let best_dist = points
                .iter()
                .map(|p| q.distance_squared(p))
                .fold(f64::INFINITY, f64::min);
            assert_eq!(q.distance_squared(&points[found]), best_dist);
        }
    }

    #[test]
    fn collinear_insertions_stay_queryable() {
        let mut locator = KdTreeLocator::new();
        for i in 0..200 {
            locator.add_point(Point2::new(i as f64, 0.0), i);
        }
        assert_eq!(locator.near_point(&Point2::new(57.2, 3.0)), Some(57));
    }
}

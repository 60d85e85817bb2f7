//! Triangle storage with vertex fans and free-slot recycling.
//!
//! [`TriangleStore`] owns the flat triangle array and the per-vertex fans
//! (the triangles incident to each vertex). Deleting a triangle marks its
//! slot as a *dummy*: the slot is pushed on a free list and the triangle is
//! dropped from its vertices' fans, but neighbor links of surrounding
//! triangles are left stale until they are rewritten by the caller or the
//! dummies are compacted away.
//!
//! Triangle indices are invalidated by [`TriangleStore::erase_dummies`]
//! (compaction); callers must not retain raw indices across that call.

use crate::core::collections::{FastHashSet, TriFan};
use crate::core::triangle::{TriInd, Triangle, VertInd, NO_NEIGHBOR};

/// Triangle array, vertex fans, and the free-slot list.
#[derive(Clone, Debug, Default)]
pub struct TriangleStore {
    triangles: Vec<Triangle>,
    vert_tris: Vec<TriFan>,
    dummies: Vec<TriInd>,
}

impl TriangleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of triangle slots, dummies included.
    #[inline]
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Number of vertices known to the store (fans allocated).
    #[inline]
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.vert_tris.len()
    }

    /// All triangle slots as a slice, dummies included.
    #[inline]
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// A single triangle by index.
    #[inline]
    #[must_use]
    pub fn triangle(&self, i: TriInd) -> &Triangle {
        &self.triangles[i]
    }

    /// Mutable access to a single triangle.
    #[inline]
    pub fn triangle_mut(&mut self, i: TriInd) -> &mut Triangle {
        &mut self.triangles[i]
    }

    /// Fans of all vertices.
    #[inline]
    #[must_use]
    pub fn vert_tris(&self) -> &[TriFan] {
        &self.vert_tris
    }

    /// Triangles incident to vertex `v`, in no particular order.
    #[inline]
    #[must_use]
    pub fn fan(&self, v: VertInd) -> &[TriInd] {
        &self.vert_tris[v]
    }

    /// Registers a new vertex with an empty fan; returns its index.
    pub fn add_vertex(&mut self) -> VertInd {
        self.vert_tris.push(TriFan::new());
        self.vert_tris.len() - 1
    }

    /// Registers a new vertex with a pre-built fan; returns its index.
    pub fn add_vertex_with_fan(&mut self, fan: TriFan) -> VertInd {
        self.vert_tris.push(fan);
        self.vert_tris.len() - 1
    }

    /// Stores a triangle, reusing a dummy slot if one is available.
    ///
    /// Fans are not touched; the caller registers the triangle with its
    /// vertices via [`TriangleStore::add_adjacent_triangle`].
    pub fn add_triangle(&mut self, t: Triangle) -> TriInd {
        if let Some(slot) = self.dummies.pop() {
            self.triangles[slot] = t;
            slot
        } else {
            self.triangles.push(t);
            self.triangles.len() - 1
        }
    }

    /// Logically deletes triangle `i`.
    ///
    /// The triangle is removed from its vertices' fans and the slot is
    /// recorded for reuse. Neighbor links of surrounding triangles keep
    /// pointing at the dead slot until the caller rewrites them or
    /// [`TriangleStore::erase_dummies`] runs.
    ///
    /// # Panics
    ///
    /// Panics if the triangle is missing from one of its vertices' fans.
    pub fn make_dummy(&mut self, i: TriInd) {
        let vertices = self.triangles[i].vertices;
        for v in vertices {
            self.remove_adjacent_triangle(v, i);
        }
        self.dummies.push(i);
    }

    /// Whether any dummy slots are pending compaction.
    #[inline]
    #[must_use]
    pub fn has_dummies(&self) -> bool {
        !self.dummies.is_empty()
    }

    /// Compacts away all dummy slots.
    ///
    /// Surviving triangles keep their relative order; neighbor fields and
    /// vertex fans are rewritten through a remap table. Any neighbor link
    /// still aimed at a dummy becomes [`NO_NEIGHBOR`]. All previously held
    /// triangle indices are invalidated.
    pub fn erase_dummies(&mut self) {
        if self.dummies.is_empty() {
            return;
        }
        let dummy_set: FastHashSet<TriInd> = self.dummies.iter().copied().collect();
        let mut remap = vec![NO_NEIGHBOR; self.triangles.len()];
        let mut kept = 0;
        for i in 0..self.triangles.len() {
            if dummy_set.contains(&i) {
                continue;
            }
            remap[i] = kept;
            self.triangles[kept] = self.triangles[i];
            kept += 1;
        }
        self.triangles.truncate(kept);
        for t in &mut self.triangles {
            for n in &mut t.neighbors {
                if *n != NO_NEIGHBOR {
                    *n = remap[*n];
                }
            }
        }
        for fan in &mut self.vert_tris {
            for i in fan.iter_mut() {
                *i = remap[*i];
            }
        }
        self.dummies.clear();
    }

    /// Replaces the unique neighbor link of triangle `i` equal to `old`
    /// with `new`.
    ///
    /// # Panics
    ///
    /// Panics if no neighbor slot of `i` holds `old`.
    pub fn change_neighbor(&mut self, i: TriInd, old: TriInd, new: TriInd) {
        let slot = self.triangles[i].neighbor_slot(old);
        self.triangles[i].neighbors[slot as usize] = new;
    }

    /// Sets the neighbor of triangle `i` across the edge `{va, vb}` to
    /// `new`.
    ///
    /// # Panics
    ///
    /// Panics if `i` does not contain the edge `{va, vb}`.
    pub fn change_neighbor_across_edge(
        &mut self,
        i: TriInd,
        va: VertInd,
        vb: VertInd,
        new: TriInd,
    ) {
        let t = &mut self.triangles[i];
        assert!(
            t.contains_vertex(va) && t.contains_vertex(vb),
            "triangle {i} does not contain edge ({va}, {vb})"
        );
        // The neighbor across {va, vb} is opposite the third vertex.
        let slot = t
            .vertices
            .iter()
            .position(|&v| v != va && v != vb)
            .expect("edge endpoints must be distinct");
        t.neighbors[slot] = new;
    }

    /// Adds triangle `t` to the fan of vertex `v`.
    pub fn add_adjacent_triangle(&mut self, v: VertInd, t: TriInd) {
        debug_assert!(
            !self.vert_tris[v].contains(&t),
            "triangle {t} already in fan of vertex {v}"
        );
        self.vert_tris[v].push(t);
    }

    /// Removes triangle `t` from the fan of vertex `v`.
    ///
    /// # Panics
    ///
    /// Panics if `t` is not in the fan; that indicates a corrupted
    /// adjacency structure.
    pub fn remove_adjacent_triangle(&mut self, v: VertInd, t: TriInd) {
        let fan = &mut self.vert_tris[v];
        match fan.iter().position(|&x| x == t) {
            Some(pos) => {
                fan.swap_remove(pos);
            }
            None => panic!("triangle {t} is missing from the fan of vertex {v}"),
        }
    }

    /// Drops the first `n` vertices and shifts all vertex references down
    /// by `n`.
    ///
    /// Used when erasing super-triangle vertices after trimming; no stored
    /// triangle may still reference the dropped vertices.
    pub fn erase_leading_vertices(&mut self, n: usize) {
        for t in &mut self.triangles {
            for v in &mut t.vertices {
                debug_assert!(*v >= n, "triangle still references an erased vertex");
                *v -= n;
            }
        }
        self.vert_tris.drain(0..n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Two triangles sharing edge (1, 2):
    //   t0 = (0, 1, 2) with neighbor t1 across (1, 2)
    //   t1 = (3, 2, 1) with neighbor t0 across (2, 1)
    fn two_triangle_store() -> TriangleStore {
        let mut store = TriangleStore::new();
        for _ in 0..4 {
            store.add_vertex();
        }
        let t0 = store.add_triangle(Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3]));
        let t1 = store.add_triangle(Triangle::new([3, 2, 1], [NO_NEIGHBOR; 3]));
        store.triangle_mut(t0).neighbors[0] = t1;
        store.triangle_mut(t1).neighbors[0] = t0;
        for (i, t) in [(t0, [0, 1, 2]), (t1, [3, 2, 1])] {
            for v in t {
                store.add_adjacent_triangle(v, i);
            }
        }
        store
    }

    #[test]
    fn add_triangle_reuses_dummy_slots() {
        let mut store = two_triangle_store();
        assert_eq!(store.num_triangles(), 2);

        store.make_dummy(0);
        assert!(store.has_dummies());
        let reused = store.add_triangle(Triangle::new([0, 1, 2], [NO_NEIGHBOR; 3]));
        assert_eq!(reused, 0);
        assert!(!store.has_dummies());
        assert_eq!(store.num_triangles(), 2);
    }

    #[test]
    fn make_dummy_clears_fans() {
        let mut store = two_triangle_store();
        store.make_dummy(1);
        assert!(!store.fan(3).contains(&1));
        assert!(!store.fan(1).contains(&1));
        assert!(store.fan(1).contains(&0));
    }

    #[test]
    fn erase_dummies_compacts_and_remaps() {
        let mut store = two_triangle_store();
        store.make_dummy(0);
        store.erase_dummies();

        assert_eq!(store.num_triangles(), 1);
        let t = store.triangle(0);
        assert_eq!(t.vertices, [3, 2, 1]);
        // The stale link to the erased neighbor is cleared.
        assert_eq!(t.neighbors, [NO_NEIGHBOR; 3]);
        for v in [1, 2, 3] {
            assert_eq!(store.fan(v), &[0]);
        }
        assert!(store.fan(0).is_empty());
    }

    #[test]
    fn erase_dummies_is_a_noop_without_dummies() {
        let mut store = two_triangle_store();
        let before = store.triangles().to_vec();
        store.erase_dummies();
        assert_eq!(store.triangles(), &before[..]);
    }

    #[test]
    fn change_neighbor_by_index_and_by_edge() {
        let mut store = two_triangle_store();
        store.change_neighbor(0, 1, NO_NEIGHBOR);
        assert_eq!(store.triangle(0).neighbors[0], NO_NEIGHBOR);

        store.change_neighbor_across_edge(0, 1, 2, 1);
        assert_eq!(store.triangle(0).neighbors[0], 1);
    }

    #[test]
    #[should_panic(expected = "is not a neighbor")]
    fn change_neighbor_panics_on_absent_value() {
        let mut store = two_triangle_store();
        store.change_neighbor(0, 99, NO_NEIGHBOR);
    }

    #[test]
    fn erase_leading_vertices_shifts_references() {
        let mut store = TriangleStore::new();
        for _ in 0..6 {
            store.add_vertex();
        }
        let t = store.add_triangle(Triangle::new([3, 4, 5], [NO_NEIGHBOR; 3]));
        for v in [3, 4, 5] {
            store.add_adjacent_triangle(v, t);
        }
        store.erase_leading_vertices(3);
        assert_eq!(store.num_vertices(), 3);
        assert_eq!(store.triangle(t).vertices, [0, 1, 2]);
        assert_eq!(store.fan(0), &[t]);
    }
}

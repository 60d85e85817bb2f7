//! Layer-depth computation by peeling the triangulation at fixed edges.
//!
//! Starting from a seed triangle (one touching the super-triangle), a BFS
//! assigns depth 0 to everything reachable without crossing a fixed edge.
//! Triangles behind a fixed edge become seeds of the next layer, and so on
//! until all triangles are traversed. The resulting depth is:
//!
//! - 0 for triangles outside the outermost boundary,
//! - 1 inside the boundary but outside any hole,
//! - 2 inside a hole, 3 inside an island, ...
//!
//! With overlapping boundaries, crossing a fixed edge advances the depth by
//! `1 + overlap_count[edge]`, so seeds can land several layers deeper than
//! the layer being peeled; they are queued by depth until their layer comes
//! up.

use crate::core::collections::{FastHashMap, FastHashSet};
use crate::core::edge::Edge;
use crate::core::triangle::{BoundaryOverlapCount, LayerDepth, TriInd, Triangle, NO_NEIGHBOR};

/// Peels one layer: assigns `layer_depth` to every triangle reachable from
/// `seeds` without crossing a fixed edge.
///
/// Returns the triangles immediately behind the fixed edges bounding this
/// layer; they seed the next (deeper) layer.
#[must_use]
pub fn peel_layer(
    mut seeds: Vec<TriInd>,
    triangles: &[Triangle],
    fixed_edges: &FastHashSet<Edge>,
    layer_depth: LayerDepth,
    tri_depths: &mut [LayerDepth],
) -> FastHashSet<TriInd> {
    let mut behind_boundary = FastHashSet::default();
    while let Some(i_t) = seeds.pop() {
        tri_depths[i_t] = layer_depth;
        behind_boundary.remove(&i_t);
        let t = &triangles[i_t];
        for slot in 0..3u8 {
            let (va, vb) = t.edge_opposite(slot);
            let i_n = t.neighbors[slot as usize];
            if i_n == NO_NEIGHBOR || tri_depths[i_n] <= layer_depth {
                continue;
            }
            if fixed_edges.contains(&Edge::new(va, vb)) {
                behind_boundary.insert(i_n);
                continue;
            }
            seeds.push(i_n);
        }
    }
    behind_boundary
}

/// Peels one layer, accounting for overlapping boundaries.
///
/// Like [`peel_layer`], but a crossing of a fixed edge with an overlap
/// count `c` puts the far triangle at depth `layer_depth + 1 + c`. The
/// returned map carries each behind-boundary triangle with its target
/// depth.
#[must_use]
pub fn peel_layer_with_overlaps(
    mut seeds: Vec<TriInd>,
    triangles: &[Triangle],
    fixed_edges: &FastHashSet<Edge>,
    overlap_count: &FastHashMap<Edge, BoundaryOverlapCount>,
    layer_depth: LayerDepth,
    tri_depths: &mut [LayerDepth],
) -> FastHashMap<TriInd, LayerDepth> {
    let mut behind_boundary: FastHashMap<TriInd, LayerDepth> = FastHashMap::default();
    while let Some(i_t) = seeds.pop() {
        tri_depths[i_t] = layer_depth;
        behind_boundary.remove(&i_t);
        let t = &triangles[i_t];
        for slot in 0..3u8 {
            let (va, vb) = t.edge_opposite(slot);
            let op_edge = Edge::new(va, vb);
            let i_n = t.neighbors[slot as usize];
            if i_n == NO_NEIGHBOR || tri_depths[i_n] <= layer_depth {
                continue;
            }
            if fixed_edges.contains(&op_edge) {
                let tri_depth = match overlap_count.get(&op_edge) {
                    Some(&count) => layer_depth + count + 1,
                    None => layer_depth + 1,
                };
                behind_boundary.insert(i_n, tri_depth);
                continue;
            }
            seeds.push(i_n);
        }
    }
    behind_boundary
}

/// Computes the layer depth of every triangle, peeling from `seed`.
///
/// The returned vector stores the depth of the `i`-th triangle at index
/// `i`; unreached triangles (impossible in a connected triangulation) keep
/// [`LayerDepth::MAX`].
#[must_use]
pub fn calculate_triangle_depths(
    seed: TriInd,
    triangles: &[Triangle],
    fixed_edges: &FastHashSet<Edge>,
) -> Vec<LayerDepth> {
    let mut tri_depths = vec![LayerDepth::MAX; triangles.len()];
    let mut seeds = vec![seed];
    let mut layer_depth: LayerDepth = 0;
    while !seeds.is_empty() {
        let new_seeds = peel_layer(seeds, triangles, fixed_edges, layer_depth, &mut tri_depths);
        seeds = new_seeds.into_iter().collect();
        layer_depth += 1;
    }
    tri_depths
}

/// Computes the layer depth of every triangle, supporting overlapping
/// boundaries.
///
/// Seeds produced behind a multiply-covered fixed edge land at depths
/// strictly greater than the next layer; they are queued per depth and
/// consumed when their layer becomes current. The loop terminates once no
/// seeds remain at the current depth and none are queued deeper.
#[must_use]
pub fn calculate_triangle_depths_with_overlaps(
    seed: TriInd,
    triangles: &[Triangle],
    fixed_edges: &FastHashSet<Edge>,
    overlap_count: &FastHashMap<Edge, BoundaryOverlapCount>,
) -> Vec<LayerDepth> {
    let mut tri_depths = vec![LayerDepth::MAX; triangles.len()];
    let mut seeds = vec![seed];
    let mut layer_depth: LayerDepth = 0;
    let mut deepest_seed_depth: LayerDepth = 0;
    let mut seeds_by_depth: FastHashMap<LayerDepth, FastHashSet<TriInd>> = FastHashMap::default();
    loop {
        let new_seeds = peel_layer_with_overlaps(
            seeds,
            triangles,
            fixed_edges,
            overlap_count,
            layer_depth,
            &mut tri_depths,
        );
        seeds_by_depth.remove(&layer_depth);
        for (i_t, depth) in new_seeds {
            deepest_seed_depth = deepest_seed_depth.max(depth);
            seeds_by_depth.entry(depth).or_default().insert(i_t);
        }
        layer_depth += 1;
        seeds = seeds_by_depth
            .get(&layer_depth)
            .map(|next| next.iter().copied().collect())
            .unwrap_or_default();
        if seeds.is_empty() && deepest_seed_depth < layer_depth {
            break;
        }
    }
    tri_depths
}

//! Collection aliases optimized for the triangulation kernel.
//!
//! The kernel keys its sets and maps by small integer indices, so a fast
//! non-cryptographic hasher is used throughout. Small per-vertex buffers
//! stay on the stack for the common case.

use crate::core::triangle::TriInd;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// `HashMap` keyed by trusted internal data, backed by `FxHasher`.
///
/// Not DoS-resistant; use only with internal keys (edge pairs, triangle
/// indices), never with attacker-controlled data.
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// `HashSet` counterpart of [`FastHashMap`].
pub type FastHashSet<T> = FxHashSet<T>;

/// Small-size-optimized vector: stack allocation up to `N` elements, heap
/// fallback beyond.
///
/// Size guidelines used in this crate:
/// - **N=8**: vertex fans (a typical interior vertex has degree 6)
/// - **N=32**: kd-tree leaf buckets
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Inline capacity of a vertex fan.
pub const VERTEX_FAN_CAPACITY: usize = 8;

/// Triangles incident to one vertex, in no particular order.
pub type TriFan = SmallBuffer<TriInd, VERTEX_FAN_CAPACITY>;

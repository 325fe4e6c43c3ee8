//! Strided n-dimensional iteration, broadcasting and reduction engine.
//!
//! This crate provides the traversal core of an ndarray library: dynamic-rank
//! strided views over existing memory, zero-copy broadcasting, loop-interchange
//! and cache-blocking planning, and a kernel-dispatch engine that the
//! element-wise and reduction operation families are layered on.
//!
//! # Core Types
//!
//! - [`StridedView`] / [`StridedViewMut`]: Zero-copy strided views over existing data
//! - [`StridedArray`]: Owned strided multidimensional array
//! - [`MemoryOrder`]: Nominal row-major / column-major layout tag
//! - [`KernelWrite`]: Write-back kernel return convention (`Write` or `Skip`)
//!
//! # Primary API
//!
//! ## Broadcasting
//!
//! - [`broadcast`]: Expand a view to a target shape without copying, with an
//!   optional set of protected dimensions pinned to the source
//! - [`maybe_broadcast`]: Allocation-free fast path for the no-op case
//! - [`broadcast_shapes`]: Common-shape promotion across operands
//!
//! ## Map Operations
//!
//! - [`copy_into`], [`fill`]: Bulk writes
//! - [`map_into`], [`zip_map2_into`]: Element-wise operations (inputs are
//!   broadcast against the destination)
//! - [`map_indexed_into`], [`fill_by`]: Coordinate-aware writes honoring the
//!   [`KernelWrite`] skip convention
//!
//! ## Reduce Operations
//!
//! - [`reduce`]: Full reduction with map function
//! - [`reduce_subarrays`], [`reduce_subarrays_with`]: One kernel call per kept
//!   coordinate over a sub-view of the reduced dimensions
//! - [`any`], [`all`], [`count_truthy`], [`count_falsy`], [`includes`],
//!   [`find`], [`some_by`] and their `_dims` variants: the reduction family
//!   built on the driver
//!
//! # Example
//!
//! ```rust
//! use ndstrided::{MemoryOrder, StridedView, any, broadcast};
//!
//! let data = vec![1.0, -2.0, 3.0, -4.0];
//! let view = StridedView::new(&data, &[4], &[1], 0, MemoryOrder::RowMajor).unwrap();
//! assert!(any(&view).unwrap());
//!
//! // [1, 4] -> [3, 4]: broadcast a row to a matrix without copying
//! let row = StridedView::new(&data, &[1, 4], &[4, 1], 0, MemoryOrder::RowMajor).unwrap();
//! let mat = broadcast(&row, &[3, 4], &[]).unwrap();
//! assert_eq!(mat.dims(), &[3, 4]);
//! assert_eq!(mat.strides(), &[0, 1]);
//! ```
//!
//! # Cache Optimization
//!
//! Traversal follows a fuse → order → block pipeline:
//! - Contiguous dimensions are fused to reduce loop depth
//! - Dimensions are sorted by stride magnitude for locality, the destination
//!   operand weighted double
//! - Iteration is tiled so the working set across all operands fits L1
//!   ([`BLOCK_MEMORY_SIZE`] = 32KB); organized stride patterns skip tiling
//!
//! Kernels with an order-sensitive contract (`find`'s first match) bypass the
//! interchange and run in logical index order.

mod block;
pub mod broadcast;
mod fuse;
mod index;
mod kernel;
mod map;
mod ops;
mod order;
mod reduce;
mod scalar;
pub mod view;

// ============================================================================
// Element capability traits
// ============================================================================
pub use scalar::{Scalar, Truthy};

// ============================================================================
// View types and utilities
// ============================================================================
pub use view::{
    col_major_strides, row_major_strides, MemoryOrder, StridedArray, StridedView, StridedViewMut,
};

// ============================================================================
// Index normalization
// ============================================================================
pub use index::{
    normalize_axes, normalize_index, normalize_indices, normalize_indices_in_place, INVALID_INDEX,
};

// ============================================================================
// Broadcasting
// ============================================================================
pub use broadcast::{broadcast, broadcast_shapes, maybe_broadcast};

// ============================================================================
// Traversal engine
// ============================================================================
pub use kernel::{traversal_mode, KernelWrite, TraversalMode};
pub use order::{strides_order, StrideOrder};

// ============================================================================
// Map operations
// ============================================================================
pub use map::{copy_into, fill, fill_by, map_indexed_into, map_into, zip_map2_into};

// ============================================================================
// Reduce operations
// ============================================================================
pub use reduce::{reduce, reduce_subarrays, reduce_subarrays_with, reduced_shape};

pub use ops::{
    all, all_dims, any, any_dims, count_falsy, count_falsy_dims, count_truthy, count_truthy_dims,
    find, find_index, includes, includes_dims, some_by, some_by_dims,
};

// ============================================================================
// Constants
// ============================================================================

/// Block memory size for cache-optimized iteration (L1 cache target).
///
/// Operations are blocked into tiles whose combined working set across all
/// operand buffers stays within this size.
pub const BLOCK_MEMORY_SIZE: usize = 32 * 1024;

/// Cache line size in bytes, used for memory region estimation.
pub const CACHE_LINE_SIZE: usize = 64;

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur during strided array operations.
#[derive(Debug, thiserror::Error)]
pub enum StridedError {
    /// Array ranks do not match, or a broadcast target has fewer dimensions
    /// than the source.
    #[error("rank mismatch: {0} vs {1}")]
    RankMismatch(usize, usize),

    /// Array shapes are incompatible for a same-shape operation.
    #[error("shape mismatch: {0:?} vs {1:?}")]
    ShapeMismatch(Vec<usize>, Vec<usize>),

    /// Shapes cannot be reconciled under broadcasting rules.
    #[error("cannot broadcast {src:?} to {target:?}")]
    BroadcastIncompatible {
        src: Vec<usize>,
        target: Vec<usize>,
    },

    /// A dimension index falls outside `[-rank, rank-1]` after normalization.
    #[error("invalid axis {axis} for rank {rank}")]
    InvalidAxis { axis: isize, rank: usize },

    /// The same normalized dimension index appears more than once.
    #[error("duplicate axis {axis}")]
    DuplicateAxis { axis: usize },

    /// An axis list is longer than the input's rank.
    #[error("too many axes: {given} for rank {rank}")]
    TooManyAxes { given: usize, rank: usize },

    /// Stride array length doesn't match dimensions.
    #[error("stride and dims length mismatch")]
    StrideLengthMismatch,

    /// A view would reach outside its buffer, or offset arithmetic overflowed.
    #[error("offset overflow while computing pointer")]
    OffsetOverflow,
}

/// Result type for strided array operations.
pub type Result<T> = std::result::Result<T, StridedError>;

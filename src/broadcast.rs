//! Zero-copy broadcasting.
//!
//! Broadcasting expands a view to a larger logical shape without copying:
//! source dimensions align with the trailing target dimensions, size-1
//! dimensions expand with stride 0, and missing leading dimensions are
//! synthesized with stride 0. A *protected* dimension is pinned: its size
//! and stride are copied verbatim from the source instead of being matched
//! against the target (used when a reduction holds some axes fixed).

use std::sync::Arc;

use crate::index::normalize_axes;
use crate::view::StridedView;
use crate::{Result, StridedError};

/// Compute the common broadcast shape across operands of possibly different
/// ranks.
///
/// Dimensions align from the trailing end; per aligned dimension the sizes
/// must be equal or 1, and the result takes the larger.
pub fn broadcast_shapes(dims_list: &[&[usize]]) -> Result<Vec<usize>> {
    let max_rank = dims_list.iter().map(|d| d.len()).max().unwrap_or(0);
    let mut out = vec![1usize; max_rank];

    for k in 0..max_rank {
        // k counts from the trailing dimension.
        let mut target = 1usize;
        for dims in dims_list {
            if k >= dims.len() {
                continue;
            }
            let n = dims[dims.len() - 1 - k];
            if n == 1 {
                continue;
            }
            if target == 1 {
                target = n;
            } else if target != n {
                return Err(StridedError::BroadcastIncompatible {
                    src: dims.to_vec(),
                    target: out,
                });
            }
        }
        out[max_rank - 1 - k] = target;
    }

    Ok(out)
}

/// Broadcast `view` to `target_shape`.
///
/// `protected` lists dimensions (negative offsets from the trailing end,
/// equivalently indices into the source after normalization against the
/// source rank) whose size and stride are copied from the source unchanged —
/// the output keeps the *source* extent there even when the target differs.
///
/// Always returns a newly derived view, even when the shapes already match;
/// see [`maybe_broadcast`] for the allocation-free no-op fast path.
pub fn broadcast<'a, T>(
    view: &StridedView<'a, T>,
    target_shape: &[usize],
    protected: &[isize],
) -> Result<StridedView<'a, T>> {
    let src_rank = view.ndim();
    let target_rank = target_shape.len();
    if src_rank > target_rank {
        return Err(StridedError::RankMismatch(src_rank, target_rank));
    }
    // Bounds come from the normalizer; duplicates are this caller's check,
    // folded into the same validation helper.
    let protected = normalize_axes(protected, src_rank)?;

    let src_dims = view.dims();
    let src_strides = view.strides();
    let lead = target_rank - src_rank;

    let mut dims = target_shape.to_vec();
    let mut strides = vec![0isize; target_rank];

    for i in 0..src_rank {
        let t = lead + i;
        if protected.contains(&i) {
            dims[t] = src_dims[i];
            strides[t] = src_strides[i];
        } else if src_dims[i] == target_shape[t] {
            strides[t] = src_strides[i];
        } else if src_dims[i] == 1 {
            strides[t] = 0;
        } else {
            return Err(StridedError::BroadcastIncompatible {
                src: src_dims.to_vec(),
                target: target_shape.to_vec(),
            });
        }
    }

    Ok(view.derive(Arc::from(dims), Arc::from(strides), 0))
}

/// Broadcast with a no-op fast path.
///
/// Returns the original view (shared shape/stride metadata, no allocation)
/// iff ranks match and every non-protected dimension already has the target
/// size; otherwise defers to [`broadcast`]. Error semantics are identical.
pub fn maybe_broadcast<'a, T>(
    view: &StridedView<'a, T>,
    target_shape: &[usize],
    protected: &[isize],
) -> Result<StridedView<'a, T>> {
    let src_rank = view.ndim();
    if src_rank == target_shape.len() {
        let normalized = normalize_axes(protected, src_rank)?;
        let no_op = view
            .dims()
            .iter()
            .zip(target_shape.iter())
            .enumerate()
            .all(|(i, (&s, &t))| s == t || normalized.contains(&i));
        if no_op {
            return Ok(view.clone());
        }
    }
    broadcast(view, target_shape, protected)
}

//! The traversal engine: plans and kernel iteration.
//!
//! Traversal runs in two regimes behind one engine. *Planned* traversal
//! (`for_each_inner_block` / `for_each_offset`) reorders loops for locality
//! and tiles when operand layouts disagree; visitation order is an internal
//! detail. *Logical-order* traversal (`for_each_indexed`) enumerates
//! coordinates lexicographically with no interchange, for kernels whose
//! contract observes visitation order.

use std::ops::ControlFlow;

use crate::fuse::fuse_dims;
use crate::order::{compute_order, strides_order, StrideOrder};
use crate::{block, Result, StridedError};

/// Return convention for write-back kernels: `Write(v)` stores `v` through
/// the destination accessor, `Skip` leaves the destination element untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelWrite<T> {
    Write(T),
    Skip,
}

/// How a planned traversal iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalMode {
    /// Plain nested loops in interchanged order; every operand's stride
    /// pattern is organized, so tiling is not needed.
    Direct,
    /// Tiled iteration: operand layouts disagree, so each axis is split into
    /// cache-sized blocks.
    Blocked,
}

/// Pick the traversal mode from the operands' stride patterns.
pub fn traversal_mode(strides_list: &[&[isize]]) -> TraversalMode {
    if strides_list
        .iter()
        .all(|s| strides_order(s) != StrideOrder::None)
    {
        TraversalMode::Direct
    } else {
        TraversalMode::Blocked
    }
}

/// An execution plan for one traversal. Ephemeral: rebuilt per call, never
/// persisted.
pub(crate) struct KernelPlan {
    /// Dimension permutation, innermost first.
    pub(crate) order: Vec<usize>,
    /// Tile lengths in iteration order.
    pub(crate) block: Vec<usize>,
}

/// Build an execution plan: interchange order, then tile lengths.
///
/// `Direct` mode tiles span their full dimensions, which makes the blocked
/// odometer degenerate into plain nested loops.
pub(crate) fn build_plan(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
    elem_size: usize,
) -> KernelPlan {
    let order = compute_order(dims, strides_list, dest_index);
    let block = match traversal_mode(strides_list) {
        TraversalMode::Direct => order.iter().map(|&i| dims[i]).collect(),
        TraversalMode::Blocked => block::compute_block_sizes(dims, &order, strides_list, elem_size),
    };
    KernelPlan { order, block }
}

/// Fuse contiguous dimensions, then plan on the fused shape.
pub(crate) fn build_plan_fused(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
    elem_size: usize,
) -> (Vec<usize>, KernelPlan) {
    let fused_dims = fuse_dims(dims, strides_list);
    let plan = build_plan(&fused_dims, strides_list, dest_index, elem_size);
    (fused_dims, plan)
}

// ============================================================================
// Block-based iteration with inner stride callback
// ============================================================================

/// Iterate over blocks, calling `f` with `(offsets, inner_len, inner_strides)`.
///
/// `offsets` holds each operand's running element offset at the start of the
/// innermost run; `inner_len` elements follow at `inner_strides[k]` apart.
/// Zero-size shapes are a no-op; rank 0 is a single unit call.
#[inline]
pub(crate) fn for_each_inner_block<F>(
    dims: &[usize],
    plan: &KernelPlan,
    strides_list: &[&[isize]],
    mut f: F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    if dims.iter().any(|&d| d == 0) {
        return Ok(());
    }
    let rank = dims.len();
    if rank == 0 {
        let offsets = vec![0isize; strides_list.len()];
        return f(&offsets, 1, &[]);
    }

    let ordered_dims: Vec<usize> = plan.order.iter().map(|&d| dims[d]).collect();
    let ordered_blocks: Vec<usize> = plan.block.clone();

    let mut ordered_strides: Vec<Vec<isize>> = Vec::with_capacity(strides_list.len());
    for strides in strides_list {
        ordered_strides.push(plan.order.iter().map(|&d| strides[d]).collect());
    }

    let mut offsets = vec![0isize; strides_list.len()];

    match rank {
        1 => kernel_1d_inner(
            &ordered_dims,
            &ordered_blocks,
            &ordered_strides,
            &mut offsets,
            &mut f,
        ),
        2 => kernel_2d_inner(
            &ordered_dims,
            &ordered_blocks,
            &ordered_strides,
            &mut offsets,
            &mut f,
        ),
        3 => kernel_3d_inner(
            &ordered_dims,
            &ordered_blocks,
            &ordered_strides,
            &mut offsets,
            &mut f,
        ),
        4 => kernel_4d_inner(
            &ordered_dims,
            &ordered_blocks,
            &ordered_strides,
            &mut offsets,
            &mut f,
        ),
        _ => kernel_nd_inner(
            &ordered_dims,
            &ordered_blocks,
            &ordered_strides,
            &mut offsets,
            &mut f,
        ),
    }
}

/// 1D kernel: dimension 0 is the callback run.
#[inline]
fn kernel_1d_inner<F>(
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let d0 = dims[0];
    let b0 = blocks[0].clamp(1, d0);
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut j0 = 0usize;
    while j0 < d0 {
        let blen = b0.min(d0 - j0);
        f(offsets, blen, &inner_strides)?;
        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
            *offset += blen as isize * s[0];
        }
        j0 += blen;
    }
    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset -= d0 as isize * s[0];
    }
    Ok(())
}

/// 2D kernel. Loop nesting: block loops outermost-dimension-first, element
/// loop over dimension 1, callback run over dimension 0 (smallest stride).
#[inline]
fn kernel_2d_inner<F>(
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let (d0, d1) = (dims[0], dims[1]);
    let b0 = blocks[0].clamp(1, d0);
    let b1 = blocks[1].clamp(1, d1);
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut j1 = 0usize;
    while j1 < d1 {
        let blen1 = b1.min(d1 - j1);

        let mut j0 = 0usize;
        while j0 < d0 {
            let blen0 = b0.min(d0 - j0);

            for _ in 0..blen1 {
                f(offsets, blen0, &inner_strides)?;
                for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                    *offset += s[1];
                }
            }
            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset -= blen1 as isize * s[1];
                *offset += blen0 as isize * s[0];
            }
            j0 += blen0;
        }

        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
            *offset -= d0 as isize * s[0];
            *offset += blen1 as isize * s[1];
        }
        j1 += blen1;
    }

    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset -= d1 as isize * s[1];
    }
    Ok(())
}

/// 3D kernel.
#[inline]
fn kernel_3d_inner<F>(
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let (d0, d1, d2) = (dims[0], dims[1], dims[2]);
    let b0 = blocks[0].clamp(1, d0);
    let b1 = blocks[1].clamp(1, d1);
    let b2 = blocks[2].clamp(1, d2);
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut j2 = 0usize;
    while j2 < d2 {
        let blen2 = b2.min(d2 - j2);

        let mut j1 = 0usize;
        while j1 < d1 {
            let blen1 = b1.min(d1 - j1);

            let mut j0 = 0usize;
            while j0 < d0 {
                let blen0 = b0.min(d0 - j0);

                for _ in 0..blen2 {
                    for _ in 0..blen1 {
                        f(offsets, blen0, &inner_strides)?;
                        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                            *offset += s[1];
                        }
                    }
                    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                        *offset -= blen1 as isize * s[1];
                        *offset += s[2];
                    }
                }
                for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                    *offset -= blen2 as isize * s[2];
                    *offset += blen0 as isize * s[0];
                }
                j0 += blen0;
            }

            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset -= d0 as isize * s[0];
                *offset += blen1 as isize * s[1];
            }
            j1 += blen1;
        }

        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
            *offset -= d1 as isize * s[1];
            *offset += blen2 as isize * s[2];
        }
        j2 += blen2;
    }

    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset -= d2 as isize * s[2];
    }
    Ok(())
}

/// 4D kernel.
#[inline]
fn kernel_4d_inner<F>(
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let (d0, d1, d2, d3) = (dims[0], dims[1], dims[2], dims[3]);
    let b0 = blocks[0].clamp(1, d0);
    let b1 = blocks[1].clamp(1, d1);
    let b2 = blocks[2].clamp(1, d2);
    let b3 = blocks[3].clamp(1, d3);
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();

    let mut j3 = 0usize;
    while j3 < d3 {
        let blen3 = b3.min(d3 - j3);

        let mut j2 = 0usize;
        while j2 < d2 {
            let blen2 = b2.min(d2 - j2);

            let mut j1 = 0usize;
            while j1 < d1 {
                let blen1 = b1.min(d1 - j1);

                let mut j0 = 0usize;
                while j0 < d0 {
                    let blen0 = b0.min(d0 - j0);

                    for _ in 0..blen3 {
                        for _ in 0..blen2 {
                            for _ in 0..blen1 {
                                f(offsets, blen0, &inner_strides)?;
                                for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                                    *offset += s[1];
                                }
                            }
                            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                                *offset -= blen1 as isize * s[1];
                                *offset += s[2];
                            }
                        }
                        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                            *offset -= blen2 as isize * s[2];
                            *offset += s[3];
                        }
                    }
                    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                        *offset -= blen3 as isize * s[3];
                        *offset += blen0 as isize * s[0];
                    }
                    j0 += blen0;
                }

                for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                    *offset -= d0 as isize * s[0];
                    *offset += blen1 as isize * s[1];
                }
                j1 += blen1;
            }

            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset -= d1 as isize * s[1];
                *offset += blen2 as isize * s[2];
            }
            j2 += blen2;
        }

        for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
            *offset -= d2 as isize * s[2];
            *offset += blen3 as isize * s[3];
        }
        j3 += blen3;
    }

    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset -= d3 as isize * s[3];
    }
    Ok(())
}

/// N-dimensional fallback: recursion from the outermost level down to the
/// level-0 callback run.
#[inline]
fn kernel_nd_inner<F>(
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let inner_strides: Vec<isize> = strides.iter().map(|s| s[0]).collect();
    let last = dims.len() - 1;
    kernel_nd_inner_level(last, dims, blocks, strides, &inner_strides, offsets, f)
}

fn kernel_nd_inner_level<F>(
    level: usize,
    dims: &[usize],
    blocks: &[usize],
    strides: &[Vec<isize>],
    inner_strides: &[isize],
    offsets: &mut [isize],
    f: &mut F,
) -> Result<()>
where
    F: FnMut(&[isize], usize, &[isize]) -> Result<()>,
{
    let d = dims[level];
    let b = blocks[level].clamp(1, d);

    if level == 0 {
        let mut j = 0usize;
        while j < d {
            let blen = b.min(d - j);
            f(offsets, blen, inner_strides)?;
            for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                *offset += blen as isize * s[0];
            }
            j += blen;
        }
    } else {
        let mut j = 0usize;
        while j < d {
            let blen = b.min(d - j);
            // Element loop for this dimension; the advance of the final
            // iteration doubles as the step to the next block.
            for _ in 0..blen {
                kernel_nd_inner_level(level - 1, dims, blocks, strides, inner_strides, offsets, f)?;
                for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
                    *offset += s[level];
                }
            }
            j += blen;
        }
    }

    for (offset, s) in offsets.iter_mut().zip(strides.iter()) {
        *offset -= d as isize * s[level];
    }
    Ok(())
}

// ============================================================================
// Per-element traversal
// ============================================================================

/// Planned traversal expanded to one callback per logical coordinate.
///
/// `f` receives each operand's element offset; visitation order follows the
/// plan and is not part of the contract.
#[inline]
pub(crate) fn for_each_offset<F>(
    dims: &[usize],
    plan: &KernelPlan,
    strides_list: &[&[isize]],
    mut f: F,
) -> Result<()>
where
    F: FnMut(&[isize]) -> Result<()>,
{
    let mut scratch = vec![0isize; strides_list.len()];
    for_each_inner_block(dims, plan, strides_list, |offsets, len, inner_strides| {
        scratch.copy_from_slice(offsets);
        for _ in 0..len {
            f(&scratch)?;
            for (offset, s) in scratch.iter_mut().zip(inner_strides.iter()) {
                *offset += s;
            }
        }
        Ok(())
    })
}

/// Logical-order traversal: coordinates enumerated lexicographically, last
/// index fastest, no interchange.
///
/// `f` receives the current coordinate and each operand's element offset and
/// may stop the walk early via `ControlFlow::Break`. Returns `Ok(true)` when
/// the full space was visited, `Ok(false)` on early exit.
pub(crate) fn for_each_indexed<F>(
    dims: &[usize],
    strides_list: &[&[isize]],
    mut f: F,
) -> Result<bool>
where
    F: FnMut(&[usize], &[isize]) -> Result<ControlFlow<()>>,
{
    if dims.iter().any(|&d| d == 0) {
        return Ok(true);
    }
    let rank = dims.len();
    let total: usize = dims.iter().product();
    let mut coords = vec![0usize; rank];
    let mut offsets = vec![0isize; strides_list.len()];

    for step in 0..total {
        if let ControlFlow::Break(()) = f(&coords, &offsets)? {
            return Ok(false);
        }
        if step + 1 == total {
            break;
        }
        // Odometer advance with offset deltas instead of re-deriving the
        // offsets from the coordinate.
        for i in (0..rank).rev() {
            coords[i] += 1;
            if coords[i] < dims[i] {
                for (offset, strides) in offsets.iter_mut().zip(strides_list.iter()) {
                    *offset += strides[i];
                }
                break;
            }
            coords[i] = 0;
            for (offset, strides) in offsets.iter_mut().zip(strides_list.iter()) {
                *offset -= (dims[i] as isize - 1) * strides[i];
            }
        }
    }
    Ok(true)
}

// ============================================================================
// Shape helpers
// ============================================================================

pub(crate) fn ensure_same_shape(a: &[usize], b: &[usize]) -> Result<()> {
    if a.len() != b.len() {
        return Err(StridedError::RankMismatch(a.len(), b.len()));
    }
    if a != b {
        return Err(StridedError::ShapeMismatch(a.to_vec(), b.to_vec()));
    }
    Ok(())
}

pub(crate) fn total_len(dims: &[usize]) -> usize {
    dims.iter().product()
}

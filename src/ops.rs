//! The reduction-operation family: existence, counting, search and
//! first-match queries, whole-array and per-dimension.
//!
//! Everything here is a thin kernel over the traversal machinery: the
//! whole-array forms use the contiguous fast path or an early-exit walk, the
//! `_dims` forms supply a sub-array kernel to the reduction driver. Empty
//! inputs take the documented vacuous results: `any`/`includes` false, `all`
//! true, counts zero, `find` none.

use std::ops::ControlFlow;

use crate::broadcast::maybe_broadcast;
use crate::index::normalize_axes;
use crate::kernel::{for_each_indexed, total_len};
use crate::reduce::{reduce, reduce_subarrays, reduce_subarrays_with, reduced_shape};
use crate::scalar::{Scalar, Truthy};
use crate::view::{StridedArray, StridedView};
use crate::Result;

// ============================================================================
// Whole-array queries
// ============================================================================

/// Whether any element is truthy. Vacuously false for empty inputs.
pub fn any<T: Truthy>(src: &StridedView<'_, T>) -> Result<bool> {
    some_by(src, 1, |v| v.is_truthy())
}

/// Whether every element is truthy. Vacuously true for empty inputs.
pub fn all<T: Truthy>(src: &StridedView<'_, T>) -> Result<bool> {
    if src.is_empty() {
        return Ok(true);
    }
    if src.is_contiguous() {
        let slice = unsafe { std::slice::from_raw_parts(src.ptr(), total_len(src.dims())) };
        return Ok(slice.iter().all(|v| v.is_truthy()));
    }
    let src_ptr = src.ptr();
    let complete = for_each_indexed(src.dims(), &[src.strides()], |_coords, offsets| {
        let value = unsafe { *src_ptr.offset(offsets[0]) };
        if value.is_truthy() {
            Ok(ControlFlow::Continue(()))
        } else {
            Ok(ControlFlow::Break(()))
        }
    })?;
    Ok(complete)
}

/// Number of truthy elements.
pub fn count_truthy<T: Truthy>(src: &StridedView<'_, T>) -> Result<usize> {
    reduce(
        src,
        |v| usize::from(v.is_truthy()),
        |a, b| a + b,
        0usize,
    )
}

/// Number of falsy elements.
pub fn count_falsy<T: Truthy>(src: &StridedView<'_, T>) -> Result<usize> {
    reduce(
        src,
        |v| usize::from(!v.is_truthy()),
        |a, b| a + b,
        0usize,
    )
}

/// Whether any element equals `value`. Vacuously false for empty inputs.
pub fn includes<T: Scalar>(src: &StridedView<'_, T>, value: T) -> Result<bool> {
    some_by(src, 1, |v| v == value)
}

/// Whether at least `n` elements satisfy the predicate, stopping at the
/// `n`-th match. `n == 0` is vacuously true, empty inputs with `n > 0`
/// vacuously false.
pub fn some_by<T: Copy, P>(src: &StridedView<'_, T>, n: usize, mut predicate: P) -> Result<bool>
where
    P: FnMut(T) -> bool,
{
    if n == 0 {
        return Ok(true);
    }
    if src.is_empty() {
        return Ok(false);
    }
    if src.is_contiguous() {
        let slice = unsafe { std::slice::from_raw_parts(src.ptr(), total_len(src.dims())) };
        let mut remaining = n;
        for &value in slice {
            if predicate(value) {
                remaining -= 1;
                if remaining == 0 {
                    return Ok(true);
                }
            }
        }
        return Ok(false);
    }
    let src_ptr = src.ptr();
    let mut remaining = n;
    let complete = for_each_indexed(src.dims(), &[src.strides()], |_coords, offsets| {
        let value = unsafe { *src_ptr.offset(offsets[0]) };
        if predicate(value) {
            remaining -= 1;
            if remaining == 0 {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(!complete)
}

/// First element satisfying the predicate, in logical index order.
///
/// "First" is defined on the logical coordinate order of the input, so this
/// never goes through the loop-interchange plan.
pub fn find<T: Copy, P>(src: &StridedView<'_, T>, mut predicate: P) -> Result<Option<T>>
where
    P: FnMut(T) -> bool,
{
    let mut found = None;
    let src_ptr = src.ptr();
    for_each_indexed(src.dims(), &[src.strides()], |_coords, offsets| {
        let value = unsafe { *src_ptr.offset(offsets[0]) };
        if predicate(value) {
            found = Some(value);
            Ok(ControlFlow::Break(()))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    })?;
    Ok(found)
}

/// Coordinate of the first element satisfying the predicate, in logical
/// index order.
pub fn find_index<T: Copy, P>(
    src: &StridedView<'_, T>,
    mut predicate: P,
) -> Result<Option<Vec<usize>>>
where
    P: FnMut(T) -> bool,
{
    let mut found = None;
    let src_ptr = src.ptr();
    for_each_indexed(src.dims(), &[src.strides()], |coords, offsets| {
        let value = unsafe { *src_ptr.offset(offsets[0]) };
        if predicate(value) {
            found = Some(coords.to_vec());
            Ok(ControlFlow::Break(()))
        } else {
            Ok(ControlFlow::Continue(()))
        }
    })?;
    Ok(found)
}

// ============================================================================
// Per-dimension variants
// ============================================================================

/// Shared wrapper: validate axes, allocate the kept-shape output, run the
/// driver, apply keepdims.
fn reduce_dims<T: Copy, U: Copy, K>(
    src: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
    init: U,
    kernel: K,
) -> Result<StridedArray<U>>
where
    K: FnMut(&StridedView<'_, T>) -> U,
{
    let axes = normalize_axes(axes, src.ndim())?;
    let kept = reduced_shape(src.dims(), &axes, false);
    let mut out = StridedArray::from_elem(&kept, src.order(), init);
    reduce_subarrays(src, &mut out.view_mut(), &axes, kernel)?;
    if keepdims {
        out.into_shape(&reduced_shape(src.dims(), &axes, true))
    } else {
        Ok(out)
    }
}

/// Per-coordinate `any` over the reduced dimensions.
pub fn any_dims<T: Truthy>(
    src: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<bool>> {
    reduce_dims(src, axes, keepdims, false, |sub| {
        sub.iter().any(|v| v.is_truthy())
    })
}

/// Per-coordinate `all` over the reduced dimensions.
pub fn all_dims<T: Truthy>(
    src: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<bool>> {
    reduce_dims(src, axes, keepdims, true, |sub| {
        sub.iter().all(|v| v.is_truthy())
    })
}

/// Per-coordinate truthy count over the reduced dimensions.
pub fn count_truthy_dims<T: Truthy>(
    src: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<usize>> {
    reduce_dims(src, axes, keepdims, 0usize, |sub| {
        sub.iter().filter(|v| v.is_truthy()).count()
    })
}

/// Per-coordinate falsy count over the reduced dimensions.
pub fn count_falsy_dims<T: Truthy>(
    src: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<usize>> {
    reduce_dims(src, axes, keepdims, 0usize, |sub| {
        sub.iter().filter(|v| !v.is_truthy()).count()
    })
}

/// Per-coordinate membership test over the reduced dimensions.
///
/// `search` holds one search element per kept coordinate; it is broadcast
/// against the kept shape, so a rank-0 view searches the same element
/// everywhere.
pub fn includes_dims<T: Scalar>(
    src: &StridedView<'_, T>,
    search: &StridedView<'_, T>,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<bool>> {
    let axes = normalize_axes(axes, src.ndim())?;
    let kept = reduced_shape(src.dims(), &axes, false);
    let search = maybe_broadcast(search, &kept, &[])?;
    let mut out = StridedArray::from_elem(&kept, src.order(), false);
    reduce_subarrays_with(src, &search, &mut out.view_mut(), &axes, |sub, aux| {
        let target = aux.get(&[]);
        sub.iter().any(|v| v == target)
    })?;
    if keepdims {
        out.into_shape(&reduced_shape(src.dims(), &axes, true))
    } else {
        Ok(out)
    }
}

/// Per-coordinate "at least `n` matches" over the reduced dimensions.
pub fn some_by_dims<T: Copy, P>(
    src: &StridedView<'_, T>,
    n: usize,
    predicate: P,
    axes: &[isize],
    keepdims: bool,
) -> Result<StridedArray<bool>>
where
    P: Fn(T) -> bool,
{
    reduce_dims(src, axes, keepdims, n == 0, |sub| {
        if n == 0 {
            return true;
        }
        let mut remaining = n;
        for value in sub.iter() {
            if predicate(value) {
                remaining -= 1;
                if remaining == 0 {
                    return true;
                }
            }
        }
        false
    })
}

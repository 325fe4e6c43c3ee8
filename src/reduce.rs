//! Full reduction and the sub-array reduction driver.
//!
//! The driver splits the input's dimensions into a reduced set (collapsed
//! inside the kernel) and the complementary kept set (iterated here, one
//! output scalar per kept coordinate). All the concrete reduction operations
//! share this bookkeeping and differ only in the kernel they supply.

use std::sync::Arc;

use crate::kernel::{build_plan, build_plan_fused, for_each_inner_block, for_each_offset, total_len};
use crate::view::{StridedView, StridedViewMut};
use crate::Result;

/// Full reduction: fold `reduce_fn` over `map_fn` applied to every element.
pub fn reduce<T: Copy, M, R, U>(
    src: &StridedView<'_, T>,
    map_fn: M,
    reduce_fn: R,
    init: U,
) -> Result<U>
where
    M: Fn(T) -> U,
    R: Fn(U, U) -> U,
    U: Clone,
{
    if src.is_empty() {
        return Ok(init);
    }

    if src.is_contiguous() {
        let len = total_len(src.dims());
        let slice = unsafe { std::slice::from_raw_parts(src.ptr(), len) };
        let mut acc = init;
        for &val in slice {
            acc = reduce_fn(acc, map_fn(val));
        }
        return Ok(acc);
    }

    let strides_list = [src.strides()];
    let (fused_dims, plan) = build_plan_fused(
        src.dims(),
        &strides_list,
        None,
        std::mem::size_of::<T>(),
    );

    let src_ptr = src.ptr();
    let mut acc = init;
    for_each_inner_block(&fused_dims, &plan, &strides_list, |offsets, len, strides| {
        let mut ptr = unsafe { src_ptr.offset(offsets[0]) };
        let stride = strides[0];
        for _ in 0..len {
            acc = reduce_fn(acc.clone(), map_fn(unsafe { *ptr }));
            unsafe {
                ptr = ptr.offset(stride);
            }
        }
        Ok(())
    })?;

    Ok(acc)
}

/// Output shape after reducing `axes` (normalized, unique) out of `dims`.
///
/// With `keepdims` the reduced axes stay as size-1 entries in their original
/// positions; without it they are omitted and later dimensions shift down.
pub fn reduced_shape(dims: &[usize], axes: &[usize], keepdims: bool) -> Vec<usize> {
    let mut out = Vec::with_capacity(dims.len());
    for (i, &d) in dims.iter().enumerate() {
        if axes.contains(&i) {
            if keepdims {
                out.push(1);
            }
        } else {
            out.push(d);
        }
    }
    out
}

/// Metadata shared by the driver entry points.
struct Partition {
    kept_dims: Vec<usize>,
    kept_strides: Vec<isize>,
    red_dims: Arc<[usize]>,
    red_strides: Arc<[isize]>,
}

fn partition_axes<T>(src: &StridedView<'_, T>, axes: &[usize]) -> Partition {
    let rank = src.ndim();
    let dims = src.dims();
    let strides = src.strides();
    let mut kept_dims = Vec::with_capacity(rank - axes.len());
    let mut kept_strides = Vec::with_capacity(rank - axes.len());
    let mut red_dims = Vec::with_capacity(axes.len());
    let mut red_strides = Vec::with_capacity(axes.len());
    for i in 0..rank {
        if axes.contains(&i) {
            red_dims.push(dims[i]);
            red_strides.push(strides[i]);
        } else {
            kept_dims.push(dims[i]);
            kept_strides.push(strides[i]);
        }
    }
    Partition {
        kept_dims,
        kept_strides,
        red_dims: Arc::from(red_dims),
        red_strides: Arc::from(red_strides),
    }
}

/// Reduce the dimensions in `axes` to one scalar per kept coordinate.
///
/// `axes` must arrive normalized and deduplicated (see
/// [`crate::normalize_axes`]); `dest`'s shape must equal the kept sizes —
/// public wrappers validate both, the driver only debug-asserts. The kernel
/// receives a transient sub-view over exactly the reduced dimensions, offset
/// to the current kept coordinate.
pub fn reduce_subarrays<T: Copy, U: Copy, K>(
    src: &StridedView<'_, T>,
    dest: &mut StridedViewMut<'_, U>,
    axes: &[usize],
    mut kernel: K,
) -> Result<()>
where
    K: FnMut(&StridedView<'_, T>) -> U,
{
    let part = partition_axes(src, axes);
    debug_assert_eq!(dest.dims(), &part.kept_dims[..]);

    let strides_list = [dest.strides(), &part.kept_strides[..]];
    let elem_size = std::mem::size_of::<T>().max(std::mem::size_of::<U>());
    let plan = build_plan(&part.kept_dims, &strides_list, Some(0), elem_size);

    let dst_ptr = dest.mut_ptr();
    for_each_offset(&part.kept_dims, &plan, &strides_list, |offsets| {
        let sub = src.derive(part.red_dims.clone(), part.red_strides.clone(), offsets[1]);
        let value = kernel(&sub);
        unsafe {
            *dst_ptr.offset(offsets[0]) = value;
        }
        Ok(())
    })
}

/// [`reduce_subarrays`] with one auxiliary operand.
///
/// `extra` spans the kept coordinates (shape equal to the kept sizes, often
/// by broadcasting); the kernel receives its rank-0 sub-view alongside the
/// reduced input sub-view. This is how `includes` takes a per-coordinate
/// search element.
pub fn reduce_subarrays_with<T: Copy, E: Copy, U: Copy, K>(
    src: &StridedView<'_, T>,
    extra: &StridedView<'_, E>,
    dest: &mut StridedViewMut<'_, U>,
    axes: &[usize],
    mut kernel: K,
) -> Result<()>
where
    K: FnMut(&StridedView<'_, T>, &StridedView<'_, E>) -> U,
{
    let part = partition_axes(src, axes);
    debug_assert_eq!(dest.dims(), &part.kept_dims[..]);
    debug_assert_eq!(extra.dims(), &part.kept_dims[..]);

    let scalar_dims: Arc<[usize]> = Arc::from(Vec::new());
    let scalar_strides: Arc<[isize]> = Arc::from(Vec::new());

    let strides_list = [dest.strides(), &part.kept_strides[..], extra.strides()];
    let elem_size = std::mem::size_of::<T>().max(std::mem::size_of::<U>());
    let plan = build_plan(&part.kept_dims, &strides_list, Some(0), elem_size);

    let dst_ptr = dest.mut_ptr();
    for_each_offset(&part.kept_dims, &plan, &strides_list, |offsets| {
        let sub = src.derive(part.red_dims.clone(), part.red_strides.clone(), offsets[1]);
        let aux = extra.derive(scalar_dims.clone(), scalar_strides.clone(), offsets[2]);
        let value = kernel(&sub, &aux);
        unsafe {
            *dst_ptr.offset(offsets[0]) = value;
        }
        Ok(())
    })
}

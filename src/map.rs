//! Element-wise write drivers.
//!
//! All drivers validate shapes before any element is touched, take a
//! contiguous fast path when every operand is linear in the same layout, and
//! otherwise run the planned blocked engine. The indexed variants traverse in
//! logical order and honor the [`KernelWrite`] skip convention.

use std::ops::ControlFlow;

use crate::broadcast::maybe_broadcast;
use crate::kernel::{
    build_plan_fused, ensure_same_shape, for_each_indexed, for_each_inner_block, total_len,
    KernelWrite,
};
use crate::view::{StridedView, StridedViewMut};
use crate::Result;

/// Whether `dest` and `src` can be walked as two flat slices in step.
fn same_linear_layout<T, U>(dest: &StridedViewMut<'_, T>, src: &StridedView<'_, U>) -> bool {
    dest.order() == src.order() && dest.is_contiguous() && src.is_contiguous()
}

/// Copy `src` into `dest` element-wise. Shapes must match.
pub fn copy_into<T: Copy>(dest: &mut StridedViewMut<'_, T>, src: &StridedView<'_, T>) -> Result<()> {
    map_into(dest, src, |x| x)
}

/// Fill `dest` with a single value.
pub fn fill<T: Copy>(dest: &mut StridedViewMut<'_, T>, value: T) -> Result<()> {
    if dest.is_contiguous() {
        let len = total_len(dest.dims());
        let slice = unsafe { std::slice::from_raw_parts_mut(dest.mut_ptr(), len) };
        slice.fill(value);
        return Ok(());
    }

    let dims = dest.dims().to_vec();
    let strides_list = [dest.strides()];
    let (fused_dims, plan) =
        build_plan_fused(&dims, &strides_list, Some(0), std::mem::size_of::<T>());
    let dst_ptr = dest.mut_ptr();
    for_each_inner_block(&fused_dims, &plan, &strides_list, |offsets, len, strides| {
        let mut ptr = unsafe { dst_ptr.offset(offsets[0]) };
        let stride = strides[0];
        for _ in 0..len {
            unsafe {
                *ptr = value;
                ptr = ptr.offset(stride);
            }
        }
        Ok(())
    })
}

/// Apply `f` element-wise from `src` into `dest`. Shapes must match.
pub fn map_into<T: Copy, U: Copy, F>(
    dest: &mut StridedViewMut<'_, U>,
    src: &StridedView<'_, T>,
    f: F,
) -> Result<()>
where
    F: Fn(T) -> U,
{
    ensure_same_shape(dest.dims(), src.dims())?;

    if same_linear_layout(dest, src) {
        let len = total_len(dest.dims());
        let mut dst_ptr = dest.mut_ptr();
        let mut src_ptr = src.ptr();
        for _ in 0..len {
            unsafe {
                *dst_ptr = f(*src_ptr);
                dst_ptr = dst_ptr.add(1);
                src_ptr = src_ptr.add(1);
            }
        }
        return Ok(());
    }

    let dims = dest.dims().to_vec();
    let strides_list = [dest.strides(), src.strides()];
    let elem_size = std::mem::size_of::<T>().max(std::mem::size_of::<U>());
    let (fused_dims, plan) = build_plan_fused(&dims, &strides_list, Some(0), elem_size);
    let dst_ptr = dest.mut_ptr();
    let src_ptr = src.ptr();
    for_each_inner_block(&fused_dims, &plan, &strides_list, |offsets, len, strides| {
        let mut dst = unsafe { dst_ptr.offset(offsets[0]) };
        let mut s = unsafe { src_ptr.offset(offsets[1]) };
        let (dst_stride, src_stride) = (strides[0], strides[1]);
        for _ in 0..len {
            unsafe {
                *dst = f(*s);
                dst = dst.offset(dst_stride);
                s = s.offset(src_stride);
            }
        }
        Ok(())
    })
}

/// Apply `f` element-wise over two inputs into `dest`.
///
/// Inputs are broadcast against the destination shape; inputs already at the
/// destination shape pass through without allocation.
pub fn zip_map2_into<A: Copy, B: Copy, U: Copy, F>(
    dest: &mut StridedViewMut<'_, U>,
    a: &StridedView<'_, A>,
    b: &StridedView<'_, B>,
    f: F,
) -> Result<()>
where
    F: Fn(A, B) -> U,
{
    let target = dest.dims().to_vec();
    let a = maybe_broadcast(a, &target, &[])?;
    let b = maybe_broadcast(b, &target, &[])?;

    if same_linear_layout(dest, &a) && dest.order() == b.order() && b.is_contiguous() {
        let len = total_len(dest.dims());
        let mut dst_ptr = dest.mut_ptr();
        let mut a_ptr = a.ptr();
        let mut b_ptr = b.ptr();
        for _ in 0..len {
            unsafe {
                *dst_ptr = f(*a_ptr, *b_ptr);
                dst_ptr = dst_ptr.add(1);
                a_ptr = a_ptr.add(1);
                b_ptr = b_ptr.add(1);
            }
        }
        return Ok(());
    }

    let strides_list = [dest.strides(), a.strides(), b.strides()];
    let elem_size = std::mem::size_of::<A>()
        .max(std::mem::size_of::<B>())
        .max(std::mem::size_of::<U>());
    let (fused_dims, plan) = build_plan_fused(&target, &strides_list, Some(0), elem_size);
    let dst_ptr = dest.mut_ptr();
    let a_ptr = a.ptr();
    let b_ptr = b.ptr();
    for_each_inner_block(&fused_dims, &plan, &strides_list, |offsets, len, strides| {
        let mut dst = unsafe { dst_ptr.offset(offsets[0]) };
        let mut pa = unsafe { a_ptr.offset(offsets[1]) };
        let mut pb = unsafe { b_ptr.offset(offsets[2]) };
        let (ds, sa, sb) = (strides[0], strides[1], strides[2]);
        for _ in 0..len {
            unsafe {
                *dst = f(*pa, *pb);
                dst = dst.offset(ds);
                pa = pa.offset(sa);
                pb = pb.offset(sb);
            }
        }
        Ok(())
    })
}

/// Apply a coordinate-aware kernel from `src` into `dest`, in logical index
/// order. A [`KernelWrite::Skip`] return leaves the destination element
/// untouched at that coordinate.
pub fn map_indexed_into<T: Copy, U: Copy, F>(
    dest: &mut StridedViewMut<'_, U>,
    src: &StridedView<'_, T>,
    mut f: F,
) -> Result<()>
where
    F: FnMut(T, &[usize]) -> KernelWrite<U>,
{
    ensure_same_shape(dest.dims(), src.dims())?;

    let dims = dest.dims().to_vec();
    let strides_list = [dest.strides(), src.strides()];
    let dst_ptr = dest.mut_ptr();
    let src_ptr = src.ptr();
    for_each_indexed(&dims, &strides_list, |coords, offsets| {
        let value = unsafe { *src_ptr.offset(offsets[1]) };
        match f(value, coords) {
            KernelWrite::Write(out) => unsafe { *dst_ptr.offset(offsets[0]) = out },
            KernelWrite::Skip => {}
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}

/// Fill `dest` from a coordinate function, in logical index order, honoring
/// the [`KernelWrite`] skip convention.
pub fn fill_by<U: Copy, F>(dest: &mut StridedViewMut<'_, U>, mut f: F) -> Result<()>
where
    F: FnMut(&[usize]) -> KernelWrite<U>,
{
    let dims = dest.dims().to_vec();
    let strides_list = [dest.strides()];
    let dst_ptr = dest.mut_ptr();
    for_each_indexed(&dims, &strides_list, |coords, offsets| {
        match f(coords) {
            KernelWrite::Write(out) => unsafe { *dst_ptr.offset(offsets[0]) = out },
            KernelWrite::Skip => {}
        }
        Ok(ControlFlow::Continue(()))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{MemoryOrder, StridedArray};
    use crate::StridedError;

    fn make_tensor(rows: usize, cols: usize) -> StridedArray<f64> {
        StridedArray::from_fn(&[rows, cols], MemoryOrder::RowMajor, |idx| {
            (idx[0] * cols + idx[1]) as f64
        })
    }

    #[test]
    fn test_map_into_contiguous() {
        let a = make_tensor(4, 5);
        let mut out = StridedArray::from_elem(&[4, 5], MemoryOrder::RowMajor, 0.0);
        map_into(&mut out.view_mut(), &a.view(), |x| x * 2.0).unwrap();
        for i in 0..4 {
            for j in 0..5 {
                assert_eq!(out.get(&[i, j]), a.get(&[i, j]) * 2.0);
            }
        }
    }

    #[test]
    fn test_map_into_transposed() {
        let a = make_tensor(8, 5);
        let a_view = a.view();
        let a_t = a_view.permute(&[1, 0]).unwrap();
        let mut out = StridedArray::from_elem(&[5, 8], MemoryOrder::RowMajor, 0.0);
        map_into(&mut out.view_mut(), &a_t, |x| x + 1.0).unwrap();
        for i in 0..5 {
            for j in 0..8 {
                assert_eq!(out.get(&[i, j]), a.get(&[j, i]) + 1.0);
            }
        }
    }

    #[test]
    fn test_map_into_shape_mismatch() {
        let a = make_tensor(2, 3);
        let mut out = StridedArray::from_elem(&[3, 2], MemoryOrder::RowMajor, 0.0);
        assert!(matches!(
            map_into(&mut out.view_mut(), &a.view(), |x| x),
            Err(StridedError::ShapeMismatch(..))
        ));
    }

    #[test]
    fn test_map_into_changes_type() {
        let a = make_tensor(2, 3);
        let mut out = StridedArray::from_elem(&[2, 3], MemoryOrder::RowMajor, false);
        map_into(&mut out.view_mut(), &a.view(), |x| x > 2.0).unwrap();
        assert!(!out.get(&[0, 0]));
        assert!(out.get(&[1, 2]));
    }

    #[test]
    fn test_zip_map2_broadcasts_inputs() {
        let a = make_tensor(4, 3);
        let row = StridedArray::from_fn(&[1, 3], MemoryOrder::RowMajor, |idx| {
            (idx[1] * 100) as f64
        });
        let mut out = StridedArray::from_elem(&[4, 3], MemoryOrder::RowMajor, 0.0);
        zip_map2_into(&mut out.view_mut(), &a.view(), &row.view(), |x, y| x + y).unwrap();
        for i in 0..4 {
            for j in 0..3 {
                assert_eq!(out.get(&[i, j]), a.get(&[i, j]) + (j * 100) as f64);
            }
        }
    }

    #[test]
    fn test_zip_map2_mixed_strides() {
        let a = make_tensor(6, 4);
        let b = make_tensor(6, 4);
        let a_view = a.view();
        let b_view = b.view();
        let a_t = a_view.permute(&[1, 0]).unwrap();
        let b_t = b_view.permute(&[1, 0]).unwrap();
        let mut out = StridedArray::from_elem(&[4, 6], MemoryOrder::RowMajor, 0.0);
        zip_map2_into(&mut out.view_mut(), &a_t, &b_t, |x, y| x + y).unwrap();
        for i in 0..4 {
            for j in 0..6 {
                assert_eq!(out.get(&[i, j]), a.get(&[j, i]) + b.get(&[j, i]));
            }
        }
    }

    #[test]
    fn test_zip_map2_incompatible() {
        let a = make_tensor(4, 3);
        let b = make_tensor(4, 2);
        let mut out = StridedArray::from_elem(&[4, 3], MemoryOrder::RowMajor, 0.0);
        assert!(matches!(
            zip_map2_into(&mut out.view_mut(), &a.view(), &b.view(), |x, y| x + y),
            Err(StridedError::BroadcastIncompatible { .. })
        ));
    }

    #[test]
    fn test_fill() {
        let mut out = StridedArray::from_elem(&[3, 3], MemoryOrder::ColMajor, 0.0);
        fill(&mut out.view_mut(), 7.5).unwrap();
        assert!(out.as_slice().iter().all(|&x| x == 7.5));
    }

    #[test]
    fn test_fill_by_skip_leaves_untouched() {
        let mut out = StridedArray::from_elem(&[2, 3], MemoryOrder::RowMajor, -1i32);
        fill_by(&mut out.view_mut(), |coords| {
            if (coords[0] + coords[1]) % 2 == 0 {
                KernelWrite::Write((coords[0] * 3 + coords[1]) as i32)
            } else {
                KernelWrite::Skip
            }
        })
        .unwrap();
        assert_eq!(out.as_slice(), &[0, -1, 2, -1, 4, -1]);
    }

    #[test]
    fn test_map_indexed_filtering() {
        let a = make_tensor(2, 2);
        let mut out = StridedArray::from_elem(&[2, 2], MemoryOrder::RowMajor, f64::NAN);
        map_indexed_into(&mut out.view_mut(), &a.view(), |x, coords| {
            if coords[0] == coords[1] {
                KernelWrite::Write(x * 10.0)
            } else {
                KernelWrite::Skip
            }
        })
        .unwrap();
        assert_eq!(out.get(&[0, 0]), 0.0);
        assert!(out.get(&[0, 1]).is_nan());
        assert!(out.get(&[1, 0]).is_nan());
        assert_eq!(out.get(&[1, 1]), 30.0);
    }
}

//! Dynamic-rank strided view types.
//!
//! A view is an immutable descriptor over a flat buffer it does not own:
//! dims + strides (element units, zero and negative allowed) + offset +
//! nominal memory order. Operations that "change" a view (permute, slice,
//! reverse, broadcast) return a new view aliasing the same buffer.

use std::sync::Arc;

use crate::{Result, StridedError};

// ============================================================================
// Memory order
// ============================================================================

/// Nominal memory layout of a view.
///
/// Declares which layout the strides were derived from; used by the
/// loop-ordering heuristics and by contiguity checks. Actual strides may be
/// arbitrary (permuted, reversed, broadcast).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOrder {
    /// C layout: last index varies fastest.
    RowMajor,
    /// Fortran layout: first index varies fastest.
    ColMajor,
}

impl MemoryOrder {
    /// Contiguous strides for `dims` under this layout.
    pub fn strides_for(self, dims: &[usize]) -> Vec<isize> {
        match self {
            MemoryOrder::RowMajor => row_major_strides(dims),
            MemoryOrder::ColMajor => col_major_strides(dims),
        }
    }
}

/// Compute column-major strides (first index varies fastest).
pub fn col_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in 1..rank {
        strides[i] = strides[i - 1] * dims[i - 1] as isize;
    }
    strides
}

/// Compute row-major strides (last index varies fastest).
pub fn row_major_strides(dims: &[usize]) -> Vec<isize> {
    let rank = dims.len();
    if rank == 0 {
        return vec![];
    }
    let mut strides = vec![1isize; rank];
    for i in (0..rank - 1).rev() {
        strides[i] = strides[i + 1] * dims[i + 1] as isize;
    }
    strides
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that every reachable offset stays within `[0, len)`.
///
/// Bounds are established once at construction; traversal does not re-check
/// per access.
fn validate_bounds(len: usize, dims: &[usize], strides: &[isize], offset: isize) -> Result<()> {
    if dims.len() != strides.len() {
        return Err(StridedError::StrideLengthMismatch);
    }
    if offset < 0 {
        return Err(StridedError::OffsetOverflow);
    }
    // Empty array: no element is ever accessed, but keep the base offset
    // inside the allocation so pointer derivation stays sound.
    if dims.iter().any(|&d| d == 0) {
        if offset as usize > len {
            return Err(StridedError::OffsetOverflow);
        }
        return Ok(());
    }
    let mut min_offset = offset;
    let mut max_offset = offset;
    for (&dim, &stride) in dims.iter().zip(strides.iter()) {
        if dim > 1 {
            let end = stride
                .checked_mul(dim as isize - 1)
                .ok_or(StridedError::OffsetOverflow)?;
            if end >= 0 {
                max_offset = max_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            } else {
                min_offset = min_offset
                    .checked_add(end)
                    .ok_or(StridedError::OffsetOverflow)?;
            }
        }
    }
    if min_offset < 0 {
        return Err(StridedError::OffsetOverflow);
    }
    if max_offset as usize >= len {
        return Err(StridedError::OffsetOverflow);
    }
    Ok(())
}

pub(crate) fn contiguous_for_order(dims: &[usize], strides: &[isize], order: MemoryOrder) -> bool {
    let mut expected = 1isize;
    let check = |i: usize, expected: &mut isize| -> bool {
        if dims[i] <= 1 {
            return true;
        }
        if strides[i] != *expected {
            return false;
        }
        *expected *= dims[i] as isize;
        true
    };
    match order {
        MemoryOrder::RowMajor => {
            for i in (0..dims.len()).rev() {
                if !check(i, &mut expected) {
                    return false;
                }
            }
        }
        MemoryOrder::ColMajor => {
            for i in 0..dims.len() {
                if !check(i, &mut expected) {
                    return false;
                }
            }
        }
    }
    true
}

// ============================================================================
// StridedView
// ============================================================================

/// Dynamic-rank immutable strided view.
///
/// Rank 0 (`dims == []`) denotes a scalar view with a single element at
/// `offset`. Shape and stride metadata is `Arc`-shared, so cloning and
/// derivation never copy element data.
pub struct StridedView<'a, T> {
    ptr: *const T,
    data: &'a [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    order: MemoryOrder,
}

unsafe impl<T: Send> Send for StridedView<'_, T> {}
unsafe impl<T: Sync> Sync for StridedView<'_, T> {}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
        }
    }
}

impl<T> std::fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedView")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a new immutable strided view from a borrowed slice.
    pub fn new(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: MemoryOrder,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        let ptr = unsafe { data.as_ptr().offset(offset) };
        Ok(Self {
            ptr,
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
        })
    }

    /// Create a view without bounds checking.
    ///
    /// # Safety
    /// The caller must ensure all reachable offsets stay within bounds.
    pub unsafe fn new_unchecked(
        data: &'a [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: MemoryOrder,
    ) -> Self {
        let ptr = data.as_ptr().offset(offset);
        Self {
            ptr,
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
        }
    }

    /// Derive a view over the same buffer from shared metadata.
    ///
    /// Used by broadcasting and the reduction driver, whose shapes are
    /// constructed from already-validated traversal state.
    pub(crate) fn derive(
        &self,
        dims: Arc<[usize]>,
        strides: Arc<[isize]>,
        delta: isize,
    ) -> StridedView<'a, T> {
        let offset = self.offset + delta;
        StridedView {
            ptr: unsafe { self.data.as_ptr().offset(offset) },
            data: self.data,
            dims,
            strides,
            offset,
            order: self.order,
        }
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of logical elements (1 for rank 0).
    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    #[inline]
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Raw const pointer to the element at coordinate (0, ..., 0).
    #[inline]
    pub fn ptr(&self) -> *const T {
        self.ptr
    }

    /// Permute dimensions.
    pub fn permute(&self, perm: &[usize]) -> Result<StridedView<'a, T>> {
        let rank = self.dims.len();
        if perm.len() != rank {
            return Err(StridedError::RankMismatch(perm.len(), rank));
        }
        let mut seen = vec![false; rank];
        for &p in perm {
            if p >= rank {
                return Err(StridedError::InvalidAxis {
                    axis: p as isize,
                    rank,
                });
            }
            if seen[p] {
                return Err(StridedError::DuplicateAxis { axis: p });
            }
            seen[p] = true;
        }
        let new_dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let new_strides: Vec<isize> = perm.iter().map(|&p| self.strides[p]).collect();
        Ok(self.derive(Arc::from(new_dims), Arc::from(new_strides), 0))
    }

    /// Reverse traversal direction along `axis`.
    ///
    /// The stride is negated and the offset shifted to the last element of
    /// the axis, so coordinate 0 maps to what was the highest coordinate.
    pub fn reverse(&self, axis: usize) -> Result<StridedView<'a, T>> {
        let rank = self.dims.len();
        if axis >= rank {
            return Err(StridedError::InvalidAxis {
                axis: axis as isize,
                rank,
            });
        }
        let mut strides: Vec<isize> = self.strides.to_vec();
        let d = self.dims[axis];
        let delta = if d > 0 {
            (d as isize - 1) * strides[axis]
        } else {
            0
        };
        strides[axis] = -strides[axis];
        Ok(self.derive(self.dims.clone(), Arc::from(strides), delta))
    }

    /// Take `len` elements along `axis` starting at `start`, stepping by
    /// `step` source elements per output element.
    pub fn slice_axis(
        &self,
        axis: usize,
        start: usize,
        len: usize,
        step: isize,
    ) -> Result<StridedView<'a, T>> {
        let rank = self.dims.len();
        if axis >= rank {
            return Err(StridedError::InvalidAxis {
                axis: axis as isize,
                rank,
            });
        }
        if step == 0 {
            return Err(StridedError::OffsetOverflow);
        }
        // The furthest coordinate reached must stay inside the axis.
        if len > 0 {
            let last = start as isize + (len as isize - 1) * step;
            if start >= self.dims[axis] || last < 0 || last >= self.dims[axis] as isize {
                return Err(StridedError::OffsetOverflow);
            }
        }
        let mut dims: Vec<usize> = self.dims.to_vec();
        let mut strides: Vec<isize> = self.strides.to_vec();
        let delta = if len > 0 {
            start as isize * strides[axis]
        } else {
            0
        };
        dims[axis] = len;
        strides[axis] *= step;
        Ok(self.derive(Arc::from(dims), Arc::from(strides), delta))
    }

    /// Collapse to rank 1. Requires the view to be contiguous in its
    /// declared memory order.
    pub fn flatten(&self) -> Result<StridedView<'a, T>> {
        if !self.is_contiguous() {
            return Err(StridedError::ShapeMismatch(
                self.dims.to_vec(),
                vec![self.len()],
            ));
        }
        let total = self.len();
        Ok(self.derive(Arc::from(vec![total]), Arc::from(vec![1isize]), 0))
    }

    /// Whether the view is contiguous in its declared memory order.
    pub fn is_contiguous(&self) -> bool {
        contiguous_for_order(&self.dims, &self.strides, self.order)
    }
}

impl<'a, T: Copy> StridedView<'a, T> {
    /// Buffer index for a coordinate tuple.
    #[inline]
    fn linear_index(&self, indices: &[usize]) -> isize {
        let mut idx = self.offset;
        for (&i, &s) in indices.iter().zip(self.strides.iter()) {
            idx += i as isize * s;
        }
        idx
    }

    /// Get the element at the given coordinate.
    ///
    /// # Panics
    /// Panics if the coordinate rank or any index is out of bounds.
    #[inline]
    pub fn get(&self, indices: &[usize]) -> T {
        assert_eq!(indices.len(), self.dims.len(), "coordinate rank mismatch");
        for (&i, &d) in indices.iter().zip(self.dims.iter()) {
            assert!(i < d, "index out of bounds");
        }
        self.data[self.linear_index(indices) as usize]
    }

    /// Get the element at the given coordinate without bounds checking.
    ///
    /// # Safety
    /// The caller must ensure the coordinate is within bounds.
    #[inline]
    pub unsafe fn get_unchecked(&self, indices: &[usize]) -> T {
        *self.data.get_unchecked(self.linear_index(indices) as usize)
    }

    /// Iterator over elements in logical index order (last index fastest).
    pub fn iter(&self) -> StridedIter<'a, T> {
        StridedIter {
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            indices: vec![0; self.dims.len()],
            exhausted: self.is_empty(),
        }
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// Dynamic-rank mutable strided view.
pub struct StridedViewMut<'a, T> {
    ptr: *mut T,
    data: &'a mut [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    order: MemoryOrder,
}

unsafe impl<T: Send> Send for StridedViewMut<'_, T> {}
unsafe impl<T: Sync> Sync for StridedViewMut<'_, T> {}

impl<T> std::fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("dims", &self.dims)
            .field("strides", &self.strides)
            .field("offset", &self.offset)
            .field("order", &self.order)
            .finish()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a new mutable strided view from a borrowed slice.
    pub fn new(
        data: &'a mut [T],
        dims: &[usize],
        strides: &[isize],
        offset: isize,
        order: MemoryOrder,
    ) -> Result<Self> {
        validate_bounds(data.len(), dims, strides, offset)?;
        let ptr = unsafe { data.as_mut_ptr().offset(offset) };
        Ok(Self {
            ptr,
            data,
            dims: Arc::from(dims),
            strides: Arc::from(strides),
            offset,
            order,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn offset(&self) -> isize {
        self.offset
    }

    #[inline]
    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|&d| d == 0)
    }

    /// Raw mutable pointer to the element at coordinate (0, ..., 0).
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub(crate) fn mut_ptr(&self) -> *mut T {
        self.ptr
    }

    /// Reborrow as an immutable view.
    #[inline]
    pub fn as_view(&self) -> StridedView<'_, T> {
        StridedView {
            ptr: self.ptr,
            data: self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: self.offset,
            order: self.order,
        }
    }

    /// Whether the view is contiguous in its declared memory order.
    pub fn is_contiguous(&self) -> bool {
        contiguous_for_order(&self.dims, &self.strides, self.order)
    }

    #[inline]
    fn linear_index(&self, indices: &[usize]) -> isize {
        let mut idx = self.offset;
        for (&i, &s) in indices.iter().zip(self.strides.iter()) {
            idx += i as isize * s;
        }
        idx
    }
}

impl<'a, T: Copy> StridedViewMut<'a, T> {
    /// Get the element at the given coordinate.
    #[inline]
    pub fn get(&self, indices: &[usize]) -> T {
        assert_eq!(indices.len(), self.dims.len(), "coordinate rank mismatch");
        for (&i, &d) in indices.iter().zip(self.dims.iter()) {
            assert!(i < d, "index out of bounds");
        }
        self.data[self.linear_index(indices) as usize]
    }

    /// Set the element at the given coordinate.
    #[inline]
    pub fn set(&mut self, indices: &[usize], value: T) {
        assert_eq!(indices.len(), self.dims.len(), "coordinate rank mismatch");
        for (&i, &d) in indices.iter().zip(self.dims.iter()) {
            assert!(i < d, "index out of bounds");
        }
        let idx = self.linear_index(indices) as usize;
        self.data[idx] = value;
    }
}

// ============================================================================
// Logical-order iteration
// ============================================================================

/// Iterator over a view's elements in logical index order.
pub struct StridedIter<'a, T> {
    data: &'a [T],
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    offset: isize,
    indices: Vec<usize>,
    exhausted: bool,
}

impl<'a, T: Copy> Iterator for StridedIter<'a, T> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        if self.exhausted {
            return None;
        }
        let mut pos = self.offset;
        for (&i, &s) in self.indices.iter().zip(self.strides.iter()) {
            pos += i as isize * s;
        }
        let value = self.data[pos as usize];

        // Odometer advance: last index changes fastest.
        let mut carry = true;
        for i in (0..self.indices.len()).rev() {
            if carry {
                self.indices[i] += 1;
                if self.indices[i] < self.dims[i] {
                    carry = false;
                } else {
                    self.indices[i] = 0;
                }
            }
        }
        if carry {
            self.exhausted = true;
        }
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.exhausted {
            return (0, Some(0));
        }
        let total: usize = self.dims.iter().product();
        let mut done = 0usize;
        let mut multiplier = 1usize;
        for i in (0..self.dims.len()).rev() {
            done += self.indices[i] * multiplier;
            multiplier *= self.dims[i];
        }
        let remaining = total.saturating_sub(done);
        (remaining, Some(remaining))
    }
}

impl<T: Copy> ExactSizeIterator for StridedIter<'_, T> {}

// ============================================================================
// StridedArray
// ============================================================================

/// Owned strided multidimensional array, contiguous in its memory order.
///
/// Exists so drivers and tests can allocate outputs; all traversal operates
/// on the borrowed views it hands out.
#[derive(Debug, Clone)]
pub struct StridedArray<T> {
    data: Vec<T>,
    dims: Arc<[usize]>,
    strides: Arc<[isize]>,
    order: MemoryOrder,
}

impl<T: Copy> StridedArray<T> {
    /// Allocate an array filled with `value`.
    pub fn from_elem(dims: &[usize], order: MemoryOrder, value: T) -> Self {
        let total: usize = dims.iter().product();
        Self {
            data: vec![value; total],
            dims: Arc::from(dims),
            strides: Arc::from(order.strides_for(dims)),
            order,
        }
    }

    /// Allocate an array and fill it from a coordinate function.
    pub fn from_fn(dims: &[usize], order: MemoryOrder, mut f: impl FnMut(&[usize]) -> T) -> Self {
        let total: usize = dims.iter().product();
        let rank = dims.len();
        let mut data = Vec::with_capacity(total);
        let mut indices = vec![0usize; rank];
        for _ in 0..total {
            data.push(f(&indices));
            // Advance in memory order so `data` lands contiguously.
            match order {
                MemoryOrder::RowMajor => {
                    for i in (0..rank).rev() {
                        indices[i] += 1;
                        if indices[i] < dims[i] {
                            break;
                        }
                        indices[i] = 0;
                    }
                }
                MemoryOrder::ColMajor => {
                    for i in 0..rank {
                        indices[i] += 1;
                        if indices[i] < dims[i] {
                            break;
                        }
                        indices[i] = 0;
                    }
                }
            }
        }
        Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(order.strides_for(dims)),
            order,
        }
    }

    /// Wrap existing storage. `data.len()` must equal the product of `dims`.
    pub fn from_vec(data: Vec<T>, dims: &[usize], order: MemoryOrder) -> Result<Self> {
        let total: usize = dims.iter().product();
        if data.len() != total {
            return Err(StridedError::ShapeMismatch(dims.to_vec(), vec![data.len()]));
        }
        Ok(Self {
            data,
            dims: Arc::from(dims),
            strides: Arc::from(order.strides_for(dims)),
            order,
        })
    }

    /// Reinterpret as a new shape with the same element count.
    ///
    /// Owned arrays are contiguous in their memory order, so this only
    /// recomputes strides.
    pub fn into_shape(self, dims: &[usize]) -> Result<Self> {
        let total: usize = dims.iter().product();
        if total != self.data.len() {
            return Err(StridedError::ShapeMismatch(
                self.dims.to_vec(),
                dims.to_vec(),
            ));
        }
        Ok(Self {
            data: self.data,
            dims: Arc::from(dims),
            strides: Arc::from(self.order.strides_for(dims)),
            order: self.order,
        })
    }

    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    #[inline]
    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow as an immutable view.
    pub fn view(&self) -> StridedView<'_, T> {
        StridedView {
            ptr: self.data.as_ptr(),
            data: &self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: 0,
            order: self.order,
        }
    }

    /// Borrow as a mutable view.
    pub fn view_mut(&mut self) -> StridedViewMut<'_, T> {
        let ptr = self.data.as_mut_ptr();
        StridedViewMut {
            ptr,
            data: &mut self.data,
            dims: self.dims.clone(),
            strides: self.strides.clone(),
            offset: 0,
            order: self.order,
        }
    }

    /// Get the element at the given coordinate.
    #[inline]
    pub fn get(&self, indices: &[usize]) -> T {
        self.view().get(indices)
    }

    /// Underlying storage in memory order.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

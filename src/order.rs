//! Stride-order classification and loop-interchange ordering.

/// Access-pattern classification for one operand's strides over a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrideOrder {
    /// Stride magnitudes non-increasing left to right (last index fastest).
    RowMajor,
    /// Stride magnitudes non-decreasing left to right (first index fastest).
    ColMajor,
    /// Consistent with both (rank <= 1, or all magnitudes equal).
    Any,
    /// Neither monotone direction holds.
    None,
}

/// Classify the access pattern of `strides`.
///
/// Zero strides (broadcast dimensions) are neutral: they never break either
/// monotonicity direction.
pub fn strides_order(strides: &[isize]) -> StrideOrder {
    let mags: Vec<usize> = strides
        .iter()
        .map(|s| s.unsigned_abs())
        .filter(|&m| m != 0)
        .collect();
    if mags.len() <= 1 {
        return StrideOrder::Any;
    }
    let row = mags.windows(2).all(|w| w[0] >= w[1]);
    let col = mags.windows(2).all(|w| w[0] <= w[1]);
    match (row, col) {
        (true, true) => StrideOrder::Any,
        (true, false) => StrideOrder::RowMajor,
        (false, true) => StrideOrder::ColMajor,
        (false, false) => StrideOrder::None,
    }
}

/// Compute the relative order of strides.
///
/// `result[i]` is the rank of `|strides[i]|` among all non-zero strides;
/// zero strides have order 1.
pub(crate) fn index_order(strides: &[isize]) -> Vec<usize> {
    let n = strides.len();
    let mut result = vec![1usize; n];
    for i in 0..n {
        let si = strides[i].unsigned_abs();
        if si == 0 {
            continue;
        }
        let mut k = 1usize;
        for &s in strides {
            if s != 0 && s.unsigned_abs() < si {
                k += 1;
            }
        }
        result[i] = k;
    }
    result
}

/// Compute the loop-interchange permutation for a traversal.
///
/// Dimensions are sorted so the smallest combined stride magnitude iterates
/// innermost (position 0 of the returned order). The destination operand,
/// when present, is weighted double — writes dominate locality. Ties fall
/// back to the original dimension order, which is also the canonical result
/// when every operand is disorganized.
pub(crate) fn compute_order(
    dims: &[usize],
    strides_list: &[&[isize]],
    dest_index: Option<usize>,
) -> Vec<usize> {
    let rank = dims.len();
    if rank == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..rank).collect();
    order.sort_by(|&a, &b| {
        let score_a = dim_score(a, strides_list, dest_index);
        let score_b = dim_score(b, strides_list, dest_index);
        score_a.cmp(&score_b).then_with(|| a.cmp(&b))
    });
    order
}

fn dim_score(dim: usize, strides_list: &[&[isize]], dest_index: Option<usize>) -> usize {
    let mut score = 0usize;
    for (i, strides) in strides_list.iter().enumerate() {
        let weight = if dest_index == Some(i) { 2 } else { 1 };
        let stride = strides[dim].unsigned_abs();
        score = score.saturating_add(weight * stride);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strides_order() {
        assert_eq!(strides_order(&[12, 4, 1]), StrideOrder::RowMajor);
        assert_eq!(strides_order(&[1, 2, 6]), StrideOrder::ColMajor);
        assert_eq!(strides_order(&[4, 1, 2]), StrideOrder::None);
        assert_eq!(strides_order(&[1]), StrideOrder::Any);
        assert_eq!(strides_order(&[]), StrideOrder::Any);
        // Negative strides classify by magnitude.
        assert_eq!(strides_order(&[-12, 4, -1]), StrideOrder::RowMajor);
        // Zero strides are neutral.
        assert_eq!(strides_order(&[12, 0, 1]), StrideOrder::RowMajor);
    }

    #[test]
    fn test_index_order() {
        assert_eq!(index_order(&[4, 1, 2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[4, 0, 2]), vec![2, 1, 1]);
        assert_eq!(index_order(&[-4, 1, -2]), vec![3, 1, 2]);
        assert_eq!(index_order(&[3, 3, 3]), vec![1, 1, 1]);
    }

    #[test]
    fn test_compute_order_row_major() {
        // Row-major [2, 3, 4]: innermost should be the last dimension.
        let strides = [12isize, 4, 1];
        let order = compute_order(&[2, 3, 4], &[&strides], Some(0));
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[test]
    fn test_compute_order_col_major() {
        let strides = [1isize, 2, 6];
        let order = compute_order(&[2, 3, 4], &[&strides], Some(0));
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_compute_order_dest_weighted() {
        // Destination row-major vs source column-major: destination wins.
        let dest = [3isize, 1];
        let src = [1isize, 3];
        let order = compute_order(&[3, 3], &[&dest, &src], Some(0));
        assert_eq!(order, vec![1, 0]);
    }

    #[test]
    fn test_compute_order_tie_is_stable() {
        let a = [1isize, 1];
        let order = compute_order(&[2, 2], &[&a], None);
        assert_eq!(order, vec![0, 1]);
    }
}

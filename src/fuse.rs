//! Dimension fusion and per-dimension cost weights.

/// Fuse contiguous dimensions across multiple operands.
///
/// Dimension `i` merges into `i-1` when `strides[k][i] == dims[i-1] *
/// strides[k][i-1]` for every operand `k`: the pair forms one contiguous
/// block and can be iterated as a single longer dimension. Fused-away
/// dimensions are left with size 1 (stride values are unchanged; size-1
/// dimensions are inert in every downstream loop).
pub(crate) fn fuse_dims(dims: &[usize], all_strides: &[&[isize]]) -> Vec<usize> {
    let n = dims.len();
    if n <= 1 || all_strides.is_empty() {
        return dims.to_vec();
    }

    let mut result = dims.to_vec();
    for i in (1..n).rev() {
        let mut can_merge = true;
        for strides in all_strides {
            let expected = result[i - 1] as isize * strides[i - 1];
            if strides[i] != expected {
                can_merge = false;
                break;
            }
        }
        if can_merge {
            result[i - 1] *= result[i];
            result[i] = 1;
        }
    }
    result
}

/// Minimum-stride cost for each dimension, used to pick which block to
/// shrink first: zero -> 1, nonzero -> twice the magnitude.
pub(crate) fn compute_costs(all_strides: &[&[isize]]) -> Vec<isize> {
    if all_strides.is_empty() {
        return vec![];
    }
    let n = all_strides[0].len();
    let mut costs = vec![isize::MAX; n];
    for strides in all_strides {
        for i in 0..n {
            costs[i] = costs[i].min(strides[i].abs());
        }
    }
    for cost in &mut costs {
        if *cost == 0 {
            *cost = 1;
        } else {
            *cost *= 2;
        }
    }
    costs
}

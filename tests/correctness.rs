use approx::assert_relative_eq;
use num_complex::Complex64;
use rand::{rngs::StdRng, Rng, SeedableRng};

use ndstrided::{
    all_dims, any, any_dims, broadcast, broadcast_shapes, copy_into, count_truthy,
    count_truthy_dims, fill_by, find, find_index, includes, includes_dims, map_into,
    maybe_broadcast, normalize_indices, normalize_indices_in_place, reduce, reduce_subarrays,
    reduced_shape, zip_map2_into, KernelWrite, MemoryOrder, StridedArray, StridedError,
    StridedView, INVALID_INDEX,
};

fn make_tensor(dims: &[usize]) -> StridedArray<f64> {
    let mut counter = 0usize;
    StridedArray::from_fn(dims, MemoryOrder::RowMajor, |_| {
        counter += 1;
        counter as f64
    })
}

// ============================================================================
// Broadcasting laws
// ============================================================================

#[test]
fn test_broadcast_noop_value_equality() {
    let a = make_tensor(&[3, 4]);
    let v = a.view();
    let out = broadcast(&v, &[3, 4], &[]).unwrap();
    assert_eq!(out.dims(), v.dims());
    assert_eq!(out.strides(), v.strides());
    for i in 0..3 {
        for j in 0..4 {
            assert_eq!(out.get(&[i, j]), v.get(&[i, j]));
        }
    }
    // The strict variant derives fresh metadata; the maybe variant hands the
    // original back.
    assert!(!std::ptr::eq(out.dims().as_ptr(), v.dims().as_ptr()));
    let same = maybe_broadcast(&v, &[3, 4], &[]).unwrap();
    assert!(std::ptr::eq(same.dims().as_ptr(), v.dims().as_ptr()));
}

#[test]
fn test_broadcast_reads_clamped_source_coordinate() {
    let a = make_tensor(&[2, 1, 3]);
    let v = a.view();
    let out = broadcast(&v, &[4, 2, 5, 3], &[]).unwrap();
    assert_eq!(out.dims(), &[4, 2, 5, 3]);
    for w in 0..4 {
        for x in 0..2 {
            for y in 0..5 {
                for z in 0..3 {
                    assert_eq!(out.get(&[w, x, y, z]), v.get(&[x, 0, z]));
                }
            }
        }
    }
}

#[test]
fn test_broadcast_failure_conditions() {
    let a = make_tensor(&[2, 3]);
    let v = a.view();
    assert!(matches!(
        broadcast(&v, &[3], &[]),
        Err(StridedError::RankMismatch(2, 1))
    ));
    // A simple multiple of the source size is still incompatible.
    assert!(matches!(
        broadcast(&v, &[2, 6], &[]),
        Err(StridedError::BroadcastIncompatible { .. })
    ));
}

#[test]
fn test_broadcast_protected_dim_scenario() {
    // [1, 3] -> [2, 2, 3] with protected [-2] pins the middle axis to the
    // source's size-1 axis: output shape [2, 1, 3].
    let a = make_tensor(&[1, 3]);
    let out = broadcast(&a.view(), &[2, 2, 3], &[-2]).unwrap();
    assert_eq!(out.dims(), &[2, 1, 3]);
    for i in 0..2 {
        for k in 0..3 {
            assert_eq!(out.get(&[i, 0, k]), a.get(&[0, k]));
        }
    }
}

#[test]
fn test_broadcast_shapes_promotion() {
    assert_eq!(
        broadcast_shapes(&[&[8, 1, 6, 1], &[7, 1, 5]]).unwrap(),
        vec![8, 7, 6, 5]
    );
    assert!(broadcast_shapes(&[&[3], &[4]]).is_err());
}

// ============================================================================
// Index normalization
// ============================================================================

#[test]
fn test_normalization_concrete_vector() {
    let out = normalize_indices(&[2, 5, 0, 7, 1, -5, -1, -2, -10, -11], 10).unwrap();
    assert_eq!(out, vec![2, 5, 0, 7, 1, 6, 10, 9, 1, 0]);
    assert_eq!(normalize_indices(&[15], 10), None);
}

#[test]
fn test_normalization_round_trip_range() {
    let max = 10usize;
    for i in -(max as isize + 1)..=(max as isize) {
        let out = normalize_indices(&[i], max).unwrap();
        assert_eq!(out[0] as isize, i.rem_euclid(max as isize + 1));
    }
}

#[test]
fn test_normalization_all_or_nothing_with_markers() {
    let mut batch = [3isize, -12, 5];
    assert!(!normalize_indices_in_place(&mut batch, 10));
    assert_eq!(batch, [3, INVALID_INDEX, 5]);
}

// ============================================================================
// Traversal exhaustiveness
// ============================================================================

#[test]
fn test_traversal_visits_every_coordinate_once() {
    // Copy through wildly different layouts and check the full image.
    let a = make_tensor(&[3, 4, 5]);
    let a_view = a.view();
    let permuted = a_view.permute(&[2, 0, 1]).unwrap();
    let mut out = StridedArray::from_elem(&[5, 3, 4], MemoryOrder::ColMajor, 0.0);
    copy_into(&mut out.view_mut(), &permuted).unwrap();
    for i in 0..5 {
        for j in 0..3 {
            for k in 0..4 {
                assert_eq!(out.get(&[i, j, k]), a.get(&[j, k, i]));
            }
        }
    }
}

#[test]
fn test_traversal_multiset_matches_under_random_layouts() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let rank = rng.gen_range(1..=5);
        let dims: Vec<usize> = (0..rank).map(|_| rng.gen_range(1..4)).collect();
        let a = StridedArray::from_fn(&dims, MemoryOrder::RowMajor, |_| rng.gen_range(0..100));

        // Random permutation plus reversals gives mixed-sign, mixed-order
        // strides; sum and count must not care.
        let view = a.view();
        let mut perm: Vec<usize> = (0..rank).collect();
        for i in (1..rank).rev() {
            let j = rng.gen_range(0..=i);
            perm.swap(i, j);
        }
        let mut twisted = view.permute(&perm).unwrap();
        for axis in 0..rank {
            if rng.gen_bool(0.5) {
                twisted = twisted.reverse(axis).unwrap();
            }
        }

        let base_sum = reduce(&view, |x| x as i64, |p, q| p + q, 0i64).unwrap();
        let twisted_sum = reduce(&twisted, |x| x as i64, |p, q| p + q, 0i64).unwrap();
        assert_eq!(base_sum, twisted_sum);
        assert_eq!(
            count_truthy(&view).unwrap(),
            count_truthy(&twisted).unwrap()
        );
    }
}

#[test]
fn test_traversal_broadcast_view_zero_strides() {
    // A broadcast view visits each logical coordinate even though many map
    // to the same address.
    let data = vec![2.0];
    let scalar = StridedView::new(&data, &[1], &[1], 0, MemoryOrder::RowMajor).unwrap();
    let wide = broadcast(&scalar, &[3, 4], &[]).unwrap();
    let total = reduce(&wide, |x| x, |p, q| p + q, 0.0).unwrap();
    assert_relative_eq!(total, 24.0, epsilon = 1e-12);
}

// ============================================================================
// Reduction laws
// ============================================================================

#[test]
fn test_reduction_shape_law() {
    let a = make_tensor(&[2, 3, 4]);
    let v = a.view();

    let dropped = any_dims(&v, &[0, 2], false).unwrap();
    assert_eq!(dropped.dims(), &[3]);

    let kept = any_dims(&v, &[0, 2], true).unwrap();
    assert_eq!(kept.dims(), &[1, 3, 1]);

    assert_eq!(reduced_shape(&[2, 3, 4], &[0, 2], false), vec![3]);
    assert_eq!(reduced_shape(&[2, 3, 4], &[0, 2], true), vec![1, 3, 1]);
}

#[test]
fn test_reduce_subarrays_matches_manual_sums() {
    let a = make_tensor(&[4, 3, 2]);
    let mut out = StridedArray::from_elem(&[4, 2], MemoryOrder::RowMajor, 0.0);
    reduce_subarrays(&a.view(), &mut out.view_mut(), &[1], |sub| {
        reduce(sub, |x| x, |p, q| p + q, 0.0).unwrap()
    })
    .unwrap();
    for i in 0..4 {
        for k in 0..2 {
            let mut expected = 0.0;
            for j in 0..3 {
                expected += a.get(&[i, j, k]);
            }
            assert_relative_eq!(out.get(&[i, k]), expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_scenario_any_1d() {
    let a = StridedArray::from_vec(vec![1.0, -2.0, 3.0, -4.0], &[4], MemoryOrder::RowMajor)
        .unwrap();
    assert!(any(&a.view()).unwrap());
}

#[test]
fn test_scenario_any_dims_2d() {
    let a = StridedArray::from_vec(
        vec![1.0, 0.0, 3.0, 0.0, -5.0, 0.0, -7.0, 0.0],
        &[2, 4],
        MemoryOrder::RowMajor,
    )
    .unwrap();
    let out = any_dims(&a.view(), &[0], false).unwrap();
    assert_eq!(out.dims(), &[4]);
    assert_eq!(out.as_slice(), &[true, false, true, false]);
}

#[test]
fn test_empty_axis_vacuous_results() {
    let a = StridedArray::from_elem(&[3, 0], MemoryOrder::RowMajor, 1.0);
    let v = a.view();
    let any_out = any_dims(&v, &[1], false).unwrap();
    assert_eq!(any_out.as_slice(), &[false, false, false]);
    let all_out = all_dims(&v, &[1], false).unwrap();
    assert_eq!(all_out.as_slice(), &[true, true, true]);
    let counts = count_truthy_dims(&v, &[1], false).unwrap();
    assert_eq!(counts.as_slice(), &[0, 0, 0]);
}

// ============================================================================
// Order-sensitive kernels
// ============================================================================

#[test]
fn test_find_first_match_ignores_physical_layout() {
    // The same logical array in two memory layouts must report the same
    // first match.
    let row = StridedArray::from_fn(&[3, 3], MemoryOrder::RowMajor, |idx| {
        ((idx[0] * 3 + idx[1]) % 4) as i32
    });
    let col = StridedArray::from_fn(&[3, 3], MemoryOrder::ColMajor, |idx| {
        ((idx[0] * 3 + idx[1]) % 4) as i32
    });
    let from_row = find_index(&row.view(), |v| v == 0).unwrap();
    let from_col = find_index(&col.view(), |v| v == 0).unwrap();
    assert_eq!(from_row, Some(vec![0, 0]));
    assert_eq!(from_row, from_col);

    let later = find_index(&col.view(), |v| v == 3).unwrap();
    assert_eq!(later, Some(vec![1, 0]));
}

#[test]
fn test_find_on_reversed_view() {
    let a = StridedArray::from_vec(vec![10, 20, 30, 40], &[4], MemoryOrder::RowMajor).unwrap();
    let view = a.view();
    let reversed = view.reverse(0).unwrap();
    assert_eq!(find(&reversed, |v| v < 35).unwrap(), Some(30));
}

// ============================================================================
// Map family over broadcast and filtered writes
// ============================================================================

#[test]
fn test_zip_map_broadcast_row_and_column() {
    let rows = StridedArray::from_fn(&[4, 1], MemoryOrder::RowMajor, |idx| idx[0] as f64);
    let cols = StridedArray::from_fn(&[1, 5], MemoryOrder::RowMajor, |idx| idx[1] as f64 / 10.0);
    let mut out = StridedArray::from_elem(&[4, 5], MemoryOrder::RowMajor, 0.0);
    zip_map2_into(&mut out.view_mut(), &rows.view(), &cols.view(), |r, c| r + c).unwrap();
    for i in 0..4 {
        for j in 0..5 {
            assert_relative_eq!(out.get(&[i, j]), i as f64 + j as f64 / 10.0, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_fill_by_skip_preserves_previous_writes() {
    let mut out = StridedArray::from_elem(&[4], MemoryOrder::RowMajor, 0i32);
    fill_by(&mut out.view_mut(), |c| KernelWrite::Write(c[0] as i32 + 1)).unwrap();
    fill_by(&mut out.view_mut(), |c| {
        if c[0] % 2 == 0 {
            KernelWrite::Write(0)
        } else {
            KernelWrite::Skip
        }
    })
    .unwrap();
    assert_eq!(out.as_slice(), &[0, 2, 0, 4]);
}

// ============================================================================
// Element types across the capability seam
// ============================================================================

#[test]
fn test_complex_elements() {
    let data = vec![
        Complex64::new(0.0, 0.0),
        Complex64::new(0.0, 2.0),
        Complex64::new(0.0, 0.0),
    ];
    let a = StridedArray::from_vec(data, &[3], MemoryOrder::RowMajor).unwrap();
    assert!(any(&a.view()).unwrap());
    assert_eq!(count_truthy(&a.view()).unwrap(), 1);
    assert!(includes(&a.view(), Complex64::new(0.0, 2.0)).unwrap());

    let mut mags = StridedArray::from_elem(&[3], MemoryOrder::RowMajor, 0.0f64);
    map_into(&mut mags.view_mut(), &a.view(), |z| z.norm()).unwrap();
    assert_relative_eq!(mags.get(&[1]), 2.0, epsilon = 1e-12);
}

#[test]
fn test_bool_elements() {
    let a = StridedArray::from_vec(
        vec![false, true, false, false],
        &[2, 2],
        MemoryOrder::RowMajor,
    )
    .unwrap();
    assert!(any(&a.view()).unwrap());
    assert_eq!(count_truthy(&a.view()).unwrap(), 1);
    let per_row = any_dims(&a.view(), &[1], false).unwrap();
    assert_eq!(per_row.as_slice(), &[true, false]);
}

#[test]
fn test_includes_dims_per_coordinate_search() {
    let a = StridedArray::from_fn(&[2, 3], MemoryOrder::RowMajor, |idx| {
        (idx[0] * 3 + idx[1]) as i32
    });
    // Search one element per kept column: [3, 9, 5].
    let needles =
        StridedArray::from_vec(vec![3, 9, 5], &[3], MemoryOrder::RowMajor).unwrap();
    let out = includes_dims(&a.view(), &needles.view(), &[0], false).unwrap();
    assert_eq!(out.as_slice(), &[true, false, true]);
}

//! Sum / max / min / mean / softmax values and gradients.

mod common;

use ad_lazy::check_gradient;
use ad_lazy::prelude::*;
use ad_lazy::ShapeError;
use common::{assert_close, init_tracing};

fn values(t: &Tensor) -> Vec<f32> {
    t.forward().unwrap();
    t.to_vec().unwrap()
}

// ============================================================================
// Axis reductions
// ============================================================================

#[test]
fn test_sum_over_middle_axis() {
    init_tracing();
    let s = Tensor::arange([2, 3, 4]).sum(Some(1)).unwrap();
    assert_eq!(s.shape().dims(), &[2, 4]);
    assert_eq!(
        values(&s),
        vec![12.0, 15.0, 18.0, 21.0, 48.0, 51.0, 54.0, 57.0]
    );
}

#[test]
fn test_sum_over_each_axis() {
    let x = Tensor::arange([2, 3]);
    assert_eq!(values(&x.sum(Some(0)).unwrap()), vec![3.0, 5.0, 7.0]);
    assert_eq!(values(&x.sum(Some(1)).unwrap()), vec![3.0, 12.0]);
}

#[test]
fn test_rank_one_axis_reduction_is_single_element() {
    let s = Tensor::arange([5]).sum(Some(0)).unwrap();
    assert_eq!(s.shape().dims(), &[1]);
    assert_eq!(values(&s), vec![10.0]);
}

#[test]
fn test_reduction_over_strided_operand() {
    // Columns of the transpose are rows of the source.
    let x = Tensor::arange([2, 3]).t().unwrap();
    assert_eq!(values(&x.sum(Some(0)).unwrap()), vec![3.0, 12.0]);
    assert_eq!(values(&x.max(Some(1)).unwrap()), vec![3.0, 4.0, 5.0]);
}

#[test]
fn test_invalid_reduction_dim() {
    let x = Tensor::ones([2, 2]);
    assert!(matches!(
        x.sum(Some(2)),
        Err(TensorError::Shape(ShapeError::InvalidDimension { dim: 2, rank: 2 }))
    ));
}

#[test]
fn test_min_and_global_max() {
    let x = Tensor::from_vec(vec![3.0, -1.0, 4.0, 1.0, -5.0, 9.0], [2, 3]).unwrap();
    assert_eq!(values(&x.min(Some(1)).unwrap()), vec![-1.0, -5.0]);
    assert_eq!(values(&x.max(None).unwrap()), vec![9.0]);
    assert_eq!(values(&x.min(None).unwrap()), vec![-5.0]);
}

// ============================================================================
// Reduction gradients
// ============================================================================

#[test]
fn test_max_gradient_goes_to_each_extreme() {
    init_tracing();
    eprintln!("\n=== max(0) gradient ===");

    let x = Tensor::from_vec(vec![1.0, 5.0, 5.0, 2.0], [2, 2]).unwrap();
    let m = x.max(Some(0)).unwrap();
    let loss = m.sum(None).unwrap();
    loss.forward().unwrap();
    assert_eq!(m.to_vec().unwrap(), vec![5.0, 5.0]);

    loss.backward().unwrap();
    assert_eq!(
        x.grad().unwrap().to_vec().unwrap(),
        vec![0.0, 1.0, 1.0, 0.0]
    );
}

#[test]
fn test_global_max_ties_all_receive_gradient() {
    let x = Tensor::from_vec(vec![1.0, 3.0, 3.0], [3]).unwrap();
    let m = x.max(None).unwrap();
    m.forward().unwrap();
    m.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![0.0, 1.0, 1.0]);
}

#[test]
fn test_axis_sum_gradient_with_weights() {
    // loss = sum(sum(x, 1) * w) so dloss/dx[i][j] = w[i]
    let x = Tensor::arange([2, 3]);
    let w = Tensor::from_vec(vec![2.0, -1.0], [2]).unwrap();
    let loss = x.sum(Some(1)).unwrap().mul(&w).unwrap().sum(None).unwrap();
    loss.forward().unwrap();
    loss.backward().unwrap();
    assert_eq!(
        x.grad().unwrap().to_vec().unwrap(),
        vec![2.0, 2.0, 2.0, -1.0, -1.0, -1.0]
    );
}

#[test]
fn test_mean() {
    let x = Tensor::arange([2, 4]);
    assert_eq!(values(&x.mean(Some(1)).unwrap()), vec![1.5, 5.5]);
    assert_eq!(values(&x.mean(None).unwrap()), vec![3.5]);

    let m = x.mean(None).unwrap();
    m.forward().unwrap();
    m.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![0.125; 8]);
}

#[test]
fn test_min_gradient_matches_finite_difference() {
    let check = check_gradient([2, 3], &[0.3, -0.7, 1.1, 2.0, 0.4, -0.2], 1e-3, |x| {
        x.min(Some(1))?.sum(None)
    })
    .unwrap();
    assert!(check.max_error() < 1e-2, "{:?}", check);
}

// ============================================================================
// Softmax
// ============================================================================

#[test]
fn test_softmax_rows_sum_to_one() {
    init_tracing();
    let rng = RandomSource::seeded(42);
    let x = Tensor::randn([3, 5], &rng);

    let rows = x.softmax(Some(1)).unwrap();
    let row_sums = rows.sum(Some(1)).unwrap();
    assert_close(&values(&row_sums), &[1.0; 3], 1e-5);

    let cols = x.softmax(Some(0)).unwrap();
    let col_sums = cols.sum(Some(0)).unwrap();
    assert_close(&values(&col_sums), &[1.0; 5], 1e-5);
}

#[test]
fn test_softmax_global_and_rank_one() {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0], [3]).unwrap();
    let s = x.softmax(Some(0)).unwrap();
    let e: Vec<f32> = [1.0f32, 2.0, 3.0].iter().map(|v| v.exp()).collect();
    let total: f32 = e.iter().sum();
    let expected: Vec<f32> = e.iter().map(|v| v / total).collect();
    assert_close(&values(&s), &expected, 1e-6);

    let g = Tensor::arange([2, 2]).softmax(None).unwrap();
    assert_close(&[values(&g).iter().sum::<f32>()], &[1.0], 1e-6);
}

#[test]
fn test_softmax_is_shift_invariant_for_large_inputs() {
    let x = Tensor::from_vec(vec![1000.0, 1001.0], [2]).unwrap();
    let s = values(&x.softmax(None).unwrap());
    assert!(s.iter().all(|v| v.is_finite()));
    assert_close(&s, &[0.268_941_4, 0.731_058_6], 1e-5);
}

#[test]
fn test_softmax_gradient_matches_finite_difference() {
    let point = [0.2, -0.4, 0.9, 0.1, 0.5, -1.0];
    let check = check_gradient([2, 3], &point, 1e-2, |x| {
        let w = Tensor::from_vec(vec![1.0, -2.0, 0.5, 3.0, 0.0, -1.0], [2, 3])?;
        x.softmax(Some(1))?.mul(&w)?.sum(None)
    })
    .unwrap();
    assert!(check.max_error() < 1e-2, "{:?}", check);
}

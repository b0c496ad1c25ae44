//! End-to-end forward/backward behaviour of cached graphs.

mod common;

use ad_lazy::prelude::*;
use ad_lazy::ShapeError;
use common::{assert_close, init_tracing};

// ============================================================================
// Forward / Backward
// ============================================================================

#[test]
fn test_sum_of_ones() {
    init_tracing();
    eprintln!("\n=== Global sum of ones ===");

    let n = 7;
    let x = Tensor::ones([n]);
    let s = x.sum(None).unwrap();
    s.forward().unwrap();
    assert_eq!(s.item().unwrap(), n as f32);

    s.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![1.0; n]);
}

#[test]
fn test_chain_rule_through_shared_operand() {
    init_tracing();

    // f(x) = sum(x * exp(x)), df/dx = exp(x) * (1 + x)
    let x = Tensor::from_vec(vec![0.0, 0.5, 1.0], [3]).unwrap();
    let f = x.mul(&x.exp()).unwrap().sum(None).unwrap();
    f.forward().unwrap();
    f.backward().unwrap();

    let expected: Vec<f32> = [0.0f32, 0.5, 1.0]
        .iter()
        .map(|v| v.exp() * (1.0 + v))
        .collect();
    assert_close(&x.grad().unwrap().to_vec().unwrap(), &expected, 1e-5);
}

#[test]
fn test_square_via_self_product() {
    let x = Tensor::from_vec(vec![2.0, -3.0], [2]).unwrap();
    let y = x.mul(&x).unwrap().sum(None).unwrap();
    y.forward().unwrap();
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![4.0, -6.0]);
}

#[test]
fn test_gradients_accumulate_across_passes() {
    let x = Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap();
    let y = x.mul_scalar(3.0).sum(None).unwrap();
    y.forward().unwrap();
    y.backward().unwrap();
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![6.0, 6.0]);

    y.zero_grad();
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![3.0, 3.0]);
}

#[test]
fn test_backward_with_explicit_seed() {
    let x = Tensor::from_vec(vec![1.0, 2.0, 3.0], [3]).unwrap();
    let y = x.sq();
    y.forward().unwrap();

    let seed = Tensor::from_vec(vec![1.0, 0.0, 2.0], [3]).unwrap();
    seed.forward().unwrap();
    y.backward_with(&seed).unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![2.0, 0.0, 12.0]);

    let wrong = Tensor::ones([2]);
    assert!(matches!(
        y.backward_with(&wrong),
        Err(TensorError::Shape(ShapeError::ShapeMismatch { .. }))
    ));
}

#[test]
fn test_backward_before_forward() {
    let y = Tensor::ones([1]).exp();
    assert_eq!(y.backward(), Err(TensorError::GraphUninitialized));
}

#[test]
fn test_unmaterialized_operand_reported() {
    let x = Tensor::ones([2]);
    let y = x.exp();
    // Running only the consumer leaves its operand without a buffer.
    assert_eq!(
        y.realize(),
        Err(TensorError::Unmaterialized { id: x.id() })
    );
}

#[test]
fn test_comparison_blocks_gradient() {
    let x = Tensor::from_vec(vec![1.0, 4.0], [2]).unwrap();
    let mask = x.gt(&Tensor::full([2], 2.0)).unwrap();
    let y = x.mul(&mask).unwrap().sum(None).unwrap();
    y.forward().unwrap();
    y.backward().unwrap();

    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![0.0, 1.0]);
    // The mask receives a gradient slot but nothing flows past it.
    assert!(mask.grad().is_some());
}

#[test]
fn test_alias_has_no_gradient_path() {
    let x = Tensor::from_vec(vec![1.0, 2.0], [2]).unwrap();
    let y = x.alias().sum(None).unwrap();
    y.forward().unwrap();
    y.backward().unwrap();
    assert!(x.grad().is_none());
}

// ============================================================================
// In-place updates and repeated passes
// ============================================================================

#[test]
fn test_repeated_forward_recomputes_after_in_place_update() {
    init_tracing();
    eprintln!("\n=== Repeated forward with in-place update ===");

    let x = Tensor::ones([2]);
    let y = x.mul_scalar(3.0);
    y.forward().unwrap();
    assert_eq!(y.to_vec().unwrap(), vec![3.0, 3.0]);

    x.add_assign(&Tensor::ones([2])).unwrap();
    assert_eq!(x.op_labels(), vec!["CONST", "ADD_ASSIGN"]);

    // The cached sort is rebuilt to reach the new operand; the update runs once per pass.
    y.forward().unwrap();
    assert_eq!(y.to_vec().unwrap(), vec![6.0, 6.0]);
    y.forward().unwrap();
    assert_eq!(y.to_vec().unwrap(), vec![9.0, 9.0]);
}

#[test]
fn test_in_place_broadcasts_rhs() {
    let x = Tensor::arange([2, 3]);
    let row = Tensor::from_vec(vec![10.0, 20.0, 30.0], [3]).unwrap();
    x.mul_assign(&Tensor::full([1], 2.0)).unwrap();
    x.add_assign(&row).unwrap();
    x.forward().unwrap();
    assert_eq!(
        x.to_vec().unwrap(),
        vec![10.0, 22.0, 34.0, 16.0, 28.0, 40.0]
    );

    let bad = Tensor::ones([4]);
    assert!(matches!(
        x.sub_assign(&bad),
        Err(TensorError::Shape(ShapeError::NotBroadcastable { .. }))
    ));
}

#[test]
fn test_in_place_through_view_writes_source() {
    let x = Tensor::zeros([2, 2]);
    let row = x.at(&[1]).unwrap();
    row.add_assign(&Tensor::full([2], 5.0)).unwrap();
    row.forward().unwrap();
    assert_eq!(x.to_vec().unwrap(), vec![0.0, 0.0, 5.0, 5.0]);
}

#[test]
fn test_div_assign_and_sub_assign() {
    let x = Tensor::full([2], 8.0);
    x.div_assign(&Tensor::full([2], 2.0)).unwrap();
    x.sub_assign(&Tensor::ones([2])).unwrap();
    x.forward().unwrap();
    assert_eq!(x.to_vec().unwrap(), vec![3.0, 3.0]);
}

// ============================================================================
// Random leaves and configuration
// ============================================================================

#[test]
fn test_seeded_random_leaves_reproduce() {
    let config = EngineConfig::new().with_seed(11);
    let draw = || {
        let rng = RandomSource::from_config(&config);
        let ints = Tensor::randint([8], -3, 3, &rng);
        let normals = Tensor::randn([8], &rng);
        ints.forward().unwrap();
        normals.forward().unwrap();
        (ints.to_vec().unwrap(), normals.to_vec().unwrap())
    };

    let (ints, normals) = draw();
    assert_eq!((ints.clone(), normals.clone()), draw());
    assert!(ints.iter().all(|v| v.fract() == 0.0 && (-3.0..=3.0).contains(v)));
    assert!(normals.iter().all(|v| v.is_finite()));
}

#[test]
fn test_random_leaf_is_drawn_once() {
    let rng = RandomSource::seeded(2);
    let x = Tensor::randn([4], &rng);
    let y = x.add_scalar(0.0);
    y.forward().unwrap();
    let first = x.to_vec().unwrap();
    y.forward().unwrap();
    assert_eq!(x.to_vec().unwrap(), first);
}

#[test]
fn test_graph_handle_reports_schedule() {
    let a = Tensor::ones([2]);
    let b = a.exp().sum(None).unwrap();
    let graph = Graph::new(&b);
    assert_eq!(graph.len(), 3);
    assert_eq!(graph.root_id(), b.id());
    graph.forward().unwrap();
    assert_close(&b.to_vec().unwrap(), &[2.0 * 1f32.exp()], 1e-5);
}

// ============================================================================
// Deep graphs
// ============================================================================

#[test]
fn test_deep_chain_forward_backward_and_drop() {
    init_tracing();
    eprintln!("\n=== 100k-op chain ===");

    let depth = 100_000;
    let x = Tensor::from_vec(vec![2.0], [1]).unwrap();
    let mut y = x.clone();
    for _ in 0..depth {
        y = y.neg();
    }

    y.forward().unwrap();
    assert_eq!(y.item().unwrap(), 2.0);
    y.backward().unwrap();
    assert_eq!(x.grad().unwrap().to_vec().unwrap(), vec![1.0]);

    drop(y);
    assert!(x.consumers().is_empty());
    assert_eq!(x.to_vec().unwrap(), vec![2.0]);
}

//! # ad_lazy - Lazy reverse-mode autodiff over strided tensors
//!
//! Tensor-producing calls only record an [`Operation`] on a new [`Tensor`]
//! node. A [`Graph`] sorts the DAG below a root once and then runs any
//! number of forward passes (values, dependencies first) and backward
//! passes (gradients, root first, accumulating into each tensor's gradient
//! slot).
//!
//! ## Overview
//!
//! | Piece | Role |
//! |---|---|
//! | [`Tensor`] | graph node: strided view, optional shared buffer, pending ops, gradient |
//! | [`Operation`] | `Leaf`, `Unary` or `Binary` step with forward and backward kernels |
//! | [`Graph`] | topological schedule and pass driver |
//! | [`RandomSource`] | explicit seeded generator for random leaves |
//! | [`EngineConfig`] | settings read from the environment |
//!
//! Views (permute, broadcast, index, slice, squeeze, reshape) share their
//! operand's buffer and route gradients back through the same layout
//! transform; see [`ad_strided`] for the view algebra.
//!
//! ## Example
//!
//! ```
//! use ad_lazy::prelude::*;
//!
//! let a = Tensor::arange([2, 3]);
//! let b = Tensor::arange([3, 4]);
//! let loss = a.matmul(&b)?.sum(None)?;
//!
//! loss.forward()?;
//! loss.backward()?;
//!
//! let grad_a = a.grad().unwrap().to_vec()?;
//! assert_eq!(grad_a, vec![6.0, 22.0, 38.0, 6.0, 22.0, 38.0]);
//! # Ok::<(), ad_lazy::TensorError>(())
//! ```

pub mod config;
pub mod error;
pub mod finite_diff;
pub mod graph;
pub mod ops;
pub mod random;
pub mod tensor;

pub use ad_strided::{Shape, ShapeError, Slice, View};
pub use config::EngineConfig;
pub use error::{Result, TensorError};
pub use finite_diff::{check_gradient, finite_diff_grad, max_grad_error, GradCheck};
pub use graph::Graph;
pub use ops::Operation;
pub use random::RandomSource;
pub use tensor::{Tensor, TensorId};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::TensorError;
    pub use crate::graph::Graph;
    pub use crate::random::RandomSource;
    pub use crate::tensor::{Tensor, TensorId};
    pub use ad_strided::{Shape, Slice, View};
}

//! Error types for graph construction and execution.

use ad_strided::{Shape, ShapeError};
use thiserror::Error;

use crate::tensor::TensorId;

/// The error type for tensor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    /// Invalid view transformation or incompatible operand extents.
    #[error(transparent)]
    Shape(#[from] ShapeError),

    /// Matmul operands must have equal rank of at least 2.
    #[error("matmul needs operands of equal rank >= 2, got ranks {lhs} and {rhs}")]
    MatmulRank { lhs: usize, rhs: usize },

    /// `backward()` called before any `forward()` built the graph.
    #[error("backward called before forward built a graph")]
    GraphUninitialized,

    /// The implicit seed of 1.0 only applies to single-element roots.
    #[error("backward needs a single-element root, got shape {shape}")]
    GradientOnNonScalar { shape: Shape },

    /// A kernel or reader found a tensor that has no buffer yet.
    #[error("tensor {id} has not been materialized by a forward pass")]
    Unmaterialized { id: TensorId },

    /// An in-place operation whose right-hand side depends on its target.
    #[error("in-place operation reads its own target")]
    InPlaceSelfReference,

    /// An environment value could not be parsed.
    #[error("invalid value {value:?} for {key}")]
    Config { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, TensorError>;

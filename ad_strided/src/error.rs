//! Errors raised by view algebra.

use thiserror::Error;

use crate::shape::Shape;

/// Failure of a shape or layout transformation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// Two operands have extents the operation cannot combine.
    #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// Right-aligned extents are neither equal nor 1, or the target has lower rank.
    #[error("cannot broadcast {from} to {to}")]
    NotBroadcastable { from: Shape, to: Shape },

    #[error("invalid dimension {dim} for a view of rank {rank}")]
    InvalidDimension { dim: usize, rank: usize },

    #[error("{perm:?} is not a permutation of 0..{rank}")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    #[error("index {index} out of bounds for dimension {dim} of extent {extent}")]
    IndexOutOfBounds {
        index: usize,
        dim: usize,
        extent: usize,
    },
}

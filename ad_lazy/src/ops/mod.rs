//! Operations recorded on tensors and their kernels.
//!
//! An [`Operation`] owns its operands; its output is the tensor whose
//! pending list holds it, handed to [`Operation::forward`] and
//! [`Operation::backward`] by the graph driver. Kernels allocate the output
//! buffer only when it is absent but recompute values on every pass, and
//! backward kernels accumulate into operand gradients (never overwrite).

mod elementwise;
mod leaf;
mod matmul;
mod reduce;
mod view;

pub use elementwise::{ArithOp, CompareOp, MapFn};
pub use leaf::LeafOp;
pub use matmul::MatmulGrad;
pub use reduce::ReduceOp;
pub use view::Reindex;

use crate::error::Result;
use crate::tensor::Tensor;

/// Kinds of single-operand operations.
#[derive(Clone, Debug)]
pub enum UnaryKind {
    /// Elementwise function.
    Map(MapFn),
    /// Sum/max/min over every element (`None`) or one dimension.
    Reduce { op: ReduceOp, dim: Option<usize> },
    /// Share the operand's buffer. No gradient path.
    Alias,
    /// Share the operand's buffer through a transformed view.
    View(Reindex),
    /// Materialize into a fresh contiguous buffer.
    Copy,
    /// Update the output in place with the operand (forward only).
    Assign(ArithOp),
}

/// Kinds of two-operand operations.
#[derive(Debug)]
pub enum BinaryKind {
    Arith(ArithOp),
    /// Elementwise comparison yielding 1.0 / 0.0 (forward only).
    Compare(CompareOp),
    /// Batched matrix product; `rhs` holds the transposed right operand.
    Matmul(MatmulGrad),
}

/// A pending computation of a tensor.
#[derive(Debug)]
pub enum Operation {
    Leaf(LeafOp),
    Unary { kind: UnaryKind, operand: Tensor },
    Binary {
        kind: BinaryKind,
        lhs: Tensor,
        rhs: Tensor,
    },
}

impl Operation {
    pub fn unary(kind: UnaryKind, operand: Tensor) -> Self {
        Operation::Unary { kind, operand }
    }

    pub fn binary(kind: BinaryKind, lhs: Tensor, rhs: Tensor) -> Self {
        Operation::Binary { kind, lhs, rhs }
    }

    /// Operands in visiting order (lhs before rhs).
    pub fn operands(&self) -> Vec<&Tensor> {
        match self {
            Operation::Leaf(_) => vec![],
            Operation::Unary { operand, .. } => vec![operand],
            Operation::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        }
    }

    pub(crate) fn into_operands(self) -> Vec<Tensor> {
        match self {
            Operation::Leaf(_) => vec![],
            Operation::Unary { operand, .. } => vec![operand],
            Operation::Binary { lhs, rhs, .. } => vec![lhs, rhs],
        }
    }

    /// Upper-case name for inspection and visualization.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Leaf(op) => op.label(),
            Operation::Unary { kind, .. } => match kind {
                UnaryKind::Map(f) => f.label(),
                UnaryKind::Reduce { op, .. } => op.label(),
                UnaryKind::Alias => "ALIAS",
                UnaryKind::View(r) => r.label(),
                UnaryKind::Copy => "COPY",
                UnaryKind::Assign(op) => op.assign_label(),
            },
            Operation::Binary { kind, .. } => match kind {
                BinaryKind::Arith(op) => op.label(),
                BinaryKind::Compare(op) => op.label(),
                BinaryKind::Matmul(_) => "MATMUL",
            },
        }
    }

    /// Whether backward propagates anything to the operands.
    pub fn is_differentiable(&self) -> bool {
        !matches!(
            self,
            Operation::Leaf(_)
                | Operation::Unary {
                    kind: UnaryKind::Alias | UnaryKind::Assign(_),
                    ..
                }
                | Operation::Binary {
                    kind: BinaryKind::Compare(_),
                    ..
                }
        )
    }

    pub(crate) fn forward(&self, out: &Tensor) -> Result<()> {
        match self {
            Operation::Leaf(op) => leaf::forward(op, out),
            Operation::Unary { kind, operand } => match kind {
                UnaryKind::Map(f) => elementwise::map_forward(*f, operand, out),
                UnaryKind::Reduce { op, dim } => reduce::forward(*op, *dim, operand, out),
                UnaryKind::Alias | UnaryKind::View(_) => view::share_forward(operand, out),
                UnaryKind::Copy => view::copy_forward(operand, out),
                UnaryKind::Assign(op) => elementwise::assign_forward(*op, operand, out),
            },
            Operation::Binary { kind, lhs, rhs } => match kind {
                BinaryKind::Arith(op) => {
                    elementwise::binary_forward(|a, b| op.apply(a, b), lhs, rhs, out)
                }
                BinaryKind::Compare(op) => {
                    elementwise::binary_forward(|a, b| op.apply(a, b), lhs, rhs, out)
                }
                BinaryKind::Matmul(_) => matmul::forward(lhs, rhs, out),
            },
        }
    }

    pub(crate) fn backward(&self, out: &Tensor) -> Result<()> {
        match self {
            Operation::Unary { kind, operand } => match kind {
                UnaryKind::Map(f) => elementwise::map_backward(*f, operand, out),
                UnaryKind::Reduce { op, dim } => reduce::backward(*op, *dim, operand, out),
                UnaryKind::View(r) => view::reindex_backward(r, operand, out),
                UnaryKind::Copy => view::copy_backward(operand, out),
                UnaryKind::Alias | UnaryKind::Assign(_) => Ok(()),
            },
            Operation::Binary { kind, lhs, rhs } => match kind {
                BinaryKind::Arith(op) => elementwise::arith_backward(*op, lhs, rhs, out),
                BinaryKind::Matmul(cache) => cache.backward(lhs, rhs, out),
                BinaryKind::Compare(_) => Ok(()),
            },
            Operation::Leaf(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_op(t: &Tensor) -> String {
        format!("{:?}", t.0.ops.borrow()[0])
    }

    #[test]
    fn test_differentiable_ops() {
        let x = Tensor::arange([2, 2]);
        let differentiable = [
            x.exp(),
            x.add(&x).unwrap(),
            x.sum(Some(0)).unwrap(),
            x.t().unwrap(),
            x.copy(),
            x.matmul(&x).unwrap(),
        ];
        for t in &differentiable {
            assert!(t.0.ops.borrow()[0].is_differentiable(), "{:?}", t);
        }

        x.add_assign(&Tensor::ones([2, 2])).unwrap();
        let ops = x.0.ops.borrow();
        assert!(!ops[0].is_differentiable());
        assert!(!ops[1].is_differentiable());
        assert_eq!(ops[1].label(), "ADD_ASSIGN");
        drop(ops);

        for t in [x.alias(), x.lt(&x).unwrap()] {
            assert!(!t.0.ops.borrow()[0].is_differentiable());
        }
    }

    #[test]
    fn test_matmul_cache_reported_in_debug() {
        let a = Tensor::arange([2, 2]);
        let c = a.matmul(&Tensor::ones([2, 2])).unwrap();
        assert!(first_op(&c).contains("built: Some(false)"));

        let loss = c.sum(None).unwrap();
        loss.forward().unwrap();
        loss.backward().unwrap();
        assert!(first_op(&c).contains("built: Some(true)"));
    }
}

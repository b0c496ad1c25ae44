//! Buffer-sharing view operations.

use ad_strided::{lockstep, Shape, ShapeError, Slice, View};

use crate::error::Result;
use crate::tensor::Tensor;

/// A view transformation, replayable on any view with the operand's extents.
///
/// Forward applies it to the operand's view; backward applies it to the
/// contiguous gradient of the operand, so the output gradient lands on the
/// cells it was read from. Broadcast dimensions revisit a cell, which sums
/// their contributions.
#[derive(Clone, Debug, PartialEq)]
pub enum Reindex {
    Broadcast(Shape),
    Permute(Vec<usize>),
    Squeeze(Option<usize>),
    Unsqueeze(Option<usize>),
    Index(Vec<usize>),
    Slice(Vec<Slice>),
    /// Only recorded over contiguous operands.
    Reshape(Shape),
}

impl Reindex {
    pub fn apply(&self, view: &View) -> std::result::Result<View, ShapeError> {
        match self {
            Reindex::Broadcast(shape) => view.broadcast_to(shape),
            Reindex::Permute(perm) => view.permute(perm),
            Reindex::Squeeze(dim) => view.squeeze(*dim),
            Reindex::Unsqueeze(dim) => view.unsqueeze(*dim),
            Reindex::Index(indices) => view.index(indices),
            Reindex::Slice(ranges) => view.slice(ranges),
            Reindex::Reshape(shape) => view.reshape(shape),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Reindex::Broadcast(_) => "BROADCAST",
            Reindex::Permute(_) => "PERMUTE",
            Reindex::Squeeze(_) => "SQUEEZE",
            Reindex::Unsqueeze(_) => "UNSQUEEZE",
            Reindex::Index(_) => "INDEX",
            Reindex::Slice(_) => "SLICE",
            Reindex::Reshape(_) => "RESHAPE",
        }
    }
}

pub(super) fn share_forward(operand: &Tensor, out: &Tensor) -> Result<()> {
    out.set_buffer(operand.buffer()?);
    Ok(())
}

pub(super) fn reindex_backward(reindex: &Reindex, operand: &Tensor, out: &Tensor) -> Result<()> {
    let Some(grad) = out.grad() else {
        return Ok(());
    };
    let g = grad.buffer()?;
    let operand_grad = operand.ensure_grad();
    let scatter = reindex.apply(operand_grad.view())?;
    let dst = operand_grad.buffer()?;

    for [gi, di] in lockstep([grad.view(), &scatter]) {
        dst.accumulate(di, g.get(gi));
    }
    Ok(())
}

pub(super) fn copy_forward(operand: &Tensor, out: &Tensor) -> Result<()> {
    let src = operand.buffer()?;
    let dst = out.ensure_buffer();
    for [i, o] in lockstep([operand.view(), out.view()]) {
        dst.set(o, src.get(i));
    }
    Ok(())
}

pub(super) fn copy_backward(operand: &Tensor, out: &Tensor) -> Result<()> {
    let Some(grad) = out.grad() else {
        return Ok(());
    };
    let g = grad.buffer()?;
    let operand_grad = operand.ensure_grad();
    let dst = operand_grad.buffer()?;
    for [gi, di] in lockstep([grad.view(), operand_grad.view()]) {
        dst.accumulate(di, g.get(gi));
    }
    Ok(())
}

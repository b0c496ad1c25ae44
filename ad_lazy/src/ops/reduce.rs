//! Sum / max / min reductions.
//!
//! A reduction over dimension `d` scans the operand through a view with `d`
//! permuted to the last position, so each run of `extent(d)` consecutive
//! elements of the scan is one output group. Group boundaries are detected
//! from the iterator's 1-based `count()`.

use ad_strided::{lockstep, move_to_last, ShapeError, View};

use crate::error::Result;
use crate::tensor::Tensor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
}

impl ReduceOp {
    fn identity(self) -> f32 {
        match self {
            ReduceOp::Sum => 0.0,
            ReduceOp::Max => f32::NEG_INFINITY,
            ReduceOp::Min => f32::INFINITY,
        }
    }

    fn combine(self, acc: f32, x: f32) -> f32 {
        match self {
            ReduceOp::Sum => acc + x,
            ReduceOp::Max => acc.max(x),
            ReduceOp::Min => acc.min(x),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReduceOp::Sum => "SUM",
            ReduceOp::Max => "MAX",
            ReduceOp::Min => "MIN",
        }
    }
}

/// The operand view in scan order, and the number of elements per output.
fn scan_view(view: &View, dim: Option<usize>) -> std::result::Result<(View, usize), ShapeError> {
    match dim {
        None => Ok((view.clone(), view.size())),
        Some(d) if d >= view.rank() => Err(ShapeError::InvalidDimension {
            dim: d,
            rank: view.rank(),
        }),
        Some(d) => Ok((view.permute(&move_to_last(view.rank(), d))?, view.shape().dim(d))),
    }
}

pub(super) fn forward(op: ReduceOp, dim: Option<usize>, operand: &Tensor, out: &Tensor) -> Result<()> {
    let src = operand.buffer()?;
    let dst = out.ensure_buffer();
    let (scan, group) = scan_view(operand.view(), dim)?;

    let mut outputs = out.view().positions();
    let mut acc = op.identity();
    let mut it = scan.iter();
    it.start();
    while it.has_next() {
        let count = it.count();
        if count > group && (count - 1) % group == 0 {
            if let Some(o) = outputs.next() {
                dst.set(o, acc);
            }
            acc = op.identity();
        }
        acc = op.combine(acc, src.get(it.position()));
        it.advance();
    }
    // Last group, or every group when the reduced dimension is empty.
    for o in outputs {
        dst.set(o, acc);
        acc = op.identity();
    }
    Ok(())
}

/// Sum sends the upstream value to every element of the group; max/min send
/// it to every element equal to the recorded extreme, so ties all receive it.
pub(super) fn backward(op: ReduceOp, dim: Option<usize>, operand: &Tensor, out: &Tensor) -> Result<()> {
    let Some(grad) = out.grad() else {
        return Ok(());
    };
    let (x, y, g) = (operand.buffer()?, out.buffer()?, grad.buffer()?);
    let operand_grad = operand.ensure_grad();
    let gx = operand_grad.buffer()?;

    let (scan, group) = scan_view(operand.view(), dim)?;
    let (grad_scan, _) = scan_view(operand_grad.view(), dim)?;

    let mut groups = lockstep([out.view(), grad.view()]);
    let mut current = groups.next();
    for (k, [xi, gxi]) in lockstep([&scan, &grad_scan]).enumerate() {
        if k > 0 && k % group == 0 {
            current = groups.next();
        }
        let Some([yi, gi]) = current else {
            break;
        };
        let hit = match op {
            ReduceOp::Sum => true,
            ReduceOp::Max | ReduceOp::Min => x.get(xi) == y.get(yi),
        };
        if hit {
            gx.accumulate(gxi, g.get(gi));
        }
    }
    Ok(())
}

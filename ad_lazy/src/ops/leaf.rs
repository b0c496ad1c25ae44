//! Leaf initializers.

use std::rc::Rc;

use crate::error::Result;
use crate::random::RandomSource;
use crate::tensor::Tensor;

/// How a leaf tensor fills its buffer on first forward.
#[derive(Clone, Debug)]
pub enum LeafOp {
    Const(f32),
    /// `start + i * step` in logical order.
    Arange { start: f32, step: f32 },
    /// Uniform integers in `[lo, hi]`.
    RandInt {
        lo: i64,
        hi: i64,
        rng: RandomSource,
    },
    RandNormal { rng: RandomSource },
    FromArray(Rc<[f32]>),
}

impl LeafOp {
    pub fn label(&self) -> &'static str {
        match self {
            LeafOp::Const(_) => "CONST",
            LeafOp::Arange { .. } => "ARANGE",
            LeafOp::RandInt { .. } => "RANDINT",
            LeafOp::RandNormal { .. } => "RANDN",
            LeafOp::FromArray(_) => "ARRAY",
        }
    }
}

/// No-op once the leaf holds a buffer.
pub(super) fn forward(op: &LeafOp, out: &Tensor) -> Result<()> {
    if out.is_materialized() {
        return Ok(());
    }
    let buf = out.ensure_buffer();
    let positions = out.view().positions();
    match op {
        LeafOp::Const(value) => positions.for_each(|p| buf.set(p, *value)),
        LeafOp::Arange { start, step } => positions
            .enumerate()
            .for_each(|(i, p)| buf.set(p, start + step * i as f32)),
        LeafOp::RandInt { lo, hi, rng } => {
            positions.for_each(|p| buf.set(p, rng.uniform_int(*lo, *hi) as f32))
        }
        LeafOp::RandNormal { rng } => positions.for_each(|p| buf.set(p, rng.standard_normal())),
        LeafOp::FromArray(data) => positions
            .zip(data.iter())
            .for_each(|(p, &v)| buf.set(p, v)),
    }
    Ok(())
}

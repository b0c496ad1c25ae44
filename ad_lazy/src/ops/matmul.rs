//! Batched matrix multiplication.
//!
//! The operation is recorded as `lhs: [.., H1, W]` times `rhs: [.., H2, W]`,
//! where `rhs` is a transposed view of the user's right operand, so both
//! inner loops walk the last dimension.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ad_strided::{lockstep, Buffer};
use tracing::debug;

use crate::error::Result;
use crate::graph::Graph;
use crate::tensor::Tensor;

pub(super) fn forward(lhs: &Tensor, rhs: &Tensor, out: &Tensor) -> Result<()> {
    let (a, c) = (lhs.buffer()?, rhs.buffer()?);
    let dst = out.ensure_buffer();

    let dims = lhs.shape().dims();
    let rank = dims.len();
    let (h1, w) = (dims[rank - 2], dims[rank - 1]);
    let h2 = rhs.shape().dim(rank - 2);
    let batches: usize = dims[..rank - 2].iter().product();

    if out.size() == 0 {
        return Ok(());
    }
    if w == 0 {
        out.view().positions().for_each(|o| dst.set(o, 0.0));
        return Ok(());
    }

    let mut ia = lhs.view().iter();
    let mut ic = rhs.view().iter();
    let mut io = out.view().iter();
    for _ in 0..batches {
        let c_batch = ic.save();
        for _ in 0..h1 {
            let a_row = ia.save();
            ic.restore(&c_batch);
            for _ in 0..h2 {
                ia.restore(&a_row);
                let mut acc = 0.0;
                for _ in 0..w {
                    acc += a.get(ia.position()) * c.get(ic.position());
                    ia.advance();
                    ic.advance();
                }
                dst.set(io.position(), acc);
                io.advance();
            }
        }
    }
    Ok(())
}

/// Gradient expressions of one matmul, built on its first backward.
struct GradGraphs {
    /// Buffers the detached leaves alias: upstream gradient, lhs, rhs.
    sources: [Rc<Buffer>; 3],
    grad_lhs: Tensor,
    grad_rhs: Tensor,
    lhs_graph: Graph,
    rhs_graph: Graph,
}

impl GradGraphs {
    /// `grad_lhs = g @ rhs` and `grad_rhs = g^T @ lhs` over detached leaves.
    fn build(grad: &Tensor, lhs: &Tensor, rhs: &Tensor) -> Result<Self> {
        let g = grad.detach()?;
        let a = lhs.detach()?;
        let c = rhs.detach()?;

        let grad_lhs = g.matmul(&c)?;
        let grad_rhs = g.t()?.matmul(&a)?;
        let lhs_graph = Graph::new(&grad_lhs);
        let rhs_graph = Graph::new(&grad_rhs);
        debug!(
            lhs_nodes = lhs_graph.len(),
            rhs_nodes = rhs_graph.len(),
            "built matmul gradient graphs"
        );

        Ok(GradGraphs {
            sources: [grad.buffer()?, lhs.buffer()?, rhs.buffer()?],
            grad_lhs,
            grad_rhs,
            lhs_graph,
            rhs_graph,
        })
    }

    fn tracks(&self, current: &[Rc<Buffer>; 3]) -> bool {
        self.sources
            .iter()
            .zip(current)
            .all(|(a, b)| Rc::ptr_eq(a, b))
    }
}

/// Cache of the gradient sub-graphs, owned by the matmul operation.
#[derive(Default)]
pub struct MatmulGrad {
    graphs: RefCell<Option<GradGraphs>>,
}

impl MatmulGrad {
    pub(super) fn backward(&self, lhs: &Tensor, rhs: &Tensor, out: &Tensor) -> Result<()> {
        let Some(grad) = out.grad() else {
            return Ok(());
        };
        let current = [grad.buffer()?, lhs.buffer()?, rhs.buffer()?];

        let mut cache = self.graphs.borrow_mut();
        let graphs = match cache.take() {
            Some(graphs) if graphs.tracks(&current) => graphs,
            _ => GradGraphs::build(&grad, lhs, rhs)?,
        };

        graphs.lhs_graph.forward()?;
        graphs.rhs_graph.forward()?;
        accumulate(&graphs.grad_lhs, lhs)?;
        accumulate(&graphs.grad_rhs, rhs)?;

        *cache = Some(graphs);
        Ok(())
    }
}

fn accumulate(values: &Tensor, into: &Tensor) -> Result<()> {
    let src = values.buffer()?;
    let target = into.ensure_grad();
    let dst = target.buffer()?;
    for [s, d] in lockstep([values.view(), target.view()]) {
        dst.accumulate(d, src.get(s));
    }
    Ok(())
}

impl fmt::Debug for MatmulGrad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatmulGrad")
            // None while a backward pass holds the cache.
            .field("built", &self.graphs.try_borrow().ok().map(|g| g.is_some()))
            .finish()
    }
}

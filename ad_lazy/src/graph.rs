//! Topological schedule of a tensor DAG and the forward/backward driver.

use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug_span;

use crate::error::Result;
use crate::tensor::{Tensor, TensorId, TensorNode};

/// Dependency order of every tensor reachable from a root, root last.
///
/// The schedule does not own its tensors; the root keeps the DAG alive
/// through operand references, so a graph cached on its own root forms no
/// cycle. Tensors dropped since the sort are skipped.
#[derive(Clone)]
pub struct Graph {
    root: TensorId,
    order: Vec<Weak<TensorNode>>,
}

impl Graph {
    /// Depth-first postorder from `root` over operand edges.
    pub fn new(root: &Tensor) -> Self {
        let _span = debug_span!("graph_sort", root = %root.id()).entered();

        let mut order = Vec::new();
        let mut visited: HashSet<TensorId> = HashSet::new();
        let mut stack: Vec<(Tensor, bool)> = vec![(root.clone(), false)];

        while let Some((tensor, expanded)) = stack.pop() {
            if expanded {
                order.push(Rc::downgrade(&tensor.0));
                continue;
            }
            if !visited.insert(tensor.id()) {
                continue;
            }
            let operands = tensor.operands();
            stack.push((tensor, true));
            // Reversed so the first operand (lhs) is visited first.
            for operand in operands.into_iter().rev() {
                if !visited.contains(&operand.id()) {
                    stack.push((operand, false));
                }
            }
        }

        tracing::debug!(nodes = order.len(), "sorted graph");
        Graph {
            root: root.id(),
            order,
        }
    }

    pub fn root_id(&self) -> TensorId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live tensors in schedule order.
    pub fn tensors(&self) -> Vec<Tensor> {
        self.order
            .iter()
            .filter_map(Weak::upgrade)
            .map(Tensor)
            .collect()
    }

    /// Run every tensor's pending ops, dependencies first.
    pub fn forward(&self) -> Result<()> {
        let _span = debug_span!("graph_forward", root = %self.root, nodes = self.len()).entered();
        for node in self.order.iter().filter_map(Weak::upgrade) {
            Tensor(node).run_forward()?;
        }
        Ok(())
    }

    /// Run every tensor's pending ops backward, root first.
    ///
    /// The root gradient must already be seeded; see [`Tensor::backward`].
    /// Gradients of computed tensors are reset at the start of each pass,
    /// while leaf gradients keep accumulating until [`zero_grad`](Self::zero_grad).
    pub fn backward(&self) -> Result<()> {
        let _span = debug_span!("graph_backward", root = %self.root, nodes = self.len()).entered();
        let tensors = self.tensors();
        for tensor in tensors.iter().filter(|t| t.id() != self.root && t.is_computed()) {
            tensor.clear_grad();
        }
        for tensor in tensors.iter().rev() {
            tensor.run_backward()?;
        }
        Ok(())
    }

    /// Reset every allocated gradient in the graph to zero.
    pub fn zero_grad(&self) {
        for tensor in self.tensors() {
            tensor.clear_grad();
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("root", &self.root)
            .field("nodes", &self.order.len())
            .finish()
    }
}

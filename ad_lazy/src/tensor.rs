//! Tensor handles: nodes of the lazy computation graph.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ad_strided::{transpose_perm, Buffer, Shape, ShapeError, Slice, Strides, View};
use tracing::trace;

use crate::error::{Result, TensorError};
use crate::graph::Graph;
use crate::ops::{
    ArithOp, BinaryKind, CompareOp, LeafOp, MapFn, MatmulGrad, Operation, ReduceOp, Reindex,
    UnaryKind,
};
use crate::random::RandomSource;

/// Global counter for unique tensor IDs.
static TENSOR_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bumped whenever an existing tensor's op list changes, invalidating cached sorts.
///
/// Process-wide: an in-place op on any tensor makes every cached graph
/// re-sort on its next `forward()`, at the cost of one O(nodes) traversal each.
static TOPOLOGY_EPOCH: AtomicU64 = AtomicU64::new(0);

fn next_tensor_id() -> u64 {
    TENSOR_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn bump_epoch() {
    TOPOLOGY_EPOCH.fetch_add(1, Ordering::Relaxed);
}

fn current_epoch() -> u64 {
    TOPOLOGY_EPOCH.load(Ordering::Relaxed)
}

/// Unique identifier of a tensor, increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) u64);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal node structure.
pub struct TensorNode {
    pub(crate) id: TensorId,
    pub(crate) view: View,
    pub(crate) buffer: RefCell<Option<Rc<Buffer>>>,
    pub(crate) ops: RefCell<Vec<Operation>>,
    pub(crate) grad: RefCell<Option<Tensor>>,
    pub(crate) consumers: RefCell<Vec<Weak<TensorNode>>>,
    pub(crate) graph: RefCell<Option<(u64, Rc<Graph>)>>,
}

impl Drop for TensorNode {
    /// Unlinks uniquely owned operands through a worklist, so releasing a
    /// deep chain does not recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(self.ops.get_mut());
        while let Some(op) = pending.pop() {
            for operand in op.into_operands() {
                if let Ok(mut node) = Rc::try_unwrap(operand.0) {
                    pending.append(node.ops.get_mut());
                }
            }
        }
    }
}

/// Reference-counted handle to a graph node.
///
/// Building an expression only records operations; values appear after a
/// [`forward`](Tensor::forward) pass over a graph containing the tensor.
#[derive(Clone)]
pub struct Tensor(pub(crate) Rc<TensorNode>);

impl Tensor {
    fn new_node(view: View, ops: Vec<Operation>) -> Self {
        Tensor(Rc::new(TensorNode {
            id: TensorId(next_tensor_id()),
            view,
            buffer: RefCell::new(None),
            ops: RefCell::new(ops),
            grad: RefCell::new(None),
            consumers: RefCell::new(Vec::new()),
            graph: RefCell::new(None),
        }))
    }

    fn leaf(shape: impl Into<Shape>, op: LeafOp) -> Self {
        Self::new_node(View::contiguous(shape), vec![Operation::Leaf(op)])
    }

    /// Create a node computed by `op` and register it as a consumer of the operands.
    fn from_op(view: View, op: Operation) -> Self {
        let operands: Vec<Tensor> = op.operands().into_iter().cloned().collect();
        let out = Self::new_node(view, vec![op]);
        for operand in &operands {
            operand.add_consumer(&out);
        }
        out
    }

    fn add_consumer(&self, consumer: &Tensor) {
        let mut consumers = self.0.consumers.borrow_mut();
        consumers.retain(|w| w.strong_count() > 0);
        consumers.push(Rc::downgrade(&consumer.0));
    }

    // === Constructors ===

    pub fn full(shape: impl Into<Shape>, value: f32) -> Self {
        Self::leaf(shape, LeafOp::Const(value))
    }

    pub fn zeros(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: impl Into<Shape>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Single-element tensor of shape `[1]`.
    pub fn scalar(value: f32) -> Self {
        Self::full([1], value)
    }

    /// `0, 1, 2, ...` in row-major order.
    pub fn arange(shape: impl Into<Shape>) -> Self {
        Self::arange_with(shape, 0.0, 1.0)
    }

    pub fn arange_with(shape: impl Into<Shape>, start: f32, step: f32) -> Self {
        Self::leaf(shape, LeafOp::Arange { start, step })
    }

    /// Uniform integers in `[lo, hi]`, drawn on first forward.
    pub fn randint(shape: impl Into<Shape>, lo: i64, hi: i64, rng: &RandomSource) -> Self {
        Self::leaf(
            shape,
            LeafOp::RandInt {
                lo,
                hi,
                rng: rng.clone(),
            },
        )
    }

    /// Standard normal samples, drawn on first forward.
    pub fn randn(shape: impl Into<Shape>, rng: &RandomSource) -> Self {
        Self::leaf(shape, LeafOp::RandNormal { rng: rng.clone() })
    }

    /// Row-major `data` of the given shape.
    pub fn from_vec(data: Vec<f32>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into().normalized();
        if shape.numel() != data.len() {
            return Err(ShapeError::ShapeMismatch {
                op: "from_vec",
                lhs: Shape::from([data.len()]),
                rhs: shape,
            }
            .into());
        }
        Ok(Self::leaf(shape, LeafOp::FromArray(data.into())))
    }

    // === Accessors ===

    pub fn id(&self) -> TensorId {
        self.0.id
    }

    pub fn view(&self) -> &View {
        &self.0.view
    }

    pub fn shape(&self) -> &Shape {
        self.0.view.shape()
    }

    pub fn ndim(&self) -> usize {
        self.0.view.rank()
    }

    pub fn size(&self) -> usize {
        self.0.view.size()
    }

    pub fn is_materialized(&self) -> bool {
        self.0.buffer.borrow().is_some()
    }

    /// Accumulated gradient, if a backward pass reached this tensor.
    pub fn grad(&self) -> Option<Tensor> {
        self.0.grad.borrow().clone()
    }

    /// Values in logical row-major order.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        let buf = self.buffer()?;
        Ok(self.view().positions().map(|p| buf.get(p)).collect())
    }

    /// The value of a single-element tensor.
    pub fn item(&self) -> Result<f32> {
        if self.size() != 1 {
            return Err(ShapeError::ShapeMismatch {
                op: "item",
                lhs: self.shape().clone(),
                rhs: Shape::from([1]),
            }
            .into());
        }
        let buf = self.buffer()?;
        Ok(buf.get(self.view().offset()))
    }

    /// Labels of the pending operations, in execution order.
    pub fn op_labels(&self) -> Vec<&'static str> {
        self.0.ops.borrow().iter().map(Operation::label).collect()
    }

    /// Live tensors whose operations read this one.
    pub fn consumers(&self) -> Vec<Tensor> {
        self.0
            .consumers
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(Tensor)
            .collect()
    }

    /// Operands of every pending operation, in list order.
    pub fn operands(&self) -> Vec<Tensor> {
        self.0
            .ops
            .borrow()
            .iter()
            .flat_map(|op| op.operands().into_iter().cloned())
            .collect()
    }

    // === Buffer and gradient slots ===

    pub(crate) fn buffer(&self) -> Result<Rc<Buffer>> {
        self.0
            .buffer
            .borrow()
            .clone()
            .ok_or(TensorError::Unmaterialized { id: self.id() })
    }

    /// The buffer, allocating a zeroed one sized for the view if absent.
    pub(crate) fn ensure_buffer(&self) -> Rc<Buffer> {
        let mut slot = self.0.buffer.borrow_mut();
        Rc::clone(slot.get_or_insert_with(|| Rc::new(Buffer::zeros(self.0.view.extent_end()))))
    }

    pub(crate) fn set_buffer(&self, buffer: Rc<Buffer>) {
        *self.0.buffer.borrow_mut() = Some(buffer);
    }

    /// The gradient slot, created contiguous and zero-filled on first use.
    pub(crate) fn ensure_grad(&self) -> Tensor {
        let mut slot = self.0.grad.borrow_mut();
        slot.get_or_insert_with(|| {
            let view = View::contiguous(self.shape());
            let grad = Tensor::new_node(view, Vec::new());
            grad.set_buffer(Rc::new(Buffer::zeros(self.size())));
            grad
        })
        .clone()
    }

    pub(crate) fn seed_grad(&self, value: f32) {
        if let Ok(buf) = self.ensure_grad().buffer() {
            buf.fill(value);
        }
    }

    pub(crate) fn clear_grad(&self) {
        if let Some(grad) = self.grad() {
            if let Ok(buf) = grad.buffer() {
                buf.fill(0.0);
            }
        }
    }

    /// Whether any pending op derives this tensor from others (in-place updates aside).
    pub(crate) fn is_computed(&self) -> bool {
        self.0.ops.borrow().iter().any(|op| {
            !matches!(
                op,
                Operation::Leaf(_)
                    | Operation::Unary {
                        kind: UnaryKind::Assign(_),
                        ..
                    }
            )
        })
    }

    pub(crate) fn run_forward(&self) -> Result<()> {
        let ops = self.0.ops.borrow();
        for op in ops.iter() {
            trace!(tensor = %self.id(), op = op.label(), "forward");
            op.forward(self)?;
        }
        Ok(())
    }

    pub(crate) fn run_backward(&self) -> Result<()> {
        let ops = self.0.ops.borrow();
        for op in ops.iter().rev() {
            trace!(tensor = %self.id(), op = op.label(), "backward");
            op.backward(self)?;
        }
        Ok(())
    }

    // === Passes ===

    /// Sort the graph rooted here (once) and run it forward.
    pub fn forward(&self) -> Result<()> {
        self.cached_graph_or_build().forward()
    }

    /// Seed this tensor's gradient with 1.0 and run the cached graph backward.
    ///
    /// Gradients accumulate across calls; see [`zero_grad`](Self::zero_grad).
    pub fn backward(&self) -> Result<()> {
        let graph = self.cached_graph()?;
        if self.size() != 1 {
            return Err(TensorError::GradientOnNonScalar {
                shape: self.shape().clone(),
            });
        }
        self.seed_grad(1.0);
        graph.backward()
    }

    /// Backward with an explicit upstream gradient of this tensor's shape.
    pub fn backward_with(&self, seed: &Tensor) -> Result<()> {
        let graph = self.cached_graph()?;
        if seed.shape() != self.shape() {
            return Err(ShapeError::ShapeMismatch {
                op: "backward_with",
                lhs: self.shape().clone(),
                rhs: seed.shape().clone(),
            }
            .into());
        }
        let values = seed.to_vec()?;
        let grad = self.ensure_grad();
        let buf = grad.buffer()?;
        for (p, v) in grad.view().positions().zip(values) {
            buf.set(p, v);
        }
        graph.backward()
    }

    /// Zero every gradient in the cached graph, or just this tensor's without one.
    pub fn zero_grad(&self) {
        match self.cached_graph() {
            Ok(graph) => graph.zero_grad(),
            Err(_) => self.clear_grad(),
        }
    }

    /// Run this tensor's pending ops now and drop them, leaving a materialized leaf.
    pub fn realize(&self) -> Result<()> {
        self.run_forward()?;
        self.0.ops.borrow_mut().clear();
        bump_epoch();
        Ok(())
    }

    fn cached_graph(&self) -> Result<Rc<Graph>> {
        self.0
            .graph
            .borrow()
            .as_ref()
            .map(|(_, g)| Rc::clone(g))
            .ok_or(TensorError::GraphUninitialized)
    }

    fn cached_graph_or_build(&self) -> Rc<Graph> {
        let epoch = current_epoch();
        let mut slot = self.0.graph.borrow_mut();
        match slot.as_ref() {
            Some((built, graph)) if *built == epoch => Rc::clone(graph),
            _ => {
                let graph = Rc::new(Graph::new(self));
                *slot = Some((epoch, Rc::clone(&graph)));
                graph
            }
        }
    }

    // === Elementwise unary ===

    fn map(&self, f: MapFn) -> Tensor {
        Self::from_op(
            View::contiguous(self.shape()),
            Operation::unary(UnaryKind::Map(f), self.clone()),
        )
    }

    pub fn pow(&self, exponent: f32) -> Tensor {
        self.map(MapFn::Pow(exponent))
    }

    pub fn log(&self) -> Tensor {
        self.map(MapFn::Log)
    }

    pub fn sin(&self) -> Tensor {
        self.map(MapFn::Sin)
    }

    pub fn cos(&self) -> Tensor {
        self.map(MapFn::Cos)
    }

    pub fn exp(&self) -> Tensor {
        self.map(MapFn::Exp)
    }

    pub fn tanh(&self) -> Tensor {
        self.map(MapFn::Tanh)
    }

    /// `numerator / x`
    pub fn recip(&self, numerator: f32) -> Tensor {
        self.map(MapFn::Recip(numerator))
    }

    pub fn neg(&self) -> Tensor {
        self.map(MapFn::Neg)
    }

    pub fn sq(&self) -> Tensor {
        self.map(MapFn::Sq)
    }

    pub fn sqrt(&self) -> Tensor {
        self.map(MapFn::Sqrt)
    }

    pub fn relu(&self) -> Tensor {
        self.map(MapFn::Relu)
    }

    pub fn sigmoid(&self) -> Tensor {
        self.map(MapFn::Sigmoid)
    }

    // === Elementwise binary ===

    /// `self` if it already has `shape`, otherwise a broadcast view node.
    fn expand_to(&self, shape: &Shape) -> Result<Tensor> {
        if self.shape() == shape {
            Ok(self.clone())
        } else {
            self.broadcast_to(shape.clone())
        }
    }

    fn binary(&self, kind: BinaryKind, rhs: &Tensor, op: &'static str) -> Result<Tensor> {
        let target = self
            .shape()
            .broadcast_with(rhs.shape())
            .ok_or_else(|| ShapeError::ShapeMismatch {
                op,
                lhs: self.shape().clone(),
                rhs: rhs.shape().clone(),
            })?;
        let lhs = self.expand_to(&target)?;
        let rhs = rhs.expand_to(&target)?;
        Ok(Self::from_op(
            View::contiguous(target),
            Operation::binary(kind, lhs, rhs),
        ))
    }

    pub fn add(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Arith(ArithOp::Add), rhs, "add")
    }

    pub fn sub(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Arith(ArithOp::Sub), rhs, "sub")
    }

    pub fn mul(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Arith(ArithOp::Mul), rhs, "mul")
    }

    pub fn div(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Arith(ArithOp::Div), rhs, "div")
    }

    pub fn eq(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Eq), rhs, "eq")
    }

    pub fn neq(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Neq), rhs, "neq")
    }

    pub fn lt(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Lt), rhs, "lt")
    }

    pub fn gt(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Gt), rhs, "gt")
    }

    pub fn le(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Le), rhs, "le")
    }

    pub fn ge(&self, rhs: &Tensor) -> Result<Tensor> {
        self.binary(BinaryKind::Compare(CompareOp::Ge), rhs, "ge")
    }

    /// A constant `[1]` leaf viewed with stride 0 at this tensor's shape.
    fn splat(&self, value: f32) -> Tensor {
        let target = self.shape().clone();
        let view = View::from_parts(0, target.clone(), Strides(vec![0; target.ndim()]));
        Self::from_op(
            view,
            Operation::unary(UnaryKind::View(Reindex::Broadcast(target)), Tensor::scalar(value)),
        )
    }

    fn arith_scalar(&self, op: ArithOp, value: f32) -> Tensor {
        Self::from_op(
            View::contiguous(self.shape()),
            Operation::binary(BinaryKind::Arith(op), self.clone(), self.splat(value)),
        )
    }

    pub fn add_scalar(&self, value: f32) -> Tensor {
        self.arith_scalar(ArithOp::Add, value)
    }

    pub fn sub_scalar(&self, value: f32) -> Tensor {
        self.arith_scalar(ArithOp::Sub, value)
    }

    pub fn mul_scalar(&self, value: f32) -> Tensor {
        self.arith_scalar(ArithOp::Mul, value)
    }

    pub fn div_scalar(&self, value: f32) -> Tensor {
        self.arith_scalar(ArithOp::Div, value)
    }

    // === Reductions ===

    fn reduce(&self, op: ReduceOp, dim: Option<usize>) -> Result<Tensor> {
        let shape = match dim {
            None => Shape::from([1]),
            Some(d) if d >= self.ndim() => {
                return Err(ShapeError::InvalidDimension {
                    dim: d,
                    rank: self.ndim(),
                }
                .into())
            }
            Some(d) => self.shape().without(d),
        };
        Ok(Self::from_op(
            View::contiguous(shape),
            Operation::unary(UnaryKind::Reduce { op, dim }, self.clone()),
        ))
    }

    /// Sum over every element (`None`, shape `[1]`) or over one dimension.
    pub fn sum(&self, dim: Option<usize>) -> Result<Tensor> {
        self.reduce(ReduceOp::Sum, dim)
    }

    pub fn max(&self, dim: Option<usize>) -> Result<Tensor> {
        self.reduce(ReduceOp::Max, dim)
    }

    pub fn min(&self, dim: Option<usize>) -> Result<Tensor> {
        self.reduce(ReduceOp::Min, dim)
    }

    pub fn mean(&self, dim: Option<usize>) -> Result<Tensor> {
        let n = match dim {
            Some(d) if d < self.ndim() => self.shape().dim(d),
            _ => self.size(),
        };
        Ok(self.sum(dim)?.div_scalar(n as f32))
    }

    /// `exp(x - max) / sum(exp(x - max))` along `dim`, or over every element.
    pub fn softmax(&self, dim: Option<usize>) -> Result<Tensor> {
        let rank = self.ndim();
        let keep = |t: Tensor| match dim {
            Some(d) if rank > 1 => t.unsqueeze(Some(d)),
            _ => Ok(t),
        };
        let max = keep(self.max(dim)?)?;
        let shifted = self.sub(&max)?.exp();
        let total = keep(shifted.sum(dim)?)?;
        shifted.div(&total)
    }

    // === Linear algebra ===

    /// Batched product of `[.., H1, W]` and `[.., W, H2]`.
    pub fn matmul(&self, rhs: &Tensor) -> Result<Tensor> {
        let (lr, rr) = (self.ndim(), rhs.ndim());
        if lr != rr || lr < 2 {
            return Err(TensorError::MatmulRank { lhs: lr, rhs: rr });
        }
        let (l, r) = (self.shape().dims(), rhs.shape().dims());
        if l[..lr - 2] != r[..rr - 2] || l[lr - 1] != r[rr - 2] {
            return Err(ShapeError::ShapeMismatch {
                op: "matmul",
                lhs: self.shape().clone(),
                rhs: rhs.shape().clone(),
            }
            .into());
        }

        let mut dims = l[..lr - 1].to_vec();
        dims.push(r[rr - 1]);
        Ok(Self::from_op(
            View::contiguous(dims),
            Operation::binary(
                BinaryKind::Matmul(MatmulGrad::default()),
                self.clone(),
                rhs.t()?,
            ),
        ))
    }

    // === Views ===

    fn reindexed(&self, reindex: Reindex) -> Result<Tensor> {
        let view = reindex.apply(self.view())?;
        Ok(Self::from_op(
            view,
            Operation::unary(UnaryKind::View(reindex), self.clone()),
        ))
    }

    pub fn broadcast_to(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        self.reindexed(Reindex::Broadcast(shape.into()))
    }

    pub fn permute(&self, perm: &[usize]) -> Result<Tensor> {
        self.reindexed(Reindex::Permute(perm.to_vec()))
    }

    /// Reverse the dimensions from `start_dim` onward.
    pub fn transpose(&self, start_dim: usize) -> Result<Tensor> {
        self.permute(&transpose_perm(self.ndim(), start_dim)?)
    }

    /// Swap the last two dimensions.
    pub fn t(&self) -> Result<Tensor> {
        self.transpose(self.ndim().saturating_sub(2))
    }

    pub fn squeeze(&self, dim: Option<usize>) -> Result<Tensor> {
        self.reindexed(Reindex::Squeeze(dim))
    }

    pub fn unsqueeze(&self, dim: Option<usize>) -> Result<Tensor> {
        self.reindexed(Reindex::Unsqueeze(dim))
    }

    /// Fix the leading dimensions.
    pub fn at(&self, indices: &[usize]) -> Result<Tensor> {
        self.reindexed(Reindex::Index(indices.to_vec()))
    }

    pub fn slice(&self, ranges: &[Slice]) -> Result<Tensor> {
        self.reindexed(Reindex::Slice(ranges.to_vec()))
    }

    /// Alias when contiguous, otherwise copy first.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Tensor> {
        let target = shape.into().normalized();
        if target.numel() != self.size() {
            return Err(ShapeError::ShapeMismatch {
                op: "reshape",
                lhs: self.shape().clone(),
                rhs: target,
            }
            .into());
        }
        let base = if self.view().is_contiguous() {
            self.clone()
        } else {
            self.copy()
        };
        base.reindexed(Reindex::Reshape(target))
    }

    pub fn flatten(&self) -> Result<Tensor> {
        self.reshape([self.size()])
    }

    /// Same buffer and view, no gradient path.
    pub fn alias(&self) -> Tensor {
        Self::from_op(
            self.view().clone(),
            Operation::unary(UnaryKind::Alias, self.clone()),
        )
    }

    /// Materialize into a fresh contiguous buffer.
    pub fn copy(&self) -> Tensor {
        Self::from_op(
            View::contiguous(self.shape()),
            Operation::unary(UnaryKind::Copy, self.clone()),
        )
    }

    /// A new leaf sharing this tensor's buffer and view, with no pending ops.
    pub fn detach(&self) -> Result<Tensor> {
        let buffer = self.buffer()?;
        let leaf = Self::new_node(self.view().clone(), Vec::new());
        leaf.set_buffer(buffer);
        Ok(leaf)
    }

    // === In-place ===

    fn assign(&self, op: ArithOp, rhs: &Tensor) -> Result<()> {
        if rhs.depends_on(self) {
            return Err(TensorError::InPlaceSelfReference);
        }
        let rhs = rhs.expand_to(self.shape())?;
        rhs.add_consumer(self);
        self.0
            .ops
            .borrow_mut()
            .push(Operation::unary(UnaryKind::Assign(op), rhs));
        bump_epoch();
        Ok(())
    }

    /// `self += rhs` on every forward pass from now on. Forward only.
    pub fn add_assign(&self, rhs: &Tensor) -> Result<()> {
        self.assign(ArithOp::Add, rhs)
    }

    pub fn sub_assign(&self, rhs: &Tensor) -> Result<()> {
        self.assign(ArithOp::Sub, rhs)
    }

    pub fn mul_assign(&self, rhs: &Tensor) -> Result<()> {
        self.assign(ArithOp::Mul, rhs)
    }

    pub fn div_assign(&self, rhs: &Tensor) -> Result<()> {
        self.assign(ArithOp::Div, rhs)
    }

    /// Whether `target` is `self` or reachable through operand edges.
    fn depends_on(&self, target: &Tensor) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![self.clone()];
        while let Some(t) = stack.pop() {
            if t.id() == target.id() {
                return true;
            }
            if seen.insert(t.id()) {
                stack.extend(t.operands());
            }
        }
        false
    }
}

impl std::ops::Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::neg(self)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id())
            .field("shape", self.shape())
            .field("ops", &self.op_labels())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_vec() {
            Ok(values) => write_nested(f, &values, self.shape().dims()),
            Err(_) => write!(f, "<unmaterialized {}>", self.shape()),
        }
    }
}

fn write_nested(f: &mut fmt::Formatter<'_>, values: &[f32], dims: &[usize]) -> fmt::Result {
    write!(f, "[")?;
    match dims {
        [] | [_] => {
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", v)?;
            }
        }
        [n, rest @ ..] => {
            let chunk: usize = rest.iter().product();
            for i in 0..*n {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_nested(f, &values[i * chunk..(i + 1) * chunk], rest)?;
            }
        }
    }
    write!(f, "]")
}

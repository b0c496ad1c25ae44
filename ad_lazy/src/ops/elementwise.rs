//! Elementwise kernels.

use ad_strided::lockstep;

use crate::error::Result;
use crate::tensor::Tensor;

/// Elementwise unary functions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MapFn {
    /// `x^c`
    Pow(f32),
    Log,
    Sin,
    Cos,
    Exp,
    Tanh,
    /// `c / x`
    Recip(f32),
    Neg,
    Sq,
    Sqrt,
    Relu,
    Sigmoid,
}

impl MapFn {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            MapFn::Pow(c) => x.powf(c),
            MapFn::Log => x.ln(),
            MapFn::Sin => x.sin(),
            MapFn::Cos => x.cos(),
            MapFn::Exp => x.exp(),
            MapFn::Tanh => x.tanh(),
            MapFn::Recip(c) => c / x,
            MapFn::Neg => -x,
            MapFn::Sq => x * x,
            MapFn::Sqrt => x.sqrt(),
            MapFn::Relu => x.max(0.0),
            MapFn::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// dy/dx given the input `x` and output `y`.
    pub fn derivative(self, x: f32, y: f32) -> f32 {
        match self {
            // d(x^c)/dx = c * x^(c-1)
            MapFn::Pow(c) => c * x.powf(c - 1.0),
            // d(ln(x))/dx = 1/x
            MapFn::Log => 1.0 / x,
            // d(sin(x))/dx = cos(x)
            MapFn::Sin => x.cos(),
            // d(cos(x))/dx = -sin(x)
            MapFn::Cos => -x.sin(),
            // d(exp(x))/dx = exp(x)
            MapFn::Exp => y,
            // d(tanh(x))/dx = 1 - tanh^2(x)
            MapFn::Tanh => 1.0 - y * y,
            // d(c/x)/dx = -c/x^2
            MapFn::Recip(c) => -c / (x * x),
            MapFn::Neg => -1.0,
            MapFn::Sq => 2.0 * x,
            // d(sqrt(x))/dx = 0.5/sqrt(x)
            MapFn::Sqrt => 0.5 / y,
            MapFn::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            // d(sigmoid(x))/dx = sigmoid(x) * (1 - sigmoid(x))
            MapFn::Sigmoid => y * (1.0 - y),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MapFn::Pow(_) => "POW",
            MapFn::Log => "LOG",
            MapFn::Sin => "SIN",
            MapFn::Cos => "COS",
            MapFn::Exp => "EXP",
            MapFn::Tanh => "TANH",
            MapFn::Recip(_) => "RECIP",
            MapFn::Neg => "NEG",
            MapFn::Sq => "SQ",
            MapFn::Sqrt => "SQRT",
            MapFn::Relu => "RELU",
            MapFn::Sigmoid => "SIGMOID",
        }
    }
}

/// Binary arithmetic, also used by the in-place assign ops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
        }
    }

    /// (d/da, d/db) of `a op b`.
    pub fn partials(self, a: f32, b: f32) -> (f32, f32) {
        match self {
            ArithOp::Add => (1.0, 1.0),
            ArithOp::Sub => (1.0, -1.0),
            ArithOp::Mul => (b, a),
            // d(a/b)/db = -a/b^2
            ArithOp::Div => (1.0 / b, -a / (b * b)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD",
            ArithOp::Sub => "SUB",
            ArithOp::Mul => "MUL",
            ArithOp::Div => "DIV",
        }
    }

    pub fn assign_label(self) -> &'static str {
        match self {
            ArithOp::Add => "ADD_ASSIGN",
            ArithOp::Sub => "SUB_ASSIGN",
            ArithOp::Mul => "MUL_ASSIGN",
            ArithOp::Div => "DIV_ASSIGN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CompareOp {
    pub fn apply(self, a: f32, b: f32) -> f32 {
        let hit = match self {
            CompareOp::Eq => a == b,
            CompareOp::Neq => a != b,
            CompareOp::Lt => a < b,
            CompareOp::Gt => a > b,
            CompareOp::Le => a <= b,
            CompareOp::Ge => a >= b,
        };
        if hit {
            1.0
        } else {
            0.0
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CompareOp::Eq => "EQ",
            CompareOp::Neq => "NEQ",
            CompareOp::Lt => "LT",
            CompareOp::Gt => "GT",
            CompareOp::Le => "LE",
            CompareOp::Ge => "GE",
        }
    }
}

pub(super) fn map_forward(f: MapFn, operand: &Tensor, out: &Tensor) -> Result<()> {
    let src = operand.buffer()?;
    let dst = out.ensure_buffer();
    for [i, o] in lockstep([operand.view(), out.view()]) {
        dst.set(o, f.apply(src.get(i)));
    }
    Ok(())
}

pub(super) fn map_backward(f: MapFn, operand: &Tensor, out: &Tensor) -> Result<()> {
    let Some(grad) = out.grad() else {
        return Ok(());
    };
    let (x, y, g) = (operand.buffer()?, out.buffer()?, grad.buffer()?);
    let operand_grad = operand.ensure_grad();
    let gx = operand_grad.buffer()?;

    for [xi, yi, gi, gxi] in lockstep([
        operand.view(),
        out.view(),
        grad.view(),
        operand_grad.view(),
    ]) {
        gx.accumulate(gxi, g.get(gi) * f.derivative(x.get(xi), y.get(yi)));
    }
    Ok(())
}

/// Operands were broadcast to the output extents at construction.
pub(super) fn binary_forward(
    f: impl Fn(f32, f32) -> f32,
    lhs: &Tensor,
    rhs: &Tensor,
    out: &Tensor,
) -> Result<()> {
    let (a, b) = (lhs.buffer()?, rhs.buffer()?);
    let dst = out.ensure_buffer();
    for [ai, bi, o] in lockstep([lhs.view(), rhs.view(), out.view()]) {
        dst.set(o, f(a.get(ai), b.get(bi)));
    }
    Ok(())
}

pub(super) fn arith_backward(op: ArithOp, lhs: &Tensor, rhs: &Tensor, out: &Tensor) -> Result<()> {
    let Some(grad) = out.grad() else {
        return Ok(());
    };
    let (a, b, g) = (lhs.buffer()?, rhs.buffer()?, grad.buffer()?);
    let (lhs_grad, rhs_grad) = (lhs.ensure_grad(), rhs.ensure_grad());
    let (ga, gb) = (lhs_grad.buffer()?, rhs_grad.buffer()?);

    for [ai, bi, gi, gai, gbi] in lockstep([
        lhs.view(),
        rhs.view(),
        grad.view(),
        lhs_grad.view(),
        rhs_grad.view(),
    ]) {
        let upstream = g.get(gi);
        let (da, db) = op.partials(a.get(ai), b.get(bi));
        ga.accumulate(gai, upstream * da);
        gb.accumulate(gbi, upstream * db);
    }
    Ok(())
}

/// `out op= operand`, reading the output's current values.
pub(super) fn assign_forward(op: ArithOp, operand: &Tensor, out: &Tensor) -> Result<()> {
    let src = operand.buffer()?;
    let dst = out.ensure_buffer();
    for [r, o] in lockstep([operand.view(), out.view()]) {
        dst.set(o, op.apply(dst.get(o), src.get(r)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relu_forward_is_max() {
        assert_eq!(MapFn::Relu.apply(-2.0), 0.0);
        assert_eq!(MapFn::Relu.apply(3.0), 3.0);
        assert_eq!(MapFn::Relu.derivative(-2.0, 0.0), 0.0);
        assert_eq!(MapFn::Relu.derivative(3.0, 3.0), 1.0);
    }

    #[test]
    fn test_derivatives_against_closed_forms() {
        let x = 0.7f32;
        let y = MapFn::Sigmoid.apply(x);
        assert!((MapFn::Sigmoid.derivative(x, y) - y * (1.0 - y)).abs() < 1e-6);

        let y = MapFn::Recip(3.0).apply(x);
        assert!((y - 3.0 / x).abs() < 1e-6);
        assert!((MapFn::Recip(3.0).derivative(x, y) + 3.0 / (x * x)).abs() < 1e-5);

        let y = MapFn::Pow(3.0).apply(x);
        assert!((MapFn::Pow(3.0).derivative(x, y) - 3.0 * x * x).abs() < 1e-5);
    }

    #[test]
    fn test_div_partials() {
        let (da, db) = ArithOp::Div.partials(6.0, 2.0);
        assert_eq!(da, 0.5);
        assert_eq!(db, -1.5);
    }

    #[test]
    fn test_compare() {
        assert_eq!(CompareOp::Lt.apply(1.0, 2.0), 1.0);
        assert_eq!(CompareOp::Ge.apply(1.0, 2.0), 0.0);
        assert_eq!(CompareOp::Neq.apply(1.0, 1.0), 0.0);
    }
}

//! Finite difference utilities for gradient verification.
//!
//! Provides numerical gradients for testing backward kernels.

use ad_strided::Shape;

use crate::error::{Result, TensorError};
use crate::tensor::Tensor;

/// Central finite differences of a scalar function.
///
/// # Arguments
/// * `f` - Function of the variable values returning a scalar
/// * `point` - The point at which to compute gradients
/// * `eps` - Step size; around `1e-2` suits `f32`
///
/// # Example
/// ```
/// use ad_lazy::finite_diff_grad;
///
/// // f(x, y) = x^2 + y^2
/// let grads = finite_diff_grad(|v| v[0] * v[0] + v[1] * v[1], &[3.0, 4.0], 1e-2);
/// assert!((grads[0] - 6.0).abs() < 1e-2);
/// assert!((grads[1] - 8.0).abs() < 1e-2);
/// ```
pub fn finite_diff_grad<F>(mut f: F, point: &[f32], eps: f32) -> Vec<f32>
where
    F: FnMut(&[f32]) -> f32,
{
    let mut perturbed = point.to_vec();
    (0..point.len())
        .map(|i| {
            perturbed[i] = point[i] + eps;
            let f_plus = f(&perturbed);
            perturbed[i] = point[i] - eps;
            let f_minus = f(&perturbed);
            perturbed[i] = point[i];
            (f_plus - f_minus) / (2.0 * eps)
        })
        .collect()
}

/// Largest absolute elementwise difference. Infinite if the lengths differ.
pub fn max_grad_error(grad1: &[f32], grad2: &[f32]) -> f32 {
    if grad1.len() != grad2.len() {
        return f32::INFINITY;
    }
    grad1
        .iter()
        .zip(grad2)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f32::max)
}

/// Backward-pass and numerical gradients of one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct GradCheck {
    pub analytic: Vec<f32>,
    pub numeric: Vec<f32>,
}

impl GradCheck {
    pub fn max_error(&self) -> f32 {
        max_grad_error(&self.analytic, &self.numeric)
    }
}

/// Compare the gradient of `build(x)` at `point` against finite differences.
///
/// `build` must return a single-element tensor; it is called once for the
/// backward pass and twice per coordinate on fresh graphs.
pub fn check_gradient<F>(
    shape: impl Into<Shape>,
    point: &[f32],
    eps: f32,
    build: F,
) -> Result<GradCheck>
where
    F: Fn(&Tensor) -> Result<Tensor>,
{
    let shape = shape.into();
    let eval = |values: &[f32]| -> Result<f32> {
        let x = Tensor::from_vec(values.to_vec(), shape.clone())?;
        let y = build(&x)?;
        y.forward()?;
        y.item()
    };

    let x = Tensor::from_vec(point.to_vec(), shape.clone())?;
    let y = build(&x)?;
    y.forward()?;
    y.backward()?;
    let analytic = match x.grad() {
        Some(g) => g.to_vec()?,
        None => vec![0.0; point.len()],
    };

    let mut failure: Option<TensorError> = None;
    let numeric = finite_diff_grad(
        |p| {
            eval(p).unwrap_or_else(|e| {
                failure.get_or_insert(e);
                f32::NAN
            })
        },
        point,
        eps,
    );
    match failure {
        Some(e) => Err(e),
        None => Ok(GradCheck { analytic, numeric }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_diff_quadratic() {
        // f(x, y) = x^2 + 2*x*y + y^2
        // df/dx = df/dy = 2x + 2y
        let f = |v: &[f32]| v[0] * v[0] + 2.0 * v[0] * v[1] + v[1] * v[1];
        let grads = finite_diff_grad(f, &[1.0, 2.0], 1e-2);
        assert!((grads[0] - 6.0).abs() < 1e-3);
        assert!((grads[1] - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_max_grad_error() {
        let err = max_grad_error(&[1.0, 2.0, 3.0], &[1.1, 2.0, 2.8]);
        assert!((err - 0.2).abs() < 1e-6);
        assert_eq!(max_grad_error(&[1.0], &[]), f32::INFINITY);
    }

    #[test]
    fn test_check_gradient_sin_exp() {
        // d/dx sum(sin(x) * exp(x)) = (cos(x) + sin(x)) * exp(x)
        let check = check_gradient([3], &[0.1, 0.5, -0.4], 1e-2, |x| {
            x.sin().mul(&x.exp())?.sum(None)
        })
        .unwrap();
        assert!(check.max_error() < 1e-2, "{:?}", check);
    }

    #[test]
    fn test_check_gradient_propagates_errors() {
        let err = check_gradient([2], &[1.0, 2.0], 1e-2, |x| x.sum(Some(3))).unwrap_err();
        assert!(matches!(err, TensorError::Shape(_)));
    }
}

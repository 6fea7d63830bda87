//! Central difference Jacobians.
//!
//! Used to cross-check analytic constraint Jacobians and to build numeric
//! sensitivities of the dynamics when no AD scalar is in play.

use crate::error::SolverResult;
use nalgebra::{DMatrix, DVector};

/// Step for column `j`, scaled with the magnitude of `x[j]`.
fn step(x: &DVector<f64>, j: usize, epsilon: f64) -> f64 {
    epsilon * x[j].abs().max(1.0)
}

/// Compute Jacobian using central finite differences (second order, 2x cost).
pub fn central_difference_jacobian<F>(
    x: &DVector<f64>,
    f: F,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
{
    let m = f(x)?.len();
    let mut jac = DMatrix::zeros(m, x.len());

    for j in 0..x.len() {
        let dx = step(x, j, epsilon);

        let mut x_plus = x.clone();
        x_plus[j] += dx;
        let mut x_minus = x.clone();
        x_minus[j] -= dx;

        let df = (f(&x_plus)? - f(&x_minus)?) / (2.0 * dx);
        jac.set_column(j, &df);
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jacobian_linear() {
        // f(x) = A*x, Jacobian should be A
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let f = |x: &DVector<f64>| -> SolverResult<DVector<f64>> { Ok(&a * x) };

        let x = DVector::from_vec(vec![1.0, 1.0]);
        let jac = central_difference_jacobian(&x, f, 1e-7).unwrap();

        assert!((jac - &a).abs().max() < 1e-7);
    }

    #[test]
    fn jacobian_nonlinear_central() {
        // f(x) = [x0^2, x0*x1], J = [[2x0, 0], [x1, x0]]
        let f = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] * x[0], x[0] * x[1]]))
        };

        let x = DVector::from_vec(vec![2.0, 3.0]);
        let jac = central_difference_jacobian(&x, f, 1e-6).unwrap();

        let expected = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 3.0, 2.0]);
        assert!((jac - expected).abs().max() < 1e-6);
    }

    #[test]
    fn rectangular_shapes() {
        let f = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x.sum()))
        };
        let jac = central_difference_jacobian(&DVector::zeros(3), f, 1e-6).unwrap();
        assert_eq!(jac.shape(), (1, 3));
    }
}

//! Damped Newton iteration.

use crate::error::{SolverError, SolverResult};
use ks_core::{Real, lit, to_f64};
use nalgebra::{DMatrix, DVector};

/// Newton solver configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm (0 disables)
    pub rel_tol: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            abs_tol: 1e-10,
            rel_tol: 0.0,
            line_search_beta: 0.5,
            max_line_search_iters: 20,
        }
    }
}

impl NewtonConfig {
    /// Reject settings that can never converge.
    pub fn validate(&self) -> SolverResult<()> {
        if self.max_iterations == 0 {
            return Err(SolverError::ProblemSetup {
                what: "max_iterations must be at least 1".to_string(),
            });
        }
        if !(self.abs_tol > 0.0) || self.rel_tol < 0.0 {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "tolerances must be positive (abs_tol={}, rel_tol={})",
                    self.abs_tol, self.rel_tol
                ),
            });
        }
        if !(self.line_search_beta > 0.0 && self.line_search_beta < 1.0) {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "line_search_beta must lie in (0, 1), got {}",
                    self.line_search_beta
                ),
            });
        }
        Ok(())
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult<T: Real> {
    /// Solution vector
    pub x: DVector<T>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
}

/// Newton solver with backtracking line search.
///
/// Only ever returns a point whose residual norm passed the tolerance test;
/// exhausting the iteration cap or stalling in the line search is an error.
pub fn newton_solve<T, F, J>(
    x0: DVector<T>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult<T>>
where
    T: Real,
    F: Fn(&DVector<T>) -> SolverResult<DVector<T>>,
    J: Fn(&DVector<T>) -> SolverResult<DMatrix<T>>,
{
    let abs_tol: T = lit(config.abs_tol);
    let rel_tol: T = lit(config.rel_tol);
    let beta: T = lit(config.line_search_beta);

    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        // Check convergence
        if r_norm < abs_tol || r_norm < rel_tol * r0_norm {
            tracing::debug!(
                iterations = iter,
                residual = to_f64(r_norm),
                "newton converged"
            );
            return Ok(NewtonResult {
                x,
                residual_norm: to_f64(r_norm),
                iterations: iter,
            });
        }

        // Solve J * dx = -r
        let jac = jacobian_fn(&x)?;
        let dx = jac
            .lu()
            .solve(&(-r.clone()))
            .ok_or(SolverError::SingularJacobian { iteration: iter })?;

        // Backtrack until the residual decreases
        let mut alpha = T::one();
        let mut x_new = &x + &dx;
        let mut r_new = residual_fn(&x_new)?;
        let mut r_new_norm = r_new.norm();
        let mut accepted = r_new_norm < r_norm;

        for _ in 0..config.max_line_search_iters {
            if accepted {
                break;
            }
            alpha *= beta;
            x_new = &x + &dx * alpha;
            r_new = residual_fn(&x_new)?;
            r_new_norm = r_new.norm();
            accepted = r_new_norm < r_norm;
        }

        if !accepted {
            return Err(SolverError::ConvergenceFailed {
                what: format!(
                    "line search stagnated at iteration {}, residual = {:e}",
                    iter,
                    to_f64(r_norm)
                ),
            });
        }

        tracing::trace!(
            iteration = iter,
            step = to_f64(alpha),
            residual = to_f64(r_new_norm),
            "newton step"
        );

        x = x_new;
        r = r_new;
        r_norm = r_new_norm;
    }

    if r_norm < abs_tol || r_norm < rel_tol * r0_norm {
        return Ok(NewtonResult {
            x,
            residual_norm: to_f64(r_norm),
            iterations: config.max_iterations,
        });
    }

    Err(SolverError::ConvergenceFailed {
        what: format!(
            "maximum iterations {} reached, residual = {:e}",
            config.max_iterations,
            to_f64(r_norm)
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_quadratic() {
        // Solve x^2 - 4 = 0 from x = 3
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let x0 = DVector::from_element(1, 3.0);
        let config = NewtonConfig::default();
        let result = newton_solve(x0, residual, jacobian, &config).unwrap();

        assert!((result.x[0] - 2.0).abs() < 1e-9);
        assert!(result.residual_norm < config.abs_tol);
    }

    #[test]
    fn singular_jacobian_is_reported() {
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let err = newton_solve(DVector::zeros(1), residual, jacobian, &NewtonConfig::default())
            .unwrap_err();
        assert_eq!(err, SolverError::SingularJacobian { iteration: 0 });
    }

    #[test]
    fn no_root_fails_instead_of_returning() {
        // x^2 + 1 has no real root; Newton never reaches tolerance.
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let config = NewtonConfig {
            max_iterations: 10,
            ..NewtonConfig::default()
        };
        let result = newton_solve(DVector::from_element(1, 0.7), residual, jacobian, &config);
        assert!(matches!(
            result,
            Err(SolverError::ConvergenceFailed { .. }) | Err(SolverError::SingularJacobian { .. })
        ));
    }

    #[test]
    fn already_converged_takes_no_steps() {
        let residual =
            |x: &DVector<f64>| -> SolverResult<DVector<f64>> { Ok(x.map(|xi| xi - 1.0)) };
        let jacobian = |_: &DVector<f64>| -> SolverResult<DMatrix<f64>> { Ok(DMatrix::identity(2, 2)) };
        let result = newton_solve(
            DVector::from_element(2, 1.0),
            residual,
            jacobian,
            &NewtonConfig::default(),
        )
        .unwrap();
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn config_validation() {
        assert!(NewtonConfig::default().validate().is_ok());
        let bad = NewtonConfig {
            line_search_beta: 1.5,
            ..NewtonConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = NewtonConfig {
            max_iterations: 0,
            ..NewtonConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}

//! Numeric sensitivities of the dynamics for gradient checks.

use crate::error::DynamicsResult;
use crate::forward::DependentCoordinates;
use crate::system::PartitionedModel;
use ks_model::RigidBodyModel;
use ks_solver::{SolverError, central_difference_jacobian};
use nalgebra::{DMatrix, DVector};

/// Jacobians of an output with respect to `(q_u, q̇_u, τ)`.
#[derive(Clone, Debug)]
pub struct Sensitivity {
    pub wrt_q_u: DMatrix<f64>,
    pub wrt_qdot_u: DMatrix<f64>,
    pub wrt_tau: DMatrix<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensitivityOutput {
    /// Independent acceleration `q̈_u`.
    Acceleration,
    /// Lagrange multipliers `λ`.
    Multipliers,
}

/// Central-difference sensitivity of `q̈_u` or `λ`.
///
/// With an explicit `v` the configuration leaves the constraint manifold
/// when `q_u` is perturbed; that is the partial derivative an optimizer
/// tracking `v` as a state sees. With an implicit `v` the Newton tolerance
/// of the system's solver bounds the accuracy; exact derivatives come from
/// evaluating the kernel on a dual-number scalar instead.
pub fn dynamics_sensitivity<M: RigidBodyModel<f64>>(
    system: &PartitionedModel<f64, M>,
    output: SensitivityOutput,
    q_u: &DVector<f64>,
    qdot_u: &DVector<f64>,
    dependent: DependentCoordinates<'_, f64>,
    tau: &DVector<f64>,
    epsilon: f64,
) -> DynamicsResult<Sensitivity> {
    let eval = |q_u: &DVector<f64>, qdot_u: &DVector<f64>, tau: &DVector<f64>| {
        let result = match output {
            SensitivityOutput::Acceleration => {
                system.forward_dynamics(q_u, qdot_u, dependent, tau, None)
            }
            SensitivityOutput::Multipliers => {
                system.lagrange_multipliers(q_u, qdot_u, dependent, tau, None)
            }
        };
        result.map_err(|e| SolverError::Numeric {
            what: e.to_string(),
        })
    };

    let wrt_q_u = central_difference_jacobian(q_u, |x| eval(x, qdot_u, tau), epsilon)?;
    let wrt_qdot_u = central_difference_jacobian(qdot_u, |x| eval(q_u, x, tau), epsilon)?;
    let wrt_tau = central_difference_jacobian(tau, |x| eval(q_u, qdot_u, x), epsilon)?;

    Ok(Sensitivity {
        wrt_q_u,
        wrt_qdot_u,
        wrt_tau,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_core::units::{kg, m, mps2};
    use ks_model::PointMassPair;
    use ks_solver::HolonomicConstraintSolver;

    #[test]
    fn acceleration_is_linear_in_tau() {
        let pair = PointMassPair::new("pair", kg(1.0), kg(2.0), m(1.0), mps2(9.81)).unwrap();
        let system =
            PartitionedModel::with_default_partition(pair, HolonomicConstraintSolver::default())
                .unwrap();
        let q_u = DVector::from_vec(vec![0.0, 0.0, 0.6]);
        let q_v = DVector::from_vec(vec![-0.8]);
        let qdot_u = DVector::from_vec(vec![0.1, 0.0, -0.2]);
        let tau = DVector::from_vec(vec![0.5, 0.0, -0.3, 0.2]);

        let s = dynamics_sensitivity(
            &system,
            SensitivityOutput::Acceleration,
            &q_u,
            &qdot_u,
            DependentCoordinates::Explicit(&q_v),
            &tau,
            1e-6,
        )
        .unwrap();
        assert_eq!(s.wrt_tau.shape(), (3, 4));

        // q̈_u is affine in τ: a finite step reproduces the Jacobian exactly.
        let mut tau2 = tau.clone();
        tau2[3] += 1.0;
        let a = system
            .forward_dynamics_explicit(&q_u, &q_v, &qdot_u, &tau)
            .unwrap();
        let b = system
            .forward_dynamics_explicit(&q_u, &q_v, &qdot_u, &tau2)
            .unwrap();
        assert!(((b - a) - s.wrt_tau.column(3)).norm() < 1e-6);
    }
}

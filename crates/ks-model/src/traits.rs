//! Core trait for rigid-body models.

use crate::common::{check_len, scatter};
use crate::error::{ModelError, ModelResult};
use crate::partition::CoordinatePartition;
use ks_core::Real;
use nalgebra::{DMatrix, DVector, Vector3};
use std::sync::Arc;

/// Rigid-body model consumed by the constrained-dynamics kernel.
///
/// Models are immutable, deterministic functions of the configuration `q`,
/// the velocity `qdot` and the generalized force `tau`; they must be safe to
/// evaluate concurrently from many trajectory nodes. The equations of motion
/// follow the convention
///
/// ```text
/// M(q) q̈ + N(q, q̇) = τ + Jᵀ(q) λ,        g(q) = 0
/// ```
///
/// where `N` gathers Coriolis, centrifugal and gravity terms and `J = ∂g/∂q`.
pub trait RigidBodyModel<T: Real>: Send + Sync {
    /// Model name for debugging and identification.
    fn name(&self) -> &str;

    /// Number of generalized coordinates.
    fn nb_q(&self) -> usize;

    /// Number of scalar holonomic constraint equations.
    fn nb_constraints(&self) -> usize {
        0
    }

    /// Number of markers exposed by [`marker_position`](Self::marker_position).
    fn nb_markers(&self) -> usize {
        0
    }

    /// Names of the generalized coordinates, in coordinate order.
    fn dof_names(&self) -> Vec<String> {
        (0..self.nb_q()).map(|i| format!("q{i}")).collect()
    }

    /// Coordinates driven by `tau` when expressed on the actuated subset.
    fn actuated_dofs(&self) -> Vec<usize> {
        (0..self.nb_q()).collect()
    }

    /// Independent/dependent split this model is meant to be solved with.
    fn default_partition(&self) -> ModelResult<CoordinatePartition> {
        if self.nb_constraints() == 0 {
            Ok(CoordinatePartition::unconstrained(self.nb_q()))
        } else {
            Err(ModelError::NotSupported {
                what: "constrained model without a declared partition",
            })
        }
    }

    /// Joint-space mass matrix `M(q)`.
    fn mass_matrix(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>>;

    /// Nonlinear effects `N(q, q̇)` (Coriolis, centrifugal and gravity).
    fn nonlinear_effects(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>>;

    /// Constraint residual `g(q)`; zero on the valid-configuration manifold.
    fn constraint_residual(&self, q: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, self.nb_q())?;
        Ok(DVector::zeros(0))
    }

    /// Constraint Jacobian `∂g/∂q` (`nb_constraints × nb_q`).
    fn constraint_jacobian(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        check_len("q", q, self.nb_q())?;
        Ok(DMatrix::zeros(0, self.nb_q()))
    }

    /// Velocity-product term `J̇(q, q̇) q̇` of the second time-derivative of `g`.
    fn constraint_bias(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, self.nb_q())?;
        check_len("qdot", qdot, self.nb_q())?;
        Ok(DVector::zeros(0))
    }

    /// World position of marker `index`.
    fn marker_position(&self, index: usize, _q: &DVector<T>) -> ModelResult<Vector3<T>> {
        Err(ModelError::IndexOob {
            what: "marker",
            index,
            len: 0,
        })
    }

    /// Spread an actuated-subset force vector onto every coordinate,
    /// zero-filling unactuated ones. A vector that already has `nb_q`
    /// entries is returned unchanged.
    fn generalized_forces_from_partial(&self, tau: &DVector<T>) -> ModelResult<DVector<T>> {
        if tau.len() == self.nb_q() {
            return Ok(tau.clone());
        }
        let actuated = self.actuated_dofs();
        check_len("tau (actuated)", tau, actuated.len())?;
        Ok(scatter(self.nb_q(), &actuated, tau))
    }

    /// Unconstrained forward dynamics `q̈ = M⁻¹ (τ − N)` on full coordinates.
    fn raw_forward_dynamics(
        &self,
        q: &DVector<T>,
        qdot: &DVector<T>,
        tau: &DVector<T>,
    ) -> ModelResult<DVector<T>> {
        check_len("tau", tau, self.nb_q())?;
        let mass = self.mass_matrix(q)?;
        let rhs = tau - self.nonlinear_effects(q, qdot)?;
        mass.lu().solve(&rhs).ok_or(ModelError::Singular {
            what: "mass matrix",
        })
    }
}

macro_rules! forward_model {
    ($($wrapper:ty),*) => {$(
        impl<T: Real, M: RigidBodyModel<T> + ?Sized> RigidBodyModel<T> for $wrapper {
            fn name(&self) -> &str {
                (**self).name()
            }
            fn nb_q(&self) -> usize {
                (**self).nb_q()
            }
            fn nb_constraints(&self) -> usize {
                (**self).nb_constraints()
            }
            fn nb_markers(&self) -> usize {
                (**self).nb_markers()
            }
            fn dof_names(&self) -> Vec<String> {
                (**self).dof_names()
            }
            fn actuated_dofs(&self) -> Vec<usize> {
                (**self).actuated_dofs()
            }
            fn default_partition(&self) -> ModelResult<CoordinatePartition> {
                (**self).default_partition()
            }
            fn mass_matrix(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
                (**self).mass_matrix(q)
            }
            fn nonlinear_effects(
                &self,
                q: &DVector<T>,
                qdot: &DVector<T>,
            ) -> ModelResult<DVector<T>> {
                (**self).nonlinear_effects(q, qdot)
            }
            fn constraint_residual(&self, q: &DVector<T>) -> ModelResult<DVector<T>> {
                (**self).constraint_residual(q)
            }
            fn constraint_jacobian(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
                (**self).constraint_jacobian(q)
            }
            fn constraint_bias(
                &self,
                q: &DVector<T>,
                qdot: &DVector<T>,
            ) -> ModelResult<DVector<T>> {
                (**self).constraint_bias(q, qdot)
            }
            fn marker_position(&self, index: usize, q: &DVector<T>) -> ModelResult<Vector3<T>> {
                (**self).marker_position(index, q)
            }
            fn generalized_forces_from_partial(
                &self,
                tau: &DVector<T>,
            ) -> ModelResult<DVector<T>> {
                (**self).generalized_forces_from_partial(tau)
            }
            fn raw_forward_dynamics(
                &self,
                q: &DVector<T>,
                qdot: &DVector<T>,
                tau: &DVector<T>,
            ) -> ModelResult<DVector<T>> {
                (**self).raw_forward_dynamics(q, qdot, tau)
            }
        }
    )*};
}

forward_model!(&M, Box<M>, Arc<M>);

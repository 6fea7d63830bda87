//! Lagrange multipliers of the holonomic constraints.

use crate::error::{DynamicsError, DynamicsResult};
use crate::forces::GeneralizedForceField;
use crate::forward::{ConstrainedAccelerations, DependentCoordinates, NodeState};
use crate::system::PartitionedModel;
use ks_core::Real;
use ks_model::RigidBodyModel;
use nalgebra::DVector;
use rayon::prelude::*;

impl<T: Real, M: RigidBodyModel<T>> PartitionedModel<T, M> {
    /// Recover `λ` from an acceleration evaluation.
    ///
    /// The dependent rows of `M q̈ + N − τ = Jᵀλ` give
    /// `λ = J_v⁻ᵀ (M_vu q̈_u + M_vv q̈_v + N_v − τ_v)`. Unconstrained systems
    /// yield an empty vector.
    pub fn multipliers_from(&self, acc: &ConstrainedAccelerations<T>) -> DynamicsResult<DVector<T>> {
        if !self.is_constrained() {
            return Ok(DVector::zeros(0));
        }
        let generalized = &acc.mass * &acc.qddot + &acc.nonlinear_effects - &acc.tau;
        let (_, rows_v) = self.partition().reduce(&generalized);
        acc.kinematics
            .jacobian_v
            .transpose()
            .lu()
            .solve(&rows_v)
            .ok_or(DynamicsError::SingularMatrix {
                what: "transposed dependent constraint Jacobian",
            })
    }

    /// `λ` at `(q_u, q̇_u, τ)` for any way of supplying `v`.
    pub fn lagrange_multipliers(
        &self,
        q_u: &DVector<T>,
        qdot_u: &DVector<T>,
        dependent: DependentCoordinates<'_, T>,
        tau: &DVector<T>,
        force: Option<&dyn GeneralizedForceField<T>>,
    ) -> DynamicsResult<DVector<T>> {
        let q = self.resolve_q(q_u, dependent)?;
        let acc = self.accelerations(&q, qdot_u, tau, force)?;
        self.multipliers_from(&acc)
    }

    pub fn multipliers_implicit(
        &self,
        q_u: &DVector<T>,
        qdot_u: &DVector<T>,
        seed: Option<&DVector<T>>,
        tau: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.lagrange_multipliers(q_u, qdot_u, DependentCoordinates::Implicit(seed), tau, None)
    }

    pub fn multipliers_explicit(
        &self,
        q_u: &DVector<T>,
        q_v: &DVector<T>,
        qdot_u: &DVector<T>,
        tau: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.lagrange_multipliers(q_u, qdot_u, DependentCoordinates::Explicit(q_v), tau, None)
    }

    /// `λ` at many nodes in parallel, in node order.
    pub fn multipliers_nodes(&self, nodes: &[NodeState<T>]) -> DynamicsResult<Vec<DVector<T>>> {
        nodes
            .par_iter()
            .map(|node| {
                let dependent = match &node.q_v {
                    Some(q_v) => DependentCoordinates::Explicit(q_v),
                    None => DependentCoordinates::Implicit(None),
                };
                self.lagrange_multipliers(&node.q_u, &node.qdot_u, dependent, &node.tau, None)
            })
            .collect()
    }
}

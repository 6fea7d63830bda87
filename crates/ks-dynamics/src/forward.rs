//! Partitioned forward dynamics.
//!
//! The reduced equations of motion are obtained by projecting
//! `M q̈ + N = τ + Jᵀλ` onto the independent coordinates with `[I  Bᵀ]`,
//! which eliminates `λ`:
//!
//! ```text
//! M̃ q̈_u = (τ_u + Bᵀτ_v) − (M_uv + Bᵀ M_vv) b − (N_u + Bᵀ N_v)
//! M̃     = M_uu + M_uv B + Bᵀ M_vu + Bᵀ M_vv B
//! ```

use crate::error::{DynamicsError, DynamicsResult};
use crate::forces::GeneralizedForceField;
use crate::system::{ConstrainedKinematics, PartitionedModel};
use ks_core::Real;
use ks_model::RigidBodyModel;
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

/// How the dependent coordinates reach the dynamics.
#[derive(Clone, Copy, Debug)]
pub enum DependentCoordinates<'a, T: Real> {
    /// Solve `v` from `q_u`, starting at the given seed (default seed if `None`).
    Implicit(Option<&'a DVector<T>>),
    /// `v` is an algebraic state supplied by the caller.
    Explicit(&'a DVector<T>),
}

/// Dynamics-derivative variants exposed to an enclosing optimizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DynamicsVariant {
    /// Holonomic, `v` solved internally.
    ImplicitDependent,
    /// Holonomic, `v` tracked as an algebraic state.
    ExplicitDependent,
    /// Holonomic with explicit `v` and an external force field.
    ExplicitDependentWithForce,
    /// Unconstrained full-coordinate dynamics.
    FullCoordinate,
}

impl DynamicsVariant {
    pub fn needs_explicit_dependent(self) -> bool {
        matches!(
            self,
            Self::ExplicitDependent | Self::ExplicitDependentWithForce
        )
    }
}

/// Everything computed during one constrained-dynamics evaluation.
#[derive(Clone, Debug)]
pub struct ConstrainedAccelerations<T: Real> {
    pub kinematics: ConstrainedKinematics<T>,
    /// Generalized force on every coordinate, external fields included.
    pub tau: DVector<T>,
    pub mass: DMatrix<T>,
    pub nonlinear_effects: DVector<T>,
    pub qddot_u: DVector<T>,
    /// Full acceleration.
    pub qddot: DVector<T>,
}

/// One trajectory node for batch evaluation.
#[derive(Clone, Debug)]
pub struct NodeState<T: Real> {
    pub q_u: DVector<T>,
    pub qdot_u: DVector<T>,
    /// Explicit dependent coordinates; `None` solves them from the default seed.
    pub q_v: Option<DVector<T>>,
    pub tau: DVector<T>,
}

impl<T: Real, M: RigidBodyModel<T>> PartitionedModel<T, M> {
    /// Resolve the full configuration for a dynamics call.
    pub fn resolve_q(
        &self,
        q_u: &DVector<T>,
        dependent: DependentCoordinates<'_, T>,
    ) -> DynamicsResult<DVector<T>> {
        match dependent {
            DependentCoordinates::Implicit(seed) => self.compute_q_from_u(q_u, seed),
            DependentCoordinates::Explicit(q_v) => self.compute_q(q_u, q_v),
        }
    }

    /// Assemble and solve the reduced system at a full configuration `q`.
    ///
    /// `tau` may cover all coordinates or only the actuated ones.
    pub fn accelerations(
        &self,
        q: &DVector<T>,
        qdot_u: &DVector<T>,
        tau: &DVector<T>,
        force: Option<&dyn GeneralizedForceField<T>>,
    ) -> DynamicsResult<ConstrainedAccelerations<T>> {
        let kinematics = self.kinematics(q, qdot_u)?;
        let mut tau = self.full_tau(tau)?;
        if let Some(field) = force {
            let external = field.generalized_force(q, &kinematics.qdot)?;
            if external.len() != tau.len() {
                return Err(DynamicsError::configuration(format!(
                    "force field '{}' returned {} entries, expected {}",
                    field.name(),
                    external.len(),
                    tau.len()
                )));
            }
            tau += external;
        }

        let model = self.model();
        let partition = self.partition();
        let mass = model.mass_matrix(q)?;
        let nonlinear_effects = model.nonlinear_effects(q, &kinematics.qdot)?;

        let (qddot_u, qddot) = if !self.is_constrained() {
            let qddot = mass
                .clone()
                .lu()
                .solve(&(&tau - &nonlinear_effects))
                .ok_or(DynamicsError::SingularMatrix {
                    what: "mass matrix",
                })?;
            (qddot.clone(), qddot)
        } else {
            let blocks = partition.split_blocks(&mass);
            let (tau_u, tau_v) = partition.reduce(&tau);
            let (n_u, n_v) = partition.reduce(&nonlinear_effects);
            let b = &kinematics.coupling;
            let bt = b.transpose();

            let reduced_mass =
                &blocks.uu + &blocks.uv * b + &bt * &blocks.vu + &bt * &blocks.vv * b;
            let rhs = (tau_u + &bt * tau_v)
                - (&blocks.uv + &bt * &blocks.vv) * &kinematics.bias
                - (n_u + &bt * n_v);

            let qddot_u = reduced_mass
                .lu()
                .solve(&rhs)
                .ok_or(DynamicsError::SingularMatrix {
                    what: "reduced mass matrix",
                })?;
            let qddot_v = b * &qddot_u + &kinematics.bias;
            let qddot = partition.expand(&qddot_u, &qddot_v);
            (qddot_u, qddot)
        };

        Ok(ConstrainedAccelerations {
            kinematics,
            tau,
            mass,
            nonlinear_effects,
            qddot_u,
            qddot,
        })
    }

    /// `q̈_u` for any way of supplying `v`, with an optional external force.
    pub fn forward_dynamics(
        &self,
        q_u: &DVector<T>,
        qdot_u: &DVector<T>,
        dependent: DependentCoordinates<'_, T>,
        tau: &DVector<T>,
        force: Option<&dyn GeneralizedForceField<T>>,
    ) -> DynamicsResult<DVector<T>> {
        let q = self.resolve_q(q_u, dependent)?;
        Ok(self.accelerations(&q, qdot_u, tau, force)?.qddot_u)
    }

    /// `q̈_u` with `v` solved from `q_u` (seeded by `seed` or the default seed).
    pub fn forward_dynamics_implicit(
        &self,
        q_u: &DVector<T>,
        qdot_u: &DVector<T>,
        seed: Option<&DVector<T>>,
        tau: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.forward_dynamics(q_u, qdot_u, DependentCoordinates::Implicit(seed), tau, None)
    }

    /// `q̈_u` with `v` supplied directly; no inner Newton solve.
    pub fn forward_dynamics_explicit(
        &self,
        q_u: &DVector<T>,
        q_v: &DVector<T>,
        qdot_u: &DVector<T>,
        tau: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.forward_dynamics(q_u, qdot_u, DependentCoordinates::Explicit(q_v), tau, None)
    }

    /// Explicit-`v` dynamics with an external force field added to `τ`.
    pub fn forward_dynamics_with_force(
        &self,
        q_u: &DVector<T>,
        q_v: &DVector<T>,
        qdot_u: &DVector<T>,
        tau: &DVector<T>,
        force: &dyn GeneralizedForceField<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.forward_dynamics(
            q_u,
            qdot_u,
            DependentCoordinates::Explicit(q_v),
            tau,
            Some(force),
        )
    }

    /// Unconstrained `q̈` of the underlying model on full coordinates.
    pub fn forward_dynamics_full(
        &self,
        q: &DVector<T>,
        qdot: &DVector<T>,
        tau: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        if self.is_constrained() {
            return Err(DynamicsError::configuration(format!(
                "full-coordinate dynamics requested for constrained model '{}'",
                self.model().name()
            )));
        }
        let tau = self.full_tau(tau)?;
        Ok(self.model().raw_forward_dynamics(q, qdot, &tau)?)
    }

    /// Torque-derivative-driven state derivative `[q̇_u, q̈_u, τ̇]`.
    ///
    /// `τ` is a state and `τ̇` the control; both have the same length.
    pub fn torque_derivative_driven(
        &self,
        q_u: &DVector<T>,
        qdot_u: &DVector<T>,
        tau: &DVector<T>,
        tau_dot: &DVector<T>,
        dependent: DependentCoordinates<'_, T>,
        force: Option<&dyn GeneralizedForceField<T>>,
    ) -> DynamicsResult<DVector<T>> {
        check_tau_dot(tau, tau_dot)?;
        let qddot_u = self.forward_dynamics(q_u, qdot_u, dependent, tau, force)?;
        Ok(stack(&[qdot_u, &qddot_u, tau_dot]))
    }

    /// Full-coordinate counterpart `[q̇, q̈, τ̇]`.
    pub fn torque_derivative_driven_full(
        &self,
        q: &DVector<T>,
        qdot: &DVector<T>,
        tau: &DVector<T>,
        tau_dot: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        check_tau_dot(tau, tau_dot)?;
        let qddot = self.forward_dynamics_full(q, qdot, tau)?;
        Ok(stack(&[qdot, &qddot, tau_dot]))
    }

    /// `q̈_u` at many nodes in parallel, in node order.
    pub fn forward_dynamics_nodes(&self, nodes: &[NodeState<T>]) -> DynamicsResult<Vec<DVector<T>>> {
        nodes
            .par_iter()
            .map(|node| {
                let dependent = match &node.q_v {
                    Some(q_v) => DependentCoordinates::Explicit(q_v),
                    None => DependentCoordinates::Implicit(None),
                };
                self.forward_dynamics(&node.q_u, &node.qdot_u, dependent, &node.tau, None)
            })
            .collect()
    }
}

fn check_tau_dot<T: Real>(tau: &DVector<T>, tau_dot: &DVector<T>) -> DynamicsResult<()> {
    if tau.len() != tau_dot.len() {
        return Err(DynamicsError::configuration(format!(
            "tau has {} entries but tau_dot has {}",
            tau.len(),
            tau_dot.len()
        )));
    }
    Ok(())
}

/// Concatenate vectors top to bottom.
pub(crate) fn stack<T: Real>(parts: &[&DVector<T>]) -> DVector<T> {
    let len = parts.iter().map(|p| p.len()).sum();
    DVector::from_iterator(len, parts.iter().flat_map(|p| p.iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::KeySpring;
    use ks_core::units::{kg, m, mps2};
    use ks_model::{KeyParams, PianoArm, PointMassPair};
    use ks_solver::HolonomicConstraintSolver;

    fn keyed_arm() -> PartitionedModel<f64, PianoArm> {
        let arm = PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81))
            .unwrap()
            .with_key(KeyParams {
                contact_x: m(0.35),
                top_y: m(-0.30),
                mass: kg(0.05),
            })
            .unwrap();
        let solver = HolonomicConstraintSolver::default()
            .with_default_seed(DVector::from_vec(vec![-1.0, 0.0]));
        PartitionedModel::with_default_partition(arm, solver).unwrap()
    }

    #[test]
    fn accelerations_satisfy_full_equations_of_motion() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let qdot_u = DVector::from_vec(vec![0.8]);
        let tau = DVector::from_vec(vec![1.5, -0.7]);

        let q = system.compute_q_from_u(&q_u, None).unwrap();
        let acc = system.accelerations(&q, &qdot_u, &tau, None).unwrap();

        // M q̈ + N − τ must lie in the range of Jᵀ
        let jac = RigidBodyModel::<f64>::constraint_jacobian(system.model(), &q).unwrap();
        let residual = &acc.mass * &acc.qddot + &acc.nonlinear_effects - &acc.tau;
        let lambda = jac
            .transpose()
            .svd(true, true)
            .solve(&residual, 1e-12)
            .unwrap();
        assert!((jac.transpose() * lambda - residual).norm() < 1e-9);
    }

    #[test]
    fn explicit_and_implicit_agree_on_the_manifold() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let qdot_u = DVector::from_vec(vec![0.4]);
        let tau = DVector::from_vec(vec![0.2, 0.1]);

        let q_v = system.compute_v(&q_u, None).unwrap();
        let implicit = system
            .forward_dynamics_implicit(&q_u, &qdot_u, None, &tau)
            .unwrap();
        let explicit = system
            .forward_dynamics_explicit(&q_u, &q_v, &qdot_u, &tau)
            .unwrap();
        assert!((implicit - explicit).norm() < 1e-12);
    }

    #[test]
    fn spring_changes_acceleration() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let qdot_u = DVector::zeros(1);
        let tau = DVector::zeros(2);
        let q_v = system.compute_v(&q_u, None).unwrap();

        let spring = KeySpring::new("key", 2, 200.0, 0.0, 2.0).unwrap();
        let free = system
            .forward_dynamics_explicit(&q_u, &q_v, &qdot_u, &tau)
            .unwrap();
        let sprung = system
            .forward_dynamics_with_force(&q_u, &q_v, &qdot_u, &tau, &spring)
            .unwrap();
        assert!((free - sprung).norm() > 1e-6);
    }

    #[test]
    fn state_derivative_layout() {
        let system = keyed_arm();
        let q_u = DVector::from_vec(vec![-0.3]);
        let qdot_u = DVector::from_vec(vec![0.1]);
        let tau = DVector::from_vec(vec![0.0, 0.0]);
        let tau_dot = DVector::from_vec(vec![3.0, 4.0]);

        let dx = system
            .torque_derivative_driven(
                &q_u,
                &qdot_u,
                &tau,
                &tau_dot,
                DependentCoordinates::Implicit(None),
                None,
            )
            .unwrap();
        assert_eq!(dx.len(), 4);
        assert_eq!(dx[0], 0.1);
        assert_eq!(dx[2], 3.0);
        assert_eq!(dx[3], 4.0);

        let bad = DVector::from_vec(vec![1.0]);
        assert!(
            system
                .torque_derivative_driven(
                    &q_u,
                    &qdot_u,
                    &tau,
                    &bad,
                    DependentCoordinates::Implicit(None),
                    None
                )
                .is_err()
        );
    }

    #[test]
    fn batch_preserves_node_order() {
        let system = keyed_arm();
        let nodes: Vec<_> = [-0.35, -0.3, -0.25]
            .iter()
            .map(|&s| NodeState {
                q_u: DVector::from_vec(vec![s]),
                qdot_u: DVector::from_vec(vec![0.2]),
                q_v: None,
                tau: DVector::zeros(2),
            })
            .collect();
        let batch = system.forward_dynamics_nodes(&nodes).unwrap();
        for (node, acc) in nodes.iter().zip(&batch) {
            let single = system
                .forward_dynamics_implicit(&node.q_u, &node.qdot_u, None, &node.tau)
                .unwrap();
            assert_eq!(&single, acc);
        }
    }

    #[test]
    fn full_dynamics_rejects_constrained_models() {
        let system = keyed_arm();
        let q = DVector::zeros(3);
        assert!(matches!(
            system.forward_dynamics_full(&q, &q, &DVector::zeros(2)),
            Err(DynamicsError::Configuration { .. })
        ));
    }

    #[test]
    fn full_state_derivative_uses_raw_dynamics() {
        let pair = PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81)).unwrap();
        let system: PartitionedModel<f64, _> =
            PartitionedModel::with_default_partition(pair, HolonomicConstraintSolver::default())
                .unwrap();
        let q = DVector::from_vec(vec![0.1, 0.2]);
        let qdot = DVector::from_vec(vec![0.0, 0.5]);
        let tau = DVector::from_vec(vec![0.3, 0.1]);
        let dx = system
            .torque_derivative_driven_full(&q, &qdot, &tau, &DVector::zeros(2))
            .unwrap();
        let raw = system.model().raw_forward_dynamics(&q, &qdot, &tau).unwrap();
        assert_eq!(dx.rows(2, 2).clone_owned(), raw);
    }

    #[test]
    fn pair_with_explicit_partition_is_constrained() {
        let pair = PointMassPair::new("pair", kg(1.0), kg(2.0), m(1.0), mps2(9.81)).unwrap();
        let partition = ks_model::CoordinatePartition::new(4, vec![0, 1, 2], vec![3]).unwrap();
        let system: PartitionedModel<f64, _> =
            PartitionedModel::new(pair, partition, HolonomicConstraintSolver::default()).unwrap();
        assert!(system.is_constrained());
        assert_eq!(system.nb_independent(), 3);
    }
}

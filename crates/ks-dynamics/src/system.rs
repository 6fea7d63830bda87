//! A rigid-body model bound to its coordinate partition.

use crate::error::{DynamicsError, DynamicsResult};
use ks_core::Real;
use ks_model::{CoordinatePartition, RigidBodyModel};
use ks_solver::{HolonomicConstraintSolver, SolverError};
use nalgebra::{DMatrix, DVector};
use std::marker::PhantomData;

/// A model, its independent/dependent split and the solver that recovers
/// the dependent coordinates.
///
/// Built once per phase configuration and immutable afterwards. Every
/// evaluation method is a pure function of its arguments, so one instance
/// can be shared by reference across threads and trajectory nodes.
#[derive(Clone)]
pub struct PartitionedModel<T: Real, M: RigidBodyModel<T>> {
    model: M,
    partition: CoordinatePartition,
    solver: HolonomicConstraintSolver,
    _scalar: PhantomData<fn() -> T>,
}

/// Velocity-level quantities at one configuration.
#[derive(Clone, Debug)]
pub struct ConstrainedKinematics<T: Real> {
    /// Full configuration.
    pub q: DVector<T>,
    /// Full velocity, with `q̇_v = B q̇_u`.
    pub qdot: DVector<T>,
    /// Coupling matrix `B = −J_v⁻¹ J_u` (`n_v × n_u`).
    pub coupling: DMatrix<T>,
    /// Dependent acceleration offset `b = −J_v⁻¹ J̇q̇`, so `q̈_v = B q̈_u + b`.
    pub bias: DVector<T>,
    /// Dependent block of the constraint Jacobian.
    pub jacobian_v: DMatrix<T>,
}

impl<T: Real, M: RigidBodyModel<T>> PartitionedModel<T, M> {
    /// Bind `model` to `partition`.
    ///
    /// # Errors
    /// Returns a configuration error if the partition does not cover the
    /// model's coordinates or the dependent set does not match the number
    /// of constraint rows.
    pub fn new(
        model: M,
        partition: CoordinatePartition,
        solver: HolonomicConstraintSolver,
    ) -> DynamicsResult<Self> {
        solver
            .check::<T, M>(&model, &partition)
            .map_err(|e| match e {
                SolverError::ProblemSetup { what } => DynamicsError::Configuration { what },
                other => other.into(),
            })?;

        tracing::debug!(
            model = model.name(),
            nb_independent = partition.nb_independent(),
            nb_dependent = partition.nb_dependent(),
            "partitioned model built"
        );
        Ok(Self {
            model,
            partition,
            solver,
            _scalar: PhantomData,
        })
    }

    /// Bind `model` to the partition it declares.
    pub fn with_default_partition(
        model: M,
        solver: HolonomicConstraintSolver,
    ) -> DynamicsResult<Self> {
        let partition = model.default_partition()?;
        Self::new(model, partition, solver)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn partition(&self) -> &CoordinatePartition {
        &self.partition
    }

    pub fn solver(&self) -> &HolonomicConstraintSolver {
        &self.solver
    }

    pub fn nb_q(&self) -> usize {
        self.partition.nb_q()
    }

    pub fn nb_independent(&self) -> usize {
        self.partition.nb_independent()
    }

    pub fn nb_dependent(&self) -> usize {
        self.partition.nb_dependent()
    }

    pub fn is_constrained(&self) -> bool {
        self.partition.nb_dependent() > 0
    }

    /// Full configuration from independent and dependent parts.
    pub fn compute_q(&self, q_u: &DVector<T>, q_v: &DVector<T>) -> DynamicsResult<DVector<T>> {
        Ok(self.partition.try_expand(q_u, q_v)?)
    }

    /// Dependent coordinates solved from `q_u`, starting at `seed` (or the
    /// solver's default seed).
    pub fn compute_v(
        &self,
        q_u: &DVector<T>,
        seed: Option<&DVector<T>>,
    ) -> DynamicsResult<DVector<T>> {
        Ok(self.solver.solve(&self.model, &self.partition, q_u, seed)?)
    }

    /// Full configuration on the constraint manifold.
    pub fn compute_q_from_u(
        &self,
        q_u: &DVector<T>,
        seed: Option<&DVector<T>>,
    ) -> DynamicsResult<DVector<T>> {
        let q_v = self.compute_v(q_u, seed)?;
        self.compute_q(q_u, &q_v)
    }

    /// Generalized forces on every coordinate; `tau` may cover either all
    /// coordinates or only the actuated ones.
    pub fn full_tau(&self, tau: &DVector<T>) -> DynamicsResult<DVector<T>> {
        Ok(self.model.generalized_forces_from_partial(tau)?)
    }

    fn split_jacobian(&self, q: &DVector<T>) -> DynamicsResult<(DMatrix<T>, DMatrix<T>)> {
        let jac = self.model.constraint_jacobian(q)?;
        if jac.nrows() != self.nb_dependent() || jac.ncols() != self.nb_q() {
            return Err(DynamicsError::configuration(format!(
                "constraint Jacobian is {}x{}, expected {}x{}",
                jac.nrows(),
                jac.ncols(),
                self.nb_dependent(),
                self.nb_q()
            )));
        }
        Ok(self.partition.split_columns(&jac))
    }

    /// Coupling matrix `B = −J_v⁻¹ J_u` mapping `q̇_u` to `q̇_v`.
    pub fn coupling_matrix(&self, q: &DVector<T>) -> DynamicsResult<DMatrix<T>> {
        if !self.is_constrained() {
            return Ok(DMatrix::zeros(0, self.nb_independent()));
        }
        let (j_u, j_v) = self.split_jacobian(q)?;
        j_v.lu()
            .solve(&(-j_u))
            .ok_or(DynamicsError::SingularMatrix {
                what: "dependent constraint Jacobian",
            })
    }

    /// Dependent velocity `q̇_v = B q̇_u`.
    pub fn compute_qdot_v(&self, q: &DVector<T>, qdot_u: &DVector<T>) -> DynamicsResult<DVector<T>> {
        self.partition.check_u(qdot_u)?;
        Ok(self.coupling_matrix(q)? * qdot_u)
    }

    /// Full velocity consistent with the constraint.
    pub fn compute_qdot(&self, q: &DVector<T>, qdot_u: &DVector<T>) -> DynamicsResult<DVector<T>> {
        let qdot_v = self.compute_qdot_v(q, qdot_u)?;
        Ok(self.partition.expand(qdot_u, &qdot_v))
    }

    /// Coupling matrix, full velocity and dependent-acceleration offset at
    /// `(q, q̇_u)`, sharing one factorization of `J_v`.
    pub fn kinematics(
        &self,
        q: &DVector<T>,
        qdot_u: &DVector<T>,
    ) -> DynamicsResult<ConstrainedKinematics<T>> {
        self.partition.check_u(qdot_u)?;
        if q.len() != self.nb_q() {
            return Err(DynamicsError::configuration(format!(
                "q has {} entries, expected {}",
                q.len(),
                self.nb_q()
            )));
        }

        if !self.is_constrained() {
            return Ok(ConstrainedKinematics {
                q: q.clone(),
                qdot: qdot_u.clone(),
                coupling: DMatrix::zeros(0, self.nb_independent()),
                bias: DVector::zeros(0),
                jacobian_v: DMatrix::zeros(0, 0),
            });
        }

        let (j_u, j_v) = self.split_jacobian(q)?;
        let lu = j_v.clone().lu();
        let singular = DynamicsError::SingularMatrix {
            what: "dependent constraint Jacobian",
        };

        let coupling = lu.solve(&(-j_u)).ok_or(singular.clone())?;
        let qdot_v = &coupling * qdot_u;
        let qdot = self.partition.expand(qdot_u, &qdot_v);

        let jdot_qdot = self.model.constraint_bias(q, &qdot)?;
        let bias = lu.solve(&(-jdot_qdot)).ok_or(singular)?;

        Ok(ConstrainedKinematics {
            q: q.clone(),
            qdot,
            coupling,
            bias,
            jacobian_v: j_v,
        })
    }

    /// Full acceleration from the independent one: `q̈_v = B q̈_u + b`.
    pub fn compute_qddot(
        &self,
        q: &DVector<T>,
        qdot_u: &DVector<T>,
        qddot_u: &DVector<T>,
    ) -> DynamicsResult<DVector<T>> {
        self.partition.check_u(qddot_u)?;
        let kin = self.kinematics(q, qdot_u)?;
        let qddot_v = &kin.coupling * qddot_u + &kin.bias;
        Ok(self.partition.expand(qddot_u, &qddot_v))
    }
}

//! Dependent-coordinate solve on the constraint manifold.

use crate::error::{SolverError, SolverResult};
use crate::newton::{NewtonConfig, newton_solve};
use ks_core::{Real, lit};
use ks_model::{CoordinatePartition, RigidBodyModel};
use nalgebra::{DMatrix, DVector};

/// Solves `g(expand(u, v)) = 0` for the dependent coordinates `v`.
///
/// The constraint count must equal the number of dependent coordinates so
/// that `J_v = ∂g/∂v` is square. Each call is a fresh Newton solve; nothing
/// is cached between calls, which keeps it safe to share across threads.
#[derive(Clone, Debug, Default)]
pub struct HolonomicConstraintSolver {
    config: NewtonConfig,
    default_seed: Option<DVector<f64>>,
}

impl HolonomicConstraintSolver {
    pub fn new(config: NewtonConfig) -> Self {
        Self {
            config,
            default_seed: None,
        }
    }

    /// Seed used when a call does not provide one (zeros otherwise).
    pub fn with_default_seed(mut self, seed: DVector<f64>) -> Self {
        self.default_seed = Some(seed);
        self
    }

    pub fn config(&self) -> &NewtonConfig {
        &self.config
    }

    /// Check that `model` and `partition` describe a square dependent solve.
    pub fn check<T, M>(&self, model: &M, partition: &CoordinatePartition) -> SolverResult<()>
    where
        T: Real,
        M: RigidBodyModel<T> + ?Sized,
    {
        self.config.validate()?;
        if partition.nb_q() != model.nb_q() {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "partition covers {} coordinates, model '{}' has {}",
                    partition.nb_q(),
                    model.name(),
                    model.nb_q()
                ),
            });
        }
        if model.nb_constraints() != partition.nb_dependent() {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "model '{}' has {} constraints but the partition has {} dependent coordinates",
                    model.name(),
                    model.nb_constraints(),
                    partition.nb_dependent()
                ),
            });
        }
        if let Some(seed) = &self.default_seed {
            if seed.len() != partition.nb_dependent() {
                return Err(SolverError::ProblemSetup {
                    what: format!(
                        "default seed has {} entries, expected {}",
                        seed.len(),
                        partition.nb_dependent()
                    ),
                });
            }
        }
        Ok(())
    }

    /// The seed a solve starts from when none is supplied.
    pub fn default_seed<T: Real>(&self, partition: &CoordinatePartition) -> DVector<T> {
        match &self.default_seed {
            Some(seed) if seed.len() == partition.nb_dependent() => seed.map(lit::<T>),
            _ => DVector::zeros(partition.nb_dependent()),
        }
    }

    /// Solve for `v` given `u`, starting from `seed` (or the default seed).
    ///
    /// # Errors
    /// `SingularJacobian` when `J_v` cannot be factored, `ConvergenceFailed`
    /// when Newton does not reach tolerance; a non-converged `v` is never
    /// returned.
    pub fn solve<T, M>(
        &self,
        model: &M,
        partition: &CoordinatePartition,
        u: &DVector<T>,
        seed: Option<&DVector<T>>,
    ) -> SolverResult<DVector<T>>
    where
        T: Real,
        M: RigidBodyModel<T> + ?Sized,
    {
        self.check(model, partition)?;
        partition.check_u(u)?;
        if partition.nb_dependent() == 0 {
            return Ok(DVector::zeros(0));
        }

        let v0 = match seed {
            Some(s) => {
                partition.check_v(s)?;
                s.clone()
            }
            None => self.default_seed(partition),
        };

        let residual = |v: &DVector<T>| -> SolverResult<DVector<T>> {
            Ok(model.constraint_residual(&partition.expand(u, v))?)
        };
        let jacobian = |v: &DVector<T>| -> SolverResult<DMatrix<T>> {
            let j = model.constraint_jacobian(&partition.expand(u, v))?;
            Ok(partition.split_columns(&j).1)
        };

        let result = newton_solve(v0, residual, jacobian, &self.config).map_err(|e| match e {
            SolverError::ConvergenceFailed { what } => SolverError::ConvergenceFailed {
                what: format!("dependent coordinates of '{}': {}", model.name(), what),
            },
            other => other,
        })?;

        tracing::trace!(
            model = model.name(),
            iterations = result.iterations,
            residual = result.residual_norm,
            "dependent coordinates solved"
        );
        Ok(result.x)
    }
}

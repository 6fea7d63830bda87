//! Inelastic impact against a new constraint set.

use crate::error::{TransitionError, TransitionResult};
use ks_core::Real;
use ks_model::RigidBodyModel;
use nalgebra::{DMatrix, DVector};

/// Post-impact velocity and the impulse that produced it.
#[derive(Clone, Debug)]
pub struct ImpactOutcome<T: Real> {
    pub qdot: DVector<T>,
    /// Constraint impulse `Λ`, one entry per constraint row.
    pub impulse: DVector<T>,
}

/// Resolves an instantaneous perfectly inelastic contact.
///
/// Solves
///
/// ```text
/// [ M  −Jᵀ ] [ q̇⁺ ]   [ M q̇⁻ ]
/// [ J   0  ] [ Λ  ] = [   0   ]
/// ```
///
/// so the post-impact velocity satisfies the new constraints at velocity
/// level and momentum changes only along the constraint directions.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImpactResolver;

impl ImpactResolver {
    pub fn resolve<T, M>(
        &self,
        model: &M,
        q: &DVector<T>,
        qdot_minus: &DVector<T>,
    ) -> TransitionResult<ImpactOutcome<T>>
    where
        T: Real,
        M: RigidBodyModel<T> + ?Sized,
    {
        let n = model.nb_q();
        if q.len() != n || qdot_minus.len() != n {
            return Err(TransitionError::configuration(format!(
                "impact state has {} / {} entries, post-impact model '{}' has {n}",
                q.len(),
                qdot_minus.len(),
                model.name()
            )));
        }

        let k = model.nb_constraints();
        if k == 0 {
            tracing::warn!(model = model.name(), "impact against a model without constraints");
            return Ok(ImpactOutcome {
                qdot: qdot_minus.clone(),
                impulse: DVector::zeros(0),
            });
        }

        let mass = model.mass_matrix(q)?;
        let jac = model.constraint_jacobian(q)?;
        if jac.shape() != (k, n) {
            return Err(TransitionError::configuration(format!(
                "constraint Jacobian of '{}' is {:?}, expected ({k}, {n})",
                model.name(),
                jac.shape()
            )));
        }

        let mut kkt = DMatrix::zeros(n + k, n + k);
        kkt.view_mut((0, 0), (n, n)).copy_from(&mass);
        kkt.view_mut((0, n), (n, k)).copy_from(&(-jac.transpose()));
        kkt.view_mut((n, 0), (k, n)).copy_from(&jac);

        let mut rhs = DVector::zeros(n + k);
        rhs.rows_mut(0, n).copy_from(&(&mass * qdot_minus));

        let sol = kkt.lu().solve(&rhs).ok_or(TransitionError::SingularMatrix {
            what: "impact system",
        })?;

        Ok(ImpactOutcome {
            qdot: sol.rows(0, n).clone_owned(),
            impulse: sol.rows(n, k).clone_owned(),
        })
    }
}

/// Append `count` zeros to a pre-impact vector for coordinates the
/// pre-impact model does not have.
pub fn extend_with_zeros<T: Real>(v: &DVector<T>, count: usize) -> DVector<T> {
    let mut out = DVector::zeros(v.len() + count);
    out.rows_mut(0, v.len()).copy_from(v);
    out
}

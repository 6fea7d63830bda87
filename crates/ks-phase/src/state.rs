//! Phase states and typed boundary records.

use crate::error::{TransitionError, TransitionResult};
use ks_core::{Real, ensure_finite_vec};
use ks_dynamics::PartitionedModel;
use ks_model::RigidBodyModel;
use nalgebra::DVector;
use std::fmt;

/// The coordinate representation a phase is solved in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseState {
    /// Full coordinates on an unconstrained model.
    FullCoordinate,
    /// Independent coordinates of a holonomically constrained model.
    HolonomicReduced { explicit_dependent: bool },
    /// Holonomic phase entered through an impact.
    PostImpact { explicit_dependent: bool },
}

impl PhaseState {
    pub fn is_holonomic(self) -> bool {
        !matches!(self, Self::FullCoordinate)
    }

    pub fn explicit_dependent(self) -> bool {
        match self {
            Self::FullCoordinate => false,
            Self::HolonomicReduced { explicit_dependent }
            | Self::PostImpact { explicit_dependent } => explicit_dependent,
        }
    }
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullCoordinate => write!(f, "full"),
            Self::HolonomicReduced { .. } => write!(f, "holonomic"),
            Self::PostImpact { .. } => write!(f, "post-impact"),
        }
    }
}

/// Boundary values of a full-coordinate phase.
#[derive(Clone, Debug, PartialEq)]
pub struct FullBoundary<T: Real> {
    pub q: DVector<T>,
    pub qdot: DVector<T>,
    /// Actuated generalized forces, when `τ` is a state of the phase.
    pub tau: Option<DVector<T>>,
}

/// Boundary values of a holonomic phase.
#[derive(Clone, Debug, PartialEq)]
pub struct HolonomicBoundary<T: Real> {
    pub q_u: DVector<T>,
    pub qdot_u: DVector<T>,
    /// Dependent coordinates when tracked as an algebraic state; solved
    /// from `q_u` otherwise.
    pub q_v: Option<DVector<T>>,
    /// Seed control for solving `v` in implicit-dependent phases.
    pub q_v_init: Option<DVector<T>>,
    pub tau: Option<DVector<T>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PhaseBoundary<T: Real> {
    Full(FullBoundary<T>),
    Holonomic(HolonomicBoundary<T>),
}

impl<T: Real> PhaseBoundary<T> {
    pub fn tau(&self) -> Option<&DVector<T>> {
        match self {
            Self::Full(b) => b.tau.as_ref(),
            Self::Holonomic(b) => b.tau.as_ref(),
        }
    }
}

/// One side of a junction: a phase's state tag, its system and the
/// boundary values at the junction.
pub struct PhaseSide<'a, T: Real, M: RigidBodyModel<T>> {
    pub state: PhaseState,
    pub system: &'a PartitionedModel<T, M>,
    pub boundary: &'a PhaseBoundary<T>,
}

impl<'a, T: Real, M: RigidBodyModel<T>> PhaseSide<'a, T, M> {
    pub fn new(
        state: PhaseState,
        system: &'a PartitionedModel<T, M>,
        boundary: &'a PhaseBoundary<T>,
    ) -> TransitionResult<Self> {
        let side = Self {
            state,
            system,
            boundary,
        };
        side.validate()?;
        Ok(side)
    }

    /// Check that the state tag, the system and the boundary agree.
    pub fn validate(&self) -> TransitionResult<()> {
        let name = self.system.model().name();
        match (self.state, self.boundary) {
            (PhaseState::FullCoordinate, PhaseBoundary::Full(b)) => {
                if self.system.is_constrained() {
                    return Err(TransitionError::configuration(format!(
                        "full-coordinate phase on constrained model '{name}'"
                    )));
                }
                check_len("q", &b.q, self.system.nb_q())?;
                check_len("qdot", &b.qdot, self.system.nb_q())?;
                ensure_finite_vec(&b.q, "q")?;
                ensure_finite_vec(&b.qdot, "qdot")?;
            }
            (state, PhaseBoundary::Holonomic(b)) if state.is_holonomic() => {
                if !self.system.is_constrained() {
                    tracing::warn!(model = name, "holonomic phase without dependent coordinates");
                }
                check_len("q_u", &b.q_u, self.system.nb_independent())?;
                check_len("qdot_u", &b.qdot_u, self.system.nb_independent())?;
                ensure_finite_vec(&b.q_u, "q_u")?;
                ensure_finite_vec(&b.qdot_u, "qdot_u")?;
                match &b.q_v {
                    Some(q_v) => {
                        check_len("q_v", q_v, self.system.nb_dependent())?;
                        ensure_finite_vec(q_v, "q_v")?;
                    }
                    None if state.explicit_dependent() => {
                        return Err(TransitionError::configuration(format!(
                            "{state} phase on '{name}' tracks q_v but none was given"
                        )));
                    }
                    None => {}
                }
                if let Some(seed) = &b.q_v_init {
                    check_len("q_v_init", seed, self.system.nb_dependent())?;
                    ensure_finite_vec(seed, "q_v_init")?;
                }
            }
            (state, _) => {
                return Err(TransitionError::configuration(format!(
                    "{state} phase on '{name}' has a mismatched boundary record"
                )));
            }
        }
        if let Some(tau) = self.boundary.tau() {
            ensure_finite_vec(tau, "tau")?;
            let actuated = self.system.model().actuated_dofs().len();
            if tau.len() != actuated && tau.len() != self.system.nb_q() {
                return Err(TransitionError::configuration(format!(
                    "tau has {} entries, '{name}' has {actuated} actuated coordinates",
                    tau.len()
                )));
            }
        }
        Ok(())
    }

    /// Full `(q, q̇)` at the boundary, with `v` and `q̇_v` recovered on
    /// holonomic sides.
    pub fn full_state(&self) -> TransitionResult<(DVector<T>, DVector<T>)> {
        match self.boundary {
            PhaseBoundary::Full(b) => Ok((b.q.clone(), b.qdot.clone())),
            PhaseBoundary::Holonomic(b) => {
                let q = match &b.q_v {
                    Some(q_v) => self.system.compute_q(&b.q_u, q_v)?,
                    None => self.system.compute_q_from_u(&b.q_u, b.q_v_init.as_ref())?,
                };
                let qdot = self.system.compute_qdot(&q, &b.qdot_u)?;
                Ok((q, qdot))
            }
        }
    }
}

fn check_len<T: Real>(what: &str, v: &DVector<T>, expected: usize) -> TransitionResult<()> {
    if v.len() != expected {
        return Err(TransitionError::configuration(format!(
            "{what} has {} entries, expected {expected}",
            v.len()
        )));
    }
    Ok(())
}

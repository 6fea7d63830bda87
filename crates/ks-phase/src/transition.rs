//! Junction residuals between consecutive phases.

use crate::error::{TransitionError, TransitionResult};
use crate::impact::{ImpactResolver, extend_with_zeros};
use crate::state::{PhaseBoundary, PhaseSide, PhaseState};
use ks_core::{PhasePair, Real, to_f64};
use ks_model::RigidBodyModel;
use nalgebra::DVector;

/// Continuity evaluator applied at one junction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseTransition {
    /// Same representation on both sides: `(q, q̇[, τ])⁻ − (q, q̇[, τ])⁺`.
    /// Holonomic sides compare `q_u`, `q̇_u` and, when both track it, `q_v`.
    Continuous { include_tau: bool },
    /// Full pre-phase into a holonomic post-phase; the post side is
    /// expanded to full coordinates, dropping `excluded_trailing` entries.
    FullToHolonomic {
        excluded_trailing: usize,
        include_tau: bool,
    },
    /// Holonomic pre-phase into a full post-phase.
    HolonomicToFull {
        excluded_trailing: usize,
        include_tau: bool,
    },
    /// Full pre-phase hitting a new contact: the pre state is extended with
    /// `appended` zero coordinates and passed through the impact resolver.
    Impact { appended: usize, include_tau: bool },
}

impl PhaseTransition {
    /// Default evaluator for a `(pre, post)` state pair.
    pub fn select(pre: PhaseState, post: PhaseState) -> TransitionResult<Self> {
        use PhaseState::*;
        match (pre, post) {
            (FullCoordinate, FullCoordinate) => Ok(Self::Continuous { include_tau: true }),
            (HolonomicReduced { .. }, PostImpact { .. }) => {
                Err(TransitionError::not_implemented(format!(
                    "transition {pre} -> {post}"
                )))
            }
            (HolonomicReduced { .. } | PostImpact { .. }, HolonomicReduced { .. } | PostImpact { .. }) => {
                Ok(Self::Continuous { include_tau: true })
            }
            (FullCoordinate, HolonomicReduced { .. }) => Ok(Self::FullToHolonomic {
                excluded_trailing: 0,
                include_tau: false,
            }),
            (FullCoordinate, PostImpact { .. }) => Ok(Self::Impact {
                appended: 1,
                include_tau: true,
            }),
            (HolonomicReduced { .. } | PostImpact { .. }, FullCoordinate) => {
                Ok(Self::HolonomicToFull {
                    excluded_trailing: 1,
                    include_tau: true,
                })
            }
        }
    }

    /// Check that this evaluator can connect `pre` to `post`.
    pub fn check_states(&self, pre: PhaseState, post: PhaseState) -> TransitionResult<()> {
        let ok = match self {
            Self::Continuous { .. } => pre.is_holonomic() == post.is_holonomic(),
            Self::FullToHolonomic { .. } | Self::Impact { .. } => {
                !pre.is_holonomic() && post.is_holonomic()
            }
            Self::HolonomicToFull { .. } => pre.is_holonomic() && !post.is_holonomic(),
        };
        if ok {
            Ok(())
        } else {
            Err(TransitionError::configuration(format!(
                "{self:?} cannot connect a {pre} phase to a {post} phase"
            )))
        }
    }

    fn include_tau(&self) -> bool {
        match *self {
            Self::Continuous { include_tau }
            | Self::FullToHolonomic { include_tau, .. }
            | Self::HolonomicToFull { include_tau, .. }
            | Self::Impact { include_tau, .. } => include_tau,
        }
    }

    /// Residual the enclosing optimizer drives to zero.
    pub fn residual<T, A, B>(
        &self,
        pre: &PhaseSide<'_, T, A>,
        post: &PhaseSide<'_, T, B>,
        resolver: &ImpactResolver,
    ) -> TransitionResult<DVector<T>>
    where
        T: Real,
        A: RigidBodyModel<T>,
        B: RigidBodyModel<T>,
    {
        self.check_states(pre.state, post.state)?;

        let mut blocks = match *self {
            Self::Continuous { .. } => continuous_blocks(pre, post)?,
            Self::FullToHolonomic {
                excluded_trailing, ..
            } => {
                let (q_pre, qdot_pre) = pre.full_state()?;
                let (q_post, qdot_post) = post.full_state()?;
                let q_post = drop_trailing("post q", &q_post, excluded_trailing)?;
                let qdot_post = drop_trailing("post qdot", &qdot_post, excluded_trailing)?;
                vec![
                    difference("q", &q_pre, &q_post)?,
                    difference("qdot", &qdot_pre, &qdot_post)?,
                ]
            }
            Self::HolonomicToFull {
                excluded_trailing, ..
            } => {
                let (q_pre, qdot_pre) = pre.full_state()?;
                let (q_post, qdot_post) = post.full_state()?;
                let q_pre = drop_trailing("pre q", &q_pre, excluded_trailing)?;
                let qdot_pre = drop_trailing("pre qdot", &qdot_pre, excluded_trailing)?;
                vec![
                    difference("q", &q_pre, &q_post)?,
                    difference("qdot", &qdot_pre, &qdot_post)?,
                ]
            }
            Self::Impact { appended, .. } => {
                let (q_pre, qdot_pre) = pre.full_state()?;
                let q_pre = extend_with_zeros(&q_pre, appended);
                let qdot_pre = extend_with_zeros(&qdot_pre, appended);
                let impact = resolver.resolve(post.system.model(), &q_pre, &qdot_pre)?;
                let (q_post, qdot_post) = post.full_state()?;
                vec![
                    difference("q", &q_pre, &q_post)?,
                    difference("qdot", &impact.qdot, &qdot_post)?,
                ]
            }
        };

        if self.include_tau() {
            if let Some(block) = tau_block(pre.boundary, post.boundary)? {
                blocks.push(block);
            }
        }

        Ok(concat(&blocks))
    }
}

/// A transition bound to a specific pair of consecutive phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Junction {
    pub pair: PhasePair,
    pub pre: PhaseState,
    pub post: PhaseState,
    pub transition: PhaseTransition,
}

/// Selects and evaluates junction residuals.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhaseTransitionEngine {
    resolver: ImpactResolver,
}

impl PhaseTransitionEngine {
    pub fn new(resolver: ImpactResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &ImpactResolver {
        &self.resolver
    }

    /// Build a junction, using `explicit` when given and the default
    /// evaluator for the state pair otherwise.
    pub fn junction(
        &self,
        pair: PhasePair,
        pre: PhaseState,
        post: PhaseState,
        explicit: Option<PhaseTransition>,
    ) -> TransitionResult<Junction> {
        let transition = match explicit {
            Some(t) => {
                t.check_states(pre, post)?;
                t
            }
            None => PhaseTransition::select(pre, post)?,
        };
        Ok(Junction {
            pair,
            pre,
            post,
            transition,
        })
    }

    /// Residual of `junction` for the given boundary sides.
    pub fn evaluate<T, A, B>(
        &self,
        junction: &Junction,
        pre: &PhaseSide<'_, T, A>,
        post: &PhaseSide<'_, T, B>,
    ) -> TransitionResult<DVector<T>>
    where
        T: Real,
        A: RigidBodyModel<T>,
        B: RigidBodyModel<T>,
    {
        if pre.state != junction.pre || post.state != junction.post {
            return Err(TransitionError::configuration(format!(
                "junction {} expects {} -> {}, got {} -> {}",
                junction.pair, junction.pre, junction.post, pre.state, post.state
            )));
        }
        let r = junction.transition.residual(pre, post, &self.resolver)?;
        tracing::debug!(
            junction = %junction.pair,
            len = r.len(),
            norm = to_f64(r.norm()),
            "junction residual"
        );
        Ok(r)
    }
}

fn continuous_blocks<T, A, B>(
    pre: &PhaseSide<'_, T, A>,
    post: &PhaseSide<'_, T, B>,
) -> TransitionResult<Vec<DVector<T>>>
where
    T: Real,
    A: RigidBodyModel<T>,
    B: RigidBodyModel<T>,
{
    match (pre.boundary, post.boundary) {
        (PhaseBoundary::Full(a), PhaseBoundary::Full(b)) => Ok(vec![
            difference("q", &a.q, &b.q)?,
            difference("qdot", &a.qdot, &b.qdot)?,
        ]),
        (PhaseBoundary::Holonomic(a), PhaseBoundary::Holonomic(b)) => {
            if pre.system.partition() != post.system.partition() {
                return Err(TransitionError::configuration(
                    "continuous transition between different partitions",
                ));
            }
            let mut blocks = vec![
                difference("q_u", &a.q_u, &b.q_u)?,
                difference("qdot_u", &a.qdot_u, &b.qdot_u)?,
            ];
            if let (Some(va), Some(vb)) = (&a.q_v, &b.q_v) {
                blocks.push(difference("q_v", va, vb)?);
            }
            Ok(blocks)
        }
        _ => Err(TransitionError::configuration(
            "continuous transition between different representations",
        )),
    }
}

/// τ continuity block. `None` when neither side carries τ as a state
/// (torque-driven phases); an error when only one side does.
fn tau_block<T: Real>(
    pre: &PhaseBoundary<T>,
    post: &PhaseBoundary<T>,
) -> TransitionResult<Option<DVector<T>>> {
    match (pre.tau(), post.tau()) {
        (Some(a), Some(b)) => difference("tau", a, b).map(Some),
        (None, None) => Ok(None),
        _ => Err(TransitionError::configuration(
            "tau continuity requested but only one side has a tau state",
        )),
    }
}

fn difference<T: Real>(what: &str, a: &DVector<T>, b: &DVector<T>) -> TransitionResult<DVector<T>> {
    if a.len() != b.len() {
        return Err(TransitionError::configuration(format!(
            "{what} continuity compares {} against {} entries",
            a.len(),
            b.len()
        )));
    }
    Ok(a - b)
}

fn drop_trailing<T: Real>(what: &str, v: &DVector<T>, count: usize) -> TransitionResult<DVector<T>> {
    if count > v.len() {
        return Err(TransitionError::configuration(format!(
            "cannot exclude {count} trailing entries of {what} ({} entries)",
            v.len()
        )));
    }
    Ok(v.rows(0, v.len() - count).clone_owned())
}

fn concat<T: Real>(blocks: &[DVector<T>]) -> DVector<T> {
    let len = blocks.iter().map(|b| b.len()).sum();
    DVector::from_iterator(len, blocks.iter().flat_map(|b| b.iter().copied()))
}

//! Continuity of the dependent-coordinate seed when it is a control.

use crate::error::{TransitionError, TransitionResult};
use ks_core::Real;
use ks_dynamics::PartitionedModel;
use ks_model::RigidBodyModel;
use nalgebra::DVector;
use std::fmt;

/// Control parameterisation over one shooting interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlType {
    Constant,
    ConstantWithLastNode,
    LinearContinuous,
    /// No control variables in the phase.
    None,
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Constant => "constant",
            Self::ConstantWithLastNode => "constant-with-last-node",
            Self::LinearContinuous => "linear-continuous",
            Self::None => "none",
        };
        f.write_str(s)
    }
}

impl ControlType {
    /// Reject parameterisations that carry no seed control.
    pub fn check_seed_control(self) -> TransitionResult<()> {
        match self {
            Self::Constant | Self::ConstantWithLastNode | Self::LinearContinuous => Ok(()),
            Self::None => Err(TransitionError::not_implemented(format!(
                "dependent seed continuity with {self} controls"
            ))),
        }
    }
}

/// `v(q_u_end; seed) − next_seed` for one interval of an implicit-`v`
/// phase whose seed is a control.
///
/// `seed` is the seed control at the start node of the interval, for linear
/// controls too; `next_seed` is the one the following interval starts from.
pub fn dependent_seed_continuity<T, M>(
    system: &PartitionedModel<T, M>,
    control: ControlType,
    q_u_end: &DVector<T>,
    seed: &DVector<T>,
    next_seed: &DVector<T>,
) -> TransitionResult<DVector<T>>
where
    T: Real,
    M: RigidBodyModel<T>,
{
    control.check_seed_control()?;
    if next_seed.len() != system.nb_dependent() {
        return Err(TransitionError::configuration(format!(
            "next seed has {} entries, expected {}",
            next_seed.len(),
            system.nb_dependent()
        )));
    }
    let q_v_end = system.compute_v(q_u_end, Some(seed))?;
    Ok(q_v_end - next_seed)
}

/// Seed continuity over every interval of a phase.
///
/// `q_u_ends[k]` is `q_u` at the end of interval `k` and `seeds[k]` the seed
/// control at node `k`. Parameterisations with a last-node control supply
/// one seed more than intervals; without it the last interval has no
/// successor and is skipped.
pub fn dependent_seed_continuity_intervals<T, M>(
    system: &PartitionedModel<T, M>,
    control: ControlType,
    q_u_ends: &[DVector<T>],
    seeds: &[DVector<T>],
) -> TransitionResult<Vec<DVector<T>>>
where
    T: Real,
    M: RigidBodyModel<T>,
{
    let n = q_u_ends.len();
    if seeds.len() != n && seeds.len() != n + 1 {
        return Err(TransitionError::configuration(format!(
            "{} seed controls for {n} intervals",
            seeds.len()
        )));
    }
    seeds
        .windows(2)
        .zip(q_u_ends)
        .map(|(pair, q_u_end)| dependent_seed_continuity(system, control, q_u_end, &pair[0], &pair[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_core::units::{kg, m, mps2};
    use ks_model::PointMassPair;
    use ks_solver::HolonomicConstraintSolver;

    fn system() -> PartitionedModel<f64, PointMassPair> {
        let pair = PointMassPair::new("pair", kg(1.0), kg(1.0), m(1.0), mps2(9.81)).unwrap();
        PartitionedModel::with_default_partition(pair, HolonomicConstraintSolver::default()).unwrap()
    }

    #[test]
    fn consistent_seed_gives_zero_residual() {
        let system = system();
        let q_u = DVector::from_vec(vec![0.0, 0.0, 0.6]);
        let seed = DVector::from_vec(vec![-0.5]);
        let next = DVector::from_vec(vec![-0.8]);
        for control in [
            ControlType::Constant,
            ControlType::ConstantWithLastNode,
            ControlType::LinearContinuous,
        ] {
            let r = dependent_seed_continuity(&system, control, &q_u, &seed, &next).unwrap();
            assert!(r.norm() < 1e-9);
        }
    }

    #[test]
    fn start_seed_selects_the_branch() {
        let system = system();
        let q_u = DVector::from_vec(vec![0.0, 0.0, 0.6]);
        // Seeding above the upper mass lands on the upper branch.
        let seed = DVector::from_vec(vec![0.5]);
        let next = DVector::from_vec(vec![-0.8]);
        let r = dependent_seed_continuity(&system, ControlType::LinearContinuous, &q_u, &seed, &next)
            .unwrap();
        assert!((r[0] - 1.6).abs() < 1e-9, "r = {r}");
    }

    #[test]
    fn intervals_chain_consecutive_seeds() {
        let system = system();
        let q_u_ends = vec![
            DVector::from_vec(vec![0.0, 0.0, 0.6]),
            DVector::from_vec(vec![0.0, 0.0, 0.0]),
        ];
        let seeds = vec![
            DVector::from_vec(vec![-0.5]),
            DVector::from_vec(vec![-0.8]),
            DVector::from_vec(vec![-1.0]),
        ];
        let r = dependent_seed_continuity_intervals(
            &system,
            ControlType::ConstantWithLastNode,
            &q_u_ends,
            &seeds,
        )
        .unwrap();
        assert_eq!(r.len(), 2);
        assert!(r.iter().all(|r| r.norm() < 1e-9));

        // Constant controls have no last-node seed.
        let r =
            dependent_seed_continuity_intervals(&system, ControlType::Constant, &q_u_ends, &seeds[..2])
                .unwrap();
        assert_eq!(r.len(), 1);

        assert!(matches!(
            dependent_seed_continuity_intervals(&system, ControlType::Constant, &q_u_ends, &seeds[..1]),
            Err(TransitionError::Configuration { .. })
        ));
    }

    #[test]
    fn unsupported_control_is_not_implemented() {
        let system = system();
        let q_u = DVector::from_vec(vec![0.0, 0.0, 0.6]);
        let seed = DVector::from_vec(vec![-0.5]);
        let next = DVector::from_vec(vec![-0.8]);
        assert!(matches!(
            dependent_seed_continuity(&system, ControlType::None, &q_u, &seed, &next),
            Err(TransitionError::NotImplemented { .. })
        ));
        assert!(matches!(
            dependent_seed_continuity(&system, ControlType::Constant, &q_u, &seed, &DVector::zeros(2)),
            Err(TransitionError::Configuration { .. })
        ));
    }
}

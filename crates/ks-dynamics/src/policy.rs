//! Inequality policies layered on top of the multipliers.

use crate::error::{DynamicsError, DynamicsResult};
use ks_core::{Real, to_f64};
use nalgebra::DVector;

/// A scalar that an enclosing optimizer must keep within `[lower, upper]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InequalityTerm<T: Real> {
    pub value: T,
    pub lower: f64,
    pub upper: f64,
}

impl<T: Real> InequalityTerm<T> {
    /// Distance outside the admissible interval, zero when satisfied.
    pub fn violation(&self) -> f64 {
        let v = to_f64(self.value);
        if v < self.lower {
            self.lower - v
        } else if v > self.upper {
            v - self.upper
        } else {
            0.0
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.violation() == 0.0
    }
}

/// Sign and cone policies on the constraint reactions.
#[derive(Clone, Debug, PartialEq)]
pub enum MultiplierPolicy {
    /// The listed reactions may only pull: `λ_i ≤ bound`.
    PullOnly { rows: Vec<usize>, bound: f64 },
    /// Relaxed friction cone `λ_n² − λ_t² ≥ 0`.
    RelaxedFrictionCone { normal: usize, tangential: usize },
}

impl MultiplierPolicy {
    /// Check row indices against the number of multipliers.
    pub fn validate(&self, nb_multipliers: usize) -> DynamicsResult<()> {
        let rows: Vec<usize> = match self {
            Self::PullOnly { rows, bound } => {
                if bound.is_nan() {
                    return Err(DynamicsError::configuration("pull-only bound is NaN"));
                }
                rows.clone()
            }
            Self::RelaxedFrictionCone { normal, tangential } => {
                if normal == tangential {
                    return Err(DynamicsError::configuration(
                        "friction cone needs distinct normal and tangential rows",
                    ));
                }
                vec![*normal, *tangential]
            }
        };
        match rows.iter().find(|&&r| r >= nb_multipliers) {
            Some(r) => Err(DynamicsError::configuration(format!(
                "multiplier row {r} out of range ({nb_multipliers} multipliers)"
            ))),
            None => Ok(()),
        }
    }

    /// Inequality terms for one multiplier vector.
    pub fn terms<T: Real>(&self, lambda: &DVector<T>) -> DynamicsResult<Vec<InequalityTerm<T>>> {
        self.validate(lambda.len())?;
        Ok(match self {
            Self::PullOnly { rows, bound } => rows
                .iter()
                .map(|&r| InequalityTerm {
                    value: lambda[r],
                    lower: f64::NEG_INFINITY,
                    upper: *bound,
                })
                .collect(),
            Self::RelaxedFrictionCone { normal, tangential } => {
                let (n, t) = (lambda[*normal], lambda[*tangential]);
                vec![InequalityTerm {
                    value: n * n - t * t,
                    lower: 0.0,
                    upper: f64::INFINITY,
                }]
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_only_flags_pushing() {
        let policy = MultiplierPolicy::PullOnly {
            rows: vec![1],
            bound: -0.1,
        };
        let pulling = policy.terms(&DVector::from_vec(vec![5.0, -2.0])).unwrap();
        assert!(pulling[0].is_satisfied());

        let pushing = policy.terms(&DVector::from_vec(vec![5.0, 0.4])).unwrap();
        assert!((pushing[0].violation() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn friction_cone() {
        let policy = MultiplierPolicy::RelaxedFrictionCone {
            normal: 0,
            tangential: 1,
        };
        let inside = policy.terms(&DVector::from_vec(vec![-3.0, 2.0])).unwrap();
        assert_eq!(inside[0].value, 5.0);
        assert!(inside[0].is_satisfied());

        let outside = policy.terms(&DVector::from_vec(vec![1.0, 2.0])).unwrap();
        assert!(!outside[0].is_satisfied());
    }

    #[test]
    fn rows_are_bounds_checked() {
        let policy = MultiplierPolicy::PullOnly {
            rows: vec![3],
            bound: 0.0,
        };
        assert!(policy.terms(&DVector::from_vec(vec![0.0, 0.0])).is_err());
    }
}

//! External generalized force fields.

use crate::error::{DynamicsError, DynamicsResult};
use ks_core::{Real, lit};
use nalgebra::DVector;

/// A configuration-dependent generalized force added to `τ` before the
/// constrained dynamics are assembled.
pub trait GeneralizedForceField<T: Real>: Send + Sync {
    fn name(&self) -> &str;

    /// Force on every coordinate (length `nb_q`).
    fn generalized_force(&self, q: &DVector<T>, qdot: &DVector<T>) -> DynamicsResult<DVector<T>>;
}

/// Linear return spring with preload acting on one coordinate.
///
/// The force opposes displacement past `rest_position`:
/// `f = −(preload + stiffness · (q_i − rest_position))`.
#[derive(Clone, Debug, PartialEq)]
pub struct KeySpring {
    name: String,
    coordinate: usize,
    stiffness: f64,
    rest_position: f64,
    preload: f64,
}

impl KeySpring {
    pub fn new(
        name: impl Into<String>,
        coordinate: usize,
        stiffness: f64,
        rest_position: f64,
        preload: f64,
    ) -> DynamicsResult<Self> {
        if !(stiffness.is_finite() && stiffness >= 0.0) {
            return Err(DynamicsError::configuration(format!(
                "spring stiffness must be finite and non-negative, got {stiffness}"
            )));
        }
        if !(rest_position.is_finite() && preload.is_finite()) {
            return Err(DynamicsError::configuration(
                "spring rest position and preload must be finite",
            ));
        }
        Ok(Self {
            name: name.into(),
            coordinate,
            stiffness,
            rest_position,
            preload,
        })
    }

    pub fn coordinate(&self) -> usize {
        self.coordinate
    }

    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }
}

impl<T: Real> GeneralizedForceField<T> for KeySpring {
    fn name(&self) -> &str {
        &self.name
    }

    fn generalized_force(&self, q: &DVector<T>, _qdot: &DVector<T>) -> DynamicsResult<DVector<T>> {
        if self.coordinate >= q.len() {
            return Err(DynamicsError::configuration(format!(
                "spring '{}' acts on coordinate {} but q has {} entries",
                self.name,
                self.coordinate,
                q.len()
            )));
        }
        let displacement = q[self.coordinate] - lit::<T>(self.rest_position);
        let mut f = DVector::zeros(q.len());
        f[self.coordinate] = -(lit::<T>(self.preload) + displacement * lit::<T>(self.stiffness));
        Ok(f)
    }
}

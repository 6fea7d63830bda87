//! Two planar point masses held at a fixed distance.

use crate::common::{check_len, check_marker};
use crate::error::{ModelError, ModelResult};
use crate::partition::CoordinatePartition;
use crate::traits::RigidBodyModel;
use ks_core::units::{Accel, Length, Mass};
use ks_core::{Real, lit};
use nalgebra::{DMatrix, DVector, Vector3};

/// Two point masses in the vertical plane linked by a rigid massless rod.
///
/// Coordinates are `q = [x1, y1, x2, y2]` (gravity along `-y`), with the
/// single holonomic constraint
///
/// ```text
/// g(q) = ‖p1 − p2‖ − L = 0
/// ```
///
/// The default partition keeps `x1, y1, x2` independent and solves `y2`.
#[derive(Clone, Debug)]
pub struct PointMassPair {
    name: String,
    mass_1: Mass,
    mass_2: Mass,
    length: Length,
    gravity: Accel,
}

impl PointMassPair {
    /// Create a new pair.
    ///
    /// # Errors
    /// Returns error if a mass or the rod length is not strictly positive.
    pub fn new(
        name: impl Into<String>,
        mass_1: Mass,
        mass_2: Mass,
        length: Length,
        gravity: Accel,
    ) -> ModelResult<Self> {
        if !(mass_1.value > 0.0 && mass_2.value > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "point masses must be positive",
            });
        }
        if !(length.value > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "rod length must be positive",
            });
        }
        Ok(Self {
            name: name.into(),
            mass_1,
            mass_2,
            length,
            gravity,
        })
    }

    pub fn length(&self) -> Length {
        self.length
    }

    /// Separation `d = p1 − p2` and its norm, rejecting coincident points.
    fn separation<T: Real>(&self, q: &DVector<T>) -> ModelResult<(T, T, T)> {
        check_len("q", q, 4)?;
        let dx = q[0] - q[2];
        let dy = q[1] - q[3];
        let r = (dx * dx + dy * dy).sqrt();
        if r <= T::default_epsilon() {
            return Err(ModelError::NonPhysical {
                what: "coincident point masses",
            });
        }
        Ok((dx, dy, r))
    }
}

impl<T: Real> RigidBodyModel<T> for PointMassPair {
    fn name(&self) -> &str {
        &self.name
    }

    fn nb_q(&self) -> usize {
        4
    }

    fn nb_constraints(&self) -> usize {
        1
    }

    fn nb_markers(&self) -> usize {
        2
    }

    fn dof_names(&self) -> Vec<String> {
        ["x1", "y1", "x2", "y2"].iter().map(|s| s.to_string()).collect()
    }

    fn default_partition(&self) -> ModelResult<CoordinatePartition> {
        CoordinatePartition::new(4, vec![0, 1, 2], vec![3])
    }

    fn mass_matrix(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        check_len("q", q, 4)?;
        let m1: T = lit(self.mass_1.value);
        let m2: T = lit(self.mass_2.value);
        Ok(DMatrix::from_diagonal(&DVector::from_vec(vec![m1, m1, m2, m2])))
    }

    fn nonlinear_effects(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, 4)?;
        check_len("qdot", qdot, 4)?;
        let g: T = lit(self.gravity.value);
        let m1: T = lit(self.mass_1.value);
        let m2: T = lit(self.mass_2.value);
        let zero = T::zero();
        Ok(DVector::from_vec(vec![zero, m1 * g, zero, m2 * g]))
    }

    fn constraint_residual(&self, q: &DVector<T>) -> ModelResult<DVector<T>> {
        let (_, _, r) = self.separation(q)?;
        let l: T = lit(self.length.value);
        Ok(DVector::from_element(1, r - l))
    }

    fn constraint_jacobian(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        let (dx, dy, r) = self.separation(q)?;
        let (ex, ey) = (dx / r, dy / r);
        Ok(DMatrix::from_row_slice(1, 4, &[ex, ey, -ex, -ey]))
    }

    fn constraint_bias(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        let (dx, dy, r) = self.separation(q)?;
        check_len("qdot", qdot, 4)?;
        let dvx = qdot[0] - qdot[2];
        let dvy = qdot[1] - qdot[3];
        // d/dt (d/r) · ḋ = (‖ḋ‖² − (d·ḋ / r)²) / r
        let radial = (dx * dvx + dy * dvy) / r;
        Ok(DVector::from_element(
            1,
            (dvx * dvx + dvy * dvy - radial * radial) / r,
        ))
    }

    fn marker_position(&self, index: usize, q: &DVector<T>) -> ModelResult<Vector3<T>> {
        check_marker(index, 2)?;
        check_len("q", q, 4)?;
        let k = 2 * index;
        Ok(Vector3::new(q[k], q[k + 1], T::zero()))
    }
}

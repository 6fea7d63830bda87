//! Planar two-link arm, optionally pressing a piano key.

use crate::common::{check_len, check_marker};
use crate::error::{ModelError, ModelResult};
use crate::partition::CoordinatePartition;
use crate::traits::RigidBodyModel;
use ks_core::units::{Accel, Length, Mass};
use ks_core::{Real, lit};
use nalgebra::{DMatrix, DVector, Vector3};

/// Vertically sliding key pressed by the fingertip.
#[derive(Clone, Copy, Debug)]
pub struct KeyParams {
    /// Horizontal position of the contact point on the key.
    pub contact_x: Length,
    /// Height of the key surface at rest (key coordinate zero).
    pub top_y: Length,
    /// Moving mass of the key.
    pub mass: Mass,
}

/// Two-link planar arm with point masses at the elbow and the fingertip.
///
/// Coordinates are `[shoulder, elbow]` (shoulder absolute from `+x`, elbow
/// relative) and, when a key is attached, the key depression `z` (positive
/// downward). With a key the fingertip is held on the key surface:
///
/// ```text
/// g(q) = [ p_x − contact_x,  p_y − (top_y − z) ] = 0
/// ```
///
/// so the attached model has two constraint rows, the shoulder as its only
/// independent coordinate and `[elbow, z]` dependent. The key coordinate is
/// passive (never actuated).
#[derive(Clone, Debug)]
pub struct PianoArm {
    name: String,
    upper_arm: Length,
    forearm: Length,
    elbow_mass: Mass,
    hand_mass: Mass,
    gravity: Accel,
    key: Option<KeyParams>,
}

const DOF_NAMES: [&str; 3] = ["shoulder", "elbow", "key"];

/// Marker order: elbow, fingertip, key surface (keyed model only).
pub const MARKER_ELBOW: usize = 0;
pub const MARKER_FINGERTIP: usize = 1;
pub const MARKER_KEY: usize = 2;

struct Trig<T> {
    s1: T,
    c1: T,
    s2: T,
    c2: T,
    s12: T,
    c12: T,
}

impl PianoArm {
    /// Create a free arm (no key).
    ///
    /// # Errors
    /// Returns error if a link length or mass is not strictly positive.
    pub fn new(
        name: impl Into<String>,
        upper_arm: Length,
        forearm: Length,
        elbow_mass: Mass,
        hand_mass: Mass,
        gravity: Accel,
    ) -> ModelResult<Self> {
        if !(upper_arm.value > 0.0 && forearm.value > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "link lengths must be positive",
            });
        }
        if !(elbow_mass.value > 0.0 && hand_mass.value > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "link masses must be positive",
            });
        }
        Ok(Self {
            name: name.into(),
            upper_arm,
            forearm,
            elbow_mass,
            hand_mass,
            gravity,
            key: None,
        })
    }

    /// Attach a key; the result has one extra coordinate and two constraints.
    pub fn with_key(mut self, key: KeyParams) -> ModelResult<Self> {
        if !(key.mass.value > 0.0) {
            return Err(ModelError::InvalidArg {
                what: "key mass must be positive",
            });
        }
        self.key = Some(key);
        Ok(self)
    }

    pub fn key(&self) -> Option<&KeyParams> {
        self.key.as_ref()
    }

    fn dofs(&self) -> usize {
        if self.key.is_some() { 3 } else { 2 }
    }

    fn trig<T: Real>(q: &DVector<T>) -> Trig<T> {
        let q12 = q[0] + q[1];
        Trig {
            s1: q[0].sin(),
            c1: q[0].cos(),
            s2: q[1].sin(),
            c2: q[1].cos(),
            s12: q12.sin(),
            c12: q12.cos(),
        }
    }

    fn lengths<T: Real>(&self) -> (T, T) {
        (lit(self.upper_arm.value), lit(self.forearm.value))
    }

    fn fingertip<T: Real>(&self, q: &DVector<T>) -> (T, T) {
        let (l1, l2) = self.lengths::<T>();
        let t = Self::trig(q);
        (l1 * t.c1 + l2 * t.c12, l1 * t.s1 + l2 * t.s12)
    }

    fn require_key(&self) -> ModelResult<&KeyParams> {
        self.key.as_ref().ok_or(ModelError::NotSupported {
            what: "arm has no key attached",
        })
    }
}

impl<T: Real> RigidBodyModel<T> for PianoArm {
    fn name(&self) -> &str {
        &self.name
    }

    fn nb_q(&self) -> usize {
        self.dofs()
    }

    fn nb_constraints(&self) -> usize {
        if self.key.is_some() { 2 } else { 0 }
    }

    fn nb_markers(&self) -> usize {
        if self.key.is_some() { 3 } else { 2 }
    }

    fn dof_names(&self) -> Vec<String> {
        DOF_NAMES[..self.dofs()].iter().map(|s| s.to_string()).collect()
    }

    fn actuated_dofs(&self) -> Vec<usize> {
        vec![0, 1]
    }

    fn default_partition(&self) -> ModelResult<CoordinatePartition> {
        if self.key.is_some() {
            CoordinatePartition::new(3, vec![0], vec![1, 2])
        } else {
            Ok(CoordinatePartition::unconstrained(2))
        }
    }

    fn mass_matrix(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        check_len("q", q, self.dofs())?;
        let (l1, l2) = self.lengths::<T>();
        let m1: T = lit(self.elbow_mass.value);
        let m2: T = lit(self.hand_mass.value);
        let two: T = lit(2.0);
        let c2 = Self::trig(q).c2;

        let m11 = m1 * l1 * l1 + m2 * (l1 * l1 + l2 * l2 + two * l1 * l2 * c2);
        let m12 = m2 * (l2 * l2 + l1 * l2 * c2);
        let m22 = m2 * l2 * l2;

        let mut mass = DMatrix::zeros(self.dofs(), self.dofs());
        mass[(0, 0)] = m11;
        mass[(0, 1)] = m12;
        mass[(1, 0)] = m12;
        mass[(1, 1)] = m22;
        if let Some(key) = &self.key {
            mass[(2, 2)] = lit(key.mass.value);
        }
        Ok(mass)
    }

    fn nonlinear_effects(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, self.dofs())?;
        check_len("qdot", qdot, self.dofs())?;
        let (l1, l2) = self.lengths::<T>();
        let m1: T = lit(self.elbow_mass.value);
        let m2: T = lit(self.hand_mass.value);
        let g: T = lit(self.gravity.value);
        let two: T = lit(2.0);
        let t = Self::trig(q);
        let (w1, w2) = (qdot[0], qdot[1]);

        let h = m2 * l1 * l2 * t.s2;
        let mut n = DVector::zeros(self.dofs());
        n[0] = -h * (two * w1 * w2 + w2 * w2) + (m1 + m2) * g * l1 * t.c1 + m2 * g * l2 * t.c12;
        n[1] = h * w1 * w1 + m2 * g * l2 * t.c12;
        if let Some(key) = &self.key {
            // Key surface height is top_y − z, so gravity drives z positive.
            let mk: T = lit(key.mass.value);
            n[2] = -mk * g;
        }
        Ok(n)
    }

    fn constraint_residual(&self, q: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, self.dofs())?;
        let Some(key) = &self.key else {
            return Ok(DVector::zeros(0));
        };
        let (px, py) = self.fingertip(q);
        let contact_x: T = lit(key.contact_x.value);
        let top_y: T = lit(key.top_y.value);
        Ok(DVector::from_vec(vec![px - contact_x, py - top_y + q[2]]))
    }

    fn constraint_jacobian(&self, q: &DVector<T>) -> ModelResult<DMatrix<T>> {
        check_len("q", q, self.dofs())?;
        if self.key.is_none() {
            return Ok(DMatrix::zeros(0, 2));
        }
        let (l1, l2) = self.lengths::<T>();
        let t = Self::trig(q);
        let zero = T::zero();
        let one = T::one();
        Ok(DMatrix::from_row_slice(
            2,
            3,
            &[
                -l1 * t.s1 - l2 * t.s12,
                -l2 * t.s12,
                zero,
                l1 * t.c1 + l2 * t.c12,
                l2 * t.c12,
                one,
            ],
        ))
    }

    fn constraint_bias(&self, q: &DVector<T>, qdot: &DVector<T>) -> ModelResult<DVector<T>> {
        check_len("q", q, self.dofs())?;
        check_len("qdot", qdot, self.dofs())?;
        if self.key.is_none() {
            return Ok(DVector::zeros(0));
        }
        let (l1, l2) = self.lengths::<T>();
        let t = Self::trig(q);
        let w1 = qdot[0];
        let w12 = qdot[0] + qdot[1];
        Ok(DVector::from_vec(vec![
            -l1 * t.c1 * w1 * w1 - l2 * t.c12 * w12 * w12,
            -l1 * t.s1 * w1 * w1 - l2 * t.s12 * w12 * w12,
        ]))
    }

    fn marker_position(&self, index: usize, q: &DVector<T>) -> ModelResult<Vector3<T>> {
        check_marker(index, RigidBodyModel::<T>::nb_markers(self))?;
        check_len("q", q, self.dofs())?;
        let (l1, _) = self.lengths::<T>();
        let zero = T::zero();
        match index {
            MARKER_ELBOW => Ok(Vector3::new(l1 * q[0].cos(), l1 * q[0].sin(), zero)),
            MARKER_FINGERTIP => {
                let (px, py) = self.fingertip(q);
                Ok(Vector3::new(px, py, zero))
            }
            _ => {
                let key = self.require_key()?;
                let x: T = lit(key.contact_x.value);
                let top: T = lit(key.top_y.value);
                Ok(Vector3::new(x, top - q[2], zero))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_core::units::{kg, m, mps2};

    fn keyed_arm() -> PianoArm {
        PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81))
            .unwrap()
            .with_key(KeyParams {
                contact_x: m(0.35),
                top_y: m(-0.30),
                mass: kg(0.05),
            })
            .unwrap()
    }

    #[test]
    fn free_arm_has_no_constraints() {
        let arm = PianoArm::new("arm", m(0.3), m(0.25), kg(2.0), kg(0.5), mps2(9.81)).unwrap();
        let q = DVector::from_vec(vec![0.1, 0.2]);
        assert_eq!(RigidBodyModel::<f64>::nb_q(&arm), 2);
        assert_eq!(RigidBodyModel::<f64>::constraint_residual(&arm, &q).unwrap().len(), 0);
        let p = RigidBodyModel::<f64>::default_partition(&arm).unwrap();
        assert_eq!(p.nb_dependent(), 0);
    }

    #[test]
    fn mass_matrix_is_symmetric_positive() {
        let arm = keyed_arm();
        let q = DVector::from_vec(vec![-0.3, -1.0, 0.02]);
        let mass = RigidBodyModel::<f64>::mass_matrix(&arm, &q).unwrap();
        assert_eq!(mass, mass.transpose());
        assert!(mass.clone().cholesky().is_some());
    }

    #[test]
    fn jacobian_matches_finite_difference() {
        let arm = keyed_arm();
        let q = DVector::from_vec(vec![-0.3, -1.0, 0.02]);
        let jac = RigidBodyModel::<f64>::constraint_jacobian(&arm, &q).unwrap();
        let eps = 1e-7;
        for j in 0..3 {
            let mut qp = q.clone();
            qp[j] += eps;
            let mut qm = q.clone();
            qm[j] -= eps;
            let gp = RigidBodyModel::<f64>::constraint_residual(&arm, &qp).unwrap();
            let gm = RigidBodyModel::<f64>::constraint_residual(&arm, &qm).unwrap();
            let col = (gp - gm) / (2.0 * eps);
            for i in 0..2 {
                assert!((jac[(i, j)] - col[i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn bias_matches_jacobian_rate() {
        // J̇q̇ ≈ (J(q + h q̇) − J(q − h q̇)) q̇ / 2h
        let arm = keyed_arm();
        let q = DVector::from_vec(vec![-0.3, -1.0, 0.02]);
        let qdot = DVector::from_vec(vec![0.7, -1.1, 0.4]);
        let h = 1e-6;
        let jp = RigidBodyModel::<f64>::constraint_jacobian(&arm, &(&q + &qdot * h)).unwrap();
        let jm = RigidBodyModel::<f64>::constraint_jacobian(&arm, &(&q - &qdot * h)).unwrap();
        let expected = (jp - jm) * &qdot / (2.0 * h);
        let bias = RigidBodyModel::<f64>::constraint_bias(&arm, &q, &qdot).unwrap();
        assert!((bias - expected).norm() < 1e-6);
    }

    #[test]
    fn key_marker_follows_depression() {
        let arm = keyed_arm();
        let q = DVector::from_vec(vec![0.0, 0.0, 0.01]);
        let key = RigidBodyModel::<f64>::marker_position(&arm, MARKER_KEY, &q).unwrap();
        assert!((key.y + 0.31).abs() < 1e-12);
    }

    #[test]
    fn tau_is_spread_onto_actuated_joints() {
        let arm = keyed_arm();
        let tau = DVector::from_vec(vec![1.0, 2.0]);
        let full = RigidBodyModel::<f64>::generalized_forces_from_partial(&arm, &tau).unwrap();
        assert_eq!(full.as_slice(), &[1.0, 2.0, 0.0]);
    }
}

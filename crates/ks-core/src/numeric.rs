use crate::KsError;
use nalgebra::{DVector, RealField};

/// Scalar type accepted by every kernel function.
///
/// `f64` is the everyday instantiation. Forward-mode AD scalars that
/// implement `RealField` (dual numbers) pass through the same code, which is
/// what keeps the dynamics differentiable end to end.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}

/// Lift an `f64` constant into the scalar type.
#[inline]
pub fn lit<T: Real>(v: f64) -> T {
    nalgebra::convert::<f64, T>(v)
}

/// Project a scalar back to `f64` (the real part for AD scalars).
#[inline]
pub fn to_f64<T: Real>(v: T) -> f64 {
    nalgebra::try_convert::<T, f64>(v).unwrap_or(f64::NAN)
}

/// Reject vectors containing NaN or infinities.
pub fn ensure_finite_vec<T: Real>(v: &DVector<T>, what: &'static str) -> Result<(), KsError> {
    match v.iter().find(|x| !x.is_finite()) {
        Some(bad) => Err(KsError::NonFinite {
            what,
            value: to_f64(*bad),
        }),
        None => Ok(()),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn finite_vectors_pass(values in proptest::collection::vec(-1e9_f64..1e9, 0..8)) {
            let v = DVector::from_vec(values);
            prop_assert!(ensure_finite_vec(&v, "v").is_ok());
        }
    }
}

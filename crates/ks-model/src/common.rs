//! Shared helpers for model implementations.

use crate::error::{ModelError, ModelResult};
use ks_core::{Real, ensure_len};
use nalgebra::DVector;

/// Check a configuration/velocity vector against the model's dof count.
pub fn check_len<T: Real>(what: &'static str, v: &DVector<T>, expected: usize) -> ModelResult<()> {
    Ok(ensure_len(what, expected, v.len())?)
}

/// Check a marker index against the model's marker count.
pub fn check_marker(index: usize, nb_markers: usize) -> ModelResult<()> {
    if index < nb_markers {
        Ok(())
    } else {
        Err(ModelError::IndexOob {
            what: "marker",
            index,
            len: nb_markers,
        })
    }
}

/// Pick the entries of `v` at `indices`, in order.
pub fn select<T: Real>(v: &DVector<T>, indices: &[usize]) -> DVector<T> {
    DVector::from_iterator(indices.len(), indices.iter().map(|&i| v[i]))
}

/// Write `values` into a zero vector of length `len` at `indices`.
pub fn scatter<T: Real>(len: usize, indices: &[usize], values: &DVector<T>) -> DVector<T> {
    let mut out = DVector::zeros(len);
    for (k, &i) in indices.iter().enumerate() {
        out[i] = values[k];
    }
    out
}

//! Error types for rigid-body model evaluation.

use ks_core::error::KsError;
use thiserror::Error;

/// Errors that can occur while evaluating a rigid-body model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Index out of bounds: {what} (index={index}, len={len})")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Non-physical configuration: {what}")]
    NonPhysical { what: &'static str },

    #[error("Singular matrix: {what}")]
    Singular { what: &'static str },

    #[error("Not supported: {what}")]
    NotSupported { what: &'static str },
}

pub type ModelResult<T> = Result<T, ModelError>;

impl From<KsError> for ModelError {
    fn from(e: KsError) -> Self {
        match e {
            KsError::DimensionMismatch {
                what,
                expected,
                actual,
            } => ModelError::DimensionMismatch {
                what,
                expected,
                actual,
            },
            KsError::NonFinite { what, .. } => ModelError::NonPhysical { what },
        }
    }
}

//! Error types for phase transitions.

use ks_core::KsError;
use ks_dynamics::DynamicsError;
use ks_model::ModelError;
use thiserror::Error;

/// Errors raised while building or evaluating a junction residual.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    /// Dimension, partition or state/boundary mismatch.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    /// A combination with no defined continuity physics.
    #[error("Not implemented: {what}")]
    NotImplemented { what: String },

    /// NaN or infinite boundary values.
    #[error("Numeric error: {0}")]
    Numeric(#[from] KsError),

    #[error("Singular matrix: {what}")]
    SingularMatrix { what: &'static str },

    #[error("Dynamics error: {0}")]
    Dynamics(#[from] DynamicsError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type TransitionResult<T> = Result<T, TransitionError>;

impl TransitionError {
    pub(crate) fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration { what: what.into() }
    }

    pub(crate) fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented { what: what.into() }
    }
}

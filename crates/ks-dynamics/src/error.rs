//! Error types for the constrained-dynamics kernel.

use ks_model::ModelError;
use ks_solver::SolverError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DynamicsError {
    /// Dimension or partition mismatch detected while assembling a system.
    #[error("Configuration error: {what}")]
    Configuration { what: String },

    #[error("Singular matrix: {what}")]
    SingularMatrix { what: &'static str },

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type DynamicsResult<T> = Result<T, DynamicsError>;

impl DynamicsError {
    pub(crate) fn configuration(what: impl Into<String>) -> Self {
        Self::Configuration { what: what.into() }
    }
}

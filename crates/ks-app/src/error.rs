//! Error types for the ks-app service layer.

use std::path::PathBuf;

/// Application error type wrapping the backend crates' errors behind one
/// interface for the CLI.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Project error: {0}")]
    Project(String),

    #[error("Failed to read scenario file: {path}")]
    ProjectFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Scenario validation failed: {0}")]
    Validation(String),

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("Model build failed: {0}")]
    Build(String),

    #[error("Dynamics error: {0}")]
    Dynamics(String),

    #[error("Transition error: {0}")]
    Transition(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ks-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<ks_project::ProjectError> for AppError {
    fn from(err: ks_project::ProjectError) -> Self {
        match err {
            ks_project::ProjectError::Validation(e) => AppError::Validation(e.to_string()),
            other => AppError::Project(other.to_string()),
        }
    }
}

impl From<ks_model::ModelError> for AppError {
    fn from(err: ks_model::ModelError) -> Self {
        AppError::Build(err.to_string())
    }
}

impl From<ks_dynamics::DynamicsError> for AppError {
    fn from(err: ks_dynamics::DynamicsError) -> Self {
        AppError::Dynamics(err.to_string())
    }
}

impl From<ks_phase::TransitionError> for AppError {
    fn from(err: ks_phase::TransitionError) -> Self {
        AppError::Transition(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

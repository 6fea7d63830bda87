//! Nonlinear solvers for holonomic constraints.
//!
//! Provides a damped Newton iteration generic over the scalar type, central
//! difference Jacobians, and [`HolonomicConstraintSolver`] which recovers the
//! dependent coordinates `v` from the independent ones `u`.

pub mod error;
pub mod holonomic;
pub mod jacobian;
pub mod newton;

pub use error::{SolverError, SolverResult};
pub use holonomic::HolonomicConstraintSolver;
pub use jacobian::central_difference_jacobian;
pub use newton::{NewtonConfig, NewtonResult, newton_solve};

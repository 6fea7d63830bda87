//! Constrained dynamics on partitioned coordinates.
//!
//! A [`PartitionedModel`] binds a rigid-body model to its
//! independent/dependent split. On top of it this crate provides:
//! - kinematics: coupling matrix, dependent velocity and acceleration offset
//! - forward dynamics in implicit-`v`, explicit-`v`, external-force and
//!   full-coordinate variants, plus torque-derivative-driven state derivatives
//! - Lagrange multipliers and inequality policies on them
//! - marker and holonomic-constraint terms
//! - finite-difference sensitivities for gradient checks

pub mod error;
pub mod forces;
pub mod forward;
pub mod multipliers;
pub mod penalties;
pub mod policy;
pub mod sensitivity;
pub mod system;

pub use error::{DynamicsError, DynamicsResult};
pub use forces::{GeneralizedForceField, KeySpring};
pub use forward::{ConstrainedAccelerations, DependentCoordinates, DynamicsVariant, NodeState};
pub use penalties::{
    holonomic_constraint_end, holonomic_constraint_nodes, superimpose_markers, track_marker,
};
pub use policy::{InequalityTerm, MultiplierPolicy};
pub use sensitivity::{Sensitivity, SensitivityOutput, dynamics_sensitivity};
pub use system::{ConstrainedKinematics, PartitionedModel};

//! Rigid-body models for the constrained-dynamics kernel.
//!
//! This crate defines the [`RigidBodyModel`] interface the kernel consumes
//! (mass matrix, nonlinear effects, constraint residual/Jacobian/bias,
//! markers), the [`CoordinatePartition`] between independent and dependent
//! coordinates, and two reference models:
//! - [`PointMassPair`]: two point masses at a fixed distance
//! - [`PianoArm`]: planar two-link arm, optionally held on a sliding key

pub mod common;
pub mod error;
pub mod partition;
pub mod piano_arm;
pub mod point_mass_pair;
pub mod traits;

pub use error::{ModelError, ModelResult};
pub use partition::{CoordinatePartition, PartitionedBlocks};
pub use piano_arm::{KeyParams, MARKER_ELBOW, MARKER_FINGERTIP, MARKER_KEY, PianoArm};
pub use point_mass_pair::PointMassPair;
pub use traits::RigidBodyModel;

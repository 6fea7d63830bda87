//! Phase states and the continuity residuals between phases.
//!
//! Each phase of a trajectory is tagged with a [`PhaseState`]. At every
//! junction a [`PhaseTransition`] evaluator, selected from the state pair,
//! produces a residual vector that the surrounding optimizer drives to
//! zero. Nothing here integrates or fires events; every relationship is a
//! pure function of the two boundary records.

pub mod error;
pub mod impact;
pub mod seed;
pub mod state;
pub mod transition;

pub use error::{TransitionError, TransitionResult};
pub use impact::{ImpactOutcome, ImpactResolver, extend_with_zeros};
pub use seed::{ControlType, dependent_seed_continuity, dependent_seed_continuity_intervals};
pub use state::{FullBoundary, HolonomicBoundary, PhaseBoundary, PhaseSide, PhaseState};
pub use transition::{Junction, PhaseTransition, PhaseTransitionEngine};

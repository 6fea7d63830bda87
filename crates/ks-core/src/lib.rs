//! ks-core: stable foundation for keystrike.
//!
//! Contains:
//! - numeric (scalar trait + float helpers)
//! - units (uom SI types + constructors for model parameters)
//! - ids (compact phase identifiers)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{KsError, KsResult, ensure_len};
pub use ids::*;
pub use numeric::*;
pub use units::*;

//! eos-core: shared foundation for the eos kernel crates.
//!
//! Contains:
//! - error (shared error type and result alias)
//! - ids (compact object keys handed out by the registry)
//! - numeric (Real, tolerances, the `Scalar` element trait)
//! - config (registry sizing, overridable from the environment)

pub mod config;
pub mod error;
pub mod ids;
pub mod numeric;

// Re-exports: nice ergonomics for downstream crates
pub use config::RegistryConfig;
pub use error::{EosError, EosResult};
pub use ids::*;
pub use numeric::*;

//! Process-wide runtime configuration shared by the SpatialNull crates.
//!
//! - [`determinism`] resolves RNG seeding from explicit seeds or the environment.
//! - [`tracing`] installs the global tracing subscriber.

pub mod determinism;
pub mod tracing;

pub use determinism::{
    config, lock_reduction_order, rng_from_label, rng_from_optional, DeterminismConfig,
};
pub use tracing::{init_tracing, InitError, DEFAULT_FILTER};

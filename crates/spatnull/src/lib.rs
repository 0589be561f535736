// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

// crates/spatnull/src/lib.rs
//! Spatially-constrained null models for correlating regional brain maps.
//!
//! Independent label permutation overstates significance when neighbouring
//! regions carry similar values. This crate builds nulls that keep spatial
//! autocorrelation instead:
//! - spin permutations of region centroids on the sphere ([`rotation`]),
//! - unconstrained label shuffles for structures without a sphere ([`shuffle`]),
//! - Moran spectral randomization from any spatial weight matrix ([`moran`]),
//!
//! and turns permutation batches into two-direction p-values ([`significance`]).

pub mod centroid;
pub mod coords;
pub mod correlation;
pub mod error;
pub mod moran;
pub mod permutation;
pub mod rotation;
pub mod sampler;
pub mod shuffle;
pub mod significance;
pub mod weights;

pub use centroid::{
    extract_centroids, extract_centroids_for, RegionCentroids, FREESURFER_IGNORE_LABELS,
};
pub use coords::RegionCoordinates;
pub use correlation::CorrelationMethod;
pub use error::{NullModelError, Result};
pub use moran::{
    compute_spectral_basis, randomize_spectral, MoranBasis, MoranConfig, MoranRandomization,
    Procedure, SpectrumMode,
};
pub use permutation::PermutationBatch;
pub use rotation::{generate_rotation_permutations, SphericalRotationPermuter};
pub use sampler::{NoProgress, PermutationProgress, ProgressSink, SamplerConfig};
pub use shuffle::{generate_shuffle_permutations, LabelShufflePermuter};
pub use significance::{
    permutation_p_value, shuffle_test, spin_test, PermutationTest, PermutationTestResult,
};
pub use weights::{euclidean_distances, inverse_distance_weights};

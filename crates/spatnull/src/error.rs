// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

/// Errors surfaced by the null-model engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NullModelError {
    /// Array shapes that cannot be reconciled (lengths, widths, region counts).
    #[error("shape error: {0}")]
    Shape(String),
    /// Spatial weight matrices must be square.
    #[error("weight matrix must be square, got {rows}x{cols}")]
    NonSquareWeights { rows: usize, cols: usize },
    /// Double-centering guarantees a zero eigenvalue; its absence means the input was malformed.
    #[error(
        "weight matrix has no zero eigenvalue \
         (tolerance {tolerance:e}, smallest |λ| = {smallest:e})"
    )]
    NoZeroEigenvalue { tolerance: f64, smallest: f64 },
    /// The requested spectrum left no eigenvector to randomize with.
    #[error("spectral basis is empty after removing zero eigenvalues")]
    EmptySpectrum,
    /// A permutation column failed validation.
    #[error("invalid permutation in column {column}: {reason}")]
    InvalidPermutation { column: usize, reason: String },
    /// A single permutation drew the identity more often than the retry budget allows.
    #[error(
        "gave up after {rejections} consecutive identity draws \
         ({accepted}/{target} permutations accepted)"
    )]
    RetryLimitExceeded {
        accepted: usize,
        target: usize,
        rejections: usize,
    },
    /// With fewer than two regions every permutation is the identity.
    #[error("at least two regions are required to permute, got {regions}")]
    TooFewRegions { regions: usize },
    /// The empirical correlation is undefined (e.g. a constant map).
    #[error("empirical correlation is undefined; check that neither map is constant")]
    DegenerateCorrelation,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenient result alias for the engine.
pub type Result<T> = std::result::Result<T, NullModelError>;

pub(crate) fn shape(message: impl Into<String>) -> NullModelError {
    NullModelError::Shape(message.into())
}

pub(crate) fn invalid(message: impl Into<String>) -> NullModelError {
    NullModelError::InvalidArgument(message.into())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Bounded retry loop shared by the rotation and shuffle permuters.
//!
//! Each draw moves through `Sampling -> Validating -> {Accepted, Rejected}`;
//! rejected (identity) draws go back to `Sampling`. The retry budget
//! `max_rejections` applies per permutation and is restored on every accepted
//! draw; exhausting it is reported as [`NullModelError::RetryLimitExceeded`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{invalid, NullModelError, Result};
use crate::permutation::{is_identity, PermutationBatch};

/// Tunables for permutation generation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SamplerConfig {
    /// Number of permutations to collect.
    pub n_permutations: usize,
    /// Consecutive identity draws tolerated for a single permutation.
    pub max_rejections: usize,
    /// Explicit seed; `None` defers to `spatnull_config::determinism`.
    pub seed: Option<u64>,
    /// Progress is reported every this many accepted permutations (0 disables).
    pub progress_every: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            n_permutations: 100,
            max_rejections: 10_000,
            seed: None,
            progress_every: 100,
        }
    }
}

impl SamplerConfig {
    pub fn with_permutations(n_permutations: usize) -> Self {
        Self {
            n_permutations,
            ..Self::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Snapshot handed to progress sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermutationProgress {
    pub accepted: usize,
    pub rejected: usize,
    pub target: usize,
}

/// Receives progress updates while a batch is being generated.
pub trait ProgressSink {
    fn on_progress(&mut self, progress: &PermutationProgress);
}

impl<F: FnMut(&PermutationProgress)> ProgressSink for F {
    fn on_progress(&mut self, progress: &PermutationProgress) {
        self(progress)
    }
}

/// Sink that discards every update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _: &PermutationProgress) {}
}

enum SampleState {
    Sampling,
    Validating(Vec<usize>),
    Accepted(Vec<usize>),
    Rejected,
}

pub(crate) fn collect_permutations<R, D>(
    config: &SamplerConfig,
    n_regions: usize,
    rng: &mut R,
    progress: &mut dyn ProgressSink,
    mut draw: D,
) -> Result<PermutationBatch>
where
    R: Rng + ?Sized,
    D: FnMut(&mut R) -> Vec<usize>,
{
    if config.n_permutations == 0 {
        return Err(invalid("n_permutations must be > 0"));
    }
    if n_regions < 2 {
        return Err(NullModelError::TooFewRegions { regions: n_regions });
    }

    let target = config.n_permutations;
    let mut columns: Vec<Vec<usize>> = Vec::with_capacity(target);
    let mut rejected = 0usize;
    let mut streak = 0usize;
    let mut state = SampleState::Sampling;

    loop {
        state = match state {
            SampleState::Sampling => {
                if columns.len() == target {
                    break;
                }
                SampleState::Validating(draw(rng))
            }
            SampleState::Validating(perm) => {
                if is_identity(&perm) {
                    SampleState::Rejected
                } else {
                    SampleState::Accepted(perm)
                }
            }
            SampleState::Accepted(perm) => {
                columns.push(perm);
                streak = 0;
                let accepted = columns.len();
                let every = config.progress_every;
                if (every > 0 && accepted % every == 0) || accepted == target {
                    debug!(accepted, target, rejected, "permutation progress");
                    progress.on_progress(&PermutationProgress {
                        accepted,
                        rejected,
                        target,
                    });
                }
                SampleState::Sampling
            }
            SampleState::Rejected => {
                rejected += 1;
                streak += 1;
                debug!(rejected, streak, "draw mapped regions to themselves; retrying");
                if streak > config.max_rejections {
                    return Err(NullModelError::RetryLimitExceeded {
                        accepted: columns.len(),
                        target,
                        rejections: streak,
                    });
                }
                SampleState::Sampling
            }
        };
    }

    Ok(PermutationBatch::from_validated(columns, n_regions))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Unconstrained label shuffles for region sets without a spherical embedding.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::permutation::PermutationBatch;
use crate::sampler::{collect_permutations, NoProgress, ProgressSink, SamplerConfig};

#[derive(Clone, Debug, Default)]
pub struct LabelShufflePermuter {
    config: SamplerConfig,
}

impl LabelShufflePermuter {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn generate(&self, n_regions: usize) -> Result<PermutationBatch> {
        let mut rng = spatnull_config::rng_from_optional(self.config.seed, "spatnull.shuffle");
        self.generate_with(n_regions, &mut rng, &mut NoProgress)
    }

    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        n_regions: usize,
        rng: &mut R,
        progress: &mut dyn ProgressSink,
    ) -> Result<PermutationBatch> {
        collect_permutations(&self.config, n_regions, rng, progress, |rng| {
            let mut perm: Vec<usize> = (0..n_regions).collect();
            perm.shuffle(rng);
            perm
        })
    }
}

/// `n_rot` uniformly random non-identity permutations of `0..n_regions`.
pub fn generate_shuffle_permutations(n_regions: usize, n_rot: usize) -> Result<PermutationBatch> {
    LabelShufflePermuter::new(SamplerConfig::with_permutations(n_rot)).generate(n_regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullModelError;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn shuffles_are_valid_permutations() {
        let permuter = LabelShufflePermuter::new(SamplerConfig::with_permutations(200));
        let batch = permuter
            .generate_with(14, &mut StdRng::seed_from_u64(21), &mut NoProgress)
            .unwrap();
        for column in batch.columns() {
            let mut sorted = column.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..14).collect::<Vec<_>>());
        }
    }

    #[test]
    fn two_regions_always_swap() {
        let batch = generate_shuffle_permutations(2, 25).unwrap();
        assert!(batch.columns().all(|c| c.to_vec() == vec![1, 0]));
    }

    #[test]
    fn seeded_config_is_reproducible() {
        let config = SamplerConfig::with_permutations(10).seeded(99);
        let a = LabelShufflePermuter::new(config.clone()).generate(9).unwrap();
        let b = LabelShufflePermuter::new(config).generate(9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_permutations_is_rejected() {
        assert!(matches!(
            generate_shuffle_permutations(5, 0),
            Err(NullModelError::InvalidArgument(_))
        ));
    }
}

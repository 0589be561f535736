// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Permutation p-values for the correlation between two regional maps.

use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coords::RegionCoordinates;
use crate::correlation::CorrelationMethod;
use crate::error::{shape, NullModelError, Result};
use crate::permutation::{permute, PermutationBatch};
use crate::rotation::SphericalRotationPermuter;
use crate::sampler::SamplerConfig;
use crate::shuffle::LabelShufflePermuter;

/// Below this many columns the null is evaluated on the calling thread.
const PARALLEL_THRESHOLD: usize = 256;

/// Outcome of a two-direction permutation test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PermutationTestResult {
    /// Mean of `p_xy` and `p_yx`.
    pub p_value: f64,
    pub rho_empirical: f64,
    /// Fraction of `corr(permute(x), y)` beyond the empirical value.
    pub p_xy: f64,
    /// Fraction of `corr(x, permute(y))` beyond the empirical value.
    pub p_yx: f64,
    /// All "permute x" correlations followed by all "permute y" ones.
    pub null_distribution: Option<Vec<f64>>,
}

/// Correlation test against a fixed permutation batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermutationTest {
    pub method: CorrelationMethod,
    pub keep_null: bool,
}

/// Fraction of `null` strictly beyond `rho` on its side of zero.
///
/// `rho == 0` counts values strictly greater than zero. `NaN`s never count.
pub fn tail_fraction(null: &[f64], rho: f64) -> f64 {
    let exceed = if rho >= 0.0 {
        null.iter().filter(|&&v| v > rho).count()
    } else {
        null.iter().filter(|&&v| v < rho).count()
    };
    exceed as f64 / null.len() as f64
}

impl PermutationTest {
    pub fn new(method: CorrelationMethod) -> Self {
        Self {
            method,
            keep_null: false,
        }
    }

    pub fn keep_null(mut self, keep: bool) -> Self {
        self.keep_null = keep;
        self
    }

    pub fn run(
        &self,
        x: &[f64],
        y: &[f64],
        batch: &PermutationBatch,
    ) -> Result<PermutationTestResult> {
        if x.len() != y.len() {
            return Err(shape(format!("maps differ in length: {} vs {}", x.len(), y.len())));
        }
        if x.len() != batch.n_regions() {
            return Err(shape(format!(
                "maps have {} regions but the batch permutes {}",
                x.len(),
                batch.n_regions()
            )));
        }

        let method = self.method;
        let rho_empirical = method.correlate(x, y);
        if rho_empirical.is_nan() {
            return Err(NullModelError::DegenerateCorrelation);
        }

        let table = batch.as_array();
        let pair = |r: usize| {
            let column = table.column(r);
            (
                method.correlate(&permute(column, x), y),
                method.correlate(x, &permute(column, y)),
            )
        };
        let n_perm = batch.n_permutations();
        let pairs: Vec<(f64, f64)> =
            if n_perm >= PARALLEL_THRESHOLD && !spatnull_config::lock_reduction_order() {
                (0..n_perm).into_par_iter().map(pair).collect()
            } else {
                (0..n_perm).map(pair).collect()
            };
        let (null_xy, null_yx): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();

        let p_xy = tail_fraction(&null_xy, rho_empirical);
        let p_yx = tail_fraction(&null_yx, rho_empirical);
        let p_value = (p_xy + p_yx) / 2.0;
        debug!(rho = rho_empirical, p_value, n_perm, "permutation test");

        let null_distribution = self.keep_null.then(|| {
            let mut all = null_xy;
            all.extend(null_yx);
            all
        });

        Ok(PermutationTestResult {
            p_value,
            rho_empirical,
            p_xy,
            p_yx,
            null_distribution,
        })
    }
}

/// Two-sided permutation p-value, keeping the null distribution.
pub fn permutation_p_value(
    x: &[f64],
    y: &[f64],
    batch: &PermutationBatch,
    method: CorrelationMethod,
) -> Result<PermutationTestResult> {
    PermutationTest::new(method).keep_null(true).run(x, y, batch)
}

/// Spin test: rotation permutations of the given centroids, then the p-value.
pub fn spin_test(
    x: &[f64],
    y: &[f64],
    left: ArrayView2<'_, f64>,
    right: ArrayView2<'_, f64>,
    n_rot: usize,
    method: CorrelationMethod,
) -> Result<PermutationTestResult> {
    let coords = RegionCoordinates::new(left, right)?;
    if coords.n_regions() != x.len() {
        return Err(shape(format!(
            "{} centroids but maps have {} regions",
            coords.n_regions(),
            x.len()
        )));
    }
    let batch =
        SphericalRotationPermuter::new(SamplerConfig::with_permutations(n_rot)).generate(&coords)?;
    permutation_p_value(x, y, &batch, method)
}

/// Shuffle test: unconstrained label permutations, then the p-value.
pub fn shuffle_test(
    x: &[f64],
    y: &[f64],
    n_rot: usize,
    method: CorrelationMethod,
) -> Result<PermutationTestResult> {
    let batch =
        LabelShufflePermuter::new(SamplerConfig::with_permutations(n_rot)).generate(x.len())?;
    permutation_p_value(x, y, &batch, method)
}

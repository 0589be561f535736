// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Moran spectral randomization.
//!
//! The eigenvectors of a doubly-centered spatial weight matrix (Moran
//! eigenvector maps) form an orthogonal basis of zero-mean maps ordered by
//! spatial autocorrelation. Randomizing a map's projection onto that basis
//! (sign flips, or random rotations within eigenvector pairs) preserves how
//! much of its variance sits at each spatial scale, so the surrogates keep the
//! original autocorrelation without needing a spherical embedding.

use std::cmp::Ordering;

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::correlation::{mean, pearson, sample_std};
use crate::error::{invalid, shape, NullModelError, Result};

/// Tolerance used to decide that a weight matrix needs symmetrizing.
const SYMMETRY_TOLERANCE: f64 = 1e-10;
/// Gram-Schmidt residual below which a vector is treated as dependent.
const RANK_TOLERANCE: f64 = 1e-8;

/// Which eigenvectors survive the removal of zero eigenvalues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumMode {
    /// Drop every near-zero eigenpair.
    #[default]
    NonZero,
    /// Drop exactly one (the constant direction), keeping the rest of the null space.
    All,
}

/// How projections are randomized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    /// Independent random sign per eigenvector.
    #[default]
    Singleton,
    /// Random rotation within random eigenvector pairs.
    Pair,
}

/// Eigenvalues (descending) and the matching `n x k` eigenvector matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct MoranBasis {
    pub eigenvalues: DVector<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl MoranBasis {
    pub fn n_vertices(&self) -> usize {
        self.eigenvectors.nrows()
    }

    pub fn n_components(&self) -> usize {
        self.eigenvectors.ncols()
    }
}

pub fn is_symmetric(w: &DMatrix<f64>, tolerance: f64) -> bool {
    w.is_square()
        && (0..w.nrows()).all(|i| (0..i).all(|j| (w[(i, j)] - w[(j, i)]).abs() <= tolerance))
}

pub fn symmetrize(w: &DMatrix<f64>) -> DMatrix<f64> {
    (w + w.transpose()) * 0.5
}

/// Subtracts row and column means and adds back the grand mean.
pub fn double_center(w: &DMatrix<f64>) -> DMatrix<f64> {
    let n = w.nrows() as f64;
    let row_means: Vec<f64> = w.row_iter().map(|r| r.sum() / n).collect();
    let col_means: Vec<f64> = w.column_iter().map(|c| c.sum() / n).collect();
    let grand = w.sum() / (n * n);
    DMatrix::from_fn(w.nrows(), w.ncols(), |i, j| {
        w[(i, j)] - row_means[i] - col_means[j] + grand
    })
}

/// Orthonormal completion of the zero eigenspace with the constant direction removed.
fn complete_null_space(zero_vectors: &[DVector<f64>], n: usize) -> Vec<DVector<f64>> {
    let target = zero_vectors.len().saturating_sub(1);
    let mut basis = vec![DVector::from_element(n, 1.0 / (n as f64).sqrt())];
    for candidate in zero_vectors {
        if basis.len() > target {
            break;
        }
        let mut v = candidate.clone();
        for b in &basis {
            let proj = b.dot(&v);
            v.axpy(-proj, b, 1.0);
        }
        let norm = v.norm();
        if norm > RANK_TOLERANCE {
            basis.push(v / norm);
        }
    }
    basis.split_off(1)
}

/// Eigenbasis of the doubly-centered weight matrix with zero eigenpairs removed.
///
/// Fails if `w` is not square, or if no eigenvalue lies within `tolerance`
/// of zero (the matrix was not a proper weight matrix).
pub fn compute_spectral_basis(
    w: &DMatrix<f64>,
    spectrum: SpectrumMode,
    tolerance: f64,
) -> Result<MoranBasis> {
    if !w.is_square() {
        return Err(NullModelError::NonSquareWeights {
            rows: w.nrows(),
            cols: w.ncols(),
        });
    }
    if !(tolerance > 0.0) {
        return Err(invalid("tolerance must be positive"));
    }
    let n = w.nrows();
    if n < 2 {
        return Err(invalid("weight matrix needs at least two vertices"));
    }

    let centered = if is_symmetric(w, SYMMETRY_TOLERANCE) {
        double_center(w)
    } else {
        debug!("weight matrix is not symmetric; using (W + W^T) / 2");
        double_center(&symmetrize(w))
    };
    let eigen = SymmetricEigen::new(centered);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });
    let is_zero = |idx: usize| eigen.eigenvalues[idx].abs() < tolerance;
    let zero: Vec<usize> = order.iter().copied().filter(|&i| is_zero(i)).collect();
    if zero.is_empty() {
        let smallest = eigen
            .eigenvalues
            .iter()
            .map(|v| v.abs())
            .fold(f64::INFINITY, f64::min);
        return Err(NullModelError::NoZeroEigenvalue {
            tolerance,
            smallest,
        });
    }

    let mut values: Vec<f64> = Vec::with_capacity(n);
    let mut vectors: Vec<DVector<f64>> = Vec::with_capacity(n);
    match spectrum {
        SpectrumMode::NonZero => {
            for &idx in order.iter().filter(|&&i| !is_zero(i)) {
                values.push(eigen.eigenvalues[idx]);
                vectors.push(eigen.eigenvectors.column(idx).into_owned());
            }
        }
        SpectrumMode::All => {
            if zero.len() > 1 {
                warn!(count = zero.len(), "multiple zero eigenvalues; completing the null space");
            }
            let zero_vectors: Vec<DVector<f64>> = zero
                .iter()
                .map(|&i| eigen.eigenvectors.column(i).into_owned())
                .collect();
            let mut completed = complete_null_space(&zero_vectors, n).into_iter();
            for &idx in &order {
                if is_zero(idx) {
                    if let Some(v) = completed.next() {
                        values.push(0.0);
                        vectors.push(v);
                    }
                } else {
                    values.push(eigen.eigenvalues[idx]);
                    vectors.push(eigen.eigenvectors.column(idx).into_owned());
                }
            }
        }
    }

    if vectors.is_empty() {
        return Err(NullModelError::EmptySpectrum);
    }
    debug!(
        components = vectors.len(),
        dropped = n - vectors.len(),
        "spectral basis ready"
    );
    Ok(MoranBasis {
        eigenvalues: DVector::from_vec(values),
        eigenvectors: DMatrix::from_columns(&vectors),
    })
}

/// Below this projection norm a map is treated as orthogonal to the basis.
const MIN_CAPTURED: f64 = 1e-8;

fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    if rng.gen::<bool>() {
        1.0
    } else {
        -1.0
    }
}

/// Randomizes the projection coefficients `r` (`k x n_vars`) in place.
fn randomize_coefficients<R: Rng + ?Sized>(
    r: &mut DMatrix<f64>,
    procedure: Procedure,
    joint: bool,
    rng: &mut R,
) {
    let (k, n_vars) = r.shape();
    match procedure {
        Procedure::Singleton => {
            for comp in 0..k {
                let shared = random_sign(rng);
                for var in 0..n_vars {
                    let s = if joint { shared } else { random_sign(rng) };
                    r[(comp, var)] *= s;
                }
            }
        }
        Procedure::Pair => {
            let mut order: Vec<usize> = (0..k).collect();
            order.shuffle(rng);
            let mut chunks = order.chunks_exact(2);
            for pair in chunks.by_ref() {
                let (a, b) = (pair[0], pair[1]);
                let shared = rng.gen_range(0.0..std::f64::consts::TAU);
                for var in 0..n_vars {
                    let theta = if joint {
                        shared
                    } else {
                        rng.gen_range(0.0..std::f64::consts::TAU)
                    };
                    let (sin, cos) = theta.sin_cos();
                    let (ra, rb) = (r[(a, var)], r[(b, var)]);
                    r[(a, var)] = ra * cos - rb * sin;
                    r[(b, var)] = ra * sin + rb * cos;
                }
            }
            if let [odd] = chunks.remainder() {
                let shared = random_sign(rng);
                for var in 0..n_vars {
                    let s = if joint { shared } else { random_sign(rng) };
                    r[(*odd, var)] *= s;
                }
            }
        }
    }
}

/// `n_rep` surrogate copies of `x` (`n x n_vars`) with matched autocorrelation.
///
/// Every surrogate column has the mean and sample standard deviation of the
/// corresponding input column.
pub fn randomize_spectral<R: Rng + ?Sized>(
    x: &DMatrix<f64>,
    basis: &MoranBasis,
    n_rep: usize,
    procedure: Procedure,
    joint: bool,
    rng: &mut R,
) -> Result<Vec<DMatrix<f64>>> {
    let (n, n_vars) = x.shape();
    if n != basis.n_vertices() {
        return Err(shape(format!(
            "map has {n} values but the basis spans {} vertices",
            basis.n_vertices()
        )));
    }
    if n_rep == 0 {
        return Err(invalid("n_rep must be > 0"));
    }
    if n_vars == 0 {
        return Err(shape("no variables to randomize"));
    }

    let columns: Vec<Vec<f64>> = x.column_iter().map(|c| c.iter().copied().collect()).collect();
    let moments: Vec<(f64, f64)> = columns.iter().map(|c| (mean(c), sample_std(c))).collect();
    if moments.iter().any(|&(_, sd)| !(sd > 0.0)) {
        return Err(invalid("cannot randomize a constant map"));
    }

    let eigvecs: Vec<Vec<f64>> = basis
        .eigenvectors
        .column_iter()
        .map(|c| c.iter().copied().collect())
        .collect();
    let k = eigvecs.len();
    let projection = DMatrix::from_fn(k, n_vars, |comp, var| {
        let r = pearson(&eigvecs[comp], &columns[var]);
        if r.is_nan() {
            0.0
        } else {
            r
        }
    });

    // The basis is orthonormal and centred, so `|r|` is the share of each map's
    // spread it can represent; randomization preserves that norm.
    for (var, coeffs) in projection.column_iter().enumerate() {
        let captured = coeffs.norm();
        if captured < MIN_CAPTURED {
            return Err(invalid(format!(
                "variable {var} lies outside the spectral basis (captured norm {captured:e})"
            )));
        }
    }

    let mut out = Vec::with_capacity(n_rep);
    for _ in 0..n_rep {
        let mut coeffs = projection.clone();
        randomize_coefficients(&mut coeffs, procedure, joint, rng);
        let mut sample = &basis.eigenvectors * coeffs;
        for (var, &(target_mean, target_sd)) in moments.iter().enumerate() {
            let mut col = sample.column_mut(var);
            let values: Vec<f64> = col.iter().copied().collect();
            let (m, sd) = (mean(&values), sample_std(&values));
            let scale = if sd > 0.0 { target_sd / sd } else { 0.0 };
            for v in col.iter_mut() {
                *v = target_mean + (*v - m) * scale;
            }
        }
        out.push(sample);
    }
    Ok(out)
}

/// Tunables for [`MoranRandomization`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoranConfig {
    pub procedure: Procedure,
    pub spectrum: SpectrumMode,
    /// Apply the same signs/angles to every variable.
    pub joint: bool,
    pub n_rep: usize,
    pub tolerance: f64,
    pub seed: Option<u64>,
}

impl Default for MoranConfig {
    fn default() -> Self {
        Self {
            procedure: Procedure::Singleton,
            spectrum: SpectrumMode::NonZero,
            joint: false,
            n_rep: 100,
            tolerance: 1e-10,
            seed: None,
        }
    }
}

/// Fit-once, randomize-many wrapper around a [`MoranBasis`].
#[derive(Clone, Debug)]
pub struct MoranRandomization {
    config: MoranConfig,
    basis: MoranBasis,
}

impl MoranRandomization {
    /// Computes the eigenbasis of `w`; the expensive step.
    pub fn fit(config: MoranConfig, w: &DMatrix<f64>) -> Result<Self> {
        let basis = compute_spectral_basis(w, config.spectrum, config.tolerance)?;
        Ok(Self { config, basis })
    }

    pub fn config(&self) -> &MoranConfig {
        &self.config
    }

    pub fn basis(&self) -> &MoranBasis {
        &self.basis
    }

    pub fn randomize(&self, x: &DMatrix<f64>) -> Result<Vec<DMatrix<f64>>> {
        let mut rng = spatnull_config::rng_from_optional(self.config.seed, "spatnull.moran");
        self.randomize_with(x, &mut rng)
    }

    pub fn randomize_with<R: Rng + ?Sized>(
        &self,
        x: &DMatrix<f64>,
        rng: &mut R,
    ) -> Result<Vec<DMatrix<f64>>> {
        randomize_spectral(
            x,
            &self.basis,
            self.config.n_rep,
            self.config.procedure,
            self.config.joint,
            rng,
        )
    }

    /// Single-map convenience: one `Vec` per surrogate.
    pub fn randomize_map(&self, x: &[f64]) -> Result<Vec<Vec<f64>>> {
        let matrix = DMatrix::from_column_slice(x.len(), 1, x);
        Ok(self
            .randomize(&matrix)?
            .into_iter()
            .map(|m| m.as_slice().to_vec())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn chain_weights(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| if i.abs_diff(j) == 1 { 1.0 } else { 0.0 })
    }

    #[test]
    fn double_centering_zeroes_row_and_column_sums() {
        let w = DMatrix::from_fn(5, 5, |i, j| ((i * 3 + j * 7) % 5) as f64);
        let c = double_center(&symmetrize(&w));
        for i in 0..5 {
            assert_relative_eq!(c.row(i).sum(), 0.0, epsilon = 1e-12);
            assert_relative_eq!(c.column(i).sum(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_zero_is_dropped_in_both_modes() {
        let w = chain_weights(8);
        let nonzero = compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap();
        let all = compute_spectral_basis(&w, SpectrumMode::All, 1e-10).unwrap();
        assert_eq!(nonzero.n_components(), 7);
        assert_eq!(all.n_components(), 7);
        let ev = &nonzero.eigenvalues;
        assert!((1..ev.len()).all(|i| ev[i - 1] >= ev[i]));
    }

    #[test]
    fn maps_in_a_dropped_null_space_are_rejected() {
        let mut w = DMatrix::<f64>::zeros(4, 4);
        w[(0, 1)] = 1.0;
        w[(1, 0)] = 1.0;
        let basis = compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap();
        assert_eq!(basis.n_components(), 2);
        let mut rng = StdRng::seed_from_u64(3);

        let hidden = DMatrix::from_column_slice(4, 1, &[0.0, 0.0, 1.0, -1.0]);
        let err = randomize_spectral(&hidden, &basis, 5, Procedure::Singleton, false, &mut rng)
            .unwrap_err();
        assert!(matches!(err, NullModelError::InvalidArgument(_)));

        let visible = DMatrix::from_column_slice(4, 1, &[1.0, -1.0, 0.5, 0.5]);
        let out = randomize_spectral(&visible, &basis, 5, Procedure::Singleton, false, &mut rng)
            .unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn degenerate_null_space_is_completed_orthonormally() {
        let w = DMatrix::<f64>::zeros(5, 5);
        assert_eq!(
            compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap_err(),
            NullModelError::EmptySpectrum
        );
        let basis = compute_spectral_basis(&w, SpectrumMode::All, 1e-10).unwrap();
        assert_eq!(basis.n_components(), 4);
        let gram = basis.eigenvectors.transpose() * &basis.eigenvectors;
        assert_relative_eq!(gram, DMatrix::identity(4, 4), epsilon = 1e-9);
        let ones = DVector::from_element(5, 1.0);
        for v in basis.eigenvectors.column_iter() {
            assert_relative_eq!(v.dot(&ones), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn non_square_weights_are_fatal() {
        let w = DMatrix::<f64>::zeros(3, 4);
        assert_eq!(
            compute_spectral_basis(&w, SpectrumMode::NonZero, 1e-10).unwrap_err(),
            NullModelError::NonSquareWeights { rows: 3, cols: 4 }
        );
    }

    #[test]
    fn pair_rotation_preserves_pair_power() {
        let mut r = DMatrix::from_column_slice(5, 1, &[0.3, -0.4, 0.1, 0.7, 0.2]);
        let before: f64 = r.iter().map(|v| v * v).sum();
        randomize_coefficients(&mut r, Procedure::Pair, false, &mut StdRng::seed_from_u64(4));
        let after: f64 = r.iter().map(|v| v * v).sum();
        assert_relative_eq!(before, after, epsilon = 1e-12);
    }

    #[test]
    fn joint_singleton_flips_all_variables_together() {
        let mut r = DMatrix::from_element(6, 3, 0.5);
        randomize_coefficients(&mut r, Procedure::Singleton, true, &mut StdRng::seed_from_u64(8));
        for row in r.row_iter() {
            assert!(row.iter().all(|v| *v == row[0]));
        }
    }

    #[test]
    fn surrogates_keep_mean_and_std() {
        let moran = MoranRandomization::fit(
            MoranConfig {
                n_rep: 20,
                procedure: Procedure::Pair,
                seed: Some(17),
                ..MoranConfig::default()
            },
            &chain_weights(12),
        )
        .unwrap();
        let x: Vec<f64> = (0..12).map(|i| (i as f64 * 0.7).sin() * 3.0 + 10.0).collect();
        let surrogates = moran.randomize_map(&x).unwrap();
        assert_eq!(surrogates.len(), 20);
        for s in &surrogates {
            assert_relative_eq!(mean(s), mean(&x), epsilon = 1e-9);
            assert_relative_eq!(sample_std(s), sample_std(&x), epsilon = 1e-9);
        }
    }
}

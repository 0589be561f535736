// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Spin permutations: rotate both hemispheres on the sphere and match the
//! rotated centroids back onto the originals.
//!
//! The left rotation is drawn uniformly from SO(3) (QR of a Gaussian matrix
//! with the sign fix-up); the right rotation is its mirror image across the
//! x = 0 plane, so homologous regions move symmetrically.
//!
//! Matching is the greedy "maximin" heuristic rather than an optimal
//! assignment: the unmatched region whose nearest free rotated centroid is
//! farthest away is matched first, because it only gets harder to place as
//! other regions are consumed. The null distribution depends on this choice.

use nalgebra::{Matrix3, Vector3};
use ndarray::ArrayView2;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::coords::{to_vectors, RegionCoordinates};
use crate::error::Result;
use crate::permutation::PermutationBatch;
use crate::sampler::{collect_permutations, NoProgress, ProgressSink, SamplerConfig};

/// Reflection across the hemisphere-symmetry plane.
pub fn mirror() -> Matrix3<f64> {
    Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0))
}

/// Draws a proper rotation (det = +1) uniformly at random.
pub fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> Matrix3<f64> {
    let gaussian: Matrix3<f64> = Matrix3::from_fn(|_, _| rng.sample(StandardNormal));
    let qr = gaussian.qr();
    let mut q = qr.q();
    let r = qr.r();
    // A zero on R's diagonal counts as positive.
    for j in 0..3 {
        if r[(j, j)] < 0.0 {
            let flipped = -q.column(j);
            q.set_column(j, &flipped);
        }
    }
    if q.determinant() < 0.0 {
        let flipped = -q.column(0);
        q.set_column(0, &flipped);
    }
    q
}

/// Right-hemisphere counterpart of a left-hemisphere rotation.
pub fn mirror_rotation(left: &Matrix3<f64>) -> Matrix3<f64> {
    let m = mirror();
    m * left * m
}

/// Applies `rotation` to row-vector points (`p' = p^T R`).
fn rotate(points: &[Vector3<f64>], rotation: &Matrix3<f64>) -> Vec<Vector3<f64>> {
    let rt = rotation.transpose();
    points.iter().map(|p| rt * p).collect()
}

fn nearest_free(row: &[f64], col_used: &[bool]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (j, &d) in row.iter().enumerate() {
        if col_used[j] {
            continue;
        }
        if best.map_or(true, |(_, m)| d < m) {
            best = Some((j, d));
        }
    }
    best
}

/// Greedy maximin matching; `out[i]` is the rotated index assigned to original `i`.
///
/// Ties go to the lowest index. Each original and each rotated centroid is
/// consumed exactly once.
pub fn maximin_assignment(original: &[Vector3<f64>], rotated: &[Vector3<f64>]) -> Vec<usize> {
    let n = original.len();
    debug_assert_eq!(n, rotated.len());
    let dist: Vec<f64> = original
        .iter()
        .flat_map(|o| rotated.iter().map(move |r| (o - r).norm()))
        .collect();

    let mut col_used = vec![false; n];
    let mut nearest: Vec<Option<(usize, f64)>> = (0..n)
        .map(|i| nearest_free(&dist[i * n..(i + 1) * n], &col_used))
        .collect();
    let mut assignment = vec![0usize; n];

    for _ in 0..n {
        let mut pick: Option<(usize, usize, f64)> = None;
        for (i, slot) in nearest.iter().enumerate() {
            if let Some((j, d)) = *slot {
                if pick.map_or(true, |(_, _, best)| d > best) {
                    pick = Some((i, j, d));
                }
            }
        }
        let Some((row, col, _)) = pick else { break };
        assignment[row] = col;
        nearest[row] = None;
        col_used[col] = true;
        // Only rows that wanted the consumed column need a new nearest neighbour.
        for (i, slot) in nearest.iter_mut().enumerate() {
            if matches!(slot, Some((j, _)) if *j == col) {
                *slot = nearest_free(&dist[i * n..(i + 1) * n], &col_used);
            }
        }
    }
    assignment
}

/// One spin draw over both hemispheres; may be the identity.
pub fn spin_once<R: Rng + ?Sized>(
    left: &[Vector3<f64>],
    right: &[Vector3<f64>],
    rng: &mut R,
) -> Vec<usize> {
    let tl = random_rotation(rng);
    let tr = mirror_rotation(&tl);
    let mut perm = maximin_assignment(left, &rotate(left, &tl));
    let offset = left.len();
    perm.extend(
        maximin_assignment(right, &rotate(right, &tr))
            .into_iter()
            .map(|j| j + offset),
    );
    perm
}

/// Generates spin permutations for a fixed parcellation.
#[derive(Clone, Debug, Default)]
pub struct SphericalRotationPermuter {
    config: SamplerConfig,
}

impl SphericalRotationPermuter {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn generate(&self, coords: &RegionCoordinates) -> Result<PermutationBatch> {
        let mut rng = spatnull_config::rng_from_optional(self.config.seed, "spatnull.rotation");
        self.generate_with(coords, &mut rng, &mut NoProgress)
    }

    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        coords: &RegionCoordinates,
        rng: &mut R,
        progress: &mut dyn ProgressSink,
    ) -> Result<PermutationBatch> {
        let left = to_vectors(coords.left());
        let right = to_vectors(coords.right());
        collect_permutations(&self.config, coords.n_regions(), rng, progress, |rng| {
            spin_once(&left, &right, rng)
        })
    }
}

/// `n_rot` spin permutations of the left+right region set.
pub fn generate_rotation_permutations(
    left: ArrayView2<'_, f64>,
    right: ArrayView2<'_, f64>,
    n_rot: usize,
) -> Result<PermutationBatch> {
    let coords = RegionCoordinates::new(left, right)?;
    SphericalRotationPermuter::new(SamplerConfig::with_permutations(n_rot)).generate(&coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;
    use rand::{rngs::StdRng, SeedableRng};

    fn hemisphere(n: usize, side: f64) -> Array2<f64> {
        let golden = std::f64::consts::PI * (3.0 - 5f64.sqrt());
        Array2::from_shape_fn((n, 3), |(i, axis)| {
            let y = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let radius = (1.0 - y * y).sqrt();
            let theta = golden * i as f64;
            match axis {
                0 => side * (radius * theta.cos()).abs().max(0.05),
                1 => y,
                _ => radius * theta.sin(),
            }
        })
    }

    #[test]
    fn rotations_are_proper_and_orthogonal() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let tl = random_rotation(&mut rng);
            let tr = mirror_rotation(&tl);
            assert_relative_eq!(tl.determinant(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(tr.determinant(), 1.0, epsilon = 1e-10);
            assert_relative_eq!(tr.transpose() * tr, Matrix3::identity(), epsilon = 1e-10);
            assert_relative_eq!(mirror() * tr * mirror(), tl, epsilon = 1e-12);
        }
    }

    #[test]
    fn matching_recovers_a_relabelling() {
        let points: Vec<Vector3<f64>> = (0..6)
            .map(|i| Vector3::new(i as f64, (i * i) as f64, 1.0))
            .collect();
        let order = [3usize, 0, 5, 1, 4, 2];
        let shuffled: Vec<Vector3<f64>> = order.iter().map(|&k| points[k]).collect();
        let assignment = maximin_assignment(&points, &shuffled);
        for (i, &j) in assignment.iter().enumerate() {
            assert_eq!(order[j], i);
        }
    }

    #[test]
    fn matching_is_a_bijection() {
        let mut rng = StdRng::seed_from_u64(5);
        let left = to_vectors(&hemisphere(20, -1.0));
        let rotated = rotate(&left, &random_rotation(&mut rng));
        let mut assignment = maximin_assignment(&left, &rotated);
        assignment.sort_unstable();
        assert_eq!(assignment, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn batch_columns_are_non_identity_bijections() {
        let left = hemisphere(12, -1.0);
        let right = hemisphere(12, 1.0);
        let coords = RegionCoordinates::new(left.view(), right.view()).unwrap();
        let permuter = SphericalRotationPermuter::new(SamplerConfig::with_permutations(40));
        let batch = permuter
            .generate_with(&coords, &mut StdRng::seed_from_u64(3), &mut NoProgress)
            .unwrap();
        assert_eq!(batch.as_array().dim(), (24, 40));
        for column in batch.columns() {
            let mut sorted = column.to_vec();
            assert!(sorted.iter().enumerate().any(|(i, &p)| i != p));
            sorted.sort_unstable();
            assert_eq!(sorted, (0..24).collect::<Vec<_>>());
            // Hemispheres never exchange regions.
            assert!(column.iter().take(12).all(|&p| p < 12));
        }
    }

    #[test]
    fn transposed_hemispheres_are_accepted() {
        let left = hemisphere(8, -1.0);
        let right = hemisphere(8, 1.0);
        let batch = generate_rotation_permutations(left.t(), right.t(), 5).unwrap();
        assert_eq!(batch.n_regions(), 16);
        assert_eq!(batch.n_permutations(), 5);
    }
}

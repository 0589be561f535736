// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Spatial weight matrices built from region centroids.

use nalgebra::DMatrix;
use ndarray::ArrayView2;

use crate::coords::{as_points, to_vectors};
use crate::error::{shape, Result};

/// Pairwise Euclidean distances between centroids.
pub fn euclidean_distances(coords: ArrayView2<'_, f64>) -> Result<DMatrix<f64>> {
    let points = to_vectors(&as_points(coords)?);
    let n = points.len();
    Ok(DMatrix::from_fn(n, n, |i, j| (points[i] - points[j]).norm()))
}

/// Inverse-distance weights with a zero diagonal.
///
/// Suitable input for the Moran randomizer when regions (e.g. subcortical
/// structures) have no surface mesh to derive adjacency from.
pub fn inverse_distance_weights(coords: ArrayView2<'_, f64>) -> Result<DMatrix<f64>> {
    let dist = euclidean_distances(coords)?;
    let n = dist.nrows();
    for i in 0..n {
        for j in 0..i {
            if dist[(i, j)] == 0.0 {
                return Err(shape(format!("centroids {j} and {i} coincide")));
            }
        }
    }
    Ok(DMatrix::from_fn(n, n, |i, j| {
        if i == j {
            0.0
        } else {
            1.0 / dist[(i, j)]
        }
    }))
}

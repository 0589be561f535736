// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Region coordinate sets grouped by hemisphere.

use nalgebra::Vector3;
use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::error::{shape, Result};

/// Normalises a point array to `(n, 3)`.
///
/// `(3, n)` input is transposed. A `3 x 3` array is read as three points.
pub fn as_points(coords: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
    match coords.dim() {
        (_, 3) => Ok(coords.to_owned()),
        (3, n) => {
            debug!(points = n, "transposing coordinates to n x 3");
            Ok(coords.t().as_standard_layout().into_owned())
        }
        (rows, cols) => Err(shape(format!(
            "coordinates must be n x 3 (or 3 x n), got {rows}x{cols}"
        ))),
    }
}

pub(crate) fn to_vectors(points: &Array2<f64>) -> Vec<Vector3<f64>> {
    points
        .rows()
        .into_iter()
        .map(|row| Vector3::new(row[0], row[1], row[2]))
        .collect()
}

/// Centroids of one parcellation, left hemisphere first.
///
/// The region order here is the order of every map and permutation batch
/// built from it: left regions are `0..n_left`, right regions follow.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionCoordinates {
    left: Array2<f64>,
    right: Array2<f64>,
}

impl RegionCoordinates {
    pub fn new(left: ArrayView2<'_, f64>, right: ArrayView2<'_, f64>) -> Result<Self> {
        Ok(Self {
            left: as_points(left)?,
            right: as_points(right)?,
        })
    }

    pub fn left(&self) -> &Array2<f64> {
        &self.left
    }

    pub fn right(&self) -> &Array2<f64> {
        &self.right
    }

    pub fn n_left(&self) -> usize {
        self.left.nrows()
    }

    pub fn n_right(&self) -> usize {
        self.right.nrows()
    }

    pub fn n_regions(&self) -> usize {
        self.n_left() + self.n_right()
    }

    /// Both hemispheres stacked into one `(n_regions, 3)` array.
    pub fn stacked(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.n_regions(), 3));
        out.slice_mut(ndarray::s![..self.n_left(), ..])
            .assign(&self.left);
        out.slice_mut(ndarray::s![self.n_left().., ..])
            .assign(&self.right);
        out
    }
}

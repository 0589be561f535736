// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Validated batches of region permutations.

use ndarray::{Array2, ArrayView1, Axis};

use crate::error::{shape, NullModelError, Result};

/// `n_regions x n_permutations` table; every column is a non-identity bijection.
///
/// Column `r` maps region `i` to `batch[[i, r]]`: applying it to a map `x`
/// yields `x_perm[i] = x[batch[[i, r]]]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermutationBatch {
    table: Array2<usize>,
}

pub(crate) fn is_identity(perm: &[usize]) -> bool {
    perm.iter().enumerate().all(|(i, &p)| i == p)
}

fn validate_column(column: usize, perm: ArrayView1<'_, usize>) -> Result<()> {
    let n = perm.len();
    let mut seen = vec![false; n];
    let mut identity = true;
    for (i, &target) in perm.iter().enumerate() {
        if target >= n {
            return Err(NullModelError::InvalidPermutation {
                column,
                reason: format!("index {target} out of range for {n} regions"),
            });
        }
        if std::mem::replace(&mut seen[target], true) {
            return Err(NullModelError::InvalidPermutation {
                column,
                reason: format!("index {target} appears twice"),
            });
        }
        identity &= i == target;
    }
    if identity {
        return Err(NullModelError::InvalidPermutation {
            column,
            reason: "column is the identity permutation".into(),
        });
    }
    Ok(())
}

impl PermutationBatch {
    /// Validates an externally built table.
    pub fn from_array(table: Array2<usize>) -> Result<Self> {
        if table.ncols() == 0 {
            return Err(shape("permutation batch has no columns"));
        }
        for (column, perm) in table.axis_iter(Axis(1)).enumerate() {
            validate_column(column, perm)?;
        }
        Ok(Self { table })
    }

    /// Validates and stacks columns produced elsewhere.
    pub fn from_columns(columns: &[Vec<usize>]) -> Result<Self> {
        let n_regions = columns
            .first()
            .map(Vec::len)
            .ok_or_else(|| shape("permutation batch has no columns"))?;
        let mut table = Array2::zeros((n_regions, columns.len()));
        for (r, column) in columns.iter().enumerate() {
            if column.len() != n_regions {
                return Err(shape(format!(
                    "column {r} has {} entries, expected {n_regions}",
                    column.len()
                )));
            }
            for (i, &p) in column.iter().enumerate() {
                table[[i, r]] = p;
            }
        }
        Self::from_array(table)
    }

    /// Columns that the samplers already checked.
    pub(crate) fn from_validated(columns: Vec<Vec<usize>>, n_regions: usize) -> Self {
        let mut table = Array2::zeros((n_regions, columns.len()));
        for (r, column) in columns.into_iter().enumerate() {
            for (i, p) in column.into_iter().enumerate() {
                table[[i, r]] = p;
            }
        }
        Self { table }
    }

    pub fn n_regions(&self) -> usize {
        self.table.nrows()
    }

    pub fn n_permutations(&self) -> usize {
        self.table.ncols()
    }

    /// Column `r`, or a shape error when `r >= n_permutations()`.
    pub fn column(&self, r: usize) -> Result<ArrayView1<'_, usize>> {
        if r >= self.n_permutations() {
            return Err(shape(format!(
                "permutation {r} out of range for a batch of {}",
                self.n_permutations()
            )));
        }
        Ok(self.table.column(r))
    }

    pub fn columns(&self) -> impl Iterator<Item = ArrayView1<'_, usize>> {
        self.table.axis_iter(Axis(1))
    }

    pub fn as_array(&self) -> &Array2<usize> {
        &self.table
    }

    pub fn into_array(self) -> Array2<usize> {
        self.table
    }

    /// Reorders `map` by column `r`.
    pub fn apply(&self, r: usize, map: &[f64]) -> Result<Vec<f64>> {
        if map.len() != self.n_regions() {
            return Err(shape(format!(
                "map has {} values but the batch permutes {} regions",
                map.len(),
                self.n_regions()
            )));
        }
        Ok(permute(self.column(r)?, map))
    }
}

pub(crate) fn permute(perm: ArrayView1<'_, usize>, map: &[f64]) -> Vec<f64> {
    perm.iter().map(|&idx| map[idx]).collect()
}

// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpatialNull — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Per-region centroids from a labelled vertex cloud.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};
use tracing::debug;

use crate::coords::as_points;
use crate::error::{shape, Result};

/// Annotation names that never form a cortical region.
pub const FREESURFER_IGNORE_LABELS: &[&str] = &["unknown", "corpuscallosum", "medialwall", "???"];

/// Centroids in label-sort order together with the labels they belong to.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionCentroids<L> {
    pub labels: Vec<L>,
    pub points: Array2<f64>,
}

impl<L> RegionCentroids<L> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

#[derive(Clone, Copy, Default)]
struct Accum {
    sum: [f64; 3],
    count: usize,
}

fn accumulate<L: Ord + Clone>(
    coords: &Array2<f64>,
    labels: &[L],
    ignore: &[L],
) -> Result<BTreeMap<L, Accum>> {
    if coords.nrows() != labels.len() {
        return Err(shape(format!(
            "{} vertices but {} labels",
            coords.nrows(),
            labels.len()
        )));
    }
    let mut acc: BTreeMap<L, Accum> = BTreeMap::new();
    for (row, label) in coords.rows().into_iter().zip(labels) {
        if ignore.contains(label) {
            continue;
        }
        let slot = acc.entry(label.clone()).or_default();
        for axis in 0..3 {
            slot.sum[axis] += row[axis];
        }
        slot.count += 1;
    }
    Ok(acc)
}

fn finish<L>(entries: Vec<(L, Accum)>) -> RegionCentroids<L> {
    let mut points = Array2::zeros((entries.len(), 3));
    let mut labels = Vec::with_capacity(entries.len());
    for (idx, (label, acc)) in entries.into_iter().enumerate() {
        let n = acc.count as f64;
        for axis in 0..3 {
            points[[idx, axis]] = acc.sum[axis] / n;
        }
        labels.push(label);
    }
    RegionCentroids { labels, points }
}

/// Mean vertex position of every label present in `labels`, minus `ignore`.
pub fn extract_centroids<L: Ord + Clone>(
    coords: ArrayView2<'_, f64>,
    labels: &[L],
    ignore: &[L],
) -> Result<RegionCentroids<L>> {
    let coords = as_points(coords)?;
    let acc = accumulate(&coords, labels, ignore)?;
    Ok(finish(acc.into_iter().collect()))
}

/// Like [`extract_centroids`], but driven by a region table.
///
/// Table entries with no vertices are omitted without error, so callers
/// must compare the output length against the table they expect.
pub fn extract_centroids_for<L: Ord + Clone + std::fmt::Debug>(
    coords: ArrayView2<'_, f64>,
    labels: &[L],
    regions: &[L],
    ignore: &[L],
) -> Result<RegionCentroids<L>> {
    let coords = as_points(coords)?;
    let mut acc = accumulate(&coords, labels, ignore)?;
    let mut table: Vec<&L> = regions.iter().filter(|r| !ignore.contains(r)).collect();
    table.sort();
    table.dedup();

    let mut entries = Vec::with_capacity(table.len());
    for region in table {
        match acc.remove(region) {
            Some(found) => entries.push((region.clone(), found)),
            None => debug!(region = ?region, "region has no vertices; omitted"),
        }
    }
    Ok(finish(entries))
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Equal-width histogram binning

use serde::{Deserialize, Serialize};
use shapematch_geometry::{sample_range, ShapeFunction};

/// Closed value interval covered by a histogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramRange {
    pub min: f64,
    pub max: f64,
}

impl HistogramRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Fixed range of `function`, or the observed extent of `values`.
    ///
    /// Falls back to `[0, 0]` when there is neither.
    pub fn for_samples(function: ShapeFunction, values: &[f64]) -> Self {
        if let Some((min, max)) = function.fixed_range() {
            return Self::new(min, max);
        }
        sample_range(values)
            .map(|(min, max)| Self::new(min, max))
            .unwrap_or_else(|| Self::new(0.0, 0.0))
    }

    /// Smallest range covering both
    pub fn union(self, other: Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Bin index of `value` among `num_bins` equal-width bins.
    ///
    /// `None` outside the range. The last bin is closed on the right; a
    /// zero-width range maps every contained value to bin 0.
    pub fn bin_of(&self, value: f64, num_bins: usize) -> Option<usize> {
        if num_bins == 0 || !self.contains(value) {
            return None;
        }
        let width = self.width();
        if width <= 0.0 {
            return Some(0);
        }
        let index = ((value - self.min) / width * num_bins as f64) as usize;
        Some(index.min(num_bins - 1))
    }
}

/// Count `values` into `num_bins` equal-width bins over `range`, dropping
/// values outside it
pub fn bin_counts(values: &[f64], range: HistogramRange, num_bins: usize) -> Vec<u32> {
    let mut counts = vec![0u32; num_bins];
    for &v in values {
        if let Some(i) = range.bin_of(v, num_bins) {
            counts[i] += 1;
        }
    }
    counts
}

/// Divide counts by their total; all zeros when the total is zero
pub fn to_probabilities(counts: &[u32]) -> Vec<f64> {
    let total: u64 = counts.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    let total = total as f64;
    counts.iter().map(|&c| c as f64 / total).collect()
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Histogram metrics and the per-group registry

use rustc_hash::FxHashMap;
use shapematch_geometry::ShapeFunction;

use crate::config::{DistanceConfig, MetricKind};

/// Dissimilarity between two equal-length histograms
pub trait HistogramMetric: Send + Sync {
    fn name(&self) -> &str;

    /// Non-negative, symmetric, zero for identical inputs
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

/// 1-D earth mover's distance with bin index as ground coordinate.
///
/// Equals the L1 distance between the cumulative distributions. Each input
/// is scaled to unit mass when its total is positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wasserstein;

impl HistogramMetric for Wasserstein {
    fn name(&self) -> &str {
        "wasserstein"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let mass = |h: &[f64]| {
            let total: f64 = h.iter().sum();
            if total > 0.0 {
                total
            } else {
                1.0
            }
        };
        let (mass_a, mass_b) = (mass(a), mass(b));

        let mut cdf_a = 0.0;
        let mut cdf_b = 0.0;
        let mut work = 0.0;
        for (x, y) in a.iter().zip(b) {
            cdf_a += x / mass_a;
            cdf_b += y / mass_b;
            work += (cdf_a - cdf_b).abs();
        }
        work
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Euclidean;

impl HistogramMetric for Euclidean {
    fn name(&self) -> &str {
        "euclidean"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f64>()
            .sqrt()
    }
}

/// Cosine distance `1 - cos(a, b)`.
///
/// Two all-zero histograms are at distance 0; one all-zero against a
/// non-zero histogram is at distance 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl HistogramMetric for Cosine {
    fn name(&self) -> &str {
        "cosine"
    }

    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
        let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
        match (norm_a > 0.0, norm_b > 0.0) {
            (false, false) => 0.0,
            (true, true) => (1.0 - dot / (norm_a * norm_b)).max(0.0),
            _ => 1.0,
        }
    }
}

/// Built-in metric for a configured kind
pub fn metric_for(kind: MetricKind) -> Box<dyn HistogramMetric> {
    match kind {
        MetricKind::Wasserstein => Box::new(Wasserstein),
        MetricKind::Euclidean => Box::new(Euclidean),
        MetricKind::Cosine => Box::new(Cosine),
    }
}

/// Metric used for each histogram group
pub struct MetricRegistry {
    metrics: FxHashMap<ShapeFunction, Box<dyn HistogramMetric>>,
}

impl MetricRegistry {
    /// Same metric kind for every group
    pub fn uniform(kind: MetricKind) -> Self {
        let metrics = ShapeFunction::ALL
            .iter()
            .map(|&f| (f, metric_for(kind)))
            .collect();
        Self { metrics }
    }

    pub fn from_config(config: &DistanceConfig) -> Self {
        let metrics = ShapeFunction::ALL
            .iter()
            .map(|&f| (f, metric_for(config.metric(f))))
            .collect();
        Self { metrics }
    }

    /// Replace the metric of one group
    pub fn register(&mut self, function: ShapeFunction, metric: Box<dyn HistogramMetric>) {
        self.metrics.insert(function, metric);
    }

    /// Metric of `function`; Wasserstein for groups never registered
    pub fn metric(&self, function: ShapeFunction) -> &dyn HistogramMetric {
        match self.metrics.get(&function) {
            Some(metric) => metric.as_ref(),
            None => &Wasserstein,
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::uniform(MetricKind::Wasserstein)
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for function in ShapeFunction::ALL {
            map.entry(&function.name(), &self.metric(function).name());
        }
        map.finish()
    }
}

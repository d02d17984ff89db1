// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Distance Engine
//!
//! The composite distance between two normalized feature vectors is built from
//! two parts:
//!
//! - **scalar**: weighted Euclidean distance over the scalar features that
//!   both vectors define
//! - **histogram**: per shape function, the group's metric times the group's
//!   weight, summed over all five groups
//!
//! The parts are merged by the configured [`Combination`].

use serde::Serialize;
use shapematch_geometry::ShapeFunction;

use crate::config::{Combination, DistanceConfig};
use crate::error::{Error, Result};
use crate::features::{check_histogram_layout, FeatureVector, ScalarFeature};
use crate::metric::MetricRegistry;

/// Per-part view of one distance evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceBreakdown {
    pub scalar: f64,
    /// Weighted metric value per shape function, canonical order
    pub histograms: [f64; 5],
    pub total: f64,
}

impl DistanceBreakdown {
    pub fn histogram_total(&self) -> f64 {
        self.histograms.iter().sum()
    }
}

/// Weighted multi-metric distance between feature vectors
#[derive(Debug)]
pub struct DistanceEngine {
    config: DistanceConfig,
    registry: MetricRegistry,
}

impl DistanceEngine {
    /// Engine with the metrics named in `config`
    pub fn new(config: DistanceConfig) -> Result<Self> {
        let registry = MetricRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Engine with a caller-supplied registry; `config.metrics` is ignored
    pub fn with_registry(config: DistanceConfig, registry: MetricRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &DistanceConfig {
        &self.config
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Weighted Euclidean distance over features defined in both vectors
    pub fn scalar_distance(&self, a: &FeatureVector, b: &FeatureVector) -> f64 {
        ScalarFeature::ALL
            .iter()
            .filter_map(|&f| match (a.scalars.get(f), b.scalars.get(f)) {
                (Some(x), Some(y)) => Some(self.config.scalar_weight(f) * (x - y) * (x - y)),
                _ => None,
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Full breakdown; fails when the vectors have different layouts
    pub fn breakdown(&self, a: &FeatureVector, b: &FeatureVector) -> Result<DistanceBreakdown> {
        let num_bins = a.histograms.first().map(|h| h.len()).unwrap_or(0);
        check_histogram_layout(a, num_bins)?;
        check_histogram_layout(b, num_bins).map_err(|e| match e {
            Error::ConfigMismatch(msg) => Error::ConfigMismatch(format!("{} (compared with '{}')", msg, a.id)),
            other => other,
        })?;

        let scalar = self.scalar_distance(a, b);

        let mut histograms = [0.0; 5];
        for ((slot, ha), hb) in histograms.iter_mut().zip(&a.histograms).zip(&b.histograms) {
            let function: ShapeFunction = ha.function;
            let weight = self.config.histogram_weight(function);
            if weight > 0.0 {
                *slot = weight * self.registry.metric(function).distance(&ha.bins, &hb.bins);
            }
        }
        let histogram_total: f64 = histograms.iter().sum();

        let total = match self.config.combination {
            Combination::Sum => histogram_total + scalar,
            Combination::Product => histogram_total * scalar,
        };

        Ok(DistanceBreakdown {
            scalar,
            histograms,
            total,
        })
    }

    /// Composite distance
    pub fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> Result<f64> {
        Ok(self.breakdown(a, b)?.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetricKind;
    use crate::features::{Histogram, ScalarDescriptors};
    use approx::assert_relative_eq;

    fn vector(id: &str, scalars: &[(ScalarFeature, f64)], peak: usize) -> FeatureVector {
        let mut s = ScalarDescriptors::new();
        for &(f, v) in scalars {
            s.set(f, Some(v));
        }
        FeatureVector {
            id: id.into(),
            class: "c".into(),
            scalars: s,
            histograms: ShapeFunction::ALL
                .iter()
                .map(|&function| {
                    let mut bins = vec![0.0; 4];
                    bins[peak] = 1.0;
                    Histogram { function, bins }
                })
                .collect(),
        }
    }

    #[test]
    fn test_reflexive() {
        let engine = DistanceEngine::new(DistanceConfig::default()).unwrap();
        let v = vector("a", &[(ScalarFeature::Volume, 0.3), (ScalarFeature::Diameter, -1.2)], 2);
        assert_eq!(engine.distance(&v, &v).unwrap(), 0.0);
    }

    #[test]
    fn test_sum_and_product() {
        let a = vector("a", &[(ScalarFeature::Volume, 0.0), (ScalarFeature::Diameter, 0.0)], 0);
        let b = vector("b", &[(ScalarFeature::Volume, 3.0), (ScalarFeature::Diameter, 4.0)], 1);

        let sum = DistanceEngine::new(DistanceConfig::default()).unwrap();
        let breakdown = sum.breakdown(&a, &b).unwrap();
        assert_relative_eq!(breakdown.scalar, 5.0);
        // One-bin shift in each of five groups
        assert_relative_eq!(breakdown.histogram_total(), 5.0);
        assert_relative_eq!(breakdown.total, 10.0);

        let product =
            DistanceEngine::new(DistanceConfig::default().with_combination(Combination::Product)).unwrap();
        assert_relative_eq!(product.distance(&a, &b).unwrap(), 25.0);
    }

    #[test]
    fn test_histogram_weights() {
        let a = vector("a", &[], 0);
        let b = vector("b", &[], 3);
        let config = DistanceConfig::default()
            .with_histogram_weight(ShapeFunction::A3, 0.0)
            .with_histogram_weight(ShapeFunction::D2, 10.0);
        let engine = DistanceEngine::new(config).unwrap();
        let breakdown = engine.breakdown(&a, &b).unwrap();
        assert_eq!(breakdown.histograms[ShapeFunction::A3.index()], 0.0);
        assert_relative_eq!(breakdown.histograms[ShapeFunction::D2.index()], 30.0);
        assert_relative_eq!(breakdown.total, 3.0 * 3.0 + 30.0);
    }

    #[test]
    fn test_undefined_scalars_excluded_per_pair() {
        let a = vector("a", &[(ScalarFeature::Volume, 1.0), (ScalarFeature::Convexity, 9.0)], 0);
        let b = vector("b", &[(ScalarFeature::Volume, 4.0)], 0);
        let engine = DistanceEngine::new(DistanceConfig::default()).unwrap();
        assert_relative_eq!(engine.scalar_distance(&a, &b), 3.0);
        assert_relative_eq!(engine.scalar_distance(&b, &a), 3.0);
    }

    #[test]
    fn test_symmetric() {
        let a = vector("a", &[(ScalarFeature::Volume, 1.0), (ScalarFeature::Eccentricity, 0.2)], 0);
        let b = vector("b", &[(ScalarFeature::Volume, -2.0), (ScalarFeature::Eccentricity, 0.7)], 2);
        for combination in [Combination::Sum, Combination::Product] {
            let engine = DistanceEngine::new(DistanceConfig::default().with_combination(combination)).unwrap();
            assert_eq!(engine.distance(&a, &b).unwrap(), engine.distance(&b, &a).unwrap());
        }
    }

    #[test]
    fn test_per_group_metric() {
        let a = vector("a", &[], 0);
        let b = vector("b", &[], 3);
        let mut config = DistanceConfig::default();
        for f in ShapeFunction::ALL {
            config.metrics.insert(f, MetricKind::Cosine);
        }
        let engine = DistanceEngine::new(config).unwrap();
        // Orthogonal one-hot histograms
        assert_relative_eq!(engine.distance(&a, &b).unwrap(), 5.0);
    }

    #[test]
    fn test_layout_mismatch() {
        let a = vector("a", &[], 0);
        let mut b = vector("b", &[], 0);
        b.histograms[2].bins.push(0.0);
        let engine = DistanceEngine::new(DistanceConfig::default()).unwrap();
        assert!(matches!(engine.distance(&a, &b), Err(Error::ConfigMismatch(_))));
    }
}

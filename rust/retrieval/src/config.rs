// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration
//!
//! Every section deserializes with `#[serde(default)]`, so a JSON document
//! only needs the keys it changes. Map-valued settings fall back to the
//! default entry for any feature a document leaves out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shapematch_geometry::{
    PointSampling, SamplerConfig, ShapeFunction, DEFAULT_MAX_REDRAW_FACTOR, DEFAULT_NUM_SAMPLES,
};

use crate::error::{Error, Result};
use crate::features::ScalarFeature;

/// Default histogram resolution
pub const DEFAULT_NUM_BINS: usize = 40;

/// Default number of ranked results
pub const DEFAULT_TOP_K: usize = 10;

/// Descriptor sampling parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Samples per shape function
    pub num_samples: usize,
    /// Bins per histogram; must match between corpus and queries
    pub num_bins: usize,
    pub d1_sampling: PointSampling,
    /// Draw budget per shape function as a multiple of `num_samples`
    pub max_redraw_factor: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_NUM_SAMPLES,
            num_bins: DEFAULT_NUM_BINS,
            d1_sampling: PointSampling::Surface,
            max_redraw_factor: DEFAULT_MAX_REDRAW_FACTOR,
        }
    }
}

impl DescriptorConfig {
    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            num_samples: self.num_samples,
            d1_sampling: self.d1_sampling,
            max_redraw_factor: self.max_redraw_factor,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_samples == 0 {
            return Err(Error::InvalidConfig("num_samples must be positive".into()));
        }
        if self.num_bins == 0 {
            return Err(Error::InvalidConfig("num_bins must be positive".into()));
        }
        if self.max_redraw_factor == 0 {
            return Err(Error::InvalidConfig("max_redraw_factor must be positive".into()));
        }
        Ok(())
    }
}

/// Scalar feature scaling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalingMethod {
    /// `(x - median) / IQR`
    #[serde(rename = "robust")]
    Robust,
    /// `(x - min) / (max - min)`
    #[serde(rename = "minmax")]
    MinMax,
}

/// Per-feature scaling choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub methods: BTreeMap<ScalarFeature, ScalingMethod>,
}

impl NormalizationConfig {
    /// Built-in choice: min/max for the heavy-tailed Diameter and
    /// Eccentricity, robust for the rest
    pub fn default_method(feature: ScalarFeature) -> ScalingMethod {
        match feature {
            ScalarFeature::Diameter | ScalarFeature::Eccentricity => ScalingMethod::MinMax,
            _ => ScalingMethod::Robust,
        }
    }

    /// Same method for every feature
    pub fn uniform(method: ScalingMethod) -> Self {
        Self {
            methods: ScalarFeature::ALL.iter().map(|&f| (f, method)).collect(),
        }
    }

    pub fn method(&self, feature: ScalarFeature) -> ScalingMethod {
        self.methods
            .get(&feature)
            .copied()
            .unwrap_or_else(|| Self::default_method(feature))
    }
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            methods: ScalarFeature::ALL
                .iter()
                .map(|&f| (f, Self::default_method(f)))
                .collect(),
        }
    }
}

/// Distance function applied to one histogram group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// 1-D earth mover's distance over bin index
    #[default]
    Wasserstein,
    Euclidean,
    /// `1 - cos(a, b)`
    Cosine,
}

/// How the scalar and histogram parts are merged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combination {
    /// histogram part + scalar part
    #[default]
    Sum,
    /// histogram part * scalar part
    Product,
}

impl std::str::FromStr for Combination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Combination::Sum),
            "product" => Ok(Combination::Product),
            other => Err(Error::InvalidConfig(format!(
                "unknown combination rule '{}', expected sum or product",
                other
            ))),
        }
    }
}

/// Weights, metrics and combination rule of the distance engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    pub scalar_weights: BTreeMap<ScalarFeature, f64>,
    pub histogram_weights: BTreeMap<ShapeFunction, f64>,
    pub metrics: BTreeMap<ShapeFunction, MetricKind>,
    pub combination: Combination,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            scalar_weights: ScalarFeature::ALL.iter().map(|&f| (f, 1.0)).collect(),
            histogram_weights: ShapeFunction::ALL.iter().map(|&f| (f, 1.0)).collect(),
            metrics: ShapeFunction::ALL
                .iter()
                .map(|&f| (f, MetricKind::default()))
                .collect(),
            combination: Combination::default(),
        }
    }
}

impl DistanceConfig {
    pub fn scalar_weight(&self, feature: ScalarFeature) -> f64 {
        self.scalar_weights.get(&feature).copied().unwrap_or(1.0)
    }

    pub fn histogram_weight(&self, function: ShapeFunction) -> f64 {
        self.histogram_weights.get(&function).copied().unwrap_or(1.0)
    }

    pub fn metric(&self, function: ShapeFunction) -> MetricKind {
        self.metrics.get(&function).copied().unwrap_or_default()
    }

    /// Set the weight of one histogram group
    pub fn with_histogram_weight(mut self, function: ShapeFunction, weight: f64) -> Self {
        self.histogram_weights.insert(function, weight);
        self
    }

    pub fn with_combination(mut self, combination: Combination) -> Self {
        self.combination = combination;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let scalar = self.scalar_weights.iter().map(|(f, w)| (f.name(), *w));
        let histogram = self.histogram_weights.iter().map(|(f, w)| (f.name(), *w));
        for (name, weight) in scalar.chain(histogram) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "weight of {} must be a finite non-negative number, got {}",
                    name, weight
                )));
            }
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub descriptor: DescriptorConfig,
    pub normalization: NormalizationConfig,
    pub distance: DistanceConfig,
    pub top_k: usize,
    /// Base seed for descriptor sampling; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            descriptor: DescriptorConfig::default(),
            normalization: NormalizationConfig::default(),
            distance: DistanceConfig::default(),
            top_k: DEFAULT_TOP_K,
            seed: None,
        }
    }
}

impl RetrievalConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.descriptor.validate()?;
        self.distance.validate()?;
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("top_k must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.descriptor.num_samples, 5000);
        assert_eq!(config.descriptor.num_bins, 40);
        assert_eq!(config.top_k, 10);
        assert_eq!(config.distance.combination, Combination::Sum);
        assert_eq!(
            config.normalization.method(ScalarFeature::Diameter),
            ScalingMethod::MinMax
        );
        assert_eq!(
            config.normalization.method(ScalarFeature::Volume),
            ScalingMethod::Robust
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let json = r#"{
            "descriptor": { "num_bins": 10 },
            "distance": {
                "histogram_weights": { "D2": 1000.0 },
                "metrics": { "A3": "cosine" },
                "combination": "product"
            },
            "normalization": { "methods": { "Surface Area": "minmax" } },
            "seed": 42
        }"#;
        let config = RetrievalConfig::from_json(json).unwrap();
        assert_eq!(config.descriptor.num_bins, 10);
        assert_eq!(config.descriptor.num_samples, 5000);
        assert_eq!(config.distance.histogram_weight(ShapeFunction::D2), 1000.0);
        assert_eq!(config.distance.histogram_weight(ShapeFunction::D3), 1.0);
        assert_eq!(config.distance.metric(ShapeFunction::A3), MetricKind::Cosine);
        assert_eq!(config.distance.metric(ShapeFunction::D1), MetricKind::Wasserstein);
        assert_eq!(config.distance.combination, Combination::Product);
        assert_eq!(
            config.normalization.method(ScalarFeature::SurfaceArea),
            ScalingMethod::MinMax
        );
        // Left out of the partial map, so the built-in choice applies
        assert_eq!(
            config.normalization.method(ScalarFeature::Eccentricity),
            ScalingMethod::MinMax
        );
        assert_eq!(config.seed, Some(42));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let config = DistanceConfig::default().with_histogram_weight(ShapeFunction::D4, -1.0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_bins() {
        let json = r#"{ "descriptor": { "num_bins": 0 } }"#;
        assert!(matches!(
            RetrievalConfig::from_json(json),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_combination_from_str() {
        assert_eq!("Product".parse::<Combination>().unwrap(), Combination::Product);
        assert_eq!("sum".parse::<Combination>().unwrap(), Combination::Sum);
        assert!("max".parse::<Combination>().is_err());
    }
}

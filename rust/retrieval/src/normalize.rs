// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature Normalizer
//!
//! [`CorpusStatistics`] is fitted once over the raw descriptors of the whole
//! reference corpus and then applied unchanged to every corpus shape and every
//! query. It holds:
//!
//! - a center and scale per scalar feature (median/IQR or min/range)
//! - fixed bin edges per shape function (A3 over [0, 180], D1–D4 over the
//!   corpus-wide sample extent)
//!
//! The D1 point selection of the corpus is recorded as well; a descriptor
//! drawn with a different selection is rejected with `ConfigMismatch`.
//!
//! Scalar values with a zero scale normalize to 0. Undefined scalars stay
//! undefined. Samples outside the corpus edges are dropped before the counts
//! are turned into probabilities.

use serde::{Deserialize, Serialize};
use shapematch_geometry::{sample_range, PointSampling, ShapeFunction};

use crate::config::{NormalizationConfig, ScalingMethod};
use crate::error::{Error, Result};
use crate::features::{
    FeatureVector, Histogram, RawDescriptor, ReferenceTable, ScalarDescriptors, ScalarFeature,
};
use crate::histogram::{bin_counts, to_probabilities, HistogramRange};

/// Fitted scaling of one scalar feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarScaling {
    pub feature: ScalarFeature,
    pub method: ScalingMethod,
    pub center: f64,
    pub scale: f64,
}

impl ScalarScaling {
    #[inline]
    pub fn has_scale(&self) -> bool {
        self.scale.is_finite() && self.scale > 0.0
    }

    /// `(value - center) / scale`, or 0 when the scale vanishes
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        if self.has_scale() {
            (value - self.center) / self.scale
        } else {
            0.0
        }
    }

    fn fit(feature: ScalarFeature, method: ScalingMethod, sorted: &[f64]) -> Self {
        let (center, scale) = match (method, sorted.first(), sorted.last()) {
            (_, None, _) | (_, _, None) => (0.0, 0.0),
            (ScalingMethod::Robust, _, _) => {
                let q1 = percentile(sorted, 0.25);
                let q3 = percentile(sorted, 0.75);
                (percentile(sorted, 0.5), q3 - q1)
            }
            (ScalingMethod::MinMax, Some(&min), Some(&max)) => (min, max - min),
        };
        Self {
            feature,
            method,
            center,
            scale,
        }
    }
}

/// Bin edges of one shape function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramEdges {
    pub function: ShapeFunction,
    pub range: HistogramRange,
}

/// Corpus-wide normalization statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub num_bins: usize,
    /// D1 point selection shared by every corpus descriptor
    #[serde(default)]
    pub d1_sampling: PointSampling,
    /// One entry per scalar feature, in canonical order
    pub scalars: Vec<ScalarScaling>,
    /// One entry per shape function, in canonical order
    pub histograms: Vec<HistogramEdges>,
}

impl CorpusStatistics {
    /// Fit statistics over a corpus of raw descriptors
    pub fn fit(raw: &[RawDescriptor], config: &NormalizationConfig, num_bins: usize) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if num_bins == 0 {
            return Err(Error::InvalidConfig("num_bins must be positive".into()));
        }
        let d1_sampling = raw[0].d1_sampling;
        for descriptor in raw {
            descriptor.check_layout()?;
            if descriptor.d1_sampling != d1_sampling {
                return Err(Error::ConfigMismatch(format!(
                    "descriptor '{}' uses {:?} D1 sampling, corpus uses {:?}",
                    descriptor.id, descriptor.d1_sampling, d1_sampling
                )));
            }
        }

        let scalars = ScalarFeature::ALL
            .iter()
            .map(|&feature| {
                let mut values: Vec<f64> = raw.iter().filter_map(|d| d.scalars.get(feature)).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                let scaling = ScalarScaling::fit(feature, config.method(feature), &values);
                if !scaling.has_scale() {
                    tracing::debug!(
                        feature = feature.name(),
                        defined = values.len(),
                        "Zero scale, feature normalizes to 0"
                    );
                }
                scaling
            })
            .collect();

        let histograms = ShapeFunction::ALL
            .iter()
            .map(|&function| {
                let range = match function.fixed_range() {
                    Some((min, max)) => HistogramRange::new(min, max),
                    None => raw
                        .iter()
                        .filter_map(|d| d.samples(function))
                        .filter_map(|s| sample_range(&s.values))
                        .map(|(min, max)| HistogramRange::new(min, max))
                        .reduce(HistogramRange::union)
                        .unwrap_or_else(|| HistogramRange::new(0.0, 0.0)),
                };
                HistogramEdges { function, range }
            })
            .collect();

        tracing::info!(
            shapes = raw.len(),
            num_bins,
            d1_sampling = ?d1_sampling,
            "Fitted corpus statistics"
        );

        Ok(Self {
            num_bins,
            d1_sampling,
            scalars,
            histograms,
        })
    }

    /// Scaling of one feature
    pub fn scaling(&self, feature: ScalarFeature) -> Option<&ScalarScaling> {
        self.scalars.iter().find(|s| s.feature == feature)
    }

    /// Bin edges of one shape function
    pub fn range(&self, function: ShapeFunction) -> Option<HistogramRange> {
        self.histograms
            .iter()
            .find(|h| h.function == function)
            .map(|h| h.range)
    }

    /// Check the layout, e.g. after deserialization
    pub fn validate(&self) -> Result<()> {
        if self.num_bins == 0 {
            return Err(Error::ConfigMismatch("statistics have zero bins".into()));
        }
        let features: Vec<ScalarFeature> = self.scalars.iter().map(|s| s.feature).collect();
        if features != ScalarFeature::ALL {
            return Err(Error::ConfigMismatch(format!(
                "statistics cover scalar features {:?}, expected {:?}",
                features,
                ScalarFeature::ALL
            )));
        }
        let functions: Vec<ShapeFunction> = self.histograms.iter().map(|h| h.function).collect();
        if functions != ShapeFunction::ALL {
            return Err(Error::ConfigMismatch(format!(
                "statistics cover shape functions {:?}, expected {:?}",
                functions,
                ShapeFunction::ALL
            )));
        }
        Ok(())
    }

    /// Check that vectors normalized with these statistics fit `table`
    pub fn check_table(&self, table: &ReferenceTable) -> Result<()> {
        if self.num_bins != table.num_bins() {
            return Err(Error::ConfigMismatch(format!(
                "statistics use {} bins but the table uses {}",
                self.num_bins,
                table.num_bins()
            )));
        }
        Ok(())
    }

    /// Normalize one raw descriptor
    pub fn normalize(&self, raw: &RawDescriptor) -> Result<FeatureVector> {
        raw.check_layout()?;
        if raw.d1_sampling != self.d1_sampling {
            return Err(Error::ConfigMismatch(format!(
                "descriptor '{}' uses {:?} D1 sampling, statistics were fitted with {:?}",
                raw.id, raw.d1_sampling, self.d1_sampling
            )));
        }

        let mut scalars = ScalarDescriptors::new();
        for scaling in &self.scalars {
            scalars.set(scaling.feature, raw.scalars.get(scaling.feature).map(|v| scaling.apply(v)));
        }

        let histograms = self
            .histograms
            .iter()
            .map(|edges| {
                let values = raw
                    .samples(edges.function)
                    .map(|s| s.values.as_slice())
                    .unwrap_or_default();
                let counts = bin_counts(values, edges.range, self.num_bins);
                let kept: u32 = counts.iter().sum();
                if (kept as usize) < values.len() {
                    tracing::debug!(
                        id = raw.id.as_str(),
                        function = edges.function.name(),
                        dropped = values.len() - kept as usize,
                        "Samples outside corpus range"
                    );
                }
                Histogram {
                    function: edges.function,
                    bins: to_probabilities(&counts),
                }
            })
            .collect();

        Ok(FeatureVector {
            id: raw.id.clone(),
            class: raw.class.clone(),
            scalars,
            histograms,
        })
    }
}

/// Normalize `raw` against fitted corpus statistics
pub fn normalize(raw: &RawDescriptor, statistics: &CorpusStatistics) -> Result<FeatureVector> {
    statistics.normalize(raw)
}

/// Linearly interpolated percentile of sorted, non-empty data
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let position = p * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ShapeSamples;
    use approx::assert_relative_eq;

    fn raw(id: &str, scalar: Option<f64>, samples: &[f64]) -> RawDescriptor {
        let scalars = ScalarDescriptors::new()
            .with(ScalarFeature::Volume, scalar)
            .with(ScalarFeature::Diameter, scalar);
        RawDescriptor {
            id: id.into(),
            class: "c".into(),
            scalars,
            d1_sampling: PointSampling::Surface,
            samples: ShapeFunction::ALL
                .iter()
                .map(|&function| ShapeSamples {
                    function,
                    values: samples.to_vec(),
                    discarded: 0,
                    range: HistogramRange::for_samples(function, samples),
                    counts: Vec::new(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&data, 0.5), 2.5);
        assert_relative_eq!(percentile(&data, 0.25), 1.75);
        assert_relative_eq!(percentile(&data, 0.75), 3.25);
        assert_relative_eq!(percentile(&[7.0], 0.25), 7.0);
    }

    #[test]
    fn test_robust_and_minmax_scaling() {
        let corpus: Vec<_> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| raw(&i.to_string(), Some(v), &[0.5]))
            .collect();
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();

        let volume = stats.scaling(ScalarFeature::Volume).unwrap();
        assert_eq!(volume.method, ScalingMethod::Robust);
        assert_relative_eq!(volume.center, 2.5);
        assert_relative_eq!(volume.scale, 1.5);

        let diameter = stats.scaling(ScalarFeature::Diameter).unwrap();
        assert_eq!(diameter.method, ScalingMethod::MinMax);
        assert_relative_eq!(diameter.apply(4.0), 1.0);
        assert_relative_eq!(diameter.apply(1.0), 0.0);
    }

    #[test]
    fn test_zero_scale_normalizes_to_zero() {
        let corpus = vec![raw("a", Some(3.0), &[1.0]), raw("b", Some(3.0), &[1.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        let v = stats.normalize(&raw("q", Some(10.0), &[1.0])).unwrap();
        assert_eq!(v.scalars.get(ScalarFeature::Volume), Some(0.0));
        assert_eq!(v.scalars.get(ScalarFeature::Diameter), Some(0.0));
    }

    #[test]
    fn test_undefined_stays_undefined() {
        let corpus = vec![raw("a", Some(1.0), &[1.0]), raw("b", None, &[2.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        let v = stats.normalize(&corpus[1]).unwrap();
        assert_eq!(v.scalars.get(ScalarFeature::Volume), None);
        assert_eq!(v.scalars.get(ScalarFeature::Convexity), None);
    }

    #[test]
    fn test_corpus_wide_edges() {
        let corpus = vec![raw("a", None, &[1.0, 2.0]), raw("b", None, &[3.0, 5.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        assert_eq!(stats.range(ShapeFunction::D2), Some(HistogramRange::new(1.0, 5.0)));
        assert_eq!(stats.range(ShapeFunction::A3), Some(HistogramRange::new(0.0, 180.0)));

        let v = stats.normalize(&corpus[1]).unwrap();
        assert_eq!(v.histogram(ShapeFunction::D2).unwrap().bins, vec![0.0, 0.0, 0.5, 0.5]);
    }

    #[test]
    fn test_out_of_range_query_samples_are_dropped() {
        let corpus = vec![raw("a", None, &[1.0, 5.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();

        let v = stats.normalize(&raw("q", None, &[0.0, 2.0, 9.0])).unwrap();
        let d2 = &v.histogram(ShapeFunction::D2).unwrap().bins;
        assert_eq!(d2, &vec![0.0, 1.0, 0.0, 0.0]);

        let v = stats.normalize(&raw("far", None, &[50.0])).unwrap();
        assert_eq!(v.histogram(ShapeFunction::D3).unwrap().bins, vec![0.0; 4]);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let corpus = vec![raw("a", Some(1.0), &[1.0, 4.0]), raw("b", Some(2.0), &[2.0, 3.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 8).unwrap();
        let first = normalize(&corpus[0], &stats).unwrap();
        let second = normalize(&corpus[0], &stats).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(matches!(
            CorpusStatistics::fit(&[], &NormalizationConfig::default(), 10),
            Err(Error::EmptyCorpus)
        ));
    }

    #[test]
    fn test_validate_rejects_missing_function() {
        let corpus = vec![raw("a", Some(1.0), &[1.0])];
        let mut stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        assert!(stats.validate().is_ok());
        stats.histograms.pop();
        assert!(matches!(stats.validate(), Err(Error::ConfigMismatch(_))));
    }

    #[test]
    fn test_d1_sampling_is_recorded_and_enforced() {
        let mut corpus = vec![raw("a", Some(1.0), &[1.0]), raw("b", Some(2.0), &[2.0])];
        for d in &mut corpus {
            d.d1_sampling = PointSampling::Vertex;
        }
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        assert_eq!(stats.d1_sampling, PointSampling::Vertex);
        assert!(stats.normalize(&corpus[0]).is_ok());

        let query = raw("q", Some(1.5), &[1.5]);
        assert!(matches!(stats.normalize(&query), Err(Error::ConfigMismatch(_))));
    }

    #[test]
    fn test_mixed_d1_sampling_corpus_is_rejected() {
        let mut corpus = vec![raw("a", Some(1.0), &[1.0]), raw("b", Some(2.0), &[2.0])];
        corpus[1].d1_sampling = PointSampling::Vertex;
        assert!(matches!(
            CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4),
            Err(Error::ConfigMismatch(_))
        ));
    }

    #[test]
    fn test_bin_mismatch_with_table() {
        let corpus = vec![raw("a", Some(1.0), &[1.0])];
        let stats = CorpusStatistics::fit(&corpus, &NormalizationConfig::default(), 4).unwrap();
        assert!(stats.check_table(&ReferenceTable::new(4)).is_ok());
        assert!(matches!(
            stats.check_table(&ReferenceTable::new(10)),
            Err(Error::ConfigMismatch(_))
        ));
    }
}

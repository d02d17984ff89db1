// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # ShapeMatch Retrieval
//!
//! Content-based 3D shape retrieval: descriptor building, corpus
//! normalization and multi-metric ranking.
//!
//! ## Pipeline
//!
//! ```text
//! Mesh ──▶ DescriptorBuilder ──▶ RawDescriptor
//!                                   │
//!          CorpusStatistics::fit ◀──┤ (whole corpus, once)
//!                                   ▼
//!                  CorpusStatistics::normalize ──▶ FeatureVector
//!                                                    │
//!               ReferenceTable + DistanceEngine ──▶ rank_top_k ──▶ [DistanceResult]
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use shapematch_geometry::unit_cube;
//! use shapematch_retrieval::{
//!     rank_top_k, CorpusStatistics, DescriptorBuilder, DistanceEngine, ReferenceTable,
//!     RetrievalConfig,
//! };
//!
//! # fn main() -> shapematch_retrieval::Result<()> {
//! let config = RetrievalConfig::default();
//! let builder = DescriptorBuilder::new(config.descriptor)?;
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! let raw = vec![builder.build(&unit_cube(), "cube", "box", &mut rng)?];
//! let stats = CorpusStatistics::fit(&raw, &config.normalization, config.descriptor.num_bins)?;
//! let rows = raw.iter().map(|r| stats.normalize(r)).collect::<Result<Vec<_>, _>>()?;
//! let table = ReferenceTable::from_rows(stats.num_bins, rows)?;
//!
//! let query = stats.normalize(&builder.build(&unit_cube(), "query", "box", &mut rng)?)?;
//! let engine = DistanceEngine::new(config.distance)?;
//! let results = rank_top_k(&query, &table, &engine, config.top_k)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod distance;
pub mod error;
pub mod features;
pub mod histogram;
pub mod metric;
pub mod normalize;
pub mod rank;

pub use config::{
    Combination, DescriptorConfig, DistanceConfig, MetricKind, NormalizationConfig,
    RetrievalConfig, ScalingMethod, DEFAULT_NUM_BINS, DEFAULT_TOP_K,
};
pub use descriptor::{scalar_descriptors, DescriptorBuilder};
pub use distance::{DistanceBreakdown, DistanceEngine};
pub use error::{Error, Result};
pub use features::{
    DistanceResult, FeatureVector, Histogram, RawDescriptor, ReferenceTable, ScalarDescriptors,
    ScalarFeature, ShapeSamples, TableSchema,
};
pub use histogram::HistogramRange;
pub use metric::{Cosine, Euclidean, HistogramMetric, MetricRegistry, Wasserstein};
pub use normalize::{normalize, CorpusStatistics, HistogramEdges, ScalarScaling};
pub use rank::{rank_by_id, rank_top_k};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corpus indexing: fit statistics once, normalize every shape with them.

use rand::Rng;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use shapematch_geometry::Mesh;
use shapematch_retrieval::{
    CorpusStatistics, DescriptorBuilder, Error, FeatureVector, RawDescriptor, ReferenceTable,
    Result, RetrievalConfig,
};

/// Searchable corpus together with the statistics that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedCorpus {
    pub statistics: CorpusStatistics,
    pub table: ReferenceTable,
}

/// Fit corpus statistics and build the reference table
pub fn index_corpus(raw: &[RawDescriptor], config: &RetrievalConfig) -> Result<IndexedCorpus> {
    let statistics = CorpusStatistics::fit(raw, &config.normalization, config.descriptor.num_bins)?;

    let mut seen = FxHashSet::default();
    for descriptor in raw {
        if !seen.insert(descriptor.id.as_str()) {
            tracing::warn!(id = %descriptor.id, "Duplicate shape id in corpus");
        }
    }

    let rows = raw
        .par_iter()
        .map(|descriptor| statistics.normalize(descriptor))
        .collect::<Result<Vec<_>>>()?;
    let table = ReferenceTable::from_rows(statistics.num_bins, rows)?;

    tracing::info!(rows = table.len(), num_bins = table.num_bins(), "Reference table built");

    Ok(IndexedCorpus { statistics, table })
}

/// Describe and normalize a query mesh against existing corpus statistics.
///
/// The builder must draw D1 the same way the corpus was drawn.
pub fn prepare_query<R: Rng + ?Sized>(
    mesh: &Mesh,
    id: &str,
    builder: &DescriptorBuilder,
    statistics: &CorpusStatistics,
    rng: &mut R,
) -> Result<FeatureVector> {
    let d1_sampling = builder.config().d1_sampling;
    if d1_sampling != statistics.d1_sampling {
        return Err(Error::ConfigMismatch(format!(
            "query uses {:?} D1 sampling, corpus was indexed with {:?}",
            d1_sampling, statistics.d1_sampling
        )));
    }
    let raw = builder.build(mesh, id, "", rng)?;
    statistics.normalize(&raw)
}

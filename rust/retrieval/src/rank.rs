// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ranker

use rayon::prelude::*;

use crate::distance::DistanceEngine;
use crate::error::{Error, Result};
use crate::features::{DistanceResult, FeatureVector, ReferenceTable};

/// The `k` rows of `table` closest to `query`, nearest first.
///
/// Rows sharing the query's identifier are skipped. Candidates are scored in
/// parallel; equal distances keep table order.
pub fn rank_top_k(
    query: &FeatureVector,
    table: &ReferenceTable,
    engine: &DistanceEngine,
    k: usize,
) -> Result<Vec<DistanceResult>> {
    table.schema.check_vector(query)?;

    let mut results = table
        .rows()
        .par_iter()
        .filter(|row| row.id != query.id)
        .map(|row| {
            Ok(DistanceResult {
                id: row.id.clone(),
                class: row.class.clone(),
                distance: engine.distance(query, row)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Stable: ties stay in table order
    results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    results.truncate(k);
    Ok(results)
}

/// Rank an existing table row against the rest of its table
pub fn rank_by_id(
    id: &str,
    table: &ReferenceTable,
    engine: &DistanceEngine,
    k: usize,
) -> Result<Vec<DistanceResult>> {
    let query = table
        .get(id)
        .ok_or_else(|| Error::UnknownShape(id.to_string()))?;
    rank_top_k(query, table, engine, k)
}

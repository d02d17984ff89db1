// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Batch querying. A failing query is reported in its outcome and the batch
//! carries on.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shapematch_retrieval::{rank_top_k, DistanceEngine, DistanceResult, FeatureVector, ReferenceTable};

/// Outcome of one query in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryOutcome {
    Ranked { id: String, results: Vec<DistanceResult> },
    Failed { id: String, reason: String },
}

impl QueryOutcome {
    pub fn id(&self) -> &str {
        match self {
            QueryOutcome::Ranked { id, .. } | QueryOutcome::Failed { id, .. } => id,
        }
    }

    pub fn is_ranked(&self) -> bool {
        matches!(self, QueryOutcome::Ranked { .. })
    }

    pub fn results(&self) -> Option<&[DistanceResult]> {
        match self {
            QueryOutcome::Ranked { results, .. } => Some(results),
            QueryOutcome::Failed { .. } => None,
        }
    }
}

/// Rank every query against `table`, one outcome per query in input order
pub fn run_queries(
    queries: &[FeatureVector],
    table: &ReferenceTable,
    engine: &DistanceEngine,
    k: usize,
) -> Vec<QueryOutcome> {
    let outcomes: Vec<QueryOutcome> = queries
        .par_iter()
        .map(|query| match rank_top_k(query, table, engine, k) {
            Ok(results) => QueryOutcome::Ranked {
                id: query.id.clone(),
                results,
            },
            Err(e) => {
                tracing::warn!(id = %query.id, error = %e, "Query failed");
                QueryOutcome::Failed {
                    id: query.id.clone(),
                    reason: e.to_string(),
                }
            }
        })
        .collect();

    let ranked = outcomes.iter().filter(|o| o.is_ranked()).count();
    tracing::info!(
        queries = outcomes.len(),
        ranked,
        failed = outcomes.len() - ranked,
        "Batch query complete"
    );
    outcomes
}

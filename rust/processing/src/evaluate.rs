// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Retrieval evaluation
//!
//! A seeded sample of table rows is used as queries against the table itself.
//! A returned shape is relevant when it shares the query's class.
//!
//! - precision = relevant / returned (0 when nothing is returned)
//! - recall = relevant / (class size - 1), undefined for singleton classes

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use shapematch_retrieval::{rank_top_k, DistanceEngine, Error, ReferenceTable, Result};

/// Scores of one evaluation query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvaluation {
    pub id: String,
    pub class: String,
    pub returned: usize,
    pub relevant: usize,
    pub precision: f64,
    pub recall: Option<f64>,
}

/// Mean scores over the queries of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEvaluation {
    pub class: String,
    pub queries: usize,
    pub mean_precision: f64,
    pub mean_recall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub k: usize,
    pub queries: Vec<QueryEvaluation>,
    pub mean_precision: f64,
    pub mean_recall: Option<f64>,
    /// Sorted by class name
    pub per_class: Vec<ClassEvaluation>,
    pub elapsed_ms: u64,
}

/// Evaluate top-`k` retrieval on up to `sample_size` rows of `table`
pub fn evaluate(
    table: &ReferenceTable,
    engine: &DistanceEngine,
    k: usize,
    sample_size: usize,
    seed: u64,
) -> Result<EvaluationReport> {
    if table.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    if k == 0 || sample_size == 0 {
        return Err(Error::InvalidConfig("k and sample size must be positive".into()));
    }
    let start = Instant::now();

    let mut class_sizes: FxHashMap<&str, usize> = FxHashMap::default();
    for row in table.rows() {
        *class_sizes.entry(row.class.as_str()).or_default() += 1;
    }

    let amount = sample_size.min(table.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let mut picked = rand::seq::index::sample(&mut rng, table.len(), amount).into_vec();
    picked.sort_unstable();

    let queries = picked
        .par_iter()
        .map(|&index| {
            let query = &table.rows()[index];
            let results = rank_top_k(query, table, engine, k)?;
            let relevant = results.iter().filter(|r| r.class == query.class).count();
            let returned = results.len();
            let others = class_sizes
                .get(query.class.as_str())
                .map_or(0, |size| size.saturating_sub(1));
            Ok(QueryEvaluation {
                id: query.id.clone(),
                class: query.class.clone(),
                returned,
                relevant,
                precision: if returned > 0 {
                    relevant as f64 / returned as f64
                } else {
                    0.0
                },
                recall: (others > 0).then(|| relevant as f64 / others as f64),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mean_precision = mean(queries.iter().map(|q| q.precision));
    let mean_recall = mean_defined(queries.iter().map(|q| q.recall));

    let mut by_class: FxHashMap<&str, Vec<&QueryEvaluation>> = FxHashMap::default();
    for q in &queries {
        by_class.entry(q.class.as_str()).or_default().push(q);
    }
    let mut per_class: Vec<ClassEvaluation> = by_class
        .into_iter()
        .map(|(class, members)| ClassEvaluation {
            class: class.to_string(),
            queries: members.len(),
            mean_precision: mean(members.iter().map(|q| q.precision)),
            mean_recall: mean_defined(members.iter().map(|q| q.recall)),
        })
        .collect();
    per_class.sort_by(|a, b| a.class.cmp(&b.class));

    let elapsed_ms = start.elapsed().as_millis() as u64;
    tracing::info!(
        queries = queries.len(),
        k,
        mean_precision,
        mean_recall = mean_recall.unwrap_or(f64::NAN),
        elapsed_ms,
        "Evaluation complete"
    );

    Ok(EvaluationReport {
        k,
        queries,
        mean_precision,
        mean_recall,
        per_class,
        elapsed_ms,
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn mean_defined(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let defined: Vec<f64> = values.flatten().collect();
    (!defined.is_empty()).then(|| mean(defined.into_iter()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shapematch_geometry::ShapeFunction;
    use shapematch_retrieval::{
        DistanceConfig, FeatureVector, Histogram, ScalarDescriptors, ScalarFeature,
    };

    fn row(id: &str, class: &str, volume: f64) -> FeatureVector {
        FeatureVector {
            id: id.into(),
            class: class.into(),
            scalars: ScalarDescriptors::new().with(ScalarFeature::Volume, Some(volume)),
            histograms: ShapeFunction::ALL
                .iter()
                .map(|&function| Histogram {
                    function,
                    bins: vec![1.0, 0.0],
                })
                .collect(),
        }
    }

    fn table() -> ReferenceTable {
        ReferenceTable::from_rows(
            2,
            vec![
                row("a1", "a", 0.0),
                row("a2", "a", 0.1),
                row("a3", "a", 0.2),
                row("b1", "b", 5.0),
                row("b2", "b", 5.1),
                row("c1", "c", 20.0),
            ],
        )
        .unwrap()
    }

    fn engine() -> DistanceEngine {
        DistanceEngine::new(DistanceConfig::default()).unwrap()
    }

    #[test]
    fn test_full_evaluation() {
        let report = evaluate(&table(), &engine(), 2, 100, 0).unwrap();
        assert_eq!(report.queries.len(), 6);

        let a1 = report.queries.iter().find(|q| q.id == "a1").unwrap();
        assert_eq!((a1.returned, a1.relevant), (2, 2));
        assert_relative_eq!(a1.precision, 1.0);
        assert_eq!(a1.recall, Some(1.0));

        let b1 = report.queries.iter().find(|q| q.id == "b1").unwrap();
        assert_eq!(b1.relevant, 1);
        assert_relative_eq!(b1.precision, 0.5);
        assert_eq!(b1.recall, Some(1.0));

        // Singleton class has no recall
        let c1 = report.queries.iter().find(|q| q.id == "c1").unwrap();
        assert_eq!(c1.relevant, 0);
        assert_eq!(c1.recall, None);

        let classes: Vec<&str> = report.per_class.iter().map(|c| c.class.as_str()).collect();
        assert_eq!(classes, vec!["a", "b", "c"]);
        assert_eq!(report.per_class[2].mean_recall, None);
        // a: 1, 1, 1; b: 0.5, 0.5; c: 0
        assert_relative_eq!(report.mean_precision, 4.0 / 6.0, epsilon = 1e-12);
        assert_relative_eq!(report.mean_recall.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_is_seeded() {
        let a = evaluate(&table(), &engine(), 3, 3, 42).unwrap();
        let b = evaluate(&table(), &engine(), 3, 3, 42).unwrap();
        let ids = |r: &EvaluationReport| r.queries.iter().map(|q| q.id.clone()).collect::<Vec<_>>();
        assert_eq!(a.queries.len(), 3);
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn test_rejects_empty_and_zero_k() {
        let empty = ReferenceTable::new(2);
        assert!(matches!(evaluate(&empty, &engine(), 3, 3, 0), Err(Error::EmptyCorpus)));
        assert!(matches!(
            evaluate(&table(), &engine(), 0, 3, 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}

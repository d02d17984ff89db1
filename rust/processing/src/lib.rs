// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corpus-wide jobs shared by the CLI and embedding applications.
//!
//! Every job tolerates per-shape or per-query failures and reports them next
//! to the successful results.

pub mod corpus;
pub mod evaluate;
pub mod index;
pub mod query;

pub use corpus::{
    build_corpus, shape_seed, BuildFailure, CorpusBuild, CorpusBuildStats, CorpusEntry,
    ShapeSource,
};
pub use evaluate::{evaluate, ClassEvaluation, EvaluationReport, QueryEvaluation};
pub use index::{index_corpus, prepare_query, IndexedCorpus};
pub use query::{run_queries, QueryOutcome};

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Corpus descriptor building with parallel extraction and a failure tally.

use std::borrow::Cow;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shapematch_geometry::Mesh;
use shapematch_retrieval::{DescriptorBuilder, DescriptorConfig, RawDescriptor, Result};

/// A corpus shape that can produce its mesh on demand
pub trait ShapeSource: Sync {
    fn id(&self) -> &str;
    fn class(&self) -> &str;
    /// Load the mesh; the error text ends up in the failure tally
    fn load(&self) -> std::result::Result<Cow<'_, Mesh>, String>;
}

/// A shape whose mesh is already in memory
#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub id: String,
    pub class: String,
    pub mesh: Mesh,
}

impl CorpusEntry {
    pub fn new(id: impl Into<String>, class: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            mesh,
        }
    }
}

impl ShapeSource for CorpusEntry {
    fn id(&self) -> &str {
        &self.id
    }

    fn class(&self) -> &str {
        &self.class
    }

    fn load(&self) -> std::result::Result<Cow<'_, Mesh>, String> {
        Ok(Cow::Borrowed(&self.mesh))
    }
}

/// A shape that could not be described
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub id: String,
    pub class: String,
    pub reason: String,
}

/// Tally of a corpus build
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusBuildStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

/// Result of describing a whole corpus
#[derive(Debug, Clone)]
pub struct CorpusBuild {
    /// Successful descriptors, in input order
    pub descriptors: Vec<RawDescriptor>,
    /// Failed shapes, in input order
    pub failures: Vec<BuildFailure>,
    pub stats: CorpusBuildStats,
}

/// Seed of the sampling stream for shape `index`.
///
/// A splitmix64 step over the base seed and index, so every shape gets an
/// independent stream regardless of which worker runs it.
pub fn shape_seed(base: u64, index: u64) -> u64 {
    let mut z = base.wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Describe every shape in parallel.
///
/// Per-shape failures are collected, never propagated; only an invalid
/// configuration fails the whole build.
pub fn build_corpus<S: ShapeSource>(
    sources: &[S],
    config: &DescriptorConfig,
    seed: u64,
) -> Result<CorpusBuild> {
    let builder = DescriptorBuilder::new(*config)?;
    let start = Instant::now();

    tracing::info!(
        shapes = sources.len(),
        num_samples = config.num_samples,
        num_bins = config.num_bins,
        seed,
        "Starting corpus descriptor build"
    );

    let outcomes: Vec<std::result::Result<RawDescriptor, BuildFailure>> = sources
        .par_iter()
        .enumerate()
        .map(|(index, source)| {
            let fail = |reason: String| BuildFailure {
                id: source.id().to_string(),
                class: source.class().to_string(),
                reason,
            };
            let mesh = source.load().map_err(fail)?;
            let mut rng = StdRng::seed_from_u64(shape_seed(seed, index as u64));
            builder
                .build(&mesh, source.id(), source.class(), &mut rng)
                .map_err(|e| fail(e.to_string()))
        })
        .collect();

    let mut descriptors = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(failure) => {
                tracing::warn!(id = %failure.id, reason = %failure.reason, "Shape skipped");
                failures.push(failure);
            }
        }
    }

    let stats = CorpusBuildStats {
        total: sources.len(),
        succeeded: descriptors.len(),
        failed: failures.len(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    tracing::info!(
        total = stats.total,
        succeeded = stats.succeeded,
        failed = stats.failed,
        elapsed_ms = stats.elapsed_ms,
        "Corpus descriptor build complete"
    );

    Ok(CorpusBuild {
        descriptors,
        failures,
        stats,
    })
}

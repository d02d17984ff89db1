// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI configuration: environment variables, then an optional JSON file,
//! then command-line flags.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use shapematch_retrieval::{Combination, RetrievalConfig};

/// Settings of one CLI run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Pipeline configuration.
    pub retrieval: RetrievalConfig,
    /// Number of worker threads for parallel processing.
    pub worker_threads: usize,
}

impl Settings {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut retrieval = RetrievalConfig::default();
        let defaults = retrieval.clone();

        retrieval.descriptor.num_samples = std::env::var("SHAPEMATCH_SAMPLES")
            .unwrap_or_else(|_| defaults.descriptor.num_samples.to_string())
            .parse()
            .unwrap_or(defaults.descriptor.num_samples);
        retrieval.descriptor.num_bins = std::env::var("SHAPEMATCH_BINS")
            .unwrap_or_else(|_| defaults.descriptor.num_bins.to_string())
            .parse()
            .unwrap_or(defaults.descriptor.num_bins);
        retrieval.top_k = std::env::var("SHAPEMATCH_TOP_K")
            .unwrap_or_else(|_| defaults.top_k.to_string())
            .parse()
            .unwrap_or(defaults.top_k);
        retrieval.seed = std::env::var("SHAPEMATCH_SEED")
            .ok()
            .and_then(|s| s.parse().ok());
        retrieval.distance.combination = std::env::var("SHAPEMATCH_COMBINATION")
            .ok()
            .and_then(|s| s.parse::<Combination>().ok())
            .unwrap_or(defaults.distance.combination);

        Self {
            retrieval,
            worker_threads: std::env::var("WORKER_THREADS")
                .unwrap_or_else(|_| num_cpus::get().to_string())
                .parse()
                .unwrap_or_else(|_| num_cpus::get()),
        }
    }

    /// Overlay a (possibly partial) JSON config file on the current settings
    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let overlay: Value =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

        let mut current = serde_json::to_value(&self.retrieval)?;
        merge(&mut current, overlay);
        self.retrieval = serde_json::from_value(current)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(())
    }
}

/// Recursive object merge; non-object values in `overlay` replace `base`
fn merge(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Object(overlay) => {
            if let Value::Object(base) = base {
                for (key, value) in overlay {
                    merge(base.entry(key).or_insert(Value::Null), value);
                }
            } else {
                *base = Value::Object(overlay);
            }
        }
        overlay => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shapematch_geometry::ShapeFunction;

    #[test]
    fn test_merge_keeps_unmentioned_keys() {
        let mut base = json!({ "descriptor": { "num_samples": 100, "num_bins": 10 }, "top_k": 3 });
        merge(&mut base, json!({ "descriptor": { "num_bins": 40 } }));
        assert_eq!(base["descriptor"]["num_samples"], 100);
        assert_eq!(base["descriptor"]["num_bins"], 40);
        assert_eq!(base["top_k"], 3);
    }

    #[test]
    fn test_file_overlays_earlier_settings() {
        let mut settings = Settings {
            retrieval: RetrievalConfig::default(),
            worker_threads: 1,
        };
        settings.retrieval.descriptor.num_samples = 123;

        let path = std::env::temp_dir().join(format!("shapematch-config-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "distance": { "histogram_weights": { "D3": 1000.0 } }, "top_k": 4 }"#,
        )
        .unwrap();
        settings.apply_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.retrieval.descriptor.num_samples, 123);
        assert_eq!(settings.retrieval.top_k, 4);
        assert_eq!(settings.retrieval.distance.histogram_weight(ShapeFunction::D3), 1000.0);
        assert_eq!(settings.retrieval.distance.histogram_weight(ShapeFunction::D2), 1.0);
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ShapeMatch CLI - content-based 3D shape retrieval.
//!
//! Usage:
//!   shapematch describe <mesh.json> [options]
//!   shapematch index <manifest.json> --out <dir> [options]
//!   shapematch query <mesh.json> --table <table.json> --stats <stats.json> [options]
//!   shapematch query --id <shape id> --table <table.json> [options]
//!   shapematch evaluate --table <table.json> [--queries N] [options]

mod config;
mod mesh_file;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shapematch_processing::{build_corpus, evaluate, index_corpus, prepare_query};
use shapematch_retrieval::{
    rank_by_id, rank_top_k, Combination, CorpusStatistics, DescriptorBuilder, DistanceEngine,
    DistanceResult, ReferenceTable,
};

use crate::config::Settings;
use crate::mesh_file::{load_manifest, load_mesh};

/// Parsed command-line options shared by all commands
#[derive(Debug, Default)]
struct Options {
    positional: Vec<String>,
    config: Option<PathBuf>,
    out: Option<PathBuf>,
    table: Option<PathBuf>,
    stats: Option<PathBuf>,
    id: Option<String>,
    class: Option<String>,
    top_k: Option<usize>,
    queries: Option<usize>,
    samples: Option<usize>,
    bins: Option<usize>,
    seed: Option<u64>,
    combination: Option<Combination>,
    threads: Option<usize>,
    json: bool,
}

impl Options {
    fn parse(args: &[String]) -> Result<Self> {
        let mut options = Options::default();
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--config" => options.config = Some(PathBuf::from(next(args, &mut i, flag)?)),
                "--out" | "-o" => options.out = Some(PathBuf::from(next(args, &mut i, flag)?)),
                "--table" => options.table = Some(PathBuf::from(next(args, &mut i, flag)?)),
                "--stats" => options.stats = Some(PathBuf::from(next(args, &mut i, flag)?)),
                "--id" => options.id = Some(next(args, &mut i, flag)?.to_string()),
                "--class" => options.class = Some(next(args, &mut i, flag)?.to_string()),
                "-k" | "--top-k" => options.top_k = Some(parse_next(args, &mut i, flag)?),
                "--queries" => options.queries = Some(parse_next(args, &mut i, flag)?),
                "--samples" => options.samples = Some(parse_next(args, &mut i, flag)?),
                "--bins" => options.bins = Some(parse_next(args, &mut i, flag)?),
                "--seed" => options.seed = Some(parse_next(args, &mut i, flag)?),
                "--combination" => options.combination = Some(parse_next(args, &mut i, flag)?),
                "--threads" => options.threads = Some(parse_next(args, &mut i, flag)?),
                "--json" => options.json = true,
                other if other.starts_with('-') => bail!("Unknown option: {}", other),
                other => options.positional.push(other.to_string()),
            }
            i += 1;
        }
        Ok(options)
    }

    /// Flags take precedence over the environment and the config file
    fn apply(&self, settings: &mut Settings) {
        let retrieval = &mut settings.retrieval;
        if let Some(k) = self.top_k {
            retrieval.top_k = k;
        }
        if let Some(samples) = self.samples {
            retrieval.descriptor.num_samples = samples;
        }
        if let Some(bins) = self.bins {
            retrieval.descriptor.num_bins = bins;
        }
        if let Some(seed) = self.seed {
            retrieval.seed = Some(seed);
        }
        if let Some(combination) = self.combination {
            retrieval.distance.combination = combination;
        }
        if let Some(threads) = self.threads {
            settings.worker_threads = threads;
        }
    }

    /// Overlay the config file, then the flags, on `settings`
    fn layer(&self, mut settings: Settings) -> Result<Settings> {
        if let Some(path) = &self.config {
            settings.apply_file(path)?;
        }
        self.apply(&mut settings);
        settings.retrieval.validate()?;
        Ok(settings)
    }

    fn input(&self, what: &str) -> Result<&Path> {
        match self.positional.first() {
            Some(path) => Ok(Path::new(path)),
            None => bail!("Missing {} argument", what),
        }
    }

    fn required<'a>(value: &'a Option<PathBuf>, flag: &str) -> Result<&'a Path> {
        value
            .as_deref()
            .with_context(|| format!("Missing required option {}", flag))
    }
}

fn next<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .with_context(|| format!("Option {} needs a value", flag))
}

fn parse_next<T>(args: &[String], i: &mut usize, flag: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = next(args, i, flag)?;
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Invalid value '{}' for {}: {}", raw, flag, e))
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(());
    }

    let command = args[1].as_str();
    let options = Options::parse(&args[2..])?;

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,shapematch=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = options.layer(Settings::from_env())?;

    tracing::info!(
        command,
        worker_threads = settings.worker_threads,
        num_samples = settings.retrieval.descriptor.num_samples,
        num_bins = settings.retrieval.descriptor.num_bins,
        top_k = settings.retrieval.top_k,
        "Starting ShapeMatch"
    );

    rayon::ThreadPoolBuilder::new()
        .num_threads(settings.worker_threads)
        .build_global()
        .context("Failed to initialize rayon thread pool")?;

    match command {
        "describe" => describe(&options, &settings),
        "index" => index(&options, &settings),
        "query" => query(&options, &settings),
        "evaluate" => run_evaluation(&options, &settings),
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    }
}

/// Configured seed, or a fresh one that is logged so the run can be repeated
fn seed(settings: &Settings) -> u64 {
    settings.retrieval.seed.unwrap_or_else(|| {
        let seed: u64 = rand::random();
        tracing::info!(seed, "No seed configured, using a random one");
        seed
    })
}

fn describe(options: &Options, settings: &Settings) -> Result<()> {
    let path = options.input("mesh")?;
    let mesh = load_mesh(path)?;
    let id = options
        .id
        .clone()
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let class = options.class.clone().unwrap_or_default();

    let builder = DescriptorBuilder::new(settings.retrieval.descriptor)?;
    let mut rng = StdRng::seed_from_u64(seed(settings));
    let raw = builder.build(&mesh, &id, &class, &mut rng)?;

    println!("{}", serde_json::to_string_pretty(&raw)?);
    Ok(())
}

fn index(options: &Options, settings: &Settings) -> Result<()> {
    let manifest = options.input("manifest")?;
    let out = options.out.clone().unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&out).with_context(|| format!("creating {}", out.display()))?;

    let entries = load_manifest(manifest)?;
    let build = build_corpus(&entries, &settings.retrieval.descriptor, seed(settings))?;
    write_json(&out.join("failures.json"), &build.failures)?;
    if build.descriptors.is_empty() {
        bail!("No shape in {} could be described", manifest.display());
    }

    let indexed = index_corpus(&build.descriptors, &settings.retrieval)?;
    write_json(&out.join("table.json"), &indexed.table)?;
    write_json(&out.join("stats.json"), &indexed.statistics)?;

    println!(
        "Indexed {}/{} shapes ({} failed) in {} ms -> {}",
        build.stats.succeeded,
        build.stats.total,
        build.stats.failed,
        build.stats.elapsed_ms,
        out.display()
    );
    for failure in &build.failures {
        println!("  skipped {} [{}]: {}", failure.id, failure.class, failure.reason);
    }
    Ok(())
}

fn query(options: &Options, settings: &Settings) -> Result<()> {
    let table: ReferenceTable = read_json(Options::required(&options.table, "--table")?)?;
    table.validate()?;
    let engine = DistanceEngine::new(settings.retrieval.distance.clone())?;
    let k = settings.retrieval.top_k;

    let results = match &options.id {
        Some(id) => rank_by_id(id, &table, &engine, k)?,
        None => {
            let path = options.input("mesh")?;
            let stats: CorpusStatistics = read_json(Options::required(&options.stats, "--stats")?)?;
            stats.validate()?;
            stats.check_table(&table)?;

            // D1 must be drawn the way the corpus was
            let mut descriptor = settings.retrieval.descriptor;
            if descriptor.d1_sampling != stats.d1_sampling {
                tracing::warn!(
                    configured = ?descriptor.d1_sampling,
                    corpus = ?stats.d1_sampling,
                    "Using the corpus D1 sampling for the query"
                );
                descriptor.d1_sampling = stats.d1_sampling;
            }

            let mesh = load_mesh(path)?;
            let builder = DescriptorBuilder::new(descriptor)?;
            let id = path.to_string_lossy();
            let mut rng = StdRng::seed_from_u64(seed(settings));
            let query = prepare_query(&mesh, &id, &builder, &stats, &mut rng)?;
            rank_top_k(&query, &table, &engine, k)?
        }
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }
    Ok(())
}

fn run_evaluation(options: &Options, settings: &Settings) -> Result<()> {
    let table: ReferenceTable = read_json(Options::required(&options.table, "--table")?)?;
    table.validate()?;
    let engine = DistanceEngine::new(settings.retrieval.distance.clone())?;
    let sample_size = options.queries.unwrap_or(100);

    let report = evaluate(&table, &engine, settings.retrieval.top_k, sample_size, seed(settings))?;

    if let Some(out) = &options.out {
        write_json(out, &report)?;
    }
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Evaluated {} queries at k = {} in {} ms",
        report.queries.len(),
        report.k,
        report.elapsed_ms
    );
    println!("  mean precision: {:.4}", report.mean_precision);
    match report.mean_recall {
        Some(recall) => println!("  mean recall:    {:.4}", recall),
        None => println!("  mean recall:    n/a"),
    }
    println!();
    println!("{:<24} {:>8} {:>10} {:>10}", "class", "queries", "precision", "recall");
    for class in &report.per_class {
        let recall = class
            .mean_recall
            .map_or_else(|| "n/a".to_string(), |r| format!("{:.4}", r));
        println!(
            "{:<24} {:>8} {:>10.4} {:>10}",
            class.class, class.queries, class.mean_precision, recall
        );
    }
    Ok(())
}

fn print_results(results: &[DistanceResult]) {
    if results.is_empty() {
        println!("No matches");
        return;
    }
    println!("{:>4}  {:<32} {:<20} {:>12}", "rank", "id", "class", "distance");
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>4}  {:<32} {:<20} {:>12.6}",
            rank + 1,
            result.id,
            result.class,
            result.distance
        );
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn print_usage() {
    println!("ShapeMatch - content-based 3D shape retrieval");
    println!();
    println!("Usage:");
    println!("  shapematch describe <mesh.json> [--id ID] [--class CLASS]");
    println!("  shapematch index <manifest.json> --out <dir>");
    println!("  shapematch query <mesh.json> --table <table.json> --stats <stats.json> [-k N]");
    println!("  shapematch query --id <shape id> --table <table.json> [-k N]");
    println!("  shapematch evaluate --table <table.json> [-k N] [--queries N] [--out report.json]");
    println!();
    println!("Options:");
    println!("  --config <file>          JSON configuration (partial documents allowed)");
    println!("  --samples <N>            Samples per shape function (default: 5000)");
    println!("  --bins <N>               Bins per histogram (default: 40)");
    println!("  -k, --top-k <N>          Number of results (default: 10)");
    println!("  --seed <N>               Base seed for sampling and query selection");
    println!("  --combination <rule>     sum | product (default: sum)");
    println!("  --threads <N>            Worker threads (default: all cores)");
    println!("  --json                   Print results as JSON");
    println!();
    println!("Environment:");
    println!("  SHAPEMATCH_SAMPLES, SHAPEMATCH_BINS, SHAPEMATCH_TOP_K, SHAPEMATCH_SEED,");
    println!("  SHAPEMATCH_COMBINATION, WORKER_THREADS, RUST_LOG");
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapematch_retrieval::RetrievalConfig;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_flags_and_positional() {
        let options = Options::parse(&args(&["mesh.json", "-k", "5", "--json", "--seed", "9"])).unwrap();
        assert_eq!(options.positional, vec!["mesh.json".to_string()]);
        assert_eq!(options.top_k, Some(5));
        assert_eq!(options.seed, Some(9));
        assert!(options.json);
    }

    #[test]
    fn test_parse_rejects_unknown_and_missing_values() {
        assert!(Options::parse(&args(&["--bogus"])).is_err());
        assert!(Options::parse(&args(&["-k"])).is_err());
        assert!(Options::parse(&args(&["-k", "many"])).is_err());
    }

    #[test]
    fn test_flags_override_config_file_over_environment() {
        let mut env_settings = Settings {
            retrieval: RetrievalConfig::default(),
            worker_threads: 2,
        };
        env_settings.retrieval.top_k = 20;
        env_settings.retrieval.descriptor.num_samples = 111;

        let path = std::env::temp_dir().join(format!("shapematch-layering-{}.json", std::process::id()));
        fs::write(
            &path,
            r#"{ "top_k": 7, "descriptor": { "num_bins": 16 }, "distance": { "combination": "sum" } }"#,
        )
        .unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let options =
            Options::parse(&args(&["-k", "3", "--combination", "product", "--config", path_arg.as_str()])).unwrap();
        let settings = options.layer(env_settings).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(settings.retrieval.top_k, 3);
        assert_eq!(settings.retrieval.distance.combination, Combination::Product);
        assert_eq!(settings.retrieval.descriptor.num_bins, 16);
        assert_eq!(settings.retrieval.descriptor.num_samples, 111);
        assert_eq!(settings.worker_threads, 2);
    }
}

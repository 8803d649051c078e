//! Benchmark execution, aggregation and report emission.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use jiff::Timestamp;
use log::{debug, info};

use crate::bench::score::Scores;
use crate::bench::{BenchmarkType, Microbench, bson_encoding, multi_doc, parallel, single_doc};
use crate::builder::basic;
use crate::err::{Error, Result};
use crate::json::document_to_json;
use crate::store::DocumentStore;

const TEST_NAME: &str = "Rust driver microbenchmarks";

struct RegisteredBench {
    bench: Box<dyn Microbench>,
    scores: Option<Scores>,
}

/// Runs the filtered benchmark collection strictly in registration order and
/// aggregates per-category scores. Tasks never execute concurrently with one
/// another; parallelism lives inside individual tasks.
pub struct BenchmarkRunner {
    benches: Vec<RegisteredBench>,
    filter: BTreeSet<String>,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
}

impl BenchmarkRunner {
    /// Registers the full suite against `store`, with fixtures under
    /// `data_dir`, then filters by category tokens. An empty filter keeps
    /// every benchmark; unrecognized tokens match nothing.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        data_dir: &Path,
        filter: BTreeSet<String>,
    ) -> BenchmarkRunner {
        // Task sizes and iteration counts come from the driver performance
        // benchmarking reference.
        let benches: Vec<Box<dyn Microbench>> = vec![
            Box::new(bson_encoding::BsonEncoding::new(
                "TestFlatEncoding",
                75.31,
                data_dir.join("extended_bson/flat_bson.json"),
            )),
            Box::new(bson_encoding::BsonEncoding::new(
                "TestDeepEncoding",
                19.64,
                data_dir.join("extended_bson/deep_bson.json"),
            )),
            Box::new(bson_encoding::BsonEncoding::new(
                "TestFullEncoding",
                57.34,
                data_dir.join("extended_bson/full_bson.json"),
            )),
            Box::new(single_doc::RunCommand::new(Arc::clone(&store))),
            Box::new(single_doc::FindOneById::new(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/tweet.json"),
            )),
            Box::new(single_doc::small_doc_insert_one(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/small_doc.json"),
            )),
            Box::new(single_doc::large_doc_insert_one(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/large_doc.json"),
            )),
            Box::new(multi_doc::FindMany::new(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/tweet.json"),
            )),
            Box::new(multi_doc::small_doc_bulk_insert(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/small_doc.json"),
            )),
            Box::new(multi_doc::large_doc_bulk_insert(
                Arc::clone(&store),
                data_dir.join("single_and_multi_document/large_doc.json"),
            )),
            Box::new(parallel::JsonMultiImport::new(
                Arc::clone(&store),
                data_dir.join("parallel/ldjson_multi"),
            )),
            Box::new(parallel::JsonMultiExport::new(
                Arc::clone(&store),
                data_dir.join("parallel/ldjson_multi"),
            )),
        ];

        BenchmarkRunner::with_benches(benches, filter)
    }

    /// Builds a runner over an explicit benchmark collection. Registration
    /// order is preserved through filtering and reporting.
    pub fn with_benches(
        benches: Vec<Box<dyn Microbench>>,
        filter: BTreeSet<String>,
    ) -> BenchmarkRunner {
        let benches = benches
            .into_iter()
            .filter(|bench| {
                if filter.is_empty() {
                    return true;
                }
                bench
                    .tags()
                    .iter()
                    .any(|tag| filter.contains(tag.token()))
            })
            .map(|bench| RegisteredBench {
                bench,
                scores: None,
            })
            .collect();

        BenchmarkRunner {
            benches,
            filter,
            start_time: None,
            end_time: None,
        }
    }

    pub fn bench_names(&self) -> Vec<&str> {
        self.benches.iter().map(|rb| rb.bench.name()).collect()
    }

    /// Executes every surviving benchmark sequentially, in registration
    /// order. Any failure aborts the whole suite.
    pub fn run_microbenches(&mut self) -> Result<()> {
        self.start_time = Some(Timestamp::now());
        for registered in &mut self.benches {
            println!("Starting {}...", registered.bench.name());
            let scores = execute(registered.bench.as_mut())?;
            let median = scores.median().unwrap_or_default();
            let score = scores
                .score(registered.bench.task_size_mb())
                .unwrap_or_default();
            println!(
                "{}: {} second(s) | {:.2} MB/s\n",
                registered.bench.name(),
                median.as_secs_f64(),
                score
            );
            registered.scores = Some(scores);
        }
        self.end_time = Some(Timestamp::now());
        Ok(())
    }

    /// Arithmetic mean of scores across benchmarks carrying `tag`. `None`
    /// when no surviving benchmark carries it: an empty category is an
    /// explicit "undefined", never a division by zero.
    pub fn calculate_average(&self, tag: BenchmarkType) -> Option<f64> {
        let mut count = 0u32;
        let mut total = 0.0;
        for registered in &self.benches {
            if !registered.bench.has_tag(tag) {
                continue;
            }
            let score = registered
                .scores
                .as_ref()
                .and_then(|s| s.score(registered.bench.task_size_mb()))?;
            count += 1;
            total += score;
        }
        if count == 0 {
            None
        } else {
            Some(total / f64::from(count))
        }
    }

    /// Mean of the read and write category averages, defined only when both
    /// are.
    pub fn calculate_driver_score(&self) -> Option<f64> {
        let read = self.calculate_average(BenchmarkType::Read)?;
        let write = self.calculate_average(BenchmarkType::Write)?;
        Some((read + write) / 2.0)
    }

    /// Prints the per-benchmark and per-category summaries, then persists the
    /// structured report. Only valid after a completed run.
    pub fn write_scores(&self, path: &Path) -> Result<()> {
        let start = self.start_time.ok_or(Error::SuiteIncomplete)?;
        let end = self.end_time.ok_or(Error::SuiteIncomplete)?;

        println!("\nIndividual microbenchmark scores:");
        println!("===========");

        let report = basic::document(|d| {
            d.append_document("info", |info| info.append("test_name", TEST_NAME))?;
            d.append("created_at", format_time(start).as_str())?;
            d.append("completed_at", format_time(end).as_str())?;
            d.append_array("artifacts", |_| Ok(()))?;
            d.append_array("metrics", |metrics| {
                for registered in &self.benches {
                    let scores = registered.scores.as_ref().ok_or(Error::SuiteIncomplete)?;
                    let score = scores
                        .score(registered.bench.task_size_mb())
                        .ok_or(Error::SuiteIncomplete)?;
                    let median = scores.median().unwrap_or_default();

                    println!(
                        "{}: {} seconds | {:.2} MB/s",
                        registered.bench.name(),
                        median.as_secs_f64(),
                        score
                    );

                    metrics.push_document(|m| {
                        m.append("name", registered.bench.name())?;
                        m.append("type", "THROUGHPUT")?;
                        m.append("value", score)
                    })?;
                }
                Ok(())
            })?;
            d.append_array("sub_tests", |_| Ok(()))
        })?;

        println!("\nComposite benchmarks:");
        println!("===========");
        for tag in BenchmarkType::ALL {
            if !self.filter.is_empty() && !self.filter.contains(tag.token()) {
                continue;
            }
            match self.calculate_average(tag) {
                Some(avg) => println!("{} {:.2} MB/s", tag.label(), avg),
                None => println!("{} undefined (no benchmarks in category)", tag.label()),
            }
        }
        if let Some(driver) = self.calculate_driver_score() {
            println!("DriverBench: {driver:.2} MB/s");
        }

        let json = document_to_json(report.as_view())?;
        fs::write(path, format!("[{}]", serde_json::to_string(&json)?))?;
        info!("wrote report to {}", path.display());
        Ok(())
    }
}

/// Drives one benchmark's lifecycle, returning its timing samples.
///
/// `teardown` is attempted whenever `setup` succeeded, even if an iteration
/// failed; the iteration error wins over a teardown error.
fn execute(bench: &mut dyn Microbench) -> Result<Scores> {
    bench.setup()?;

    let run: Result<Scores> = (|| {
        let mut scores = Scores::new();
        for iteration in 0..bench.iterations() {
            bench.before_task()?;
            let start = Instant::now();
            bench.task()?;
            let elapsed = start.elapsed();
            debug!(
                "{} iteration {}: {:?}",
                bench.name(),
                iteration,
                elapsed
            );
            scores.record(elapsed);
        }
        Ok(scores)
    })();

    let teardown = bench.teardown();
    let scores = run?;
    teardown?;
    Ok(scores)
}

fn format_time(ts: Timestamp) -> String {
    ts.strftime("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

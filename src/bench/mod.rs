//! The driver microbenchmark harness.
//!
//! Each benchmark is a [`Microbench`]: a polymorphic unit of work with a
//! `setup` / `before_task` / `task` / `teardown` lifecycle, a declared task
//! size in MB and a set of category tags. The [`runner`] executes benchmarks
//! strictly sequentially, derives a throughput score per benchmark from its
//! median elapsed time and aggregates per-category averages into the
//! `results.json` artifact.

pub mod bson_encoding;
pub mod multi_doc;
pub mod parallel;
pub mod runner;
pub mod score;
pub mod single_doc;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::err::{Error, Result};

pub use runner::BenchmarkRunner;
pub use score::Scores;

/// Default number of timed iterations per benchmark.
pub const DEFAULT_ITERATIONS: u32 = 100;

/// Benchmark categories, used for filtered execution and composite scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BenchmarkType {
    Bson,
    SingleDoc,
    MultiDoc,
    Parallel,
    Read,
    Write,
}

impl BenchmarkType {
    pub const ALL: [BenchmarkType; 6] = [
        BenchmarkType::Bson,
        BenchmarkType::SingleDoc,
        BenchmarkType::MultiDoc,
        BenchmarkType::Parallel,
        BenchmarkType::Read,
        BenchmarkType::Write,
    ];

    /// The token accepted on the command line / filter input.
    pub fn token(self) -> &'static str {
        match self {
            BenchmarkType::Bson => "bson",
            BenchmarkType::SingleDoc => "single",
            BenchmarkType::MultiDoc => "multi",
            BenchmarkType::Parallel => "parallel",
            BenchmarkType::Read => "read",
            BenchmarkType::Write => "write",
        }
    }

    /// Display name used in the composite score summary.
    pub fn label(self) -> &'static str {
        match self {
            BenchmarkType::Bson => "BSONBench",
            BenchmarkType::SingleDoc => "SingleBench",
            BenchmarkType::MultiDoc => "MultiBench",
            BenchmarkType::Parallel => "ParallelBench",
            BenchmarkType::Read => "ReadBench",
            BenchmarkType::Write => "WriteBench",
        }
    }
}

/// Convenience constructor for a benchmark's tag set.
pub fn tags(types: &[BenchmarkType]) -> BTreeSet<BenchmarkType> {
    types.iter().copied().collect()
}

/// One measurable unit of work.
///
/// The runner drives the lifecycle: `setup` once, then per timed iteration
/// `before_task` (untimed) followed by `task` (the sole timed section), and
/// `teardown` once at the end. `teardown` is attempted even when an earlier
/// step failed, provided `setup` completed. `task` must be side-effect
/// isolated so repeated invocation is valid.
pub trait Microbench {
    fn name(&self) -> &str;

    /// Logical data volume processed by one `task` invocation, in MB.
    fn task_size_mb(&self) -> f64;

    fn iterations(&self) -> u32 {
        DEFAULT_ITERATIONS
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType>;

    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    fn before_task(&mut self) -> Result<()> {
        Ok(())
    }

    fn task(&mut self) -> Result<()>;

    fn teardown(&mut self) -> Result<()> {
        Ok(())
    }

    fn has_tag(&self, tag: BenchmarkType) -> bool {
        self.tags().contains(&tag)
    }
}

/// Error for a benchmark whose `task` ran without a completed `setup`.
pub(crate) fn not_set_up(name: &str) -> Error {
    Error::InvalidFixture {
        value: name.to_owned(),
        reason: "task ran before setup".to_owned(),
    }
}

/// Reads a fixture file, mapping the failure to a fatal setup error.
pub(crate) fn read_fixture(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| Error::FixtureMissing {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a JSON fixture.
pub(crate) fn read_json_fixture(path: &Path) -> Result<serde_json::Value> {
    let bytes = read_fixture(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgAction, Command, value_parser};
use log::LevelFilter;

use docbson::bench::BenchmarkRunner;
use docbson::store::MemoryStore;

fn main() -> anyhow::Result<()> {
    let matches = Command::new("driver_bench")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs the driver microbenchmark suite against an in-process store")
        .arg(
            Arg::new("CATEGORIES")
                .action(ArgAction::Append)
                .help(
                    "Benchmark categories to run (bson, single, multi, parallel, read, write). \
                     Runs everything when omitted.",
                ),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .default_value("results.json")
                .help("Path of the JSON results artifact"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_parser(value_parser!(PathBuf))
                .default_value("data")
                .help("Directory containing the benchmark fixture files"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("Sets debug prints level for the application."),
        )
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )
    .context("failed to initialize logging")?;

    let filter: BTreeSet<String> = matches
        .get_many::<String>("CATEGORIES")
        .unwrap_or_default()
        .cloned()
        .collect();

    let output = matches
        .get_one::<PathBuf>("output")
        .expect("has a default value");
    let data_dir = matches
        .get_one::<PathBuf>("data-dir")
        .expect("has a default value");

    let store = Arc::new(MemoryStore::new());
    let mut runner = BenchmarkRunner::new(store, data_dir, filter);

    runner
        .run_microbenches()
        .context("benchmark suite failed")?;
    runner
        .write_scores(output)
        .with_context(|| format!("failed to write results to `{}`", output.display()))?;

    Ok(())
}

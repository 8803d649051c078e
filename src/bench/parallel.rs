//! Parallel benchmarks: LDJSON multi-file import/export.
//!
//! Each task partitions a fixed file set evenly across a configurable worker
//! count, runs one worker per partition on a dedicated pool and joins them
//! inside the timed section, so the measured duration is the wall-clock
//! completion of the slowest partition. Workers read the shared store
//! acquire-per-use and never touch another worker's partition.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use rayon::prelude::*;

use crate::bench::{BenchmarkType, Microbench, not_set_up, read_fixture, tags};
use crate::document::Document;
use crate::err::{Error, Result};
use crate::json::{document_from_json, document_to_json};
use crate::store::DocumentStore;

const IMPORT_COLLECTION: &str = "corpus";
const TASK_SIZE_MB: f64 = 565.0;
const ITERATIONS: u32 = 10;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(4)
}

/// LDJSON fixture files in `dir`, in name order.
fn list_fixture_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|source| Error::FixtureMissing {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(Error::InvalidFixture {
            value: dir.display().to_string(),
            reason: "directory holds no .txt fixture files".to_owned(),
        });
    }
    Ok(files)
}

fn parse_ldjson(bytes: &[u8]) -> Result<Vec<Document>> {
    let text = std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8 { offset: 0 })?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| document_from_json(&serde_json::from_str(line)?))
        .collect()
}

/// Even partitioning: `total` items over at most `workers` chunks.
fn partition_size(total: usize, workers: usize) -> usize {
    total.div_ceil(workers.max(1))
}

fn export_collection(index: usize) -> String {
    format!("ldjson_{index:03}")
}

fn export_file_name(index: usize) -> String {
    format!("ldjson{index:03}.txt")
}

/// `TestJsonMultiImport`: workers parse their partition of LDJSON files and
/// bulk-insert one batch per file.
pub struct JsonMultiImport {
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    dir: PathBuf,
    workers: usize,
    files: Vec<PathBuf>,
}

impl JsonMultiImport {
    pub fn new(store: Arc<dyn DocumentStore>, dir: PathBuf) -> JsonMultiImport {
        JsonMultiImport {
            store,
            tags: tags(&[BenchmarkType::Parallel, BenchmarkType::Write]),
            dir,
            workers: default_workers(),
            files: Vec::new(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> JsonMultiImport {
        self.workers = workers.max(1);
        self
    }
}

impl Microbench for JsonMultiImport {
    fn name(&self) -> &str {
        "TestJsonMultiImport"
    }

    fn task_size_mb(&self) -> f64 {
        TASK_SIZE_MB
    }

    fn iterations(&self) -> u32 {
        ITERATIONS
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        self.files = list_fixture_files(&self.dir)?;
        info!(
            "{}: {} file(s), {} worker(s)",
            self.name(),
            self.files.len(),
            self.workers
        );
        self.store.acquire()?.drop_database()
    }

    fn before_task(&mut self) -> Result<()> {
        self.store.acquire()?.drop_collection(IMPORT_COLLECTION)
    }

    fn task(&mut self) -> Result<()> {
        if self.files.is_empty() {
            return Err(not_set_up(self.name()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let chunk = partition_size(self.files.len(), self.workers);
        let store = &self.store;

        pool.install(|| {
            self.files.par_chunks(chunk).try_for_each(|part| {
                for file in part {
                    let docs = parse_ldjson(&read_fixture(file)?)?;
                    store.acquire()?.insert_many(IMPORT_COLLECTION, &docs)?;
                }
                Ok(())
            })
        })
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

/// `TestJsonMultiExport`: `setup` imports every file into its own collection;
/// workers re-serialize their partition back to one output file per input
/// file.
pub struct JsonMultiExport {
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    dir: PathBuf,
    out_dir: PathBuf,
    workers: usize,
    file_count: usize,
}

impl JsonMultiExport {
    pub fn new(store: Arc<dyn DocumentStore>, dir: PathBuf) -> JsonMultiExport {
        let out_dir = dir.join("tmp");
        JsonMultiExport {
            store,
            tags: tags(&[BenchmarkType::Parallel, BenchmarkType::Read]),
            dir,
            out_dir,
            workers: default_workers(),
            file_count: 0,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> JsonMultiExport {
        self.workers = workers.max(1);
        self
    }

    pub fn with_output_dir(mut self, out_dir: PathBuf) -> JsonMultiExport {
        self.out_dir = out_dir;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.out_dir
    }
}

impl Microbench for JsonMultiExport {
    fn name(&self) -> &str {
        "TestJsonMultiExport"
    }

    fn task_size_mb(&self) -> f64 {
        TASK_SIZE_MB
    }

    fn iterations(&self) -> u32 {
        ITERATIONS
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        let files = list_fixture_files(&self.dir)?;
        let mut conn = self.store.acquire()?;
        conn.drop_database()?;
        for (index, file) in files.iter().enumerate() {
            let docs = parse_ldjson(&read_fixture(file)?)?;
            conn.insert_many(&export_collection(index), &docs)?;
        }
        self.file_count = files.len();
        info!(
            "{}: seeded {} collection(s), {} worker(s)",
            self.name(),
            self.file_count,
            self.workers
        );
        Ok(())
    }

    fn before_task(&mut self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)?;
        for index in 0..self.file_count {
            let path = self.out_dir.join(export_file_name(index));
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn task(&mut self) -> Result<()> {
        if self.file_count == 0 {
            return Err(not_set_up(self.name()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let indices: Vec<usize> = (0..self.file_count).collect();
        let chunk = partition_size(indices.len(), self.workers);
        let store = &self.store;
        let out_dir = &self.out_dir;

        pool.install(|| {
            indices.par_chunks(chunk).try_for_each(|part| {
                for &index in part {
                    let docs = store.acquire()?.find_all(&export_collection(index))?;
                    let path = out_dir.join(export_file_name(index));
                    debug!("exporting {} document(s) to {}", docs.len(), path.display());

                    let mut out = std::io::BufWriter::new(fs::File::create(path)?);
                    for doc in &docs {
                        serde_json::to_writer(&mut out, &document_to_json(doc.as_view())?)?;
                        out.write_all(b"\n")?;
                    }
                    out.flush()?;
                }
                Ok(())
            })
        })
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_size_is_even_ceiling() {
        assert_eq!(partition_size(50, 4), 13);
        assert_eq!(partition_size(50, 1), 50);
        assert_eq!(partition_size(4, 8), 1);
        assert_eq!(partition_size(0, 4), 0);
    }

    #[test]
    fn test_parse_ldjson_skips_blank_lines() {
        let docs = parse_ldjson(b"{\"a\":1}\n\n{\"a\":2}\n").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        assert!(matches!(
            list_fixture_files(Path::new("/nonexistent/ldjson_multi")),
            Err(Error::FixtureMissing { .. })
        ));
    }
}

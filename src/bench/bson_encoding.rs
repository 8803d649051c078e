//! BSON encoding benchmarks: build the fixture document from its parsed JSON
//! form 10,000 times per task.

use std::collections::BTreeSet;
use std::hint::black_box;
use std::path::PathBuf;

use crate::bench::{BenchmarkType, Microbench, not_set_up, read_json_fixture, tags};
use crate::err::Result;
use crate::json::document_from_json;

const ENCODINGS_PER_TASK: u32 = 10_000;

pub struct BsonEncoding {
    name: String,
    task_size_mb: f64,
    tags: BTreeSet<BenchmarkType>,
    fixture: PathBuf,
    parsed: Option<serde_json::Value>,
}

impl BsonEncoding {
    pub fn new(name: &str, task_size_mb: f64, fixture: PathBuf) -> BsonEncoding {
        BsonEncoding {
            name: name.to_owned(),
            task_size_mb,
            tags: tags(&[BenchmarkType::Bson]),
            fixture,
            parsed: None,
        }
    }

    fn parsed(&self) -> Result<&serde_json::Value> {
        self.parsed.as_ref().ok_or_else(|| not_set_up(&self.name))
    }
}

impl Microbench for BsonEncoding {
    fn name(&self) -> &str {
        &self.name
    }

    fn task_size_mb(&self) -> f64 {
        self.task_size_mb
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        self.parsed = Some(read_json_fixture(&self.fixture)?);
        Ok(())
    }

    fn task(&mut self) -> Result<()> {
        let parsed = self.parsed()?;
        for _ in 0..ENCODINGS_PER_TASK {
            black_box(document_from_json(parsed)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::Error;

    #[test]
    fn test_missing_fixture_is_fatal() {
        let mut bench = BsonEncoding::new("TestFlatEncoding", 75.31, PathBuf::from("/nonexistent"));
        assert!(matches!(
            bench.setup(),
            Err(Error::FixtureMissing { .. })
        ));
    }
}

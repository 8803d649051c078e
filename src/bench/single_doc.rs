//! Single-document benchmarks: command round-trips, `_id` point reads and
//! one-at-a-time inserts.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::bench::{
    BenchmarkType, DEFAULT_ITERATIONS, Microbench, not_set_up, read_json_fixture, tags,
};
use crate::builder::basic;
use crate::document::Document;
use crate::err::{Error, Result};
use crate::json::document_from_json;
use crate::store::DocumentStore;

pub(crate) const COLLECTION: &str = "corpus";
pub(crate) const DOCS_PER_TASK: u32 = 10_000;

/// Rebuilds `doc` with a leading int32 `_id` element.
pub(crate) fn with_id(doc: &Document, id: i32) -> Result<Document> {
    basic::document(|d| {
        d.append("_id", id)?;
        for element in doc.as_view().iter() {
            let (key, value) = element?;
            d.append(key, value)?;
        }
        Ok(())
    })
}

pub(crate) fn fixture_document(path: &PathBuf) -> Result<Document> {
    document_from_json(&read_json_fixture(path)?)
}

/// `TestRunCommand`: issue a trivial command 10,000 times per task.
pub struct RunCommand {
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    command: Option<Document>,
}

impl RunCommand {
    pub fn new(store: Arc<dyn DocumentStore>) -> RunCommand {
        RunCommand {
            store,
            tags: tags(&[BenchmarkType::SingleDoc]),
            command: None,
        }
    }
}

impl Microbench for RunCommand {
    fn name(&self) -> &str {
        "TestRunCommand"
    }

    fn task_size_mb(&self) -> f64 {
        0.13
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        self.command = Some(basic::document(|d| d.append("hello", true))?);
        Ok(())
    }

    fn task(&mut self) -> Result<()> {
        let command = self
            .command
            .as_ref()
            .ok_or_else(|| not_set_up("TestRunCommand"))?;
        let mut conn = self.store.acquire()?;
        for _ in 0..DOCS_PER_TASK {
            conn.run_command(command.as_view())?;
        }
        Ok(())
    }
}

/// `TestFindOneById`: 10,000 sequential point reads against a pre-seeded
/// collection.
pub struct FindOneById {
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    fixture: PathBuf,
}

impl FindOneById {
    pub fn new(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> FindOneById {
        FindOneById {
            store,
            tags: tags(&[BenchmarkType::SingleDoc, BenchmarkType::Read]),
            fixture,
        }
    }
}

impl Microbench for FindOneById {
    fn name(&self) -> &str {
        "TestFindOneById"
    }

    fn task_size_mb(&self) -> f64 {
        16.22
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        let doc = fixture_document(&self.fixture)?;
        let mut conn = self.store.acquire()?;
        conn.drop_database()?;
        let docs: Vec<Document> = (1..=DOCS_PER_TASK as i32)
            .map(|id| with_id(&doc, id))
            .collect::<Result<_>>()?;
        conn.insert_many(COLLECTION, &docs)?;
        debug!("seeded {} documents for {}", docs.len(), self.name());
        Ok(())
    }

    fn task(&mut self) -> Result<()> {
        let mut conn = self.store.acquire()?;
        for id in 1..=DOCS_PER_TASK as i32 {
            conn.find_by_id(COLLECTION, id)?
                .ok_or(Error::CollectionNotFound {
                    name: COLLECTION.to_owned(),
                })?;
        }
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

/// `TestSmallDocInsertOne` / `TestLargeDocInsertOne`: insert the fixture
/// document one call at a time.
pub struct InsertOne {
    name: String,
    task_size_mb: f64,
    iterations: u32,
    docs_per_task: u32,
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    fixture: PathBuf,
    doc: Option<Document>,
}

impl InsertOne {
    pub fn new(
        name: &str,
        task_size_mb: f64,
        iterations: u32,
        docs_per_task: u32,
        store: Arc<dyn DocumentStore>,
        fixture: PathBuf,
    ) -> InsertOne {
        InsertOne {
            name: name.to_owned(),
            task_size_mb,
            iterations,
            docs_per_task,
            store,
            tags: tags(&[BenchmarkType::SingleDoc, BenchmarkType::Write]),
            fixture,
            doc: None,
        }
    }
}

impl Microbench for InsertOne {
    fn name(&self) -> &str {
        &self.name
    }

    fn task_size_mb(&self) -> f64 {
        self.task_size_mb
    }

    fn iterations(&self) -> u32 {
        self.iterations
    }

    fn tags(&self) -> &BTreeSet<BenchmarkType> {
        &self.tags
    }

    fn setup(&mut self) -> Result<()> {
        self.doc = Some(fixture_document(&self.fixture)?);
        self.store.acquire()?.drop_database()
    }

    fn before_task(&mut self) -> Result<()> {
        // Fresh collection per timed iteration.
        self.store.acquire()?.drop_collection(COLLECTION)
    }

    fn task(&mut self) -> Result<()> {
        let doc = self.doc.as_ref().ok_or_else(|| not_set_up(&self.name))?;
        let mut conn = self.store.acquire()?;
        for _ in 0..self.docs_per_task {
            conn.insert_one(COLLECTION, doc.as_view())?;
        }
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

pub fn small_doc_insert_one(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> InsertOne {
    InsertOne::new(
        "TestSmallDocInsertOne",
        2.75,
        DEFAULT_ITERATIONS,
        DOCS_PER_TASK,
        store,
        fixture,
    )
}

pub fn large_doc_insert_one(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> InsertOne {
    InsertOne::new("TestLargeDocInsertOne", 27.31, 10, 10, store, fixture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::Value;

    #[test]
    fn test_with_id_prepends_id() {
        let doc = basic::document(|d| d.append("a", 1i32)).unwrap();
        let tagged = with_id(&doc, 42).unwrap();
        let first = tagged.as_view().iter().next().unwrap().unwrap();
        assert_eq!(first, ("_id", Value::Int32(42)));
        assert_eq!(tagged.as_view().get("a"), Some(Value::Int32(1)));
    }

    #[test]
    fn test_run_command_task_round_trips() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let mut bench = RunCommand::new(store);
        bench.setup().unwrap();
        bench.task().unwrap();
    }
}

//! Multi-document benchmarks: full cursor drains and bulk inserts.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use crate::bench::single_doc::{COLLECTION, DOCS_PER_TASK, fixture_document, with_id};
use crate::bench::{BenchmarkType, DEFAULT_ITERATIONS, Microbench, not_set_up, tags};
use crate::document::Document;
use crate::err::{Error, Result};
use crate::store::DocumentStore;

/// `TestFindManyAndEmptyCursor`: drain the whole pre-seeded collection once
/// per task.
pub struct FindMany {
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    fixture: PathBuf,
}

impl FindMany {
    pub fn new(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> FindMany {
        FindMany {
            store,
            tags: tags(&[BenchmarkType::MultiDoc, BenchmarkType::Read]),
            fixture,
        }
    }
}

impl Microbench for FindMany {
    fn name(&self) -> &str {
        "TestFindManyAndEmptyCursor"
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
        let docs = conn.find_all(COLLECTION)?;
        if docs.len() != DOCS_PER_TASK as usize {
            return Err(Error::InvalidFixture {
                value: COLLECTION.to_owned(),
                reason: format!("expected {} documents, found {}", DOCS_PER_TASK, docs.len()),
            });
        }
        // Decode every document, mirroring a full cursor drain.
        for doc in &docs {
            for element in doc.as_view().iter() {
                element?;
            }
        }
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

/// `TestSmallDocBulkInsert` / `TestLargeDocBulkInsert`: insert the whole
/// batch with one call.
pub struct BulkInsert {
    name: String,
    task_size_mb: f64,
    iterations: u32,
    store: Arc<dyn DocumentStore>,
    tags: BTreeSet<BenchmarkType>,
    fixture: PathBuf,
    batch: Vec<Document>,
    batch_size: u32,
}

impl BulkInsert {
    pub fn new(
        name: &str,
        task_size_mb: f64,
        iterations: u32,
        batch_size: u32,
        store: Arc<dyn DocumentStore>,
        fixture: PathBuf,
    ) -> BulkInsert {
        BulkInsert {
            name: name.to_owned(),
            task_size_mb,
            iterations,
            store,
            tags: tags(&[BenchmarkType::MultiDoc, BenchmarkType::Write]),
            fixture,
            batch: Vec::new(),
            batch_size,
        }
    }
}

impl Microbench for BulkInsert {
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
        let doc = fixture_document(&self.fixture)?;
        self.batch = vec![doc; self.batch_size as usize];
        self.store.acquire()?.drop_database()
    }

    fn before_task(&mut self) -> Result<()> {
        self.store.acquire()?.drop_collection(COLLECTION)
    }

    fn task(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Err(not_set_up(&self.name));
        }
        self.store.acquire()?.insert_many(COLLECTION, &self.batch)
    }

    fn teardown(&mut self) -> Result<()> {
        self.store.acquire()?.drop_database()
    }
}

pub fn small_doc_bulk_insert(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> BulkInsert {
    BulkInsert::new(
        "TestSmallDocBulkInsert",
        2.75,
        DEFAULT_ITERATIONS,
        DOCS_PER_TASK,
        store,
        fixture,
    )
}

pub fn large_doc_bulk_insert(store: Arc<dyn DocumentStore>, fixture: PathBuf) -> BulkInsert {
    BulkInsert::new("TestLargeDocBulkInsert", 27.31, 10, 10, store, fixture)
}

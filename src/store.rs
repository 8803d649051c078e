//! The opaque document-store capability consumed by the benchmark tasks.
//!
//! The real wire protocol, pooling and server discovery live in a lower
//! layer that is out of scope here; benchmarks only need "acquire a
//! connection", "read/write documents" and "stream bytes to/from a blob
//! bucket". `MemoryStore` is the in-process backend used by the harness and
//! the tests. Connections follow an acquire-per-use discipline: each call
//! locks the shared state for its own duration only, so parallel workers
//! never serialize on a long-held lock.

use std::sync::{Arc, RwLock};

use hashbrown::HashMap;
use log::debug;

use crate::builder::basic;
use crate::document::{Document, DocumentView};
use crate::err::{Error, Result};
use crate::value::Value;

pub trait DocumentStore: Send + Sync {
    /// Acquires a connection from the pool.
    fn acquire(&self) -> Result<Box<dyn Connection + '_>>;
}

pub trait Connection {
    /// Round-trips a command document, returning the server reply.
    fn run_command(&mut self, command: DocumentView<'_>) -> Result<Document>;

    fn insert_one(&mut self, collection: &str, doc: DocumentView<'_>) -> Result<()>;

    fn insert_many(&mut self, collection: &str, docs: &[Document]) -> Result<()>;

    /// Point lookup on the `_id` element (int32 ids only).
    fn find_by_id(&mut self, collection: &str, id: i32) -> Result<Option<Document>>;

    /// Full scan, in insertion order.
    fn find_all(&mut self, collection: &str) -> Result<Vec<Document>>;

    fn drop_collection(&mut self, collection: &str) -> Result<()>;

    fn drop_database(&mut self) -> Result<()>;

    /// Stores a named blob, returning its id.
    fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<u64>;

    fn download(&mut self, id: u64) -> Result<Vec<u8>>;
}

#[derive(Default)]
struct Collection {
    docs: Vec<Document>,
    by_id: HashMap<i32, usize>,
}

#[derive(Default)]
struct StoreInner {
    collections: HashMap<String, Collection>,
    blobs: HashMap<u64, (String, Vec<u8>)>,
    next_blob_id: u64,
}

/// In-memory backend. Cloning shares the underlying state.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl DocumentStore for MemoryStore {
    fn acquire(&self) -> Result<Box<dyn Connection + '_>> {
        Ok(Box::new(MemoryConnection { store: self }))
    }
}

struct MemoryConnection<'a> {
    store: &'a MemoryStore,
}

impl MemoryConnection<'_> {
    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.store
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.store
            .inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn extract_id(doc: DocumentView<'_>) -> Option<i32> {
    match doc.get("_id") {
        Some(Value::Int32(id)) => Some(id),
        _ => None,
    }
}

impl Connection for MemoryConnection<'_> {
    fn run_command(&mut self, command: DocumentView<'_>) -> Result<Document> {
        // Any well-formed command is acknowledged; this backend has no
        // server-side semantics.
        debug!(
            "run_command: {} byte(s)",
            command.as_bytes().len()
        );
        basic::document(|d| d.append("ok", 1.0f64))
    }

    fn insert_one(&mut self, collection: &str, doc: DocumentView<'_>) -> Result<()> {
        let mut inner = self.write();
        let coll = inner.collections.entry_ref(collection).or_default();
        if let Some(id) = extract_id(doc) {
            coll.by_id.insert(id, coll.docs.len());
        }
        coll.docs.push(doc.to_document());
        Ok(())
    }

    fn insert_many(&mut self, collection: &str, docs: &[Document]) -> Result<()> {
        let mut inner = self.write();
        let coll = inner.collections.entry_ref(collection).or_default();
        coll.docs.reserve(docs.len());
        for doc in docs {
            if let Some(id) = extract_id(doc.as_view()) {
                coll.by_id.insert(id, coll.docs.len());
            }
            coll.docs.push(doc.clone());
        }
        Ok(())
    }

    fn find_by_id(&mut self, collection: &str, id: i32) -> Result<Option<Document>> {
        let inner = self.read();
        let coll = inner
            .collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound {
                name: collection.to_owned(),
            })?;
        Ok(coll.by_id.get(&id).map(|&idx| coll.docs[idx].clone()))
    }

    fn find_all(&mut self, collection: &str) -> Result<Vec<Document>> {
        let inner = self.read();
        let coll = inner
            .collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound {
                name: collection.to_owned(),
            })?;
        Ok(coll.docs.clone())
    }

    fn drop_collection(&mut self, collection: &str) -> Result<()> {
        self.write().collections.remove(collection);
        Ok(())
    }

    fn drop_database(&mut self) -> Result<()> {
        let mut inner = self.write();
        inner.collections.clear();
        inner.blobs.clear();
        Ok(())
    }

    fn upload(&mut self, name: &str, bytes: &[u8]) -> Result<u64> {
        let mut inner = self.write();
        let id = inner.next_blob_id;
        inner.next_blob_id += 1;
        inner.blobs.insert(id, (name.to_owned(), bytes.to_vec()));
        Ok(id)
    }

    fn download(&mut self, id: u64) -> Result<Vec<u8>> {
        let inner = self.read();
        inner
            .blobs
            .get(&id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or(Error::BlobNotFound { id })
    }
}

//! In-process [`DocumentStore`] for exercising migrations without a database.

use crate::{
    Error, Result,
    documents::Document,
    patch::Patch,
    store::DocumentStore,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

pub use crate::schema::ensure_documents_table;

type Collection = BTreeMap<String, Map<String, Value>>;

/// Documents kept in memory, ordered by id within each collection.
///
/// Records every single-document read and the size of every commit so tests
/// can assert on store traffic.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Collection>>,
    gets: Mutex<Vec<(String, String)>>,
    commits: Mutex<Vec<usize>>,
    fail_commit: Mutex<Option<usize>>,
    scans: Mutex<usize>,
    fail_scan: Mutex<Option<usize>>,
    fail_get: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. Non-object values are stored as empty documents.
    pub fn insert(&self, collection: &str, id: &str, doc: Value) {
        let fields = Document::from_value(id, doc).fields;
        self.collections
            .lock()
            .expect("memory store poisoned")
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), fields);
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Value> {
        self.collections
            .lock()
            .expect("memory store poisoned")
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Value::Object(fields.clone()))
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .expect("memory store poisoned")
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Number of single-document reads against `collection` (scans excluded).
    pub fn gets(&self, collection: &str) -> usize {
        self.gets
            .lock()
            .expect("memory store poisoned")
            .iter()
            .filter(|(c, _)| c == collection)
            .count()
    }

    /// Size of each successful commit, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.commits.lock().expect("memory store poisoned").clone()
    }

    /// Make the `nth` page request (1-based, counted across all collections) fail.
    pub fn fail_scan(&self, nth: usize) {
        *self.fail_scan.lock().expect("memory store poisoned") = Some(nth);
    }

    /// Make every single-document read of `id` fail, in any collection.
    pub fn fail_get(&self, id: &str) {
        *self.fail_get.lock().expect("memory store poisoned") = Some(id.to_string());
    }

    /// Make the `nth` commit attempt (1-based) fail without writing anything.
    pub fn fail_commit(&self, nth: usize) {
        *self.fail_commit.lock().expect("memory store poisoned") = Some(nth);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn scan_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let attempt = {
            let mut scans = self.scans.lock().expect("memory store poisoned");
            *scans += 1;
            *scans
        };
        if *self.fail_scan.lock().expect("memory store poisoned") == Some(attempt) {
            return Err(transport_error(format!("scan of `{collection}` dropped")));
        }
        let collections = self.collections.lock().expect("memory store poisoned");
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|(id, _)| after.is_none_or(|a| id.as_str() > a))
            .take(limit)
            .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.gets
            .lock()
            .expect("memory store poisoned")
            .push((collection.to_string(), id.to_string()));
        if self.fail_get.lock().expect("memory store poisoned").as_deref() == Some(id) {
            return Err(transport_error(format!("read of {collection}/{id} dropped")));
        }
        Ok(self
            .collections
            .lock()
            .expect("memory store poisoned")
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn commit(&self, collection: &str, writes: &[(String, Patch)]) -> Result<usize> {
        let attempt = {
            let commits = self.commits.lock().expect("memory store poisoned");
            commits.len() + 1
        };
        if *self.fail_commit.lock().expect("memory store poisoned") == Some(attempt) {
            return Err(Error::CommitFailed {
                collection: collection.to_string(),
                size: writes.len(),
                reason: "injected failure".into(),
            });
        }

        let mut collections = self.collections.lock().expect("memory store poisoned");
        let docs = collections.entry(collection.to_string()).or_default();
        if let Some((missing, _)) = writes.iter().find(|(id, _)| !docs.contains_key(id)) {
            return Err(Error::DocNotFound {
                collection: collection.to_string(),
                id: missing.clone(),
            });
        }
        for (id, patch) in writes {
            if let Some(fields) = docs.get_mut(id) {
                patch.apply(fields);
            }
        }
        self.commits
            .lock()
            .expect("memory store poisoned")
            .push(writes.len());
        Ok(writes.len())
    }
}

fn transport_error(msg: String) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::ConnectionReset, msg))
}

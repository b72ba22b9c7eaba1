use crate::{Result, documents::Document, store::DocumentStore};
use std::collections::HashMap;
use tracing::debug;

/// Per-run memo of documents fetched from the lookup collection.
///
/// Hits never touch the store. A miss that resolves to "not found" is not
/// remembered, so the next reference fetches again.
pub struct LookupCache<'s> {
    store: &'s dyn DocumentStore,
    collection: String,
    entries: HashMap<String, Document>,
    fetches: usize,
}

impl<'s> LookupCache<'s> {
    pub fn new(store: &'s dyn DocumentStore, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
            entries: HashMap::new(),
            fetches: 0,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub async fn fetch(&mut self, id: &str) -> Result<Option<&Document>> {
        if !self.entries.contains_key(id) {
            self.fetches += 1;
            match self.store.get(&self.collection, id).await? {
                Some(doc) => {
                    debug!(collection = %self.collection, id, "lookup cached");
                    self.entries.insert(id.to_string(), doc);
                }
                None => return Ok(None),
            }
        }
        Ok(self.entries.get(id))
    }

    /// Store reads performed so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

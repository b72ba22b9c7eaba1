use crate::{Error, Result, documents::Document, patch::Patch};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

/// The remote document store a migration reads from and writes to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Up to `limit` documents of `collection` whose id sorts after `after`.
    async fn scan_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Apply every patch or none of them. Returns the number of documents written.
    async fn commit(&self, collection: &str, writes: &[(String, Patch)]) -> Result<usize>;
}

/// Cursor over every document of one collection, fetched page by page.
pub struct Scan<'s> {
    store: &'s dyn DocumentStore,
    collection: String,
    page_size: usize,
    buffered: VecDeque<Document>,
    last_id: Option<String>,
    exhausted: bool,
}

impl<'s> Scan<'s> {
    pub fn new(store: &'s dyn DocumentStore, collection: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            collection: collection.into(),
            page_size: page_size.max(1),
            buffered: VecDeque::new(),
            last_id: None,
            exhausted: false,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Document>> {
        if self.buffered.is_empty() && !self.exhausted {
            let page = self
                .store
                .scan_page(&self.collection, self.last_id.as_deref(), self.page_size)
                .await?;
            if page.len() < self.page_size {
                self.exhausted = true;
            }
            if let Some(last) = page.last() {
                self.last_id = Some(last.id.clone());
            }
            debug!(collection = %self.collection, fetched = page.len(), "scan page");
            self.buffered.extend(page);
        }
        Ok(self.buffered.pop_front())
    }
}

/// Postgres-backed document store. Documents live in one `documents` table
/// keyed by `(collection, id)`.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    pub fn builder(url: impl Into<String>) -> StoreBuilder {
        StoreBuilder::new(url)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace a whole document. Used for seeding; migrations only patch.
    pub async fn upsert<T: Serialize>(&self, collection: &str, id: &str, doc: &T) -> Result<i32> {
        let json = serde_json::to_value(doc)?;
        let version: i32 = sqlx::query_scalar(
            r#"
            insert into documents (collection, id, doc, version)
            values ($1, $2, $3, 1)
            on conflict (collection, id) do update
              set doc = excluded.doc,
                  version = documents.version + 1,
                  updated_at = now()
            returning version
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&json)
        .fetch_one(&self.pool)
        .await?;
        Ok(version)
    }
}

#[async_trait]
impl DocumentStore for Store {
    async fn scan_page(
        &self,
        collection: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Document>> {
        let rows: Vec<(String, Value)> = sqlx::query_as(
            r#"select id, doc from documents
                where collection = $1 and ($2::text is null or id > $2)
                order by id
                limit $3"#,
        )
        .bind(collection)
        .bind(after)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, doc)| Document::from_value(id, doc))
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let doc: Option<Value> =
            sqlx::query_scalar("select doc from documents where collection = $1 and id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(doc.map(|d| Document::from_value(id, d)))
    }

    async fn commit(&self, collection: &str, writes: &[(String, Patch)]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for (id, patch) in writes {
            let deletes = patch.deletes();
            let sets = Value::Object(patch.sets());
            let res = sqlx::query(
                r#"update documents
                      set doc = (doc - $3::text[]) || $4::jsonb,
                          version = version + 1,
                          updated_at = now()
                    where collection = $1 and id = $2"#,
            )
            .bind(collection)
            .bind(id)
            .bind(&deletes)
            .bind(&sets)
            .execute(&mut *tx)
            .await?;
            if res.rows_affected() == 0 {
                // dropping the transaction rolls back the rest of the batch
                return Err(Error::DocNotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                });
            }
        }
        tx.commit().await?;
        Ok(writes.len())
    }
}

pub struct StoreBuilder {
    url: String,
    max_connections: Option<u32>,
    connect_timeout: Option<Duration>,
}

impl StoreBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            connect_timeout: None,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max.max(1));
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn build(self) -> Result<Store> {
        let mut opts = PgPoolOptions::new();
        if let Some(max) = self.max_connections {
            opts = opts.max_connections(max);
        }
        if let Some(t) = self.connect_timeout {
            opts = opts.acquire_timeout(t);
        }
        let pool = opts.connect(&self.url).await?;
        Ok(Store { pool })
    }
}

use crate::{
    Error, Result,
    batch::BatchWriter,
    cache::LookupCache,
    documents::Document,
    error::{DocumentError, PlanError, WithContext},
    patch::Patch,
    store::{DocumentStore, Scan},
};
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Upper bound on patches per commit; the store rejects larger batches.
pub const MAX_BATCH_SIZE: usize = 500;

/// One field-mapping migration over a source collection.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> &str;

    /// Collection whose documents are scanned and patched.
    fn source(&self) -> &str;

    /// Collection consulted through the lookup cache.
    fn lookup(&self) -> &str {
        self.source()
    }

    fn default_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    /// Patch that brings `doc` to the target schema, or `None` when it already conforms.
    async fn plan(
        &self,
        doc: &Document,
        lookup: &mut LookupCache<'_>,
    ) -> std::result::Result<Option<Patch>, PlanError>;
}

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Overrides the migration's default batch size. Clamped to `1..=MAX_BATCH_SIZE`.
    pub batch_size: Option<usize>,
    pub page_size: usize,
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            page_size: 300,
            dry_run: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentFailure {
    pub id: String,
    pub error: DocumentError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    pub commits: usize,
    pub failures: Vec<DocumentFailure>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updated {}, skipped {}, errors {} in {} commit(s)",
            self.updated, self.skipped, self.errors, self.commits
        )
    }
}

pub struct MigrationRunner<S> {
    store: S,
    config: RunnerConfig,
}

impl<S: DocumentStore> MigrationRunner<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, RunnerConfig::default())
    }

    pub fn with_config(store: S, config: RunnerConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Scan the source collection once, staging and committing patches.
    ///
    /// Per-document data errors are counted and the scan continues. Scan,
    /// lookup transport and commit failures abort with [`Error::Aborted`],
    /// which carries the counts gathered up to that point.
    #[instrument(skip_all, fields(migration = migration.name(), source = migration.source(), dry_run = self.config.dry_run))]
    pub async fn run<M: Migration + ?Sized>(&self, migration: &M) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        match self.run_inner(migration, &mut summary).await {
            Ok(()) => {
                info!(%summary, "migration finished");
                Ok(summary)
            }
            Err(source) => {
                warn!(%summary, error = %source, "migration aborted");
                Err(Error::Aborted {
                    migration: migration.name().to_string(),
                    summary,
                    source: Box::new(source),
                })
            }
        }
    }

    fn batch_size<M: Migration + ?Sized>(&self, migration: &M) -> usize {
        self.config
            .batch_size
            .unwrap_or_else(|| migration.default_batch_size())
            .clamp(1, MAX_BATCH_SIZE)
    }

    async fn run_inner<M: Migration + ?Sized>(
        &self,
        migration: &M,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let store: &dyn DocumentStore = &self.store;
        let threshold = self.batch_size(migration);
        let mut scan = Scan::new(store, migration.source(), self.config.page_size);
        let mut lookup = LookupCache::new(store, migration.lookup());
        let mut batch =
            BatchWriter::new(store, migration.source(), threshold).dry_run(self.config.dry_run);

        info!(threshold, "migration started");

        while let Some(doc) = scan
            .next()
            .await
            .context(format!("scanning `{}`", migration.source()))?
        {
            match migration.plan(&doc, &mut lookup).await {
                Ok(Some(patch)) if !patch.is_empty() => {
                    debug!(id = %doc.id, fields = patch.len(), "patch staged");
                    summary.updated += 1;
                    batch.stage(doc.id, patch).await?;
                    summary.commits = batch.commits();
                }
                Ok(_) => {
                    debug!(id = %doc.id, "nothing to migrate");
                    summary.skipped += 1;
                }
                Err(PlanError::Document(error)) => {
                    match error.missing_key() {
                        Some(key) => warn!(id = %doc.id, key, %error, "document left unmodified"),
                        None => warn!(id = %doc.id, %error, "document left unmodified"),
                    }
                    summary.errors += 1;
                    summary.failures.push(DocumentFailure { id: doc.id, error });
                }
                Err(PlanError::Store(e)) => {
                    return Err(Error::Context {
                        context: format!("looking up `{}` for {}", lookup.collection(), doc.id),
                        source: Box::new(e),
                    });
                }
            }
        }

        batch.flush().await?;
        summary.commits = batch.commits();
        debug!(lookups = lookup.fetches(), cached = lookup.len(), "lookup cache stats");
        Ok(())
    }
}

use crate::{Result, patch::Patch, store::DocumentStore};
use tracing::info;

/// Accumulates patches for one collection and commits them in bounded,
/// all-or-nothing batches.
pub struct BatchWriter<'s> {
    store: &'s dyn DocumentStore,
    collection: String,
    threshold: usize,
    dry_run: bool,
    pending: Vec<(String, Patch)>,
    commits: usize,
}

impl<'s> BatchWriter<'s> {
    pub fn new(store: &'s dyn DocumentStore, collection: impl Into<String>, threshold: usize) -> Self {
        Self {
            store,
            collection: collection.into(),
            threshold: threshold.max(1),
            dry_run: false,
            pending: Vec::new(),
            commits: 0,
        }
    }

    /// Plan only: flushes drop the staged patches instead of writing them.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Stage a patch; commits the batch once it reaches the threshold.
    pub async fn stage(&mut self, id: String, patch: Patch) -> Result<Option<FlushOutcome>> {
        self.pending.push((id, patch));
        if self.pending.len() >= self.threshold {
            return self.flush().await.map(Some);
        }
        Ok(None)
    }

    pub async fn flush(&mut self) -> Result<FlushOutcome> {
        if self.pending.is_empty() {
            return Ok(FlushOutcome::default());
        }
        let writes = std::mem::take(&mut self.pending);
        if self.dry_run {
            info!(collection = %self.collection, size = writes.len(), "dry run, batch discarded");
            return Ok(FlushOutcome {
                size: writes.len(),
                committed: false,
            });
        }
        info!(collection = %self.collection, size = writes.len(), "committing batch");
        let written = self.store.commit(&self.collection, &writes).await?;
        self.commits += 1;
        info!(collection = %self.collection, written, "batch committed");
        Ok(FlushOutcome {
            size: written,
            committed: true,
        })
    }

    pub fn commits(&self) -> usize {
        self.commits
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub size: usize,
    pub committed: bool,
}

use crate::runner::RunSummary;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document {collection}/{id} not found")]
    DocNotFound { collection: String, id: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("batch commit of {size} patches to `{collection}` failed: {reason}")]
    CommitFailed {
        collection: String,
        size: usize,
        reason: String,
    },
    #[error("migration `{migration}` aborted ({summary}): {source}")]
    Aborted {
        migration: String,
        summary: RunSummary,
        #[source]
        source: Box<Error>,
    },
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

pub trait WithContext<T> {
    fn context(self, msg: impl Into<String>) -> Result<T>;
}

impl<T> WithContext<T> for Result<T> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Context {
            context: msg.into(),
            source: Box::new(e),
        })
    }
}

/// Per-document data problem. Counted and logged by the runner; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("missing required field `{field}`")]
    MissingReference { field: String },
    #[error("referenced {collection} document `{id}` not found")]
    ForeignNotFound { collection: String, id: String },
    #[error("round `{round_id}` not found in product `{product_id}`")]
    RoundNotFound { product_id: String, round_id: String },
    #[error("document does not match the expected shape: {reason}")]
    Malformed { reason: String },
}

impl DocumentError {
    pub fn missing(field: impl Into<String>) -> Self {
        DocumentError::MissingReference {
            field: field.into(),
        }
    }

    /// The key whose absence caused the failure, for log context.
    pub fn missing_key(&self) -> Option<&str> {
        match self {
            DocumentError::MissingReference { field } => Some(field.as_str()),
            DocumentError::ForeignNotFound { id, .. } => Some(id.as_str()),
            DocumentError::RoundNotFound { round_id, .. } => Some(round_id.as_str()),
            DocumentError::Malformed { .. } => None,
        }
    }
}

/// Outcome of planning one document that did not produce a patch decision.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Store(#[from] Error),
}

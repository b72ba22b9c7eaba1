//! catalog-migrate — batched, idempotent field migrations for the `orders` and
//! `products` document collections.

pub mod batch;
pub mod cache;
pub mod cli;
pub mod documents;
mod error;
pub mod migrations;
pub mod patch;
pub mod runner;
pub mod schema;
pub mod store;
pub mod testing;

pub use documents::Document;
pub use error::{DocumentError, Error, PlanError, Result, WithContext};
pub use patch::{FieldOp, Patch};
pub use runner::{Migration, MigrationRunner, RunSummary, RunnerConfig};
pub use store::{DocumentStore, Store};

pub mod prelude {
    pub use crate::{
        Document, DocumentStore, FieldOp, Migration, MigrationRunner, Patch, Result, RunSummary,
        Store,
    };
}

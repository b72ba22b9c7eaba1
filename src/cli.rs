//! Shared setup for the migration binaries: arguments, credentials, logging.

use crate::{
    Error, Result,
    runner::{Migration, MigrationRunner, RunSummary, RunnerConfig},
    store::Store,
};
use clap::Args;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_CREDENTIALS_PATH: &str = "service-account.json";

#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Credential file with the store connection settings.
    #[arg(long, env = "CATALOG_MIGRATE_CREDENTIALS", default_value = DEFAULT_CREDENTIALS_PATH)]
    pub credentials: PathBuf,

    /// Patches per commit (default depends on the migration, max 500)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Plan and count patches without writing them
    #[arg(long)]
    pub dry_run: bool,
}

impl MigrateArgs {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            batch_size: self.batch_size,
            dry_run: self.dry_run,
            ..RunnerConfig::default()
        }
    }
}

/// Connection settings read from the credential file.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub database_url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
}

impl Credentials {
    /// `Ok(None)` when the file does not exist; an unreadable or invalid file is a config error.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let creds: Credentials = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?;
        if creds.database_url.trim().is_empty() {
            return Err(Error::Config(format!(
                "{}: database_url is empty",
                path.display()
            )));
        }
        Ok(Some(creds))
    }

    pub async fn connect(&self) -> Result<Store> {
        let mut builder = Store::builder(&self.database_url);
        if let Some(max) = self.max_connections {
            builder = builder.max_connections(max);
        }
        if let Some(secs) = self.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        builder.build().await
    }
}

/// Install the fmt subscriber, honoring `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Load credentials, connect and run `migration` once.
///
/// Returns `Ok(None)` without touching the store when the credential file is missing.
pub async fn run_migration<M: Migration>(
    migration: &M,
    args: &MigrateArgs,
) -> Result<Option<RunSummary>> {
    let Some(creds) = Credentials::load(&args.credentials)? else {
        println!(
            "error: credential file '{}' not found; set --credentials or CATALOG_MIGRATE_CREDENTIALS",
            args.credentials.display()
        );
        return Ok(None);
    };
    let store = creds.connect().await?;
    info!("store connection established");

    let runner = MigrationRunner::with_config(store, args.runner_config());
    let summary = runner.run(migration).await?;
    print_summary(migration.name(), &summary, args.dry_run);
    Ok(Some(summary))
}

pub fn print_summary(name: &str, summary: &RunSummary, dry_run: bool) {
    let mode = if dry_run { " (dry run)" } else { "" };
    println!("--- {name} finished{mode} ---");
    println!("updated: {}", summary.updated);
    println!("skipped: {}", summary.skipped);
    println!("errors:  {}", summary.errors);
    println!("commits: {}", summary.commits);
    for failure in &summary.failures {
        println!("  - {}: {}", failure.id, failure.error);
    }
}

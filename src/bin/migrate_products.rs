use catalog_migrate::{
    cli::{self, MigrateArgs},
    migrations::ProductSchemaMigration,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "migrate-products", version, about = "Move products from the pricing-option schema to grouped items")]
struct Cli {
    #[command(flatten)]
    args: MigrateArgs,
}

#[tokio::main]
async fn main() -> catalog_migrate::Result<()> {
    let cli = Cli::parse();
    cli::init_tracing();

    cli::run_migration(&ProductSchemaMigration, &cli.args).await?;
    Ok(())
}

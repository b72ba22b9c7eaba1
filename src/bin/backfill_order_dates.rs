use catalog_migrate::{
    cli::{self, MigrateArgs},
    migrations::OrderDateBackfill,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "backfill-order-dates", version, about = "Backfill missing pickup dates on orders from product sales rounds")]
struct Cli {
    #[command(flatten)]
    args: MigrateArgs,
}

#[tokio::main]
async fn main() -> catalog_migrate::Result<()> {
    let cli = Cli::parse();
    cli::init_tracing();

    cli::run_migration(&OrderDateBackfill, &cli.args).await?;
    Ok(())
}

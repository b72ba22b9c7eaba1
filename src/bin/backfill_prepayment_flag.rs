use catalog_migrate::{
    cli::{self, MigrateArgs},
    migrations::PrepaymentFlagBackfill,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "backfill-prepayment-flag", version, about = "Default isPrepaymentRequired to false on product sales rounds")]
struct Cli {
    #[command(flatten)]
    args: MigrateArgs,
}

#[tokio::main]
async fn main() -> catalog_migrate::Result<()> {
    let cli = Cli::parse();
    cli::init_tracing();

    cli::run_migration(&PrepaymentFlagBackfill, &cli.args).await?;
    Ok(())
}

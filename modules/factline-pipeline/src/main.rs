use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use factline_common::Config;
use factline_pipeline::bootstrap::build_pipeline;
use factline_store::{migrate, PgStore, Store};

#[derive(Parser)]
#[command(name = "factline", about = "News claim verification pipeline")]
struct Args {
    /// Run a single stage once and exit (ingest, cluster, extract, verify, refine).
    #[arg(long)]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("factline=info".parse()?))
        .init();

    let args = Args::parse();

    info!("Factline pipeline starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let pipeline = build_pipeline(&config, store);

    match args.once {
        Some(stage) => pipeline.scheduler.tick(&stage).await,
        None => pipeline.scheduler.run().await,
    }
}

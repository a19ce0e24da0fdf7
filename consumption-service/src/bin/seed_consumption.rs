use anyhow::{bail, Result};
use consumption_client::db::ensure_consumption_schema;
use consumption_service::{
    config::AppConfig,
    ingest::{validated, ConsumptionCsvSource, PgBatchWriter, SeedLoader},
    observability,
};
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing("info");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: seed_consumption <csv_file_path>");
    }
    let file_path = &args[1];

    let cfg = AppConfig::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.database.max_connections)
        .connect(&cfg.database.uri)
        .await?;
    ensure_consumption_schema(&pool).await?;

    let loader = SeedLoader::new(
        Arc::new(PgBatchWriter::new(pool)),
        cfg.seed.batch_size,
        cfg.seed.retry_policy(),
    );
    let records = validated(ConsumptionCsvSource::new(file_path).records());

    let summary = loader.load(records).await?;
    tracing::info!(
        written = summary.written,
        rejected = summary.rejected,
        file = %file_path,
        "consumption seeding finished"
    );

    if summary.written == 0 {
        bail!("no valid consumption records found in {file_path}");
    }

    Ok(())
}
